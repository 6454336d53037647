use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("No access token. Pass --token, set INPUT_GITHUB_TOKEN, or add auth.token to the config file.")]
    NotAuthenticated,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("GitHub API error: {0}")]
    GitHub(String),

    #[error("Query execution failed with status {status}: {body}")]
    QueryExecution { status: u16, body: String },

    #[error("GraphQL query returned errors: {0}")]
    GraphQl(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<octocrab::Error> for ReportError {
    fn from(err: octocrab::Error) -> Self {
        ReportError::GitHub(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
