use crate::error::{ReportError, Result};
use crate::github::{AlertSourceKind, ClientSettings};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_OUTPUT: &str = "dependabot_vulnerability_report.md";

/// On-disk configuration. Every key is optional; flags and `INPUT_*`
/// variables take precedence over anything set here.
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Deserialize, Default)]
pub struct AuthConfig {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ApiConfig {
    pub url: Option<String>,
    pub graphql_url: Option<String>,
    pub source: Option<AlertSourceKind>,
    pub connect_timeout_secs: Option<u64>,
    pub read_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ReportConfig {
    pub output: Option<PathBuf>,
}

/// Values given on the command line or through the environment.
#[derive(Debug, Default)]
pub struct Overrides {
    pub token: Option<String>,
    pub api_url: Option<String>,
    pub graphql_url: Option<String>,
    pub source: Option<AlertSourceKind>,
    pub connect_timeout_secs: Option<u64>,
    pub read_timeout_secs: Option<u64>,
    pub output: Option<PathBuf>,
}

/// Fully resolved, read-only settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub client: ClientSettings,
    pub source: AlertSourceKind,
    pub output: PathBuf,
}

impl Config {
    pub fn resolve(self, overrides: Overrides) -> Result<Settings> {
        let token = overrides
            .token
            .or(self.auth.token)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(ReportError::NotAuthenticated)?;

        let api_url = normalize_url(
            overrides
                .api_url
                .or(self.api.url)
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        )?;
        let mut client = ClientSettings::new(token, api_url);
        if let Some(url) = overrides.graphql_url.or(self.api.graphql_url) {
            client.graphql_url = normalize_url(url)?;
        }
        client.connect_timeout = overrides
            .connect_timeout_secs
            .or(self.api.connect_timeout_secs)
            .map(Duration::from_secs);
        client.read_timeout = overrides
            .read_timeout_secs
            .or(self.api.read_timeout_secs)
            .map(Duration::from_secs);
        client.ensure_same_origin()?;

        Ok(Settings {
            client,
            source: overrides.source.or(self.api.source).unwrap_or_default(),
            output: overrides
                .output
                .or(self.report.output)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
        })
    }
}

fn normalize_url(url: String) -> Result<String> {
    let url = url.trim().trim_end_matches('/').to_string();
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(ReportError::Config(format!(
            "API URL must start with http:// or https://, got `{url}`"
        )));
    }
    Ok(url)
}

pub fn config_path() -> Result<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg).join("vulnreport").join("config.toml");
        return Ok(path);
    }

    let home =
        dirs::home_dir().ok_or_else(|| ReportError::Config("Cannot find home directory".into()))?;
    Ok(home.join(".config").join("vulnreport").join("config.toml"))
}

/// Loads the config file. An explicitly named file must exist; the default
/// location is optional.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(ReportError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => {
            let path = config_path()?;
            if !path.exists() {
                return Ok(Config::default());
            }
            path
        }
    };
    let contents = fs::read_to_string(&path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}
