use crate::config::{load_config, Overrides};
use crate::display;
use crate::error::Result;
use crate::github::users::{org_owners, repo_admins};
use crate::github::{fetcher_for, AlertFetcher, AlertSourceKind, Contact, GithubClient};
use crate::report::{build_rows, render_markdown, ReportRow};
use clap::Args;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Organization (or user) that owns the repository
    #[arg(long, env = "INPUT_ORG_NAME")]
    pub org: String,

    /// Repository name
    #[arg(long, env = "INPUT_REPO_NAME")]
    pub repo: String,

    /// GitHub access token
    #[arg(long, env = "INPUT_GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// REST API base URL
    #[arg(long, env = "INPUT_API_URL")]
    pub api_url: Option<String>,

    /// GraphQL endpoint (defaults to <api-url>/graphql)
    #[arg(long)]
    pub graphql_url: Option<String>,

    /// Where alerts come from
    #[arg(long, value_enum, env = "INPUT_ALERT_SOURCE")]
    pub source: Option<AlertSourceKind>,

    /// Connect timeout in seconds
    #[arg(long)]
    pub connect_timeout: Option<u64>,

    /// Read timeout in seconds
    #[arg(long)]
    pub read_timeout: Option<u64>,

    /// Markdown file to write
    #[arg(long, short, env = "INPUT_OUTPUT_FILE")]
    pub output: Option<PathBuf>,

    /// Config file (defaults to ~/.config/vulnreport/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl ReportArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            token: self.token.clone(),
            api_url: self.api_url.clone(),
            graphql_url: self.graphql_url.clone(),
            source: self.source,
            connect_timeout_secs: self.connect_timeout,
            read_timeout_secs: self.read_timeout,
            output: self.output.clone(),
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    NothingToReport,
    Written {
        path: PathBuf,
        rows: Vec<ReportRow>,
        markdown: String,
    },
}

pub async fn run(args: &ReportArgs, json: bool) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let settings = config.resolve(args.overrides())?;
    let client = GithubClient::new(&settings.client)?;
    let fetcher = fetcher_for(settings.source);

    let outcome = generate(
        &client,
        fetcher.as_ref(),
        &args.org,
        &args.repo,
        &settings.output,
    )
    .await?;

    match outcome {
        Outcome::NothingToReport => {
            display::success(&format!(
                "No vulnerability alerts for {}/{}. Nothing to report.",
                args.org, args.repo
            ));
        }
        Outcome::Written {
            path,
            rows,
            markdown,
        } => {
            display::output(json, rows.as_slice(), |_| print!("{markdown}"));
            display::success(&format!(
                "Wrote {} alert(s) to {}",
                rows.len(),
                path.display()
            ));
        }
    }

    Ok(())
}

/// Owners, then admins, then alerts. Nothing is rendered or written when
/// there are no alerts.
pub async fn generate(
    client: &GithubClient,
    fetcher: &dyn AlertFetcher,
    org: &str,
    repo: &str,
    output: &Path,
) -> Result<Outcome> {
    let owners = org_owners(client, org).await;
    warn_skipped("org owner", &owners);
    let admins = repo_admins(client, org, repo).await;
    warn_skipped("repo admin", &admins);

    let alerts = fetcher.fetch_alerts(client, org, repo).await?;
    info!(
        source = fetcher.name(),
        alerts = alerts.len(),
        owners = owners.len(),
        admins = admins.len(),
        "collected report inputs"
    );
    if alerts.is_empty() {
        return Ok(Outcome::NothingToReport);
    }

    let rows = build_rows(org, repo, &alerts, &owners, &admins);
    let markdown = render_markdown(&rows);

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, &markdown)?;

    Ok(Outcome::Written {
        path: output.to_path_buf(),
        rows,
        markdown,
    })
}

fn warn_skipped(role: &str, contacts: &[Contact]) {
    for contact in contacts {
        if let Contact::Skipped { login, reason } = contact {
            display::warn(&format!("Left {role} {login} out of the report: {reason}"));
        }
    }
}
