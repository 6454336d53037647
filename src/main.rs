mod commands;
mod config;
mod display;
mod error;
mod github;
mod report;

use clap::Parser;
use commands::report::ReportArgs;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "vulnreport",
    version,
    about = "Summarize a repository's Dependabot alerts and admin contacts as markdown"
)]
pub struct Cli {
    #[command(flatten)]
    report: ReportArgs,

    /// Echo the report rows as JSON instead of markdown
    #[arg(long)]
    json: bool,

    /// Log each API request
    #[arg(long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "vulnreport=debug,warn" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = commands::report::run(&cli.report, cli.json).await {
        display::error(&e.to_string());
        std::process::exit(1);
    }
}
