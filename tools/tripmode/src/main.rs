use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tripmode::cli::{self, Cli, LogFormat};

fn main() -> Result<()> {
    // Parse first so -v can pick the log level
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    cli::run(cli)
}

/// Logs go to stderr; stdout carries the run summary and preview
fn init_tracing(verbose: u8, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli::log_filter(verbose)));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
