use anyhow::Result;
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  adwatch [config.toml] [--debug]    Run every alert of the configuration");
    eprintln!("  adwatch --help                     Show this message");
    eprintln!();
    eprintln!("  --debug    Log at debug level, including the content of downloaded reports");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let debug = args.iter().any(|a| a == "--debug");
    let directive = if debug { "adwatch=debug" } else { "adwatch=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    if let Some(unknown) = args.iter().find(|a| a.starts_with('-') && *a != "--debug") {
        print_usage();
        anyhow::bail!("unknown option {unknown}");
    }
    let config_path = args
        .iter()
        .find(|a| !a.starts_with('-'))
        .map(String::as_str)
        .unwrap_or("config/adwatch.toml");

    tracing::info!(config = config_path, "Starting alert run");
    let report = adwatch_runner::run(Path::new(config_path)).await?;

    let failed = report.failed_alerts();
    let total = report.summaries.len() + report.rejected.len();
    if failed > 0 {
        anyhow::bail!("{failed} of {total} alert(s) failed");
    }
    tracing::info!(alerts = total, "Alert run complete");
    Ok(())
}
