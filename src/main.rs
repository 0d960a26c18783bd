use clap::Parser;
use tracing_subscriber::EnvFilter;

use oeis_solver::cli;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Initialize logging based on verbosity flag
    let filter = if cli.verbose {
        EnvFilter::new("oeis_solver=debug,info")
    } else {
        EnvFilter::new("oeis_solver=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        cli::Commands::BuildIndex(args) => {
            cli::build::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Match(args) => {
            cli::match_cmd::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Transform(args) => {
            cli::transform::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Combo(args) => {
            cli::combo::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Analyze(args) => {
            cli::analyze::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Stats(args) => {
            cli::stats::run(args, cli.format, cli.verbose)?;
        }
    }

    Ok(())
}
