//! doot-install CLI

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use doot_cli::cmd;
use doot_cli::exit;
use doot_cli::ui::ConsoleReporter;
use doot_cli::{Cli, Commands};
use doot_core::Reporter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let reporter = Arc::new(ConsoleReporter::new(cli.quiet));
    match run(cli, reporter.clone()).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            reporter.error(&exit::describe(&err));
            ExitCode::from(exit::code_for(&err))
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli, reporter: Arc<ConsoleReporter>) -> Result<u8> {
    let dry_run = cli.dry_run;

    match cli.command {
        Commands::Install(args) => cmd::install::install(&args, dry_run, reporter).await,
        Commands::Resolve(target) => cmd::resolve::resolve(&target).await.map(|()| exit::SUCCESS),
        Commands::Platform => cmd::platform::platform(cli.verbose).map(|()| exit::SUCCESS),
        Commands::Hash { files } => cmd::hash::hash(&files).map(|()| exit::SUCCESS),
        Commands::Catalog {
            version,
            checksums,
            repo,
        } => cmd::catalog::catalog(&version, &checksums, &repo).map(|()| exit::SUCCESS),
        Commands::Completions { shell } => {
            cmd::completions::completions(shell);
            Ok(exit::SUCCESS)
        }
    }
}
