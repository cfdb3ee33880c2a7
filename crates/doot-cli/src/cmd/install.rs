//! Install command

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use doot_core::{InstallConfig, InstallLayout, Pipeline, Reporter};
use doot_schema::Shell;

use super::{fetch_timeout, load_catalog, print_plan, request_for, retry_policy};
use crate::InstallArgs;
use crate::exit;
use crate::ui::ConsoleReporter;

/// Resolve, fetch, verify and install; returns the process exit code.
pub async fn install(
    args: &InstallArgs,
    dry_run: bool,
    reporter: Arc<ConsoleReporter>,
) -> Result<u8> {
    let catalog = load_catalog(&args.target).await?;
    let config = config_for(args)?;
    let pipeline = Pipeline::new(catalog, config).with_reporter(reporter.clone());
    let request = request_for(&args.target);

    if dry_run {
        let plan = pipeline.plan(&request)?;
        print_plan(&plan);
        println!("target:   {}", plan.destination.display());
        return Ok(exit::SUCCESS);
    }

    let outcome = pipeline.run(&request).await?;

    let version = outcome.installed.version();
    if outcome.completions.is_complete() {
        reporter.success(&format!("doot {version} is ready"));
        Ok(exit::SUCCESS)
    } else {
        let failed: Vec<String> = outcome
            .completions
            .failed
            .iter()
            .map(|(shell, _)| shell.to_string())
            .collect();
        reporter.warning(&format!(
            "doot {version} installed, but completions failed for: {}",
            failed.join(", ")
        ));
        Ok(exit::COMPLETIONS_PARTIAL)
    }
}

/// Install configuration from flags, environment and defaults.
pub fn config_for(args: &InstallArgs) -> Result<InstallConfig> {
    let prefix = args
        .prefix
        .clone()
        .or_else(doot_core::try_default_prefix)
        .context("cannot determine an install prefix; pass --prefix or set DOOT_INSTALL_PREFIX")?;

    let mut layout = InstallLayout::under(&prefix);
    if let Some(bin_dir) = &args.bin_dir {
        layout.bin_dir.clone_from(bin_dir);
    }

    let mut config = InstallConfig::with_layout(layout);
    config.retry = retry_policy(&args.target);
    config.fetch_timeout = fetch_timeout(&args.target);
    config.build_timeout = Duration::from_secs(args.build_timeout);
    config.check_version = !args.skip_version_check;
    config.shells = if args.no_completions {
        Vec::new()
    } else if args.shells.is_empty() {
        Shell::ALL.to_vec()
    } else {
        let mut shells = args.shells.clone();
        shells.sort();
        shells.dedup();
        shells
    };

    Ok(config)
}
