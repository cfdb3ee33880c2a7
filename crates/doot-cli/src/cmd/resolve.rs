//! Resolve command

use anyhow::Result;

use doot_core::{InstallConfig, Pipeline};

use super::{load_catalog, print_plan, request_for};
use crate::TargetArgs;

/// Print the artifact `install` would use, without fetching anything.
pub async fn resolve(target: &TargetArgs) -> Result<()> {
    let catalog = load_catalog(target).await?;
    let prefix = doot_core::try_default_prefix().unwrap_or_default();
    let pipeline = Pipeline::new(catalog, InstallConfig::with_prefix(prefix));

    let plan = pipeline.plan(&request_for(target))?;
    print_plan(&plan);
    Ok(())
}
