//! Catalog command: turn a release checksum listing into catalog TOML.

use anyhow::{Context, Result};
use std::path::Path;

use doot_core::catalog::{Checksums, ReleaseLayout};
use doot_schema::Version;

pub fn catalog(version: &str, checksums: &Path, repo: &str) -> Result<()> {
    let text = std::fs::read_to_string(checksums)
        .with_context(|| format!("failed to read {}", checksums.display()))?;
    let checksums = Checksums::parse(&text)?;

    let catalog = ReleaseLayout::new(repo).catalog_for(&Version::from(version), &checksums)?;
    print!("{}", catalog.to_toml()?);
    Ok(())
}
