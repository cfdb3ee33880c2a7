//! Platform command

use anyhow::Result;

/// Print the detected host platform, e.g. `linux-arm64`.
pub fn platform(verbose: bool) -> Result<()> {
    let platform = doot_core::platform::identify()?;
    if verbose {
        println!("{platform} (release assets: doot-{})", platform.release_suffix());
    } else {
        println!("{platform}");
    }
    Ok(())
}
