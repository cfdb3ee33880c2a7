//! Runtime prerequisites of the installed tool.

/// Tools `doot` shells out to at runtime.
pub const RUNTIME_TOOLS: &[&str] = &["git", "git-crypt"];

/// Runtime tools not found on `PATH`.
pub fn missing_runtime_tools() -> Vec<&'static str> {
    missing_from(RUNTIME_TOOLS, |tool| which::which(tool).is_ok())
}

fn missing_from(
    tools: &[&'static str],
    available: impl Fn(&str) -> bool,
) -> Vec<&'static str> {
    let missing: Vec<_> = tools.iter().copied().filter(|t| !available(t)).collect();
    if !missing.is_empty() {
        tracing::debug!(?missing, "runtime tools not on PATH");
    }
    missing
}
