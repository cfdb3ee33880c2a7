use std::path::{Path, PathBuf};

use doot_schema::Shell;

/// Environment variable overriding the install prefix.
pub const PREFIX_ENV: &str = "DOOT_INSTALL_PREFIX";

/// Returns the install prefix, or None if the user's home cannot be resolved.
///
/// `$DOOT_INSTALL_PREFIX` wins; otherwise `~/.local`.
pub fn try_default_prefix() -> Option<PathBuf> {
    if let Some(val) = std::env::var_os(PREFIX_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(val));
    }
    dirs::home_dir().map(|h| h.join(".local"))
}

/// Where the executable and its completion scripts land.
///
/// Passed explicitly through the pipeline so nothing reads ambient state
/// after configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    /// Directory holding the canonical executable.
    pub bin_dir: PathBuf,
    /// Root under which shell completion directories live (usually the prefix).
    pub completion_root: PathBuf,
}

impl InstallLayout {
    /// Standard layout under a prefix: `<prefix>/bin` and `<prefix>/share/...`.
    pub fn under(prefix: impl AsRef<Path>) -> Self {
        let prefix = prefix.as_ref();
        Self {
            bin_dir: prefix.join("bin"),
            completion_root: prefix.to_path_buf(),
        }
    }

    /// Directory that holds completion scripts for `shell`.
    pub fn completion_dir(&self, shell: Shell) -> PathBuf {
        let rel = match shell {
            Shell::Bash => "share/bash-completion/completions",
            Shell::Zsh => "share/zsh/site-functions",
            Shell::Fish => "share/fish/vendor_completions.d",
        };
        self.completion_root.join(rel)
    }

    /// Full path of the completion script for `shell` and executable `exe`.
    pub fn completion_path(&self, shell: Shell, exe: &str) -> PathBuf {
        self.completion_dir(shell)
            .join(shell.completion_file_name(exe))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_under_prefix() {
        let layout = InstallLayout::under("/usr/local");
        assert_eq!(layout.bin_dir, PathBuf::from("/usr/local/bin"));
        assert_eq!(
            layout.completion_path(Shell::Zsh, "doot"),
            PathBuf::from("/usr/local/share/zsh/site-functions/_doot")
        );
        assert_eq!(
            layout.completion_path(Shell::Fish, "doot"),
            PathBuf::from("/usr/local/share/fish/vendor_completions.d/doot.fish")
        );
        assert_eq!(
            layout.completion_path(Shell::Bash, "doot"),
            PathBuf::from("/usr/local/share/bash-completion/completions/doot")
        );
    }
}
