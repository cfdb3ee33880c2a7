//! doot-install - resolve, verify and install the doot dotfiles manager
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! # Overview
//!
//! Picks the right `doot` release artifact for the host from a catalog,
//! checks its SHA256, builds it from source when asked, installs it
//! atomically as `<prefix>/bin/doot` and writes shell completions.
//!
//! # Directory Layout
//!
//! ```text
//! <prefix>/                      # $DOOT_INSTALL_PREFIX or ~/.local
//! ├── bin/doot
//! └── share/
//!     ├── bash-completion/completions/doot
//!     ├── zsh/site-functions/_doot
//!     └── fish/vendor_completions.d/doot.fish
//! ```

pub mod cmd;
pub mod exit;
pub mod ui;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use doot_schema::Shell;

/// Version reported by `--version`.
pub const VERSION: &str = env!("DOOT_INSTALL_VERSION");

#[derive(Debug, Parser)]
#[command(name = "doot-install")]
#[command(author, version = VERSION, about = "Install the doot dotfiles manager")]
pub struct Cli {
    /// Show what would happen without making changes
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log every pipeline step to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Which artifact to pick.
#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
    /// Release to install, or `latest`
    pub version: String,

    /// Catalog file or http(s) URL
    #[arg(long, env = "DOOT_INSTALL_CATALOG")]
    pub catalog: String,

    /// Target platform (e.g. linux-arm64) instead of the detected host
    #[arg(long)]
    pub platform: Option<String>,

    /// Build from the source archive instead of using a prebuilt binary
    #[arg(long)]
    pub from_source: bool,

    /// Extra attempts after a transient fetch failure
    #[arg(long, default_value_t = 2)]
    pub retries: u32,

    /// Seconds allowed per fetch attempt
    #[arg(long, value_name = "SECS", default_value_t = 120)]
    pub fetch_timeout: u64,
}

#[derive(Debug, Clone, Args)]
pub struct InstallArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Install prefix (executable goes to <prefix>/bin)
    #[arg(long, env = "DOOT_INSTALL_PREFIX")]
    pub prefix: Option<PathBuf>,

    /// Directory for the executable, overriding <prefix>/bin
    #[arg(long)]
    pub bin_dir: Option<PathBuf>,

    /// Shells to generate completions for (default: all)
    #[arg(long = "shell", value_name = "SHELL")]
    pub shells: Vec<Shell>,

    /// Skip shell completion generation
    #[arg(long, conflicts_with = "shells")]
    pub no_completions: bool,

    /// Seconds allowed for a source build
    #[arg(long, value_name = "SECS", default_value_t = 600)]
    pub build_timeout: u64,

    /// Do not run `doot --version` after installing
    #[arg(long)]
    pub skip_version_check: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Install a doot release
    Install(InstallArgs),
    /// Show which artifact would be installed
    Resolve(TargetArgs),
    /// Print the detected platform
    Platform,
    /// Compute SHA256 of files, in sha256sum format
    Hash {
        /// Files to hash
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Generate a catalog entry from a release's checksum listing
    Catalog {
        /// Release version
        version: String,
        /// sha256sum-format listing of the release assets
        #[arg(long)]
        checksums: PathBuf,
        /// Repository publishing the release
        #[arg(long, default_value = doot_schema::UPSTREAM_REPO)]
        repo: String,
    },
    /// Generate shell completions for doot-install
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_install_flags() {
        let cli = Cli::try_parse_from([
            "doot-install",
            "install",
            "1.4.0",
            "--catalog",
            "/tmp/catalog.toml",
            "--platform",
            "linux-arm64",
            "--shell",
            "zsh",
            "--shell",
            "fish",
            "--retries",
            "0",
        ])
        .unwrap();

        let Commands::Install(args) = cli.command else {
            panic!("expected install");
        };
        assert_eq!(args.target.version, "1.4.0");
        assert_eq!(args.target.platform.as_deref(), Some("linux-arm64"));
        assert_eq!(args.shells, vec![Shell::Zsh, Shell::Fish]);
        assert_eq!(args.target.retries, 0);
        assert!(!args.target.from_source);
    }

    #[test]
    fn rejects_unknown_shell() {
        let err = Cli::try_parse_from([
            "doot-install",
            "install",
            "1.4.0",
            "--catalog",
            "c.toml",
            "--shell",
            "powershell",
        ])
        .unwrap_err();
        assert!(err.to_string().contains("powershell"));
    }
}
