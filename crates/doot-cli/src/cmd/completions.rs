//! Completions command

use clap::CommandFactory;
use clap_complete::generate;

/// Generate shell completions for doot-install itself
pub fn completions(shell: clap_complete::Shell) {
    let mut cmd = crate::Cli::command();
    generate(shell, &mut cmd, "doot-install", &mut std::io::stdout());
}
