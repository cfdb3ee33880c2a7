//! Console implementation of [`Reporter`].
//!
//! Everything goes to stderr so stdout stays clean for command output
//! (`resolve`, `hash`, `catalog`, ...).

use std::io::{IsTerminal, Write};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use crossterm::style::Stylize;
use doot_core::Reporter;
use doot_schema::{ArtifactDescriptor, Shell};

use super::theme::{self, Theme};

#[derive(Debug)]
pub struct ConsoleReporter {
    theme: Theme,
    quiet: bool,
    interactive: bool,
    current_download: Mutex<Option<String>>,
}

impl ConsoleReporter {
    /// With `quiet`, only warnings and errors are printed.
    pub fn new(quiet: bool) -> Self {
        Self {
            theme: Theme::default(),
            quiet,
            interactive: std::io::stderr().is_terminal(),
            current_download: Mutex::new(None),
        }
    }
}

impl Reporter for ConsoleReporter {
    fn section(&self, title: &str) {
        if self.quiet {
            return;
        }
        eprintln!("{}", title.with(self.theme.colors.header).bold());
    }

    fn resolved(&self, descriptor: &ArtifactDescriptor) {
        if self.quiet {
            return;
        }
        eprintln!(
            "  doot {} ({})  {}",
            descriptor.version,
            descriptor.target_label(),
            descriptor.url.as_str().with(self.theme.colors.secondary)
        );
    }

    fn downloading(&self, url: &str, current: u64, total: Option<u64>) {
        if self.quiet {
            return;
        }
        let Ok(mut last) = self.current_download.lock() else {
            return;
        };
        if last.as_deref() != Some(url) {
            eprintln!("  {} {}", self.theme.icons.info, url.with(self.theme.colors.secondary));
            *last = Some(url.to_string());
        }

        if let (true, Some(total)) = (self.interactive, total) {
            let mut stderr = std::io::stderr();
            let _ = write!(stderr, "\r  {}", theme::format_download_progress(current, total));
            if current >= total {
                let _ = writeln!(stderr);
            }
            let _ = stderr.flush();
        }
    }

    fn retrying(&self, attempt: u32, max_attempts: u32, delay: Duration, reason: &str) {
        self.warning(&format!(
            "attempt {attempt}/{max_attempts} failed ({reason}); retrying in {:.1}s",
            delay.as_secs_f64()
        ));
    }

    fn installed(&self, path: &Path) {
        self.success(&format!("installed {}", path.display()));
    }

    fn completion_written(&self, shell: Shell, path: &Path) {
        if self.quiet {
            return;
        }
        eprintln!(
            "  {} {shell:<5} {}",
            self.theme.icons.success.with(self.theme.colors.success),
            path.display().to_string().with(self.theme.colors.secondary)
        );
    }

    fn completion_failed(&self, shell: Shell, reason: &str) {
        self.warning(&format!("{shell} completions failed: {reason}"));
    }

    fn info(&self, msg: &str) {
        if self.quiet {
            return;
        }
        eprintln!("  {} {msg}", self.theme.icons.info);
    }

    fn success(&self, msg: &str) {
        if self.quiet {
            return;
        }
        eprintln!(
            "  {} {msg}",
            self.theme.icons.success.with(self.theme.colors.success)
        );
    }

    fn warning(&self, msg: &str) {
        eprintln!(
            "  {} {}",
            self.theme.icons.warning.with(self.theme.colors.warning),
            msg.with(self.theme.colors.warning)
        );
    }

    fn error(&self, msg: &str) {
        eprintln!(
            "{} {}",
            self.theme.icons.error.with(self.theme.colors.error),
            msg.with(self.theme.colors.error)
        );
    }
}
