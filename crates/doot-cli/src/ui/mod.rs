//! Terminal output.
//!
//! - [`theme`] - Colors, icons, and formatting helpers
//! - [`output`] - The console [`Reporter`](doot_core::Reporter) used by commands

pub mod output;
pub mod theme;

pub use output::ConsoleReporter;
pub use theme::Theme;
