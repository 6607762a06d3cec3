//! Logging and debugging facilities for Vitrine.
//!
//! Vitrine uses the `tracing` crate for instrumentation. Nothing is printed
//! unless the application installs a subscriber:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_env_filter("vitrine::store=debug,vitrine::model=warn")
//!         .init();
//! }
//! ```
//!
//! Every event in the workspace names one of the [`targets`] explicitly, so
//! filters can pick out a single subsystem.

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Signal/slot system target.
    pub const SIGNAL: &str = "vitrine_core::signal";
    /// Dispatcher queue target.
    pub const DISPATCHER: &str = "vitrine_core::dispatcher";
    /// Worker pool target.
    pub const THREADPOOL: &str = "vitrine_core::threadpool";
    /// Box persistence target.
    pub const STORE: &str = "vitrine::store";
    /// Tree projection target.
    pub const MODEL: &str = "vitrine::model";
    /// Collection controller target.
    pub const COLLECTION: &str = "vitrine::collection";
    /// Configuration loading target.
    pub const CONFIG: &str = "vitrine::config";
    /// Performance spans.
    pub const PERF: &str = "vitrine::perf";
}

/// Style options for tree visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
    /// Compact representation with dashes.
    Compact,
}

impl TreeStyle {
    /// Build the line prefix for a node at `depth`.
    ///
    /// `depth == 0` is the root and gets no prefix. `indent` is the number of
    /// spaces emitted after each ancestor branch.
    pub fn prefix(self, depth: usize, is_last: bool, indent: usize) -> String {
        if depth == 0 {
            return String::new();
        }

        let (branch, tee, corner) = match self {
            TreeStyle::Ascii => ("|", "+-- ", "`-- "),
            TreeStyle::Unicode => ("\u{2502}", "\u{251c}\u{2500}\u{2500} ", "\u{2514}\u{2500}\u{2500} "),
            TreeStyle::Compact => ("", "- ", "- "),
        };

        let mut prefix = String::new();
        for _ in 0..(depth - 1) {
            prefix.push_str(branch);
            prefix.extend(std::iter::repeat_n(' ', indent));
        }
        prefix.push_str(if is_last { corner } else { tee });
        prefix
    }
}

/// A guard that keeps a tracing span entered until dropped.
///
/// Used to time store transactions and tree realization.
#[derive(Debug)]
pub struct PerfSpan {
    _span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create a new performance span.
    ///
    /// The span will be active until the guard is dropped.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: "vitrine::perf", "perf", operation = name);
        Self {
            _span: span.entered(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_root_is_empty() {
        assert_eq!(TreeStyle::Unicode.prefix(0, true, 2), "");
        assert_eq!(TreeStyle::Ascii.prefix(0, false, 2), "");
    }

    #[test]
    fn test_prefix_ascii() {
        assert_eq!(TreeStyle::Ascii.prefix(1, false, 2), "+-- ");
        assert_eq!(TreeStyle::Ascii.prefix(1, true, 2), "`-- ");
        assert_eq!(TreeStyle::Ascii.prefix(2, true, 2), "|  `-- ");
    }

    #[test]
    fn test_prefix_unicode() {
        assert_eq!(TreeStyle::Unicode.prefix(1, true, 1), "\u{2514}\u{2500}\u{2500} ");
    }

    #[test]
    fn test_perf_span() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let _span = PerfSpan::new("test_operation");
        tracing::debug!(target: targets::PERF, "inside span");
    }
}
