//! Log setup shared by the server and client binaries.

use std::io::IsTerminal;

use clap::ValueEnum;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogLevel {
    None,
    Error,
    #[default]
    Warning,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// The `EnvFilter` directive level.
    #[must_use]
    pub fn directive(self) -> &'static str {
        match self {
            Self::None => "off",
            Self::Error => "error",
            Self::Warning => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogColorize {
    Never,
    Always,
    /// Color when stderr is a terminal.
    #[default]
    Auto,
}

impl LogColorize {
    #[must_use]
    pub fn enabled(self, stderr_is_terminal: bool) -> bool {
        match self {
            Self::Never => false,
            Self::Always => true,
            Self::Auto => stderr_is_terminal,
        }
    }
}

/// The filter for an optional `--log-level`.
///
/// An explicit level wins; otherwise `RUST_LOG`, otherwise warnings.
#[must_use]
pub fn filter_for(level: Option<LogLevel>) -> EnvFilter {
    let directives = |level: LogLevel| {
        let level = level.directive();
        format!("ferroterm_core={level},ferroterm_server={level},ferroterm_client={level},ferroterm={level}")
    };
    match level {
        Some(level) => EnvFilter::new(directives(level)),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(directives(LogLevel::default()))),
    }
}

/// Install the global subscriber, writing to stderr.
pub fn init_logging(level: Option<LogLevel>, colorize: LogColorize) -> std::io::Result<()> {
    let ansi = colorize.enabled(std::io::stderr().is_terminal());
    let verbose = matches!(level, Some(LogLevel::Debug | LogLevel::Trace));
    tracing_subscriber::registry()
        .with(filter_for(level))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(ansi)
                .with_target(true)
                .with_file(verbose)
                .with_line_number(verbose),
        )
        .try_init()
        .map_err(|err| std::io::Error::other(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_map_to_directives() {
        assert_eq!(LogLevel::None.directive(), "off");
        assert_eq!(LogLevel::Warning.directive(), "warn");
        assert_eq!(LogLevel::default(), LogLevel::Warning);
    }

    #[test]
    fn level_names_match_cli() {
        let level = LogLevel::from_str("warning", false).expect("valid level");
        assert_eq!(level, LogLevel::Warning);
        assert!(LogLevel::from_str("verbose", false).is_err());
    }

    #[test]
    fn colorize_auto_follows_terminal() {
        assert!(LogColorize::Auto.enabled(true));
        assert!(!LogColorize::Auto.enabled(false));
        assert!(LogColorize::Always.enabled(false));
        assert!(!LogColorize::Never.enabled(true));
    }

    #[test]
    fn explicit_level_builds_filter() {
        let filter = filter_for(Some(LogLevel::Debug)).to_string();
        assert!(filter.contains("ferroterm_server=debug"));
    }
}
