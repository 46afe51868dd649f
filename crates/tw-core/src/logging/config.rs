//! Logging configuration.
//!
//! Level and format come from `TW_LOG`/`RUST_LOG` and `TW_LOG_FORMAT`,
//! then from `-v`/`-q` and the machine output flags on the command line.

use tracing_subscriber::filter::LevelFilter;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Console lines on stderr.
    #[default]
    Human,
    /// One JSON object per line on stderr.
    Jsonl,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" | "console" => Ok(LogFormat::Human),
            "jsonl" | "json" => Ok(LogFormat::Jsonl),
            _ => Err(format!("unknown log format: {}", s)),
        }
    }
}

/// Minimum level passed to the subscriber filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "off" | "quiet" => Ok(LogLevel::Off),
            _ => Err(format!("unknown log level: {}", s)),
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Off => LevelFilter::OFF,
        }
    }
}

/// Most verbose level named anywhere in a `RUST_LOG` directive string.
///
/// Targets are left to `EnvFilter`.
fn level_from_directives(directives: &str) -> Option<LogLevel> {
    [
        ("trace", LogLevel::Trace),
        ("debug", LogLevel::Debug),
        ("info", LogLevel::Info),
        ("warn", LogLevel::Warn),
        ("error", LogLevel::Error),
    ]
    .into_iter()
    .find(|(name, _)| directives.contains(name))
    .map(|(_, level)| level)
}

/// Resolved logging settings for one process.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Prefix human lines with a timestamp. Off with `TW_LOG_TIMESTAMPS=0`.
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::Human,
            level: LogLevel::Info,
            timestamps: true,
        }
    }
}

impl LogConfig {
    /// Read the process environment, then apply CLI overrides.
    pub fn from_env(cli_level: Option<LogLevel>, cli_format: Option<LogFormat>) -> Self {
        Self::resolve(|key| std::env::var(key).ok(), cli_level, cli_format)
    }

    /// `TW_LOG` beats `RUST_LOG`; CLI values beat both. Unparseable values
    /// are ignored.
    fn resolve(
        env: impl Fn(&str) -> Option<String>,
        cli_level: Option<LogLevel>,
        cli_format: Option<LogFormat>,
    ) -> Self {
        let env_level = match env("TW_LOG") {
            Some(val) => val.parse().ok(),
            None => env("RUST_LOG").as_deref().and_then(level_from_directives),
        };
        let env_format = env("TW_LOG_FORMAT").and_then(|val| val.parse().ok());
        let timestamps = !matches!(env("TW_LOG_TIMESTAMPS").as_deref(), Some("0" | "false"));

        let defaults = LogConfig::default();
        LogConfig {
            level: cli_level.or(env_level).unwrap_or(defaults.level),
            format: cli_format.or(env_format).unwrap_or(defaults.format),
            timestamps,
        }
    }

    /// Map `-v`/`-q` counts onto a level. Quiet wins over verbose.
    pub fn level_from_flags(verbose: u8, quiet: bool) -> Option<LogLevel> {
        if quiet {
            return Some(LogLevel::Error);
        }
        match verbose {
            0 => None,
            1 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    }
}
