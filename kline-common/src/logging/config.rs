//! Logging configuration and initialization.

use std::env;
use std::io::IsTerminal;

use tracing_subscriber::fmt::time::{ChronoLocal, ChronoUtc, FormatTime};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable format with colors on terminals
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON format for machine parsing
    Json,
}

impl LogFormat {
    /// Parse format from string, falling back to `Pretty`
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

/// Timestamp format for log entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampFormat {
    /// Local time with timezone
    #[default]
    Local,
    /// UTC time (ISO 8601)
    Utc,
    /// No timestamps
    None,
}

impl TimestampFormat {
    /// Parse format from string, falling back to `Local`
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "utc" => TimestampFormat::Utc,
            "none" | "off" => TimestampFormat::None,
            _ => TimestampFormat::Local,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Output format (pretty, compact, json)
    pub format: LogFormat,
    /// Timestamp format
    pub timestamps: TimestampFormat,
    /// Default log level filter
    pub default_level: String,
    /// Include source file location
    pub include_location: bool,
    /// Include thread IDs
    pub include_thread_ids: bool,
    /// Include target (module path)
    pub include_target: bool,
    /// Include the current span in JSON output
    pub include_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            timestamps: TimestampFormat::Local,
            default_level: "info".to_string(),
            include_location: false,
            include_thread_ids: false,
            include_target: true,
            include_spans: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables
    ///
    /// Reads `LOG_FORMAT`, `LOG_TIMESTAMPS`, `LOG_LEVEL`, `LOG_LOCATION`
    /// and `LOG_THREAD_IDS`.
    pub fn from_env() -> Self {
        let flag = |name: &str, default: bool| {
            env::var(name)
                .map(|s| s == "true" || s == "1")
                .unwrap_or(default)
        };

        Self {
            format: env::var("LOG_FORMAT")
                .map(|s| LogFormat::parse(&s))
                .unwrap_or_default(),
            timestamps: env::var("LOG_TIMESTAMPS")
                .map(|s| TimestampFormat::parse(&s))
                .unwrap_or_default(),
            default_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            include_location: flag("LOG_LOCATION", false),
            include_thread_ids: flag("LOG_THREAD_IDS", false),
            include_target: true,
            include_spans: false,
        }
    }

    /// Create config for JSON output
    pub fn json() -> Self {
        Self {
            format: LogFormat::Json,
            timestamps: TimestampFormat::Utc,
            include_location: true,
            include_thread_ids: true,
            include_spans: true,
            ..Default::default()
        }
    }

    /// Create config for compact output
    pub fn compact() -> Self {
        Self {
            format: LogFormat::Compact,
            ..Default::default()
        }
    }

    /// Set the default log level
    pub fn with_default_level(mut self, level: impl Into<String>) -> Self {
        self.default_level = level.into();
        self
    }
}

/// Initialize logging with the given configuration
///
/// # Errors
///
/// Returns an error if the subscriber cannot be initialized (e.g., already set)
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_level));

    let layer = match config.timestamps {
        TimestampFormat::Local => {
            format_layer(&config, ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f %z".to_string()))
        }
        TimestampFormat::Utc => {
            format_layer(&config, ChronoUtc::new("%Y-%m-%dT%H:%M:%S%.3fZ".to_string()))
        }
        TimestampFormat::None => format_layer(&config, ()),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(env_filter)
        .try_init()?;

    Ok(())
}

/// Build the output layer for the configured format and timer
fn format_layer<T>(config: &LogConfig, timer: T) -> BoxedLayer
where
    T: FormatTime + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_timer(timer)
        .with_target(config.include_target)
        .with_thread_ids(config.include_thread_ids)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    match config.format {
        LogFormat::Json => layer
            .json()
            .with_current_span(config.include_spans)
            .with_span_list(false)
            .boxed(),
        LogFormat::Compact => layer.compact().with_ansi(false).boxed(),
        LogFormat::Pretty => layer.with_ansi(std::io::stdout().is_terminal()).boxed(),
    }
}
