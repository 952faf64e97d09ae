//! Logging support for pool operations.
//!
//! Pools report through `tracing`. Every event carries a `component` field
//! naming the part of the crate that emitted it (`"pool"`, `"bufferpool"`,
//! `"gate"`), and performance diagnostics such as discarded buffers go to the
//! `performance` target so they can be enabled on their own:
//!
//! ```text
//! RUST_LOG=performance=debug,media_pool=info
//! ```

/// Component name for the generic pool machinery.
pub const POOL: &str = "pool";
/// Component name for the buffer pool specialization.
pub const BUFFER_POOL: &str = "bufferpool";
/// Component name for the wait/flush gate.
pub const GATE: &str = "gate";

/// Log level for pool diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Per-object events on the hot path
    Trace = 0,
    /// State transitions and configuration
    Debug = 1,
    /// Noteworthy but expected events
    Info = 2,
    /// Misuse and recoverable problems
    Warn = 3,
    /// Failures
    Error = 4,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Install a global fmt subscriber filtered by `RUST_LOG`.
///
/// Falls back to `default_level` when `RUST_LOG` is unset. Returns `false`
/// if a global subscriber was already installed, which makes it safe to call
/// from every test.
#[cfg(feature = "subscriber")]
pub fn init_from_env(default_level: LogLevel) -> bool {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(tracing::Level::from(default_level).as_str().to_lowercase())
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init()
        .is_ok()
}

/// Log a trace-level message for a component.
#[macro_export]
macro_rules! log_trace {
    ($component:expr, $($arg:tt)*) => {
        $crate::tracing::trace!(component = $component, $($arg)*)
    };
}

/// Log a debug-level message for a component.
#[macro_export]
macro_rules! log_debug {
    ($component:expr, $($arg:tt)*) => {
        $crate::tracing::debug!(component = $component, $($arg)*)
    };
}

/// Log an info-level message for a component.
#[macro_export]
macro_rules! log_info {
    ($component:expr, $($arg:tt)*) => {
        $crate::tracing::info!(component = $component, $($arg)*)
    };
}

/// Log a warning-level message for a component.
#[macro_export]
macro_rules! log_warn {
    ($component:expr, $($arg:tt)*) => {
        $crate::tracing::warn!(component = $component, $($arg)*)
    };
}

/// Log an error-level message for a component.
#[macro_export]
macro_rules! log_error {
    ($component:expr, $($arg:tt)*) => {
        $crate::tracing::error!(component = $component, $($arg)*)
    };
}

/// Log a performance diagnostic (target `performance`, debug level).
#[macro_export]
macro_rules! log_perf {
    ($component:expr, $($arg:tt)*) => {
        $crate::tracing::debug!(target: "performance", component = $component, $($arg)*)
    };
}
