//! Structured logging utilities.
//!
//! Provides context-aware logging with run_id and item_id included
//! in every log message.

use std::fmt;

/// Logging context for a migration run, a command, or a submission.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub run_id: String,
    pub item_id: Option<String>,
}

impl LogContext {
    pub fn new(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            item_id: None,
        }
    }

    pub fn with_item(&self, item_id: &str) -> Self {
        Self {
            run_id: self.run_id.clone(),
            item_id: Some(item_id.to_string()),
        }
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.item_id {
            Some(item) => write!(f, "[run={}] [item={}]", self.run_id, item),
            None => write!(f, "[run={}]", self.run_id),
        }
    }
}

/// Log an info message with context.
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $event:expr, $($key:ident = $value:expr),+ $(,)?) => {
        log::info!(
            concat!("{} {}", $(" ", stringify!($key), "={:?}"),+),
            $ctx,
            $event,
            $($value),+
        )
    };
    ($ctx:expr, $event:expr $(,)?) => {
        log::info!("{} {}", $ctx, $event)
    };
}

/// Log a warning message with context.
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $event:expr, $($key:ident = $value:expr),+ $(,)?) => {
        log::warn!(
            concat!("{} {}", $(" ", stringify!($key), "={:?}"),+),
            $ctx,
            $event,
            $($value),+
        )
    };
    ($ctx:expr, $event:expr $(,)?) => {
        log::warn!("{} {}", $ctx, $event)
    };
}

/// Log an error message with context.
#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $event:expr, $($key:ident = $value:expr),+ $(,)?) => {
        log::error!(
            concat!("{} {}", $(" ", stringify!($key), "={:?}"),+),
            $ctx,
            $event,
            $($value),+
        )
    };
    ($ctx:expr, $event:expr $(,)?) => {
        log::error!("{} {}", $ctx, $event)
    };
}

/// Log a debug message with context.
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $event:expr, $($key:ident = $value:expr),+ $(,)?) => {
        log::debug!(
            concat!("{} {}", $(" ", stringify!($key), "={:?}"),+),
            $ctx,
            $event,
            $($value),+
        )
    };
    ($ctx:expr, $event:expr $(,)?) => {
        log::debug!("{} {}", $ctx, $event)
    };
}
