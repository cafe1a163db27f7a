//! Structured logging utilities.
//!
//! Provides context-aware logging with the check ID, network and client
//! included in every log message.

use std::fmt;

/// Logging context for one evaluation.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub check_id: String,
    pub network: Option<String>,
    pub client: Option<String>,
}

impl LogContext {
    pub fn new(check_id: &str) -> Self {
        Self {
            check_id: check_id.to_string(),
            network: None,
            client: None,
        }
    }

    pub fn with_target(&self, network: &str, client: &str) -> Self {
        Self {
            check_id: self.check_id.clone(),
            network: Some(network.to_string()),
            client: Some(client.to_string()),
        }
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[check={}]", self.check_id)?;
        if let Some(network) = &self.network {
            write!(f, " [network={}]", network)?;
        }
        if let Some(client) = &self.client {
            write!(f, " [client={}]", client)?;
        }
        Ok(())
    }
}

/// Log an info message with context: `log_info!(ctx, "EVENT", key = value, ...)`.
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $event:literal $(, $key:ident = $value:expr)* $(,)?) => {
        log::info!(
            concat!("{} ", $event $(, " ", stringify!($key), "={}")*),
            $ctx
            $(, $value)*
        )
    };
}

/// Log a warning message with context: `log_warn!(ctx, "EVENT", key = value, ...)`.
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $event:literal $(, $key:ident = $value:expr)* $(,)?) => {
        log::warn!(
            concat!("{} ", $event $(, " ", stringify!($key), "={}")*),
            $ctx
            $(, $value)*
        )
    };
}

/// Log an error message with context: `log_error!(ctx, "EVENT", key = value, ...)`.
#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $event:literal $(, $key:ident = $value:expr)* $(,)?) => {
        log::error!(
            concat!("{} ", $event $(, " ", stringify!($key), "={}")*),
            $ctx
            $(, $value)*
        )
    };
}

/// Log a debug message with context: `log_debug!(ctx, "EVENT", key = value, ...)`.
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $event:literal $(, $key:ident = $value:expr)* $(,)?) => {
        log::debug!(
            concat!("{} ", $event $(, " ", stringify!($key), "={}")*),
            $ctx
            $(, $value)*
        )
    };
}
