//! Logging utilities
//!
//! Two channels exist side by side:
//! - the `log` facade, used throughout the crate and installed with [`init`];
//! - [`LoggerProxy`], a per-viewer fan-out that forwards formatted lines to
//!   callbacks registered by library users (the C ABI's logger callbacks).

use std::fmt;

use crate::config::LoggingConfig;

pub use log::{debug, error, info, trace, warn};

/// Target used when mirroring fan-out messages to the `log` facade.
pub const LOG_TARGET: &str = "datviz";

/// A registered logging callback. Receives one formatted line per call,
/// including the trailing newline.
pub type LogSink = Box<dyn FnMut(&str)>;

/// Initialize the global logger.
///
/// `RUST_LOG` takes precedence over the configured filter. Only the first
/// call installs a logger; later calls are ignored.
pub fn init(config: &LoggingConfig) {
    let mut builder = env_logger::Builder::new();

    match std::env::var("RUST_LOG") {
        Ok(filter) => builder.parse_filters(&filter),
        Err(_) => builder.parse_filters(&config.filter),
    };

    if builder.try_init().is_ok() {
        log::debug!("logging initialized");
    }
}

/// Forwards log lines to every registered sink, in registration order.
///
/// There is no level filtering; [`info`](Self::info) and
/// [`error`](Self::error) only differ by their message prefix. Sinks are
/// called directly, so a panicking sink propagates to the caller.
#[derive(Default)]
pub struct LoggerProxy {
    sinks: Vec<LogSink>,
}

impl LoggerProxy {
    /// Create a proxy with no sinks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sink. Sinks cannot be removed.
    pub fn add_logger<F>(&mut self, sink: F)
    where
        F: FnMut(&str) + 'static,
    {
        self.sinks.push(Box::new(sink));
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.sinks.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Format one line and forward it to every sink.
    pub fn log(&mut self, args: fmt::Arguments<'_>) {
        if self.sinks.is_empty() {
            return;
        }

        let mut message = args.to_string();
        message.push('\n');

        for sink in &mut self.sinks {
            sink(&message);
        }
    }

    /// Forward an `INFO:` line and mirror it to `log::info!`.
    pub fn info(&mut self, args: fmt::Arguments<'_>) {
        log::info!(target: LOG_TARGET, "{args}");
        self.log(format_args!("INFO: {args}"));
    }

    /// Forward an `ERROR:` line and mirror it to `log::error!`.
    pub fn error(&mut self, args: fmt::Arguments<'_>) {
        log::error!(target: LOG_TARGET, "{args}");
        self.log(format_args!("ERROR: {args}"));
    }
}

impl fmt::Debug for LoggerProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerProxy")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}
