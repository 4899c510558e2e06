//! Logging boundary for bundling events.
//!
//! The bundler reports what it does on three channels: `debug` (each fetch
//! and file read), `info` (references deliberately left alone) and `error`
//! (each reference that failed, reported before the call returns its error).
//! Inject an [`Arc<dyn BundleLogger>`] via [`crate::Bundler::with_logger`] to
//! route these wherever the host application wants them: a terminal, a test
//! harness, a log file.
//!
//! The default is [`TracingLogger`], which forwards to the `tracing` macros.
//!
//! # Example
//!
//! ```rust
//! use svg_imgbundle::BundleLogger;
//! use std::sync::atomic::{AtomicBool, Ordering};
//!
//! #[derive(Default)]
//! struct FailureFlag(AtomicBool);
//!
//! impl BundleLogger for FailureFlag {
//!     fn error(&self, _message: &str) {
//!         self.0.store(true, Ordering::SeqCst);
//!     }
//! }
//! ```

use std::sync::Arc;

/// Receives bundling events.
///
/// Implementations must be `Send + Sync`: references are resolved
/// concurrently, so the channels may be called from several tasks at once.
/// All methods default to no-ops.
pub trait BundleLogger: Send + Sync {
    /// Fine-grained progress: fetches, file reads, cache hits.
    fn debug(&self, message: &str) {
        let _ = message;
    }

    /// Notable but non-fatal events, such as references left unresolved.
    fn info(&self, message: &str) {
        let _ = message;
    }

    /// A reference failed to resolve. The call will fail with it.
    fn error(&self, message: &str) {
        let _ = message;
    }
}

/// Forwards every channel to the matching `tracing` macro.
///
/// This is the default logger of a [`crate::Bundler`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl BundleLogger for TracingLogger {
    fn debug(&self, message: &str) {
        tracing::debug!("{}", message);
    }

    fn info(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!("{}", message);
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl BundleLogger for NoopLogger {}

/// Convenience alias matching the type stored in [`crate::Bundler`].
pub type SharedLogger = Arc<dyn BundleLogger>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingLogger {
        lines: Mutex<Vec<(String, String)>>,
    }

    impl BundleLogger for RecordingLogger {
        fn debug(&self, message: &str) {
            self.lines.lock().unwrap().push(("debug".into(), message.into()));
        }

        fn error(&self, message: &str) {
            self.lines.lock().unwrap().push(("error".into(), message.into()));
        }
    }

    #[test]
    fn noop_logger_does_not_panic() {
        let l = NoopLogger;
        l.debug("a");
        l.info("b");
        l.error("c");
    }

    #[test]
    fn unimplemented_channels_default_to_noop() {
        let l = RecordingLogger::default();
        l.debug("fetching");
        l.info("skipped");
        l.error("failed");

        let lines = l.lines.lock().unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], ("debug".to_string(), "fetching".to_string()));
        assert_eq!(lines[1], ("error".to_string(), "failed".to_string()));
    }

    #[test]
    fn arc_dyn_logger_works() {
        let l: SharedLogger = Arc::new(TracingLogger);
        l.debug("debug event");
        l.info("info event");
        l.error("error event");
    }
}
