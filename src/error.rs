//! Error types for the svg-imgbundle library.
//!
//! Two distinct error types reflect two distinct failure scopes:
//!
//! * [`FetchError`]: **Per reference**: one image could not be retrieved
//!   (oversized payload, HTTP error status, unreachable host, missing file).
//!   It is `Clone` because the outcome is cached and handed to every caller
//!   that coalesced on the same reference.
//!
//! * [`BundleError`]: **Per call**: the bundling call as a whole failed.
//!   A failing reference surfaces as [`BundleError::Resolution`], which names
//!   the reference so callers can tell which `href` broke the document.
//!
//! There is no partial success: when a call returns an error, no rewritten
//! document is produced.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to resolve a single image reference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The payload exceeded the configured maximum image size.
    #[error("image exceeds the maximum size of {limit} bytes")]
    TooLarge { limit: u64 },

    /// The server answered with a non-success status code.
    #[error("expected status 200 from '{url}' but got {status}")]
    RemoteStatus { url: String, status: u16 },

    /// The remote resource could not be reached or the body could not be read.
    #[error("failed to fetch '{url}': {reason}")]
    Transport {
        url: String,
        reason: String,
        timed_out: bool,
    },

    /// The local file, or one of its parent directories, does not exist.
    #[error("image file not found: '{path}'")]
    NotFound { path: PathBuf },

    /// The local file exists but could not be read.
    #[error("failed to read image file '{path}': {reason}")]
    Io { path: PathBuf, reason: String },
}

/// All errors returned by the bundling entry points.
#[derive(Debug, Error)]
pub enum BundleError {
    // ── Resolution errors ─────────────────────────────────────────────────
    /// A distinct reference failed to resolve, failing the whole document.
    #[error("failed to bundle image '{reference}': {source}")]
    Resolution {
        reference: String,
        #[source]
        source: FetchError,
    },

    /// The caller cancelled the call before every reference resolved.
    #[error("image bundling was cancelled")]
    Cancelled,

    /// The call did not finish within the configured bundling deadline.
    #[error("image bundling timed out after {secs}s\nIncrease --timeout.")]
    TimedOut { secs: u64 },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not read the input document.
    #[error("Failed to read input file '{path}': {source}")]
    InputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the output document.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BundleError {
    /// The per-reference failure behind this error, if any.
    pub fn fetch_error(&self) -> Option<&FetchError> {
        match self {
            BundleError::Resolution { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_display_names_reference() {
        let e = BundleError::Resolution {
            reference: "https://example.com/a.png".into(),
            source: FetchError::RemoteStatus {
                url: "https://example.com/a.png".into(),
                status: 500,
            },
        };
        let msg = e.to_string();
        assert!(msg.contains("https://example.com/a.png"), "got: {msg}");
        assert!(msg.contains("500"), "got: {msg}");
    }

    #[test]
    fn fetch_error_accessor() {
        let e = BundleError::Resolution {
            reference: "./missing.png".into(),
            source: FetchError::NotFound {
                path: PathBuf::from("/tmp/missing.png"),
            },
        };
        assert!(matches!(e.fetch_error(), Some(FetchError::NotFound { .. })));
        assert!(BundleError::Cancelled.fetch_error().is_none());
    }

    #[test]
    fn too_large_display() {
        let e = FetchError::TooLarge { limit: 1024 };
        assert!(e.to_string().contains("1024 bytes"));
    }

    #[test]
    fn timed_out_display() {
        let e = BundleError::TimedOut { secs: 300 };
        assert!(e.to_string().contains("300s"));
    }
}
