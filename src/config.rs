//! Configuration types for image bundling.
//!
//! All bundling behaviour is controlled through [`BundleConfig`], built via
//! its [`BundleConfigBuilder`]. The config is plain data: it can be cloned
//! into every bundler, serialised next to run statistics, and compared across
//! runs.

use crate::error::BundleError;
use serde::{Deserialize, Serialize};

/// Default cap on a single remote image payload: 32 MiB.
pub const DEFAULT_MAX_IMAGE_SIZE: u64 = 1 << 25;

/// Configuration for a [`crate::Bundler`].
///
/// # Example
/// ```rust
/// use svg_imgbundle::BundleConfig;
///
/// let config = BundleConfig::builder()
///     .max_image_size(4 * 1024 * 1024)
///     .concurrency(8)
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 8);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleConfig {
    /// Largest accepted remote payload in bytes. Default: 32 MiB.
    ///
    /// Payloads of exactly this size are accepted; one byte more fails with
    /// [`crate::FetchError::TooLarge`]. The limit is enforced while reading
    /// the body, so a server that under-reports `Content-Length` is still
    /// caught.
    pub max_image_size: u64,

    /// Per-request HTTP timeout in seconds. Default: 60.
    pub request_timeout_secs: u64,

    /// Deadline for a whole bundling call in seconds. Default: 300.
    pub bundle_timeout_secs: u64,

    /// Number of distinct references resolved at the same time. Default: 16.
    ///
    /// Fetches are network-bound; a hanging request only occupies one slot
    /// until its request timeout fires.
    pub concurrency: usize,

    /// Which kinds of references are bundled. Default: [`ReferenceScope::All`].
    pub scope: ReferenceScope,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            max_image_size: DEFAULT_MAX_IMAGE_SIZE,
            request_timeout_secs: 60,
            bundle_timeout_secs: 300,
            concurrency: 16,
            scope: ReferenceScope::default(),
        }
    }
}

impl BundleConfig {
    /// Create a new builder for `BundleConfig`.
    pub fn builder() -> BundleConfigBuilder {
        BundleConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`BundleConfig`].
#[derive(Debug)]
pub struct BundleConfigBuilder {
    config: BundleConfig,
}

impl BundleConfigBuilder {
    pub fn max_image_size(mut self, bytes: u64) -> Self {
        self.config.max_image_size = bytes;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn bundle_timeout_secs(mut self, secs: u64) -> Self {
        self.config.bundle_timeout_secs = secs;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn scope(mut self, scope: ReferenceScope) -> Self {
        self.config.scope = scope;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BundleConfig, BundleError> {
        let c = &self.config;
        if c.max_image_size == 0 {
            return Err(BundleError::InvalidConfig(
                "max image size must be ≥ 1 byte".into(),
            ));
        }
        if c.request_timeout_secs == 0 || c.bundle_timeout_secs == 0 {
            return Err(BundleError::InvalidConfig(
                "timeouts must be ≥ 1 second".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(BundleError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which image references a bundling call rewrites.
///
/// Out-of-scope references are left untouched in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReferenceScope {
    /// Remote URLs and local paths. (default)
    #[default]
    All,
    /// Only `http://` and `https://` URLs.
    Remote,
    /// Only filesystem paths.
    Local,
}

impl ReferenceScope {
    pub fn includes_remote(self) -> bool {
        matches!(self, ReferenceScope::All | ReferenceScope::Remote)
    }

    pub fn includes_local(self) -> bool {
        matches!(self, ReferenceScope::All | ReferenceScope::Local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = BundleConfig::default();
        assert_eq!(c.max_image_size, 1 << 25);
        assert_eq!(c.request_timeout_secs, 60);
        assert_eq!(c.bundle_timeout_secs, 300);
        assert_eq!(c.concurrency, 16);
        assert_eq!(c.scope, ReferenceScope::All);
    }

    #[test]
    fn builder_clamps_concurrency() {
        let c = BundleConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn builder_rejects_zero_size() {
        let err = BundleConfig::builder().max_image_size(0).build().unwrap_err();
        assert!(matches!(err, BundleError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        assert!(BundleConfig::builder().request_timeout_secs(0).build().is_err());
        assert!(BundleConfig::builder().bundle_timeout_secs(0).build().is_err());
    }

    #[test]
    fn scope_membership() {
        assert!(ReferenceScope::All.includes_remote());
        assert!(ReferenceScope::All.includes_local());
        assert!(ReferenceScope::Remote.includes_remote());
        assert!(!ReferenceScope::Remote.includes_local());
        assert!(!ReferenceScope::Local.includes_remote());
        assert!(ReferenceScope::Local.includes_local());
    }

    #[test]
    fn serde_round_trip_keeps_scope() {
        let c = BundleConfig::builder()
            .scope(ReferenceScope::Local)
            .build()
            .unwrap();
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains("\"Local\""));
    }
}
