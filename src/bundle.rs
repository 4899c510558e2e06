//! Bundling entry points: resolve every image reference and rewrite the
//! document.
//!
//! ## Flow
//!
//! ```text
//! document ──▶ matcher ──▶ classify ──▶ cache ──(miss)──▶ fetch ──▶ encode
//!                                         │
//!                                         ▼
//!                              sequential rewrite pass
//! ```
//!
//! Distinct references are resolved concurrently; the output buffer is only
//! touched afterwards, in one ordered pass over the matched spans. The first
//! failing reference fails the call and drops the fetches still in flight.

use crate::cache::{FetchOutcome, ImageCache};
use crate::config::{BundleConfig, ReferenceScope};
use crate::error::BundleError;
use crate::logger::{SharedLogger, TracingLogger};
use crate::pipeline::classify::{classify, Classification, SkipReason, SourceLocation, Target};
use crate::pipeline::encode::{self, ResolvedImage};
use crate::pipeline::fetch::Fetcher;
use crate::pipeline::matcher::{self, Occurrence};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Counters describing one bundling call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleStats {
    /// Image `href` attributes found, duplicates included.
    pub occurrences: usize,
    /// Distinct reference strings among them.
    pub distinct_references: usize,
    /// Distinct references replaced by a data URI.
    pub embedded_references: usize,
    /// Distinct references deliberately left as-is.
    pub skipped_references: usize,
    /// Fetches actually performed by this call.
    pub fetched: usize,
    /// Embedded references served from an earlier call's cache entry.
    pub cache_hits: usize,
    pub duration_ms: u64,
}

/// Rewritten document plus statistics.
#[derive(Debug, Clone)]
pub struct BundleOutput {
    pub document: Vec<u8>,
    pub stats: BundleStats,
}

/// Resolves image references and rewrites documents.
///
/// A `Bundler` owns a shared [`ImageCache`]. Calls made with
/// `use_cache = true` read and populate it, so a reference fetched once is
/// never fetched again for the life of the cache. Calls made with
/// `use_cache = false` get a private cache that still coalesces duplicate
/// references within the document and is dropped when the call returns.
///
/// # Example
/// ```rust,no_run
/// use svg_imgbundle::{BundleConfig, Bundler, SourceLocation};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bundler = Bundler::new(BundleConfig::default())?;
/// let svg = std::fs::read("diagram.svg")?;
/// let out = bundler
///     .bundle(&SourceLocation::parse("diagram.svg"), &svg, true)
///     .await?;
/// std::fs::write("diagram.bundled.svg", out)?;
/// # Ok(())
/// # }
/// ```
pub struct Bundler {
    config: BundleConfig,
    fetcher: Fetcher,
    cache: Arc<ImageCache>,
    logger: SharedLogger,
}

impl fmt::Debug for Bundler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bundler")
            .field("config", &self.config)
            .field("cached_images", &self.cache.len())
            .field("logger", &"<dyn BundleLogger>")
            .finish()
    }
}

impl Bundler {
    /// Create a bundler with its own HTTP client, an empty cache and the
    /// [`TracingLogger`].
    pub fn new(config: BundleConfig) -> Result<Self, BundleError> {
        let fetcher = Fetcher::new(&config)?;
        Ok(Self {
            config,
            fetcher,
            cache: Arc::new(ImageCache::new()),
            logger: Arc::new(TracingLogger),
        })
    }

    /// Share `cache` with other bundlers (or keep it across sessions).
    pub fn with_cache(mut self, cache: Arc<ImageCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Fetch remote images with a caller-configured HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.fetcher = Fetcher::with_client(client, self.config.max_image_size);
        self
    }

    pub fn config(&self) -> &BundleConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ImageCache> {
        &self.cache
    }

    /// Bundle every in-scope image reference in `document`.
    ///
    /// # Errors
    /// - [`BundleError::Resolution`] when any reference cannot be fetched;
    ///   no partially rewritten document is returned
    /// - [`BundleError::TimedOut`] when the call exceeds
    ///   `bundle_timeout_secs`
    pub async fn bundle(
        &self,
        source: &SourceLocation,
        document: &[u8],
        use_cache: bool,
    ) -> Result<Vec<u8>, BundleError> {
        self.bundle_detailed(source, document, use_cache)
            .await
            .map(|out| out.document)
    }

    /// Like [`Bundler::bundle`], also returning [`BundleStats`].
    pub async fn bundle_detailed(
        &self,
        source: &SourceLocation,
        document: &[u8],
        use_cache: bool,
    ) -> Result<BundleOutput, BundleError> {
        self.run(source, document, use_cache, self.config.scope).await
    }

    /// Bundle only `http(s)` references; local paths are left untouched.
    pub async fn bundle_remote(&self, document: &[u8], use_cache: bool) -> Result<Vec<u8>, BundleError> {
        self.run(&SourceLocation::Stream, document, use_cache, ReferenceScope::Remote)
            .await
            .map(|out| out.document)
    }

    /// Bundle only filesystem references; URLs are left untouched.
    pub async fn bundle_local(
        &self,
        source: &SourceLocation,
        document: &[u8],
        use_cache: bool,
    ) -> Result<Vec<u8>, BundleError> {
        self.run(source, document, use_cache, ReferenceScope::Local)
            .await
            .map(|out| out.document)
    }

    /// Bundle until `cancel` completes, whichever comes first.
    ///
    /// On cancellation in-flight fetches are dropped and
    /// [`BundleError::Cancelled`] is returned.
    pub async fn bundle_until<C>(
        &self,
        source: &SourceLocation,
        document: &[u8],
        use_cache: bool,
        cancel: C,
    ) -> Result<Vec<u8>, BundleError>
    where
        C: Future<Output = ()>,
    {
        tokio::select! {
            result = self.bundle(source, document, use_cache) => result,
            () = cancel => {
                self.logger.info("image bundling cancelled");
                Err(BundleError::Cancelled)
            }
        }
    }

    /// Bundle the document at `input` and write the result to `output`.
    ///
    /// Relative references resolve against the directory of `input`. Uses
    /// atomic write (temp file + rename) so a failed run never leaves a
    /// half-written file behind.
    pub async fn bundle_file(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        use_cache: bool,
    ) -> Result<BundleStats, BundleError> {
        let input = input.as_ref();
        let document = tokio::fs::read(input)
            .await
            .map_err(|e| BundleError::InputReadFailed {
                path: input.to_path_buf(),
                source: e,
            })?;

        let source = SourceLocation::Path(input.to_path_buf());
        let out = self.bundle_detailed(&source, &document, use_cache).await?;
        write_atomic(output.as_ref(), &out.document).await?;
        Ok(out.stats)
    }

    /// Synchronous wrapper around [`Bundler::bundle`].
    ///
    /// Creates a temporary tokio runtime internally; do not call it from
    /// inside an async context.
    pub fn bundle_sync(
        &self,
        source: &SourceLocation,
        document: &[u8],
        use_cache: bool,
    ) -> Result<Vec<u8>, BundleError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| BundleError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.bundle(source, document, use_cache))
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    async fn run(
        &self,
        source: &SourceLocation,
        document: &[u8],
        use_cache: bool,
        scope: ReferenceScope,
    ) -> Result<BundleOutput, BundleError> {
        let secs = self.config.bundle_timeout_secs;
        let work = self.resolve_and_rewrite(source, document, use_cache, scope);
        match tokio::time::timeout(Duration::from_secs(secs), work).await {
            Ok(result) => result,
            Err(_) => {
                self.logger
                    .error(&format!("image bundling timed out after {secs}s"));
                Err(BundleError::TimedOut { secs })
            }
        }
    }

    async fn resolve_and_rewrite(
        &self,
        source: &SourceLocation,
        document: &[u8],
        use_cache: bool,
        scope: ReferenceScope,
    ) -> Result<BundleOutput, BundleError> {
        let start = Instant::now();

        // ── Step 1: Match ────────────────────────────────────────────────
        let occurrences = matcher::find_references(document);
        let distinct = matcher::distinct_references(&occurrences);
        debug!(
            "Found {} image references ({} distinct)",
            occurrences.len(),
            distinct.len()
        );

        let mut stats = BundleStats {
            occurrences: occurrences.len(),
            distinct_references: distinct.len(),
            ..Default::default()
        };

        // ── Step 2: Classify ─────────────────────────────────────────────
        let mut targets = Vec::with_capacity(distinct.len());
        for reference in distinct {
            match classify(reference, source, scope) {
                Classification::Resolve(target) => targets.push((reference, target)),
                Classification::Skip(reason) => {
                    stats.skipped_references += 1;
                    let msg = format!("leaving {reference} as-is: {reason}");
                    match reason {
                        SkipReason::NoPathContext => self.logger.info(&msg),
                        _ => self.logger.debug(&msg),
                    }
                }
            }
        }

        // ── Step 3: Resolve through the cache ────────────────────────────
        let cache = if use_cache {
            Arc::clone(&self.cache)
        } else {
            Arc::new(ImageCache::new())
        };
        let fetched = AtomicUsize::new(0);

        // Futures are materialised up front (they are lazy, so nothing runs
        // yet) so the stream type does not carry a closure that would need to
        // be higher-ranked over the reference lifetime for `Send` checks.
        let futures: Vec<_> = targets
            .into_iter()
            .map(|(reference, target)| {
                let cache = &cache;
                let fetched = &fetched;
                async move {
                    let key = target.cache_key();
                    let target = &target;
                    let outcome = cache
                        .get_or_compute(&key, move || async move {
                            fetched.fetch_add(1, Ordering::Relaxed);
                            self.resolve_target(target).await
                        })
                        .await;
                    match outcome {
                        Ok(image) => Ok((reference, key, image)),
                        Err(source) => {
                            self.logger
                                .error(&format!("failed to bundle image {reference}: {source}"));
                            Err(BundleError::Resolution {
                                reference: reference.to_string(),
                                source,
                            })
                        }
                    }
                }
            })
            .collect();
        let resolved: Result<Vec<(&str, String, Arc<ResolvedImage>)>, BundleError> =
            stream::iter(futures)
                .buffer_unordered(self.config.concurrency)
                .try_collect()
                .await;

        let resolved = match resolved {
            Ok(resolved) => resolved,
            Err(e) => {
                if use_cache {
                    let evicted = cache.evict_failures();
                    debug!("Evicted {} failed entries from the shared cache", evicted);
                }
                return Err(e);
            }
        };

        // References that normalise to one target share a single fetch, so
        // hits are counted per target, not per reference string.
        let keys: HashSet<&str> = resolved.iter().map(|(_, key, _)| key.as_str()).collect();
        stats.embedded_references = resolved.len();
        stats.fetched = fetched.load(Ordering::Relaxed);
        stats.cache_hits = keys.len().saturating_sub(stats.fetched);

        let resolved: HashMap<&str, Arc<ResolvedImage>> = resolved
            .iter()
            .map(|(reference, _, image)| (*reference, Arc::clone(image)))
            .collect();

        // ── Step 4: Rewrite ──────────────────────────────────────────────
        let document = rewrite(document, &occurrences, &resolved);

        stats.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Bundled {}/{} images ({} fetched, {} cached, {} skipped) in {}ms",
            stats.embedded_references,
            stats.distinct_references,
            stats.fetched,
            stats.cache_hits,
            stats.skipped_references,
            stats.duration_ms
        );

        Ok(BundleOutput { document, stats })
    }

    async fn resolve_target(&self, target: &Target) -> FetchOutcome {
        match target {
            Target::Remote(url) => self.logger.debug(&format!("fetching {url} remotely")),
            Target::Local(path) => self
                .logger
                .debug(&format!("reading {} from disk", path.display())),
        }

        let fetched = self.fetcher.fetch(target).await?;
        let image = encode::encode_image(
            &fetched.bytes,
            fetched.declared_type.as_deref(),
            target.name_hint(),
        );
        Ok(Arc::new(image))
    }
}

/// Copy `document`, replacing each resolved occurrence span with its data URI.
fn rewrite(
    document: &[u8],
    occurrences: &[Occurrence],
    resolved: &HashMap<&str, Arc<ResolvedImage>>,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(document.len());
    let mut cursor = 0;
    for occurrence in occurrences {
        if let Some(image) = resolved.get(occurrence.reference.as_str()) {
            out.extend_from_slice(&document[cursor..occurrence.span.start]);
            out.extend_from_slice(image.data_uri.as_bytes());
            cursor = occurrence.span.end;
        }
    }
    out.extend_from_slice(&document[cursor..]);
    out
}

/// Write `contents` to `path` via a sibling temp file and a rename.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), BundleError> {
    let write_err = |e: std::io::Error| BundleError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(uri: &str) -> Arc<ResolvedImage> {
        Arc::new(ResolvedImage {
            media_type: "image/png".into(),
            data_uri: uri.into(),
        })
    }

    #[test]
    fn rewrite_replaces_only_resolved_spans() {
        let doc = br#"<image href="a"/> <image href='b'/> <image href="a"/>"#;
        let occurrences = matcher::find_references(doc);
        let mut resolved = HashMap::new();
        resolved.insert("a", image("data:A"));

        let out = rewrite(doc, &occurrences, &resolved);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"<image href="data:A"/> <image href='b'/> <image href="data:A"/>"#
        );
    }

    #[test]
    fn rewrite_without_matches_is_identity() {
        let doc = b"<svg><rect/></svg>\n";
        let out = rewrite(doc, &[], &HashMap::new());
        assert_eq!(out, doc);
    }

    #[tokio::test]
    async fn stream_source_leaves_relative_paths() {
        let bundler = Bundler::new(BundleConfig::default()).unwrap();
        let doc = br#"<svg><image href="./cat.png"/></svg>"#;
        let out = bundler
            .bundle_detailed(&SourceLocation::Stream, doc, false)
            .await
            .unwrap();
        assert_eq!(out.document, doc);
        assert_eq!(out.stats.skipped_references, 1);
        assert_eq!(out.stats.fetched, 0);
    }

    #[test]
    fn debug_hides_logger() {
        let bundler = Bundler::new(BundleConfig::default()).unwrap();
        let s = format!("{bundler:?}");
        assert!(s.contains("Bundler"));
        assert!(s.contains("<dyn BundleLogger>"));
    }
}
