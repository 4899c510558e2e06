//! # svg-imgbundle
//!
//! Inline the images referenced by an SVG document as data URIs, producing a
//! single self-contained file.
//!
//! ## Why this crate?
//!
//! Diagram generators emit SVGs with `<image href="...">` pointing at icon
//! URLs or files next to the source. Such an SVG breaks as soon as it leaves
//! the machine it was rendered on: offline viewers, sandboxed previews and
//! email clients refuse to load the external resources. Bundling replaces
//! every reference with a `data:` URI carrying the image bytes, and changes
//! nothing else in the document.
//!
//! ## Pipeline Overview
//!
//! ```text
//! SVG bytes
//!  │
//!  ├─ 1. Match     find <image href="..."> values (byte spans, no XML parse)
//!  ├─ 2. Classify  remote URL / local path / leave alone
//!  ├─ 3. Resolve   coalesced through ImageCache, fetched concurrently
//!  ├─ 4. Encode    media type detection + base64 data URI
//!  └─ 5. Rewrite   swap each span, every other byte copied verbatim
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use svg_imgbundle::{BundleConfig, Bundler, SourceLocation};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bundler = Bundler::new(BundleConfig::default())?;
//!     let stats = bundler.bundle_file("diagram.svg", "diagram.bundled.svg", false).await?;
//!     eprintln!("embedded {} images", stats.embedded_references);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `imgbundle` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! svg-imgbundle = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod bundle;
pub mod cache;
pub mod config;
pub mod error;
pub mod logger;
pub mod pipeline;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use bundle::{BundleOutput, BundleStats, Bundler};
pub use cache::{FetchOutcome, ImageCache};
pub use config::{BundleConfig, BundleConfigBuilder, ReferenceScope, DEFAULT_MAX_IMAGE_SIZE};
pub use error::{BundleError, FetchError};
pub use logger::{BundleLogger, NoopLogger, SharedLogger, TracingLogger};
pub use pipeline::classify::{SourceLocation, Target};
pub use pipeline::encode::ResolvedImage;
