//! Reference classification: decide where an image reference points.
//!
//! A reference is either a remote URL (`http://` or `https://` with a host)
//! or a filesystem path. Relative paths are resolved against the directory of
//! the document they came from, which is only meaningful when the document
//! was read from a named file. Documents piped through stdin carry no such
//! directory, so their relative references are left alone instead of being
//! resolved against whatever the working directory happens to be.

use crate::config::ReferenceScope;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use std::fmt;
use std::path::{Path, PathBuf};

static RE_REMOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^https?://[^/?#\s]+").unwrap());

/// Where the document being bundled came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// A named file; relative references resolve against its directory.
    Path(PathBuf),
    /// A transient stream (stdin). Relative references are not resolved.
    Stream,
}

impl SourceLocation {
    /// The conventional name for "no trustworthy path": stdin.
    pub const STDIN: &'static str = "-";

    /// Parse a CLI-style source argument; `-` is the stream sentinel.
    pub fn parse(input: &str) -> Self {
        if input == Self::STDIN {
            SourceLocation::Stream
        } else {
            SourceLocation::Path(PathBuf::from(input))
        }
    }

    /// Directory relative references resolve against.
    pub fn base_dir(&self) -> Option<&Path> {
        match self {
            SourceLocation::Path(p) => Some(p.parent().unwrap_or_else(|| Path::new(""))),
            SourceLocation::Stream => None,
        }
    }
}

impl From<&str> for SourceLocation {
    fn from(input: &str) -> Self {
        Self::parse(input)
    }
}

impl From<PathBuf> for SourceLocation {
    fn from(path: PathBuf) -> Self {
        SourceLocation::Path(path)
    }
}

/// A resolvable image location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Remote(Url),
    Local(PathBuf),
}

impl Target {
    /// Key the resolved outcome is cached under.
    ///
    /// For remote targets this is the URL itself. For local targets it is the
    /// joined path, so `./a.png` under two different documents never shares
    /// an entry.
    pub fn cache_key(&self) -> String {
        match self {
            Target::Remote(url) => url.as_str().to_string(),
            Target::Local(path) => path.to_string_lossy().into_owned(),
        }
    }

    /// Name used for extension-based media type detection.
    pub fn name_hint(&self) -> &str {
        match self {
            Target::Remote(url) => url.path(),
            Target::Local(path) => path.to_str().unwrap_or(""),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Remote(url) => write!(f, "{url}"),
            Target::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Why a reference is left as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Already a `data:` URI.
    AlreadyEmbedded,
    /// Empty or fragment-only (`#id`); points back into the document itself.
    NoResource,
    /// Relative path in a document read from a stream.
    NoPathContext,
    /// Excluded by the configured [`ReferenceScope`].
    OutOfScope,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::AlreadyEmbedded => "already embedded",
            SkipReason::NoResource => "no external resource",
            SkipReason::NoPathContext => "relative path without a source directory",
            SkipReason::OutOfScope => "outside the bundling scope",
        };
        f.write_str(s)
    }
}

/// Outcome of classifying one reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Resolve(Target),
    Skip(SkipReason),
}

/// Check if the reference looks like an absolute `http(s)` URL with a host.
pub fn is_remote(reference: &str) -> bool {
    RE_REMOTE.is_match(reference)
}

/// Classify `reference` found in a document read from `source`.
pub fn classify(reference: &str, source: &SourceLocation, scope: ReferenceScope) -> Classification {
    let decoded = html_escape::decode_html_entities(reference);
    let decoded = decoded.trim();

    if decoded.starts_with("data:") {
        return Classification::Skip(SkipReason::AlreadyEmbedded);
    }
    if decoded.is_empty() || decoded.starts_with('#') {
        return Classification::Skip(SkipReason::NoResource);
    }

    if is_remote(decoded) {
        if let Ok(url) = Url::parse(decoded) {
            return if scope.includes_remote() {
                Classification::Resolve(Target::Remote(url))
            } else {
                Classification::Skip(SkipReason::OutOfScope)
            };
        }
    }

    if !scope.includes_local() {
        return Classification::Skip(SkipReason::OutOfScope);
    }

    let path = Path::new(decoded.strip_prefix("file://").unwrap_or(decoded));
    if path.is_absolute() {
        return Classification::Resolve(Target::Local(path.to_path_buf()));
    }

    match source.base_dir() {
        Some(dir) => Classification::Resolve(Target::Local(dir.join(path))),
        None => Classification::Skip(SkipReason::NoPathContext),
    }
}
