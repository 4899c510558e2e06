//! Image encoding: raw bytes → `data:<media type>;base64,<payload>`.
//!
//! The bytes are never decoded or re-encoded; the data URI is only a
//! container. What matters is the media type: an SVG embedded as anything
//! other than `image/svg+xml` will not render in browsers, so the type is
//! chosen carefully (declared header, then content sniffing, then file
//! extension).

use base64::{engine::general_purpose::STANDARD, Engine as _};
use mime_guess::mime::Mime;
use tracing::debug;

/// An image ready to be substituted into the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub media_type: String,
    pub data_uri: String,
}

pub const SVG: &str = "image/svg+xml";
pub const PNG: &str = "image/png";
const OCTET_STREAM: &str = "application/octet-stream";

/// Content types servers send when they do not know better.
const GENERIC_TYPES: &[&str] = &[OCTET_STREAM, "binary/octet-stream", "text/plain"];

/// Only the first few KiB are inspected when looking for an `<svg` root.
const SVG_SNIFF_WINDOW: usize = 4096;

/// Detect the media type and wrap `bytes` in a data URI.
pub fn encode_image(bytes: &[u8], declared: Option<&str>, name_hint: &str) -> ResolvedImage {
    let media_type = media_type(bytes, declared, name_hint);
    let data_uri = to_data_uri(bytes, &media_type);
    debug!("Encoded {} bytes as {} → {} bytes data URI", bytes.len(), media_type, data_uri.len());
    ResolvedImage {
        media_type,
        data_uri,
    }
}

/// Build a base64 data URI.
pub fn to_data_uri(bytes: &[u8], media_type: &str) -> String {
    format!("data:{};base64,{}", media_type, STANDARD.encode(bytes))
}

/// Pick the media type for `bytes`.
///
/// Order: a specific declared type (parameters dropped; XML types carrying
/// an SVG root promoted to `image/svg+xml`), then magic bytes, then the
/// extension of `name_hint`, then `application/octet-stream`.
pub fn media_type(bytes: &[u8], declared: Option<&str>, name_hint: &str) -> String {
    let sniffed = sniff(bytes);

    if let Some(declared) = declared.and_then(normalise_declared) {
        let is_xml = declared == "text/xml" || declared == "application/xml";
        if is_xml && sniffed == Some(SVG) {
            return SVG.to_string();
        }
        if !GENERIC_TYPES.contains(&declared.as_str()) {
            return declared;
        }
    }

    if let Some(sniffed) = sniffed {
        return sniffed.to_string();
    }

    mime_guess::from_path(name_hint)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| OCTET_STREAM.to_string())
}

/// The `type/subtype` of a declared Content-Type, or `None` unless it is a
/// well-formed media type. The result is written into an attribute value, so
/// nothing outside the token alphabet may pass.
fn normalise_declared(value: &str) -> Option<String> {
    let mime: Mime = value.trim().parse().ok()?;
    let essence = mime.essence_str().to_ascii_lowercase();
    essence
        .split('/')
        .all(|part| !part.is_empty() && part.bytes().all(is_token_byte))
        .then_some(essence)
}

/// RFC 6838 `restricted-name-chars`, a subset of the RFC 7230 token set that
/// leaves out quotes and `&`.
fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$-^_.+".contains(&b)
}

/// Identify common image formats from their leading bytes.
pub fn sniff(bytes: &[u8]) -> Option<&'static str> {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"\x89PNG\r\n\x1a\n", PNG),
        (b"\xff\xd8\xff", "image/jpeg"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"BM", "image/bmp"),
        (b"\x00\x00\x01\x00", "image/x-icon"),
    ];

    if let Some(&(_, ty)) = SIGNATURES.iter().find(|(sig, _)| bytes.starts_with(sig)) {
        return Some(ty);
    }
    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    if looks_like_svg(bytes) {
        return Some(SVG);
    }
    None
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let bytes = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(bytes);
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let head = &bytes[start..bytes.len().min(start + SVG_SNIFF_WINDOW)];
    head.first() == Some(&b'<') && head.windows(4).any(|w| w == b"<svg")
}
