//! Reference matching: find image `href` values in raw document bytes.
//!
//! Matching is a single byte-level regex rather than an XML parse. The input
//! is generated SVG that may carry CDATA blocks, inline fonts and markup a
//! strict parser would reject; all we need is the byte range of each image
//! reference so it can be swapped out while every other byte stays put.
//!
//! Recognised shape: an `<image` tag (optionally namespace-prefixed, as in
//! `<svg:image`), any attributes, then `href` or
//! `xlink:href` with a double- or single-quoted value. The tag must not be
//! closed (`>`) before the attribute, so `href`s on other elements never
//! match.

use once_cell::sync::Lazy;
use regex::bytes::Regex;
use std::collections::HashSet;
use std::ops::Range;

static RE_IMAGE_HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?-u)<(?:[A-Za-z_][\w.-]*:)?image\s(?:[^>]*?\s)?(?:xlink:)?href\s*=\s*(?:"([^"]*)"|'([^']*)')"#,
    )
    .unwrap()
});

/// One `href` value found inside an `<image>` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    /// The attribute value exactly as written in the document.
    pub reference: String,
    /// Byte range of the value (quotes excluded) in the document.
    pub span: Range<usize>,
}

/// Find every image reference in `document`, in document order.
///
/// Values that are not valid UTF-8 are skipped; they cannot name a URL or a
/// path we could resolve.
pub fn find_references(document: &[u8]) -> Vec<Occurrence> {
    RE_IMAGE_HREF
        .captures_iter(document)
        .filter_map(|caps| {
            let value = caps.get(1).or_else(|| caps.get(2))?;
            let reference = std::str::from_utf8(value.as_bytes()).ok()?;
            Some(Occurrence {
                reference: reference.to_string(),
                span: value.range(),
            })
        })
        .collect()
}

/// The distinct references among `occurrences`, in first-seen order.
pub fn distinct_references(occurrences: &[Occurrence]) -> Vec<&str> {
    let mut seen = HashSet::new();
    occurrences
        .iter()
        .map(|o| o.reference.as_str())
        .filter(|r| seen.insert(*r))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(doc: &str) -> Vec<String> {
        find_references(doc.as_bytes())
            .into_iter()
            .map(|o| o.reference)
            .collect()
    }

    #[test]
    fn matches_remote_and_local_values() {
        let hrefs = [
            "https://icons.terrastruct.com/essentials/004-picture.svg",
            "http://icons.terrastruct.com/essentials/004-picture.svg",
            "hi.png",
            "./cat.png",
            "/cat.png",
        ];
        for href in hrefs {
            let doc = format!(r#"<image href="{href}" />"#);
            assert_eq!(refs(&doc), vec![href.to_string()], "no match in {doc}");
        }
    }

    #[test]
    fn tolerates_attribute_order_and_whitespace() {
        let doc = "<image x=\"0\" y=\"0\"\n\twidth=\"128\"  href = \"a.png\" style=\"fill:#FFF\" />";
        assert_eq!(refs(doc), vec!["a.png"]);
    }

    #[test]
    fn matches_xlink_and_single_quotes() {
        let doc = r#"<image xlink:href='b.svg'/><image href="c.png"/>"#;
        assert_eq!(refs(doc), vec!["b.svg", "c.png"]);
    }

    #[test]
    fn matches_namespace_prefixed_tags() {
        let doc = r#"<svg:image xlink:href="a.png"/><x:image href='b.png'/>"#;
        assert_eq!(refs(doc), vec!["a.png", "b.png"]);
        assert!(refs(r#"<svg:imagex href="c.png"/><:image href="d.png"/>"#).is_empty());
    }

    #[test]
    fn ignores_href_outside_image_tags() {
        let doc = concat!(
            r#"<a href="https://example.com">link</a>"#,
            r##"<use href="#shape"/>"##,
            r#"<image data-href="nope.png" width="1"/>"#,
            r#"<imagex href="nope2.png"/>"#,
            r#"<image width="1"/><text href="nope3.png"/>"#,
        );
        assert!(refs(doc).is_empty(), "got {:?}", refs(doc));
    }

    #[test]
    fn spans_cover_exactly_the_value() {
        let doc = br#"<g><image href="x.png" /></g>"#;
        let found = find_references(doc);
        assert_eq!(found.len(), 1);
        assert_eq!(&doc[found[0].span.clone()], b"x.png");
    }

    #[test]
    fn document_order_and_duplicates_preserved() {
        let doc = r#"<image href="a"/><image href="b"/><image href="a"/>"#;
        let found = find_references(doc.as_bytes());
        assert_eq!(refs(doc), vec!["a", "b", "a"]);
        assert!(found[0].span.start < found[1].span.start);
        assert!(found[1].span.start < found[2].span.start);
        assert_eq!(distinct_references(&found), vec!["a", "b"]);
    }

    #[test]
    fn tolerates_non_utf8_bytes_elsewhere() {
        let mut doc = b"<text>\xff\xfe</text>".to_vec();
        doc.extend_from_slice(br#"<image href="ok.png"/>"#);
        let found = find_references(&doc);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].reference, "ok.png");
    }

    #[test]
    fn skips_non_utf8_values() {
        let doc = b"<image href=\"\xff.png\"/>";
        assert!(find_references(doc).is_empty());
    }
}
