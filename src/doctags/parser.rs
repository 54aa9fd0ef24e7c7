//! DocTags parser: raw tag text → ordered [`Zone`]s.
//!
//! The grammar is flat and non-nesting for same-named tags:
//!
//! ```text
//! <doctag>
//!   <kind><loc_X1><loc_Y1><loc_X2><loc_Y2>content</kind>
//!   …
//! </doctag>
//! ```
//!
//! The scanner walks the document body once. For every open tag it searches
//! forward for the close tag of the *same* name; the span between them is a
//! zone when it starts with a quadruple of location markers. Scanning then
//! resumes right after the open tag, so zones nested inside container tags
//! (`<unordered_list>`, `<otsl>`, …) are still found. Tags whose close marker
//! never appears are skipped without affecting later zones.

use crate::error::DocTagsError;
use crate::zone::{BBox, Zone};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

pub(crate) const DOC_OPEN: &str = "<doctag>";
pub(crate) const DOC_CLOSE: &str = "</doctag>";
const LOC_PREFIX: &str = "<loc_";

/// Parse a DocTags document into zones, in document order.
///
/// # Errors
/// - [`DocTagsError::EmptyDocument`] when `text` is blank
/// - [`DocTagsError::MalformedDocument`] when there is no `<doctag>` wrapper
///
/// A document without any zones is **not** an error: it describes a blank page.
pub fn parse(text: &str) -> Result<Vec<Zone>, DocTagsError> {
    if text.trim().is_empty() {
        return Err(DocTagsError::EmptyDocument);
    }
    let body = document_body(text).ok_or(DocTagsError::MalformedDocument)?;

    let mut zones = Vec::new();
    let mut seen: HashSet<(String, u32, u32)> = HashSet::new();
    let mut pos = 0;

    while let Some(tag) = next_open_tag(body, pos) {
        pos = tag.end;

        let close_marker = format!("</{}>", tag.name);
        let Some(close_rel) = body[tag.end..].find(&close_marker) else {
            debug!("Dangling <{}> at byte {} has no closing tag", tag.name, tag.start);
            continue;
        };
        let span = &body[tag.end..tag.end + close_rel];
        if span.contains(&body[tag.start..tag.end]) {
            // Same-named tags never nest: this one is dangling.
            debug!("Dangling <{}> at byte {} is reopened before closing", tag.name, tag.start);
            continue;
        }

        let Some((bbox, rest)) = leading_quad(span) else {
            continue;
        };

        if !seen.insert((tag.name.to_string(), bbox.x1, bbox.y1)) {
            debug!("Suppressed duplicate <{}> at {}", tag.name, bbox);
            continue;
        }

        zones.push(Zone::new(tag.name, bbox, strip_loc_markers(rest).trim()));
    }

    debug!("Parsed {} zones", zones.len());
    Ok(zones)
}

/// Return the text between `<doctag>` and `</doctag>`.
///
/// A missing close marker (truncated model output) extends the body to the
/// end of the input.
fn document_body(text: &str) -> Option<&str> {
    let start = text.find(DOC_OPEN)? + DOC_OPEN.len();
    let rest = &text[start..];
    Some(match rest.find(DOC_CLOSE) {
        Some(end) => &rest[..end],
        None => rest,
    })
}

/// Return the `<doctag>…</doctag>` span (markers included), if present.
pub fn doctag_span(text: &str) -> Option<&str> {
    let start = text.find(DOC_OPEN)?;
    let end = text[start..].find(DOC_CLOSE)? + start + DOC_CLOSE.len();
    Some(&text[start..end])
}

struct OpenTag<'a> {
    name: &'a str,
    start: usize,
    end: usize,
}

/// Find the next `<name>` at or after `from`, skipping close tags and
/// location markers.
fn next_open_tag(body: &str, from: usize) -> Option<OpenTag<'_>> {
    let bytes = body.as_bytes();
    let mut pos = from;
    while let Some(rel) = body[pos..].find('<') {
        let start = pos + rel;
        let name_start = start + 1;
        let name_len = bytes[name_start..]
            .iter()
            .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
            .count();
        let name_end = name_start + name_len;

        if name_len > 0 && bytes.get(name_end) == Some(&b'>') {
            let name = &body[name_start..name_end];
            if !name.starts_with("loc_") {
                return Some(OpenTag {
                    name,
                    start,
                    end: name_end + 1,
                });
            }
        }
        pos = start + 1;
    }
    None
}

/// Parse one `<loc_N>` marker at the start of `s`.
///
/// Returns the value and the number of bytes consumed.
fn loc_marker(s: &str) -> Option<(u32, usize)> {
    let digits = s.strip_prefix(LOC_PREFIX)?;
    let len = digits.bytes().take_while(u8::is_ascii_digit).count();
    if len == 0 || digits.as_bytes().get(len) != Some(&b'>') {
        return None;
    }
    let value = digits[..len].parse().ok()?;
    Some((value, LOC_PREFIX.len() + len + 1))
}

/// Parse four consecutive markers at the start of `s`.
pub(crate) fn loc_quad(s: &str) -> Option<(BBox, usize)> {
    let mut values = [0u32; 4];
    let mut consumed = 0;
    for v in &mut values {
        let (value, len) = loc_marker(&s[consumed..])?;
        *v = value;
        consumed += len;
    }
    Some((BBox::new(values[0], values[1], values[2], values[3]), consumed))
}

/// The box quadruple that leads a zone span (leading whitespace allowed),
/// plus the text that follows it.
fn leading_quad(span: &str) -> Option<(BBox, &str)> {
    let trimmed = span.trim_start();
    let (bbox, len) = loc_quad(trimmed)?;
    Some((bbox, &trimmed[len..]))
}

/// Remove every `<loc_N>` marker from `s`, leaving all other text intact.
pub fn strip_loc_markers(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(idx) = rest.find(LOC_PREFIX) {
        out.push_str(&rest[..idx]);
        match loc_marker(&rest[idx..]) {
            Some((_, len)) => rest = &rest[idx + len..],
            None => {
                out.push_str(LOC_PREFIX);
                rest = &rest[idx + LOC_PREFIX.len()..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Count every open tag name in the document (location markers excluded).
///
/// Useful to inventory the vocabulary a model actually emits.
pub fn tag_census(text: &str) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    let mut pos = 0;
    while let Some(tag) = next_open_tag(text, pos) {
        *counts.entry(tag.name.to_string()).or_insert(0) += 1;
        pos = tag.end;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_zone() {
        let zones = parse("<doctag><text><loc_10><loc_10><loc_100><loc_50>Hello</text></doctag>")
            .expect("parse");
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].kind, "text");
        assert_eq!(zones[0].bbox, BBox::new(10, 10, 100, 50));
        assert_eq!(zones[0].text, "Hello");
    }

    #[test]
    fn blank_input_is_empty_document() {
        assert!(matches!(parse(""), Err(DocTagsError::EmptyDocument)));
        assert!(matches!(parse("  \n\t "), Err(DocTagsError::EmptyDocument)));
    }

    #[test]
    fn missing_wrapper_is_malformed() {
        let r = parse("<text><loc_1><loc_2><loc_3><loc_4>x</text>");
        assert!(matches!(r, Err(DocTagsError::MalformedDocument)));
    }

    #[test]
    fn zero_zones_is_a_blank_page() {
        let zones = parse("<doctag>\n</doctag>").expect("parse");
        assert!(zones.is_empty());
    }

    #[test]
    fn unknown_tags_are_accepted() {
        let zones =
            parse("<doctag><marginalia><loc_1><loc_2><loc_30><loc_40>note</marginalia></doctag>")
                .expect("parse");
        assert_eq!(zones[0].kind, "marginalia");
    }

    #[test]
    fn empty_content_is_valid() {
        let zones = parse("<doctag><picture><loc_5><loc_6><loc_70><loc_80></picture></doctag>")
            .expect("parse");
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].text, "");
    }

    #[test]
    fn dangling_tag_does_not_stop_later_zones() {
        let doc = "<doctag><text><loc_1><loc_1><loc_9><loc_9>never closed\
                   <picture><loc_10><loc_20><loc_30><loc_40></picture>\
                   <page_footer><loc_1><loc_490><loc_50><loc_499>7</page_footer></doctag>";
        let zones = parse(doc).expect("parse");
        let kinds: Vec<&str> = zones.iter().map(|z| z.kind.as_str()).collect();
        assert_eq!(kinds, vec!["picture", "page_footer"]);
    }

    #[test]
    fn dangling_tag_does_not_swallow_same_named_zone() {
        let doc = "<doctag><text><loc_1><loc_1><loc_9><loc_9>never closed\
                   <text><loc_10><loc_10><loc_100><loc_50>Hello</text></doctag>";
        let zones = parse(doc).expect("parse");
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].bbox, BBox::new(10, 10, 100, 50));
        assert_eq!(zones[0].text, "Hello");
    }

    #[test]
    fn nested_loc_markers_are_stripped_from_text() {
        let doc = "<doctag><text><loc_1><loc_2><loc_3><loc_4>Hello <loc_77>world<loc_5></text></doctag>";
        let zones = parse(doc).expect("parse");
        assert_eq!(zones[0].text, "Hello world");
    }

    #[test]
    fn zones_inside_containers_are_found() {
        let doc = "<doctag><unordered_list>\
                   <list_item><loc_10><loc_10><loc_200><loc_20>one</list_item>\
                   <list_item><loc_10><loc_30><loc_200><loc_40>two</list_item>\
                   </unordered_list></doctag>";
        let zones = parse(doc).expect("parse");
        assert_eq!(zones.len(), 2);
        assert!(zones.iter().all(|z| z.kind == "list_item"));
        assert_eq!(zones[1].text, "two");
    }

    #[test]
    fn duplicate_zones_are_suppressed() {
        let doc = "<doctag>\
                   <text><loc_1><loc_2><loc_3><loc_4>a</text>\
                   <text><loc_1><loc_2><loc_30><loc_40>a again</text>\
                   <title><loc_1><loc_2><loc_3><loc_4>t</title>\
                   </doctag>";
        let zones = parse(doc).expect("parse");
        assert_eq!(zones.len(), 2);
        assert_eq!(zones[0].text, "a");
        assert_eq!(zones[1].kind, "title");
    }

    #[test]
    fn document_order_is_preserved() {
        let doc = "<doctag>\
                   <text><loc_1><loc_300><loc_3><loc_400>low</text>\
                   <text><loc_1><loc_20><loc_3><loc_40>high</text>\
                   </doctag>";
        let zones = parse(doc).expect("parse");
        assert_eq!(zones[0].text, "low");
        assert_eq!(zones[1].text, "high");
    }

    #[test]
    fn reversed_box_is_kept_raw() {
        let zones = parse("<doctag><text><loc_100><loc_10><loc_50><loc_40>r</text></doctag>")
            .expect("parse");
        assert_eq!(zones[0].bbox, BBox::new(100, 10, 50, 40));
    }

    #[test]
    fn truncated_document_still_parses() {
        let zones = parse("<doctag><text><loc_1><loc_2><loc_3><loc_4>cut</text><text><loc_5>")
            .expect("parse");
        assert_eq!(zones.len(), 1);
    }

    #[test]
    fn span_without_leading_quad_is_not_a_zone() {
        let zones = parse("<doctag><text>plain <loc_1><loc_2><loc_3><loc_4></text></doctag>")
            .expect("parse");
        assert!(zones.is_empty());
    }

    #[test]
    fn overflowing_coordinate_is_not_a_marker() {
        assert!(loc_marker("<loc_99999999999>").is_none());
        assert_eq!(loc_marker("<loc_42>rest"), Some((42, 8)));
    }

    #[test]
    fn strip_keeps_non_marker_text() {
        assert_eq!(strip_loc_markers("a<loc_>b<loc_x>c<loc_3>d"), "a<loc_>b<loc_x>cd");
    }

    #[test]
    fn doctag_span_extracts_wrapper() {
        let raw = "Assistant: <doctag><text>x</text></doctag><end_of_utterance>";
        assert_eq!(doctag_span(raw), Some("<doctag><text>x</text></doctag>"));
        assert_eq!(doctag_span("no wrapper"), None);
    }

    #[test]
    fn census_counts_tags() {
        let doc = "<doctag><text><loc_1><loc_2><loc_3><loc_4>a</text>\
                   <text><loc_5><loc_6><loc_7><loc_8>b</text></doctag>";
        let census = tag_census(doc);
        assert_eq!(census.get("text"), Some(&2));
        assert_eq!(census.get("doctag"), Some(&1));
        assert!(!census.keys().any(|k| k.starts_with("loc_")));
    }
}
