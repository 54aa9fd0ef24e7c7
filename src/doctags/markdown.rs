//! Markdown export of a parsed page.
//!
//! A deliberately small mapping: the zone kinds that carry prose become
//! Markdown blocks, layout-only kinds (page headers, formulas, tables without
//! structure) are dropped. Zones are emitted in reading order.

use crate::pipeline::postprocess::clean_markdown;
use crate::zone::{sort_reading_order, Zone};

/// Render `zones` as a Markdown page.
///
/// The first `section_header_level_1` becomes the `#` title; without one,
/// `title_fallback` is used. The page footer, if any, follows a rule at the end.
pub fn to_markdown(zones: &[Zone], title_fallback: &str) -> String {
    let mut ordered = zones.to_vec();
    sort_reading_order(&mut ordered);

    let title_idx = ordered
        .iter()
        .position(|z| z.kind == "section_header_level_1" && !z.text.is_empty());
    let title = title_idx
        .map(|i| ordered[i].text.as_str())
        .unwrap_or(title_fallback);

    let mut out = format!("# {}\n\n", title);
    let mut footer: Option<&str> = None;
    let mut in_list = false;

    for (i, zone) in ordered.iter().enumerate() {
        if Some(i) == title_idx || (zone.text.is_empty() && zone.kind != "picture") {
            continue;
        }

        let is_item = zone.kind == "list_item";
        if in_list && !is_item {
            out.push('\n');
        }
        in_list = is_item;

        match zone.kind.as_str() {
            "list_item" => {
                out.push_str("* ");
                out.push_str(&zone.text);
                out.push('\n');
            }
            "page_footer" => {
                footer.get_or_insert(zone.text.as_str());
            }
            "page_header" | "formula" | "otsl" => {}
            "picture" => {
                if zone.text.is_empty() {
                    out.push_str("*[Picture]*\n\n");
                } else {
                    out.push_str(&format!("*[Picture: {}]*\n\n", zone.text));
                }
            }
            kind => match heading_level(kind) {
                Some(level) => {
                    out.push_str(&"#".repeat(level));
                    out.push(' ');
                    out.push_str(&zone.text);
                    out.push_str("\n\n");
                }
                None => {
                    out.push_str(&zone.text);
                    out.push_str("\n\n");
                }
            },
        }
    }

    if let Some(text) = footer {
        out.push_str("\n---\n");
        out.push_str(text);
        out.push('\n');
    }

    clean_markdown(&out)
}

/// `section_header_level_N` → heading level `N + 1`, capped at 6.
fn heading_level(kind: &str) -> Option<usize> {
    if kind == "title" {
        return Some(1);
    }
    let n: usize = kind.strip_prefix("section_header_level_")?.parse().ok()?;
    Some((n + 1).clamp(2, 6))
}
