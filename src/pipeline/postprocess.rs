//! Post-processing: deterministic cleanup of model output and exported Markdown.
//!
//! Models wrap answers in code fences, emit CRLF line endings and scatter
//! zero-width characters even when told not to. These rules fix the quirks
//! without touching content. Each rule is a pure `&str → String` function.
//!
//! ## Rule order
//!
//! Fences are stripped before line endings are normalised so the fence regex
//! sees the raw answer; invisible characters go before the `<doctag>` span is
//! located so a BOM cannot hide the opening marker.

use crate::doctags::parser::{DOC_CLOSE, DOC_OPEN};
use once_cell::sync::Lazy;
use regex::Regex;

/// Clean a raw VLM answer into DocTags text.
///
/// 1. Strip outer code fences (```` ```xml ````, ```` ```doctags ````, bare)
/// 2. Normalise line endings (CRLF → LF)
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 4. Keep only the `<doctag>` block when one is present, dropping any
///    chatter before or after it. A block cut off by the token limit is kept
///    up to the end of the answer.
pub fn clean_doctags_response(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    isolate_doctag_block(&s)
}

/// Apply the Markdown cleanup rules to an exported page.
///
/// 1. Strip outer markdown fences
/// 2. Normalise line endings
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive blank lines down to 2
/// 5. Ensure heading lines have a blank line before them
/// 6. Strip invisible Unicode
/// 7. End with exactly one newline
pub fn clean_markdown(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = normalise_heading_spacing(&s);
    let s = remove_invisible_chars(&s);
    ensure_final_newline(&s)
}

// ── Rule: Strip outer code fences ────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```(?:markdown|md|xml|doctags|html)?[ \t]*\r?\n(.*?)\r?\n```\s*$").unwrap()
});

fn strip_code_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule: Normalise line endings ─────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule: Trim trailing whitespace per line ──────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule: Collapse excessive blank lines ─────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

// ── Rule: Heading spacing ────────────────────────────────────────────────────

fn is_heading(line: &str) -> bool {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    (1..=6).contains(&hashes) && line[hashes..].starts_with(' ')
}

fn normalise_heading_spacing(input: &str) -> String {
    let mut result = String::with_capacity(input.len() + 64);
    for (i, line) in input.lines().enumerate() {
        if is_heading(line) && i > 0 {
            let trimmed = result.trim_end_matches('\n');
            result.truncate(trimmed.len());
            result.push_str("\n\n");
        }
        result.push_str(line);
        result.push('\n');
    }
    result
}

// ── Rule: Remove invisible Unicode characters ────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule: Isolate the <doctag> block ─────────────────────────────────────────

fn isolate_doctag_block(input: &str) -> String {
    let Some(start) = input.find(DOC_OPEN) else {
        return input.trim().to_string();
    };
    let rest = &input[start..];
    match rest.find(DOC_CLOSE) {
        Some(end) => rest[..end + DOC_CLOSE.len()].to_string(),
        None => rest.trim_end().to_string(),
    }
}

// ── Rule: Single final newline ───────────────────────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}
