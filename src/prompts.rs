//! Prompts sent to the vision-language model.
//!
//! DocTags models (SmolDocling, granite-docling) are fine-tuned on a single
//! short instruction; a long rule list like a general-purpose OCR prompt only
//! degrades their output. General-purpose VLMs need the grammar spelled out,
//! so a fuller system prompt is available for them.
//!
//! Callers override the instruction via [`crate::config::PipelineConfig::prompt`].

/// The instruction DocTags models are trained on.
pub const DEFAULT_DOCTAGS_PROMPT: &str = "Convert this page to docling.";

/// System prompt describing the DocTags grammar, for models that were not
/// fine-tuned on it.
pub const DOCTAGS_GRAMMAR_PROMPT: &str = r#"You are a document layout analyser. Describe the page image as DocTags.

Output exactly one <doctag> ... </doctag> block. Inside it, emit one element per layout region, in reading order:

  <kind><loc_X1><loc_Y1><loc_X2><loc_Y2>text</kind>

Rules:
- kind is one of: title, section_header_level_1, section_header_level_2, text, list_item, caption, picture, table, formula, footnote, page_header, page_footer
- X1, Y1 is the top-left corner and X2, Y2 the bottom-right corner of the region
- coordinates are integers on a 0-500 grid covering the whole page, independent of the image size
- text is the region's transcribed content; leave it empty for pictures without a caption
- do NOT wrap the output in code fences and do NOT add commentary"#;

/// Pick the system prompt, if any, for a model name.
///
/// DocTags-native models get no system prompt at all.
pub fn system_prompt_for(model: Option<&str>) -> Option<&'static str> {
    match model {
        Some(m) if is_doctags_native(m) => None,
        _ => Some(DOCTAGS_GRAMMAR_PROMPT),
    }
}

fn is_doctags_native(model: &str) -> bool {
    let m = model.to_ascii_lowercase();
    m.contains("docling") || m.contains("smoldocling")
}
