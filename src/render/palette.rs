//! Zone colours.
//!
//! Kinds are an open set: anything without an explicit entry is drawn in the
//! fallback colour, so new tags from a newer model still render.

use image::Rgba;
use std::collections::HashMap;

const fn rgb(r: u8, g: u8, b: u8) -> Rgba<u8> {
    Rgba([r, g, b, 255])
}

const BUILTIN: [(&str, Rgba<u8>); 6] = [
    ("section_header_level_1", rgb(255, 87, 34)),
    ("text", rgb(33, 150, 243)),
    ("picture", rgb(76, 175, 80)),
    ("table", rgb(156, 39, 176)),
    ("page_header", rgb(255, 193, 7)),
    ("page_footer", rgb(121, 85, 72)),
];

/// Blue grey.
pub const FALLBACK: Rgba<u8> = rgb(96, 125, 139);

/// Kind → colour lookup with a fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    colors: HashMap<String, Rgba<u8>>,
    fallback: Rgba<u8>,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            colors: BUILTIN
                .iter()
                .map(|(kind, color)| (kind.to_string(), *color))
                .collect(),
            fallback: FALLBACK,
        }
    }
}

impl Palette {
    /// Add or replace the colour for `kind`.
    pub fn with(mut self, kind: impl Into<String>, color: Rgba<u8>) -> Self {
        self.colors.insert(kind.into(), color);
        self
    }

    pub fn with_fallback(mut self, color: Rgba<u8>) -> Self {
        self.fallback = color;
        self
    }

    pub fn color_for(&self, kind: &str) -> Rgba<u8> {
        self.colors.get(kind).copied().unwrap_or(self.fallback)
    }
}
