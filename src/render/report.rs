//! JSON sidecar describing how a page was reconciled and rendered.

use crate::error::ZoneWarning;
use crate::reconcile::{ReconciliationResult, ScaleStrategy};
use crate::zone::BBox;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneReport {
    pub index: usize,
    pub kind: String,
    pub text: String,
    /// Box as written in the DocTags source.
    pub raw: BBox,
    /// Box on the page raster.
    pub reconciled: BBox,
}

/// Everything needed to audit one page's geometry after the fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageReport {
    pub page_num: usize,
    pub page_width: u32,
    pub page_height: u32,
    pub strategy: ScaleStrategy,
    pub x_scale: f64,
    pub y_scale: f64,
    pub max_x: u32,
    pub max_y: u32,
    /// The scale was guessed; check the overlay before trusting crops.
    pub uncertain_geometry: bool,
    pub zones: Vec<ZoneReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ZoneWarning>,
}

impl PageReport {
    pub fn new(page_num: usize, result: &ReconciliationResult, warnings: Vec<ZoneWarning>) -> Self {
        Self {
            page_num,
            page_width: result.page_width,
            page_height: result.page_height,
            strategy: result.strategy,
            x_scale: result.x_scale,
            y_scale: result.y_scale,
            max_x: result.max_x,
            max_y: result.max_y,
            uncertain_geometry: result.is_uncertain(),
            zones: result
                .zones
                .iter()
                .enumerate()
                .map(|(index, rz)| ZoneReport {
                    index,
                    kind: rz.kind().to_string(),
                    text: rz.text().to_string(),
                    raw: rz.raw_bbox(),
                    reconciled: rz.bbox,
                })
                .collect(),
            warnings,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
