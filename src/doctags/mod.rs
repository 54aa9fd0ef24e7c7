//! DocTags text handling: parsing, Markdown export and coordinate repair.

pub mod markdown;
pub mod parser;
pub mod scale_fix;

pub use markdown::to_markdown;
pub use parser::{doctag_span, parse, strip_loc_markers, tag_census};
pub use scale_fix::{
    apply_affine_fix, coordinate_stats, suggest_factors, AffineFix, CoordinateRegime,
    CoordinateStats, FactorSuggestion,
};
