//! Pipeline stages that turn a document into per-page DocTags.
//!
//! Each submodule implements exactly one step, so the rasteriser and the
//! model client can be tested or swapped independently.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ rasterize ──▶ encode ──▶ llm ──▶ postprocess
//! (URL/path) (pdfium/image) (base64)  (VLM)   (cleanup)
//! ```
//!
//! 1. [`input`]: resolve the path or URL to a local file and sniff its kind
//! 2. [`rasterize`]: render selected PDF pages, or decode an image scan;
//!    runs in `spawn_blocking` because pdfium is not async-safe
//! 3. [`encode`]: PNG-encode and base64-wrap each page raster
//! 4. [`llm`]: request DocTags with timeout, retry and backoff
//! 5. [`postprocess`]: strip fences and chatter from the answer; tidy exported Markdown
//!
//! Zone parsing, reconciliation and rendering happen afterwards, in
//! [`crate::analyze::process_page`].

pub mod encode;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod rasterize;
