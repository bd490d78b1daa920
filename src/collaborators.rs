//! External capability contracts consumed by the matching core.
//!
//! The PDF parser, rasteriser, SSIM kernel and comparison store all live
//! outside this crate. Implementations are injected at construction, the
//! same way the teacher injects a `ProgressReporter` by reference rather
//! than reaching for a global singleton.

use crate::error::CoreError;
use crate::types::{ColorModel, Comparison, ComparisonStatus, ParsedDocument, RasterImage};

/// Produces per-page text, fonts and image lists for a PDF file.
pub trait Parser: Send + Sync {
    fn process_document(&self, file: &[u8]) -> Result<ParsedDocument, CoreError>;
}

/// Rasterises a single page of a previously parsed document.
pub trait Renderer: Send + Sync {
    fn render(
        &self,
        page_index: usize,
        dpi: u32,
        color_model: ColorModel,
    ) -> Result<RasterImage, CoreError>;
}

/// Persistent store of comparison jobs. Each call is transactional.
pub trait ComparisonRepository: Send + Sync {
    fn find_by_status(&self, status: ComparisonStatus) -> Result<Vec<Comparison>, CoreError>;
    fn save(&self, comparison: &Comparison) -> Result<(), CoreError>;
    fn find_by_id(&self, id: &str) -> Result<Option<Comparison>, CoreError>;
}

/// Pixel-level structural similarity kernel.
pub trait SsimKernel: Send + Sync {
    fn score(&self, a: &RasterImage, b: &RasterImage) -> f64;
}

/// Builds a `Renderer` bound to one already-loaded file. The blob/file
/// storage service and rasteriser are both out of scope; this is the seam
/// between "bytes for a job" and "a renderer for those bytes".
pub trait RendererFactory: Send + Sync {
    fn create(&self, file: &[u8]) -> Result<Box<dyn Renderer>, CoreError>;
}

/// Fetches the raw base/compare file bytes for a job from the blob/file
/// storage service.
pub trait FileStore: Send + Sync {
    fn load_pair(&self, comparison_id: &str) -> Result<(Vec<u8>, Vec<u8>), CoreError>;
}
