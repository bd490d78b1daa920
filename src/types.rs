//! Core data types shared across the matching core.
//!
//! These are the structures the scheduler persists through the
//! `ComparisonRepository` collaborator and that the matchers build and
//! consume. They carry no behaviour beyond small accessors; the algorithms
//! that populate them live in [`crate::document_matcher`],
//! [`crate::page_matcher`] and [`crate::similarity`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which file a [`PageFingerprint`] was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
    Base,
    Compare,
}

/// A contiguous page range identifying one logical sub-document within a PDF.
///
/// Created once per logical sub-document detected by the external parser;
/// destroyed with the comparison job. Page indices are 0-based and inclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentBoundary {
    pub start_page: usize,
    pub end_page: usize,
    pub matched: bool,
}

impl DocumentBoundary {
    pub fn new(start_page: usize, end_page: usize) -> Self {
        Self {
            start_page,
            end_page,
            matched: false,
        }
    }

    /// Number of pages covered by this boundary.
    pub fn page_count(&self) -> usize {
        self.end_page - self.start_page + 1
    }

    /// 0-based page indices in this boundary, in order.
    pub fn pages(&self) -> impl Iterator<Item = usize> {
        self.start_page..=self.end_page
    }
}

/// Precomputed, immutable per-page features used by the matchers.
///
/// Built once per PDF load. Fingerprints of the same `source_type` never
/// alias each other's owned data (text, words, fonts are independently
/// owned `String`/`HashMap` values, not shared references).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageFingerprint {
    pub source_type: SourceType,
    pub page_index: usize,
    pub text: String,
    pub text_hash: u64,
    pub significant_words: Vec<String>,
    pub font_counts: HashMap<String, u32>,
    pub element_count: u32,
    pub image_count: u32,
    pub has_images: bool,
}

/// A raster image as returned by the `Renderer` collaborator.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub bytes: Vec<u8>,
}

impl RasterImage {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.bytes.is_empty()
    }
}

/// Colour model requested from the `Renderer` collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorModel {
    Rgb,
    Grayscale,
}

/// One page as returned by the `Parser` collaborator.
#[derive(Debug, Clone)]
pub struct ParsedPage {
    pub index: usize,
    pub text: String,
    pub fonts: HashMap<String, u32>,
    pub images: Vec<String>,
    pub element_count: u32,
}

/// A whole document as returned by the `Parser` collaborator.
///
/// `boundaries` is the parser's logical sub-document segmentation — the
/// data model calls a `DocumentBoundary` "created once per logical
/// sub-document detected by the external parser", so boundary detection is
/// bundled into the same collaborator call rather than a separate one.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub pages: Vec<ParsedPage>,
    pub size: u64,
    pub page_count: usize,
    pub boundaries: Vec<DocumentBoundary>,
}

/// A cross-file document-boundary match: `(base_doc_index, compare_doc_index, score)`.
///
/// Valid iff each index appears in at most one `DocumentMatch` within a job
/// (see invariant 2 on [`crate::document_matcher`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMatch {
    pub base_doc_index: usize,
    pub compare_doc_index: usize,
    pub score: f64,
}

/// Sentinel compare/base page number meaning "no counterpart".
pub const NO_COUNTERPART: i64 = -1;

/// A relationship between one base page and one compare page (or the
/// sentinel [`NO_COUNTERPART`]), 1-based, with a similarity score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageMapping {
    pub base_page_number: i64,
    pub compare_page_number: i64,
    pub score: f64,
    pub difference_count: u32,
}

impl PageMapping {
    pub fn is_matched(&self) -> bool {
        self.base_page_number != NO_COUNTERPART && self.compare_page_number != NO_COUNTERPART
    }
}

/// Per-category difference counters accumulated for a [`DocumentPair`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DifferenceCounts {
    pub text: u32,
    pub image: u32,
    pub font: u32,
    pub style: u32,
    pub total: u32,
}

/// A matched (base, compare) sub-document pair with its page mappings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentPair {
    pub base_range: (usize, usize),
    pub compare_range: (usize, usize),
    pub score: f64,
    pub mappings: Vec<PageMapping>,
    pub counts: DifferenceCounts,
}

/// Lifecycle state of a [`Comparison`] job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonStatus {
    Pending,
    DocumentMatching,
    Comparing,
    Processing,
    Completed,
    Failed,
}

impl ComparisonStatus {
    /// States the stall sweep is allowed to reset back to `Pending`.
    pub fn is_sweepable(&self) -> bool {
        matches!(
            self,
            ComparisonStatus::DocumentMatching
                | ComparisonStatus::Comparing
                | ComparisonStatus::Processing
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ComparisonStatus::Completed | ComparisonStatus::Failed)
    }
}

/// Matched/unmatched/identical accounting for a whole job, plus the
/// overall similarity. A single flattened shape, not the two overlapping
/// declarations the source carried.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub matched_page_count: u64,
    pub unmatched_base: u64,
    pub unmatched_compare: u64,
    pub identical: u64,
    pub with_differences: u64,
    pub total_differences: u64,
    pub overall_similarity: f64,
}

/// The comparison job: identifier, status, timestamps, and results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comparison {
    pub id: String,
    pub status: ComparisonStatus,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub status_message: Option<String>,
    pub document_pairs: Vec<DocumentPair>,
    pub summary: ComparisonSummary,
}

impl Comparison {
    pub fn new_pending(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: ComparisonStatus::Pending,
            start_time: None,
            end_time: None,
            status_message: None,
            document_pairs: Vec::new(),
            summary: ComparisonSummary::default(),
        }
    }
}
