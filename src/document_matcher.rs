//! Document matcher (C3): matches logical sub-documents across two files.
//!
//! The candidate-generation-then-greedy-assignment shape mirrors the
//! teacher's `all_vs_all_match` in `match_files.rs`: score every candidate
//! pair, sort descending, then walk the list accepting a pair only if
//! neither side has been used yet.

use crate::collaborators::Renderer;
use crate::config::{MatcherConfig, DOCUMENT_TEXT_WEIGHT, DOCUMENT_VISUAL_WEIGHT, SAMPLE_RENDER_DPI};
use crate::error::CoreError;
use crate::similarity::{text_similarity, visual_similarity};
use crate::types::{ColorModel, DocumentBoundary, DocumentMatch};
use log::warn;
use rayon::prelude::*;

struct Candidate {
    base_index: usize,
    compare_index: usize,
    score: f64,
}

/// Concatenates the text of up to `max_sample_pages` evenly chosen pages
/// (first, middle, last for a range larger than the sample count;
/// otherwise every page in the range) into one sampled string.
fn sample_indices(boundary: &DocumentBoundary, max_sample_pages: usize) -> Vec<usize> {
    let page_count = boundary.page_count();
    if page_count <= max_sample_pages {
        return boundary.pages().collect();
    }

    let mut indices = Vec::with_capacity(max_sample_pages);
    for k in 0..max_sample_pages {
        let offset = if max_sample_pages <= 1 {
            0
        } else {
            k * (page_count - 1) / (max_sample_pages - 1)
        };
        indices.push(boundary.start_page + offset);
    }
    indices.dedup();
    indices
}

fn sample_text(boundary: &DocumentBoundary, texts: &[String], max_sample_pages: usize) -> String {
    sample_indices(boundary, max_sample_pages)
        .into_iter()
        .filter_map(|idx| texts.get(idx))
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

#[allow(clippy::too_many_arguments)]
fn score_candidate(
    base: &DocumentBoundary,
    compare: &DocumentBoundary,
    base_texts: &[String],
    compare_texts: &[String],
    base_renderer: &dyn Renderer,
    compare_renderer: &dyn Renderer,
    ssim: &dyn crate::collaborators::SsimKernel,
    config: &MatcherConfig,
) -> f64 {
    let base_sample = sample_text(base, base_texts, config.max_sample_pages);
    let compare_sample = sample_text(compare, compare_texts, config.max_sample_pages);
    let text_score = text_similarity(&base_sample, &compare_sample);

    if text_score < config.text_similarity_threshold / 2.0 {
        return text_score;
    }

    let samples = config
        .max_sample_pages
        .min(base.page_count())
        .min(compare.page_count());
    let visual_score = if samples == 0 {
        0.0
    } else {
        let mut total = 0.0;
        for k in 0..samples {
            let base_idx = base.start_page + (k * base.page_count() / samples);
            let compare_idx = compare.start_page + (k * compare.page_count() / samples);

            let pair = (
                base_renderer.render(base_idx, SAMPLE_RENDER_DPI, ColorModel::Rgb),
                compare_renderer.render(compare_idx, SAMPLE_RENDER_DPI, ColorModel::Rgb),
            );
            total += match pair {
                (Ok(a), Ok(b)) => visual_similarity(ssim, &a, &b),
                _ => {
                    warn!("render failed while sampling document pair for visual score");
                    0.0
                }
            };
        }
        total / samples as f64
    };

    DOCUMENT_TEXT_WEIGHT * text_score + DOCUMENT_VISUAL_WEIGHT * visual_score
}

/// Matches document boundaries across two files.
///
/// `base_texts`/`compare_texts` are full per-page text arrays (indexed by
/// 0-based page index within the whole file, not within a boundary).
/// Returns matches with `score > combined_similarity_threshold`, each index
/// used at most once.
#[allow(clippy::too_many_arguments)]
pub fn match_documents(
    base_boundaries: &[DocumentBoundary],
    compare_boundaries: &[DocumentBoundary],
    base_texts: &[String],
    compare_texts: &[String],
    base_renderer: &dyn Renderer,
    compare_renderer: &dyn Renderer,
    ssim: &dyn crate::collaborators::SsimKernel,
    config: &MatcherConfig,
) -> Result<Vec<DocumentMatch>, CoreError> {
    if base_boundaries.is_empty() || compare_boundaries.is_empty() {
        return Ok(Vec::new());
    }

    let pairs: Vec<(usize, usize)> = (0..base_boundaries.len())
        .flat_map(|i| (0..compare_boundaries.len()).map(move |j| (i, j)))
        .collect();

    let mut candidates: Vec<Candidate> = pairs
        .par_iter()
        .map(|&(i, j)| {
            let score = score_candidate(
                &base_boundaries[i],
                &compare_boundaries[j],
                base_texts,
                compare_texts,
                base_renderer,
                compare_renderer,
                ssim,
                config,
            );
            Candidate {
                base_index: i,
                compare_index: j,
                score,
            }
        })
        .filter(|c| c.score > config.combined_similarity_threshold)
        .collect();

    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.base_index.cmp(&b.base_index))
            .then(a.compare_index.cmp(&b.compare_index))
    });

    let mut used_base = vec![false; base_boundaries.len()];
    let mut used_compare = vec![false; compare_boundaries.len()];
    let mut matches = Vec::new();

    for c in candidates {
        if used_base[c.base_index] || used_compare[c.compare_index] {
            continue;
        }
        used_base[c.base_index] = true;
        used_compare[c.compare_index] = true;
        matches.push(DocumentMatch {
            base_doc_index: c.base_index,
            compare_doc_index: c.compare_index,
            score: c.score,
        });
    }

    Ok(matches)
}
