//! Page matcher (C4): one-to-one page mapping within a matched document pair.
//!
//! Case B's greedy largest-cell-first consumption generalises the
//! teacher's `compare_structured.rs` merge-join (consume matched records,
//! then count whatever remains on either side as unmatched) from a sorted
//! two-pointer walk to a full similarity matrix, since page order across
//! two PDFs is never assumed aligned the way sorted keys are.

use crate::collaborators::Renderer;
use crate::config::{MatcherConfig, PAGE_TEXT_WEIGHT, PAGE_VISUAL_WEIGHT, SAMPLE_RENDER_DPI};
use crate::similarity::{text_similarity, visual_similarity};
use crate::types::{ColorModel, DocumentBoundary, PageMapping, NO_COUNTERPART};
use log::warn;

/// `0.6 * textScore + 0.4 * visualScore`, short-circuiting to `textScore`
/// alone when it falls below half the text-similarity threshold.
pub fn page_similarity(
    base_page: usize,
    compare_page: usize,
    base_texts: &[String],
    compare_texts: &[String],
    base_renderer: &dyn Renderer,
    compare_renderer: &dyn Renderer,
    ssim: &dyn crate::collaborators::SsimKernel,
    config: &MatcherConfig,
) -> f64 {
    let base_text = base_texts.get(base_page).map(String::as_str).unwrap_or("");
    let compare_text = compare_texts
        .get(compare_page)
        .map(String::as_str)
        .unwrap_or("");
    let text_score = text_similarity(base_text, compare_text);

    if text_score < config.text_similarity_threshold / 2.0 {
        return text_score;
    }

    let visual_score = match (
        base_renderer.render(base_page, SAMPLE_RENDER_DPI, ColorModel::Rgb),
        compare_renderer.render(compare_page, SAMPLE_RENDER_DPI, ColorModel::Rgb),
    ) {
        (Ok(a), Ok(b)) => visual_similarity(ssim, &a, &b),
        _ => {
            warn!("render failed while scoring page pair ({base_page}, {compare_page})");
            0.0
        }
    };

    PAGE_TEXT_WEIGHT * text_score + PAGE_VISUAL_WEIGHT * visual_score
}

/// Produces the page mapping for one matched document pair.
#[allow(clippy::too_many_arguments)]
pub fn match_pages(
    base: &DocumentBoundary,
    compare: &DocumentBoundary,
    base_texts: &[String],
    compare_texts: &[String],
    base_renderer: &dyn Renderer,
    compare_renderer: &dyn Renderer,
    ssim: &dyn crate::collaborators::SsimKernel,
    config: &MatcherConfig,
) -> Vec<PageMapping> {
    let base_pages: Vec<usize> = base.pages().collect();
    let compare_pages: Vec<usize> = compare.pages().collect();

    if base_pages.len() == compare_pages.len() {
        return match_pages_equal_count(
            &base_pages,
            &compare_pages,
            base_texts,
            compare_texts,
            base_renderer,
            compare_renderer,
            ssim,
            config,
        );
    }

    match_pages_unequal_count(
        &base_pages,
        &compare_pages,
        base_texts,
        compare_texts,
        base_renderer,
        compare_renderer,
        ssim,
        config,
    )
}

/// Case A: equal page counts map positionally, independent of similarity —
/// a contract, not a heuristic, even when a cross-pairing would score
/// higher.
#[allow(clippy::too_many_arguments)]
fn match_pages_equal_count(
    base_pages: &[usize],
    compare_pages: &[usize],
    base_texts: &[String],
    compare_texts: &[String],
    base_renderer: &dyn Renderer,
    compare_renderer: &dyn Renderer,
    ssim: &dyn crate::collaborators::SsimKernel,
    config: &MatcherConfig,
) -> Vec<PageMapping> {
    base_pages
        .iter()
        .zip(compare_pages.iter())
        .map(|(&b, &c)| {
            let score = page_similarity(
                b,
                c,
                base_texts,
                compare_texts,
                base_renderer,
                compare_renderer,
                ssim,
                config,
            );
            PageMapping {
                base_page_number: (b + 1) as i64,
                compare_page_number: (c + 1) as i64,
                score,
                difference_count: 0,
            }
        })
        .collect()
}

/// Case B: builds the full similarity matrix and greedily consumes the
/// largest remaining cell, at most `min(|B|, |C|)` rounds, stopping early
/// once the best remaining cell falls below `text_similarity_threshold` or
/// no free row/column remains. Ties break on lowest base index, then
/// lowest compare index.
#[allow(clippy::too_many_arguments)]
fn match_pages_unequal_count(
    base_pages: &[usize],
    compare_pages: &[usize],
    base_texts: &[String],
    compare_texts: &[String],
    base_renderer: &dyn Renderer,
    compare_renderer: &dyn Renderer,
    ssim: &dyn crate::collaborators::SsimKernel,
    config: &MatcherConfig,
) -> Vec<PageMapping> {
    let rows = base_pages.len();
    let cols = compare_pages.len();

    let mut matrix = vec![vec![0.0_f64; cols]; rows];
    for (i, &b) in base_pages.iter().enumerate() {
        for (j, &c) in compare_pages.iter().enumerate() {
            matrix[i][j] = page_similarity(
                b,
                c,
                base_texts,
                compare_texts,
                base_renderer,
                compare_renderer,
                ssim,
                config,
            );
        }
    }

    let mut row_consumed = vec![false; rows];
    let mut col_consumed = vec![false; cols];
    let mut mappings = Vec::new();

    let rounds = rows.min(cols);
    for _ in 0..rounds {
        let mut best: Option<(usize, usize, f64)> = None;
        for i in 0..rows {
            if row_consumed[i] {
                continue;
            }
            for j in 0..cols {
                if col_consumed[j] {
                    continue;
                }
                let v = matrix[i][j];
                let better = match best {
                    None => true,
                    Some((bi, bj, bv)) => v > bv || (v == bv && (i, j) < (bi, bj)),
                };
                if better {
                    best = Some((i, j, v));
                }
            }
        }

        match best {
            Some((i, j, v)) if v >= config.text_similarity_threshold => {
                row_consumed[i] = true;
                col_consumed[j] = true;
                mappings.push(PageMapping {
                    base_page_number: (base_pages[i] + 1) as i64,
                    compare_page_number: (compare_pages[j] + 1) as i64,
                    score: v,
                    difference_count: 0,
                });
            }
            _ => break,
        }
    }

    for (i, &b) in base_pages.iter().enumerate() {
        if !row_consumed[i] {
            mappings.push(PageMapping {
                base_page_number: (b + 1) as i64,
                compare_page_number: NO_COUNTERPART,
                score: 0.0,
                difference_count: 0,
            });
        }
    }
    for (j, &c) in compare_pages.iter().enumerate() {
        if !col_consumed[j] {
            mappings.push(PageMapping {
                base_page_number: NO_COUNTERPART,
                compare_page_number: (c + 1) as i64,
                score: 0.0,
                difference_count: 0,
            });
        }
    }

    mappings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::SsimKernel;
    use crate::error::CoreError;
    use crate::types::RasterImage;

    struct NullRenderer;
    impl Renderer for NullRenderer {
        fn render(&self, _i: usize, _dpi: u32, _cm: ColorModel) -> Result<RasterImage, CoreError> {
            Err(CoreError::Render("no renderer in this test".into()))
        }
    }

    struct ZeroKernel;
    impl SsimKernel for ZeroKernel {
        fn score(&self, _a: &RasterImage, _b: &RasterImage) -> f64 {
            0.0
        }
    }

    #[test]
    fn equal_counts_map_positionally_even_when_reordered() {
        // base [A, B, C], compare [C, A, B]: positional mapping must win,
        // not the higher-scoring cross-match.
        let cfg = MatcherConfig::default();
        let renderer = NullRenderer;
        let ssim = ZeroKernel;

        let base_texts = vec!["alpha text".to_string(), "bravo text".to_string(), "charlie text".to_string()];
        let compare_texts = vec!["charlie text".to_string(), "alpha text".to_string(), "bravo text".to_string()];

        let base = DocumentBoundary::new(0, 2);
        let compare = DocumentBoundary::new(0, 2);

        let mappings = match_pages(
            &base,
            &compare,
            &base_texts,
            &compare_texts,
            &renderer,
            &renderer,
            &ssim,
            &cfg,
        );

        assert_eq!(mappings.len(), 3);
        assert_eq!(mappings[0].base_page_number, 1);
        assert_eq!(mappings[0].compare_page_number, 1);
        assert_eq!(mappings[1].base_page_number, 2);
        assert_eq!(mappings[1].compare_page_number, 2);
        assert_eq!(mappings[2].base_page_number, 3);
        assert_eq!(mappings[2].compare_page_number, 3);
    }

    #[test]
    fn unequal_counts_leave_sentinel_unmatched_entries() {
        let cfg = MatcherConfig::default();
        let renderer = NullRenderer;
        let ssim = ZeroKernel;

        // base has 4 pages, compare has 3; A<->A', C<->C' near-identical, B/D unmatched, E' unrelated.
        let base_texts = vec![
            "first page alpha content".to_string(),
            "second page bravo content".to_string(),
            "third page charlie content".to_string(),
            "fourth page delta content".to_string(),
        ];
        let compare_texts = vec![
            "first page alpha content".to_string(),
            "third page charlie content".to_string(),
            "totally unrelated echo material".to_string(),
        ];

        let base = DocumentBoundary::new(0, 3);
        let compare = DocumentBoundary::new(0, 2);

        let mappings = match_pages(
            &base,
            &compare,
            &base_texts,
            &compare_texts,
            &renderer,
            &renderer,
            &ssim,
            &cfg,
        );

        let matched: Vec<_> = mappings.iter().filter(|m| m.is_matched()).collect();
        assert_eq!(matched.len(), 2);

        let base_unmatched = mappings
            .iter()
            .filter(|m| m.compare_page_number == NO_COUNTERPART)
            .count();
        let compare_unmatched = mappings
            .iter()
            .filter(|m| m.base_page_number == NO_COUNTERPART)
            .count();
        assert_eq!(base_unmatched, 2);
        assert_eq!(compare_unmatched, 1);
    }

    #[test]
    fn page_mapping_coverage_holds() {
        let cfg = MatcherConfig::default();
        let renderer = NullRenderer;
        let ssim = ZeroKernel;

        let base_texts = vec!["x".to_string(); 5];
        let compare_texts = vec!["y".to_string(); 2];

        let base = DocumentBoundary::new(0, 4);
        let compare = DocumentBoundary::new(0, 1);

        let mappings = match_pages(
            &base,
            &compare,
            &base_texts,
            &compare_texts,
            &renderer,
            &renderer,
            &ssim,
            &cfg,
        );

        let base_numbers: std::collections::HashSet<i64> = mappings
            .iter()
            .filter(|m| m.base_page_number != NO_COUNTERPART)
            .map(|m| m.base_page_number)
            .collect();
        assert_eq!(base_numbers.len(), 5);

        let compare_numbers: std::collections::HashSet<i64> = mappings
            .iter()
            .filter(|m| m.compare_page_number != NO_COUNTERPART)
            .map(|m| m.compare_page_number)
            .collect();
        assert_eq!(compare_numbers.len(), 2);
    }
}
