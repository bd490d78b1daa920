//! Similarity kernel (C1): pure, stateless scoring functions.
//!
//! Both operations are safe for concurrent invocation — neither touches
//! shared state — so callers are free to fan them out across a `rayon`
//! pool without any synchronization of their own.

use crate::collaborators::SsimKernel;
use crate::types::RasterImage;
use std::collections::HashSet;

/// Words that carry no discriminating weight for text similarity.
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "of", "to", "in", "on", "at", "for", "and", "or", "is", "are", "was",
    "were", "be", "been", "being", "this", "that", "it", "as", "by", "with", "from",
];

/// Lower-cases and splits on whitespace, dropping stop words and empty
/// tokens. Mirrors the teacher's `calculate_jaccard_similarity` tokenizer
/// in spirit (whitespace split + lowercase), with stop-word removal added
/// to match "significant words" from the data model.
pub fn significant_words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty() && !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

/// Lower-cased whitespace tokens with no stop-word filtering, used as the
/// fallback when a non-empty text's significant-word set is empty (e.g. it
/// is made up entirely of stop words or punctuation). Mirrors the teacher's
/// `calculate_jaccard_similarity` tokenizer, which never filters.
fn raw_words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

fn token_set(text: &str) -> HashSet<String> {
    let significant = significant_words(text);
    if !significant.is_empty() {
        return significant.into_iter().collect();
    }
    raw_words(text).into_iter().collect()
}

/// Normalised token-overlap metric: Jaccard similarity over the significant
/// words of `a` and `b`, falling back to unfiltered tokens when stop-word
/// removal would otherwise empty out a non-empty text.
///
/// `text_similarity(x, x) = 1` for non-empty `x`; `text_similarity(x, "") = 0`;
/// symmetric to within floating error.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    let tokens_a = token_set(a);
    let tokens_b = token_set(b);

    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();

    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// SSIM on two rasterised page images via the injected [`SsimKernel`].
///
/// When the images differ in dimension the smaller is treated as scaled to
/// the larger and the score is computed on the pixel-aligned intersection;
/// the kernel itself owns the scaling, this function only enforces the
/// empty-image fallback the contract requires.
pub fn visual_similarity(kernel: &dyn SsimKernel, img_a: &RasterImage, img_b: &RasterImage) -> f64 {
    if img_a.is_empty() || img_b.is_empty() {
        return 0.0;
    }
    kernel.score(img_a, img_b).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedKernel(f64);
    impl SsimKernel for FixedKernel {
        fn score(&self, _a: &RasterImage, _b: &RasterImage) -> f64 {
            self.0
        }
    }

    fn img(w: u32, h: u32) -> RasterImage {
        RasterImage {
            width: w,
            height: h,
            channels: 3,
            bytes: vec![0; (w * h * 3) as usize],
        }
    }

    #[test]
    fn identical_text_scores_one() {
        let t = "the quick brown fox jumps over the lazy dog";
        assert_eq!(text_similarity(t, t), 1.0);
    }

    #[test]
    fn stop_word_only_text_still_scores_one_against_itself() {
        let t = "the and of";
        assert_eq!(text_similarity(t, t), 1.0);
    }

    #[test]
    fn empty_text_scores_zero() {
        assert_eq!(text_similarity("some words here", ""), 0.0);
        assert_eq!(text_similarity("", ""), 0.0);
    }

    #[test]
    fn text_similarity_is_symmetric() {
        let a = "quick brown fox";
        let b = "brown fox jumps";
        assert!((text_similarity(a, b) - text_similarity(b, a)).abs() < 1e-12);
    }

    #[test]
    fn text_similarity_bounded() {
        let s = text_similarity("alpha beta gamma", "beta gamma delta");
        assert!((0.0..=1.0).contains(&s));
    }

    #[test]
    fn visual_similarity_zero_on_empty_image() {
        let kernel = FixedKernel(0.9);
        let empty = RasterImage {
            width: 0,
            height: 0,
            channels: 3,
            bytes: vec![],
        };
        assert_eq!(visual_similarity(&kernel, &empty, &img(10, 10)), 0.0);
    }

    #[test]
    fn visual_similarity_delegates_to_kernel() {
        let kernel = FixedKernel(0.75);
        assert_eq!(visual_similarity(&kernel, &img(4, 4), &img(4, 4)), 0.75);
    }
}
