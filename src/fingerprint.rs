//! Builds the immutable per-page [`PageFingerprint`]s matchers score
//! against, once per PDF load.
//!
//! Grounded on the teacher's own fingerprinting pass (`compute_fingerprints`
//! in the retired `fingerprint.rs`): a `rayon` parallel map over pages,
//! each entry reduced to a small set of owned, hashable features.

use crate::similarity::significant_words;
use crate::types::{ParsedDocument, PageFingerprint, SourceType};
use rayon::prelude::*;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

fn hash_text(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

/// Builds one fingerprint per page of `doc`. Fingerprints of the same
/// `source_type` share no memory: each owns its own text, word list and
/// font map.
pub fn build_page_fingerprints(doc: &ParsedDocument, source_type: SourceType) -> Vec<PageFingerprint> {
    doc.pages
        .par_iter()
        .map(|page| PageFingerprint {
            source_type,
            page_index: page.index,
            text: page.text.clone(),
            text_hash: hash_text(&page.text),
            significant_words: significant_words(&page.text),
            font_counts: page.fonts.clone(),
            element_count: page.element_count,
            image_count: page.images.len() as u32,
            has_images: !page.images.is_empty(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParsedPage;

    fn doc_with_pages(texts: &[&str]) -> ParsedDocument {
        ParsedDocument {
            pages: texts
                .iter()
                .enumerate()
                .map(|(i, t)| ParsedPage {
                    index: i,
                    text: t.to_string(),
                    fonts: Default::default(),
                    images: vec![],
                    element_count: 0,
                })
                .collect(),
            size: 0,
            page_count: texts.len(),
            boundaries: vec![],
        }
    }

    #[test]
    fn fingerprints_are_built_per_page_and_own_their_text() {
        let doc = doc_with_pages(&["alpha beta", "gamma delta"]);
        let fps = build_page_fingerprints(&doc, SourceType::Base);
        assert_eq!(fps.len(), 2);
        assert_eq!(fps[0].text, "alpha beta");
        assert_eq!(fps[1].text, "gamma delta");
        assert_ne!(fps[0].text_hash, fps[1].text_hash);
    }

    #[test]
    fn identical_text_yields_identical_hash() {
        let doc = doc_with_pages(&["same text", "same text"]);
        let fps = build_page_fingerprints(&doc, SourceType::Compare);
        assert_eq!(fps[0].text_hash, fps[1].text_hash);
    }
}
