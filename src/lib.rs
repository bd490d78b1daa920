//! Matching core and scheduler for PDF-to-PDF comparison.
//!
//! This crate decides which logical sub-document in one PDF corresponds to
//! which in another, which pages within a matched pair correspond, and
//! drives that work through a bounded-concurrency background scheduler
//! with stall recovery. The PDF parser, rasteriser, SSIM kernel, blob
//! storage and persistent store are all external collaborators (see
//! [`collaborators`]) injected by the embedding application.

pub mod collaborators;
pub mod config;
pub mod document_matcher;
pub mod error;
pub mod fingerprint;
pub mod governor;
pub mod page_matcher;
pub mod scheduler;
pub mod similarity;
pub mod types;

/// Initialises `env_logger` from `RUST_LOG`, defaulting to `warn` when
/// unset. Optional convenience for embedders; the crate itself never
/// calls this on its own.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
}
