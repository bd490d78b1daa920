//! Configuration defaults for the matching core.
//!
//! Each config struct implements `Default` the way the teacher's
//! `CompareConfig` does, with `from_env` helpers that read overrides
//! straight from the process environment (no config-file crate, matching
//! the teacher's own choice to wire configuration through explicit struct
//! construction rather than a file format).

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Text/visual blend weight for document-level candidate scoring.
pub const DOCUMENT_TEXT_WEIGHT: f64 = 0.7;
pub const DOCUMENT_VISUAL_WEIGHT: f64 = 0.3;

/// Text/visual blend weight for page-level scoring. Deliberately distinct
/// from the document-level weights.
pub const PAGE_TEXT_WEIGHT: f64 = 0.6;
pub const PAGE_VISUAL_WEIGHT: f64 = 0.4;

/// DPI used for all sample/page renders.
pub const SAMPLE_RENDER_DPI: u32 = 72;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Configuration for the document matcher (C3) and page matcher (C4).
#[derive(Debug, Clone)]
pub struct MatcherConfig {
    pub text_similarity_threshold: f64,
    pub visual_similarity_threshold: f64,
    pub combined_similarity_threshold: f64,
    pub max_sample_pages: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            text_similarity_threshold: 0.5,
            visual_similarity_threshold: 0.6,
            combined_similarity_threshold: 0.55,
            max_sample_pages: 3,
        }
    }
}

impl MatcherConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            text_similarity_threshold: env_or(
                "PDFCOMPARE_TEXT_SIMILARITY_THRESHOLD",
                d.text_similarity_threshold,
            ),
            visual_similarity_threshold: env_or(
                "PDFCOMPARE_VISUAL_SIMILARITY_THRESHOLD",
                d.visual_similarity_threshold,
            ),
            combined_similarity_threshold: env_or(
                "PDFCOMPARE_COMBINED_SIMILARITY_THRESHOLD",
                d.combined_similarity_threshold,
            ),
            max_sample_pages: env_or("PDFCOMPARE_MAX_SAMPLE_PAGES", d.max_sample_pages),
        }
    }
}

/// Configuration for the resource governor (C2).
#[derive(Debug, Clone)]
pub struct GovernorConfig {
    /// Advisory pressure thresholds, in MiB.
    pub high_threshold_mib: u64,
    pub very_high_threshold_mib: u64,
    pub critical_threshold_mib: u64,
    /// Directory scratch-spilled buffers are written under.
    pub scratch_dir: PathBuf,
    /// Minimum buffer size that is eligible for spilling.
    pub spill_threshold_bytes: usize,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            high_threshold_mib: 1500,
            very_high_threshold_mib: 2500,
            critical_threshold_mib: 3500,
            scratch_dir: env::temp_dir().join("pdfcompare"),
            spill_threshold_bytes: 1024 * 1024,
        }
    }
}

impl GovernorConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            high_threshold_mib: env_or("PDFCOMPARE_MEM_HIGH_MIB", d.high_threshold_mib),
            very_high_threshold_mib: env_or(
                "PDFCOMPARE_MEM_VERY_HIGH_MIB",
                d.very_high_threshold_mib,
            ),
            critical_threshold_mib: env_or(
                "PDFCOMPARE_MEM_CRITICAL_MIB",
                d.critical_threshold_mib,
            ),
            scratch_dir: env::var("PDFCOMPARE_SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.scratch_dir),
            spill_threshold_bytes: d.spill_threshold_bytes,
        }
    }
}

/// Configuration for the scheduler (C5).
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub max_concurrent_comparisons: usize,
    pub tick_interval: Duration,
    pub stall_sweep_interval: Duration,
    pub stall_threshold: Duration,
    pub worker_count: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_comparisons: 2,
            tick_interval: Duration::from_secs(30),
            stall_sweep_interval: Duration::from_secs(15 * 60),
            stall_threshold: Duration::from_secs(30 * 60),
            worker_count: 4,
        }
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            max_concurrent_comparisons: env_or(
                "PDFCOMPARE_MAX_CONCURRENT",
                d.max_concurrent_comparisons,
            ),
            tick_interval: d.tick_interval,
            stall_sweep_interval: d.stall_sweep_interval,
            stall_threshold: d.stall_threshold,
            worker_count: env_or("PDFCOMPARE_WORKER_COUNT", d.worker_count),
        }
    }
}
