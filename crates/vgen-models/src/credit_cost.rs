//! Credit cost calculation for generation jobs.
//!
//! The quote is computed once when a job is accepted and then fixed for the
//! lifetime of the job. It returns a structured breakdown for use in ledger
//! entry descriptions and metadata.
//!
//! # Example
//!
//! ```ignore
//! use vgen_models::JobCostCalculator;
//!
//! let cost = JobCostCalculator::new(30, 6)
//!     .with_base_credits(10)
//!     .with_credits_per_second(2)
//!     .calculate();
//!
//! assert_eq!(cost.total, 70); // 10 + 2 * 30
//! ```

use std::collections::HashMap;

use crate::style::VideoStyle;

/// Default flat credits charged per job.
pub const DEFAULT_BASE_CREDITS: i64 = 10;

/// Default credits charged per second of requested video.
pub const DEFAULT_CREDITS_PER_SECOND: i64 = 2;

// =============================================================================
// Cost Breakdown
// =============================================================================

/// Detailed breakdown of the credit price of a generation job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostBreakdown {
    /// Flat per-job credits
    pub base_credits: i64,
    /// Credits for the requested duration
    pub duration_credits: i64,
    /// Requested duration in seconds
    pub duration_seconds: u32,
    /// Number of scenes
    pub scene_count: u32,
    pub style: VideoStyle,
    /// Grand total
    pub total: i64,
}

impl CostBreakdown {
    /// Generate a human-readable description for ledger entries.
    ///
    /// Format: "Generate 30s video, 6 scenes (tiktok)"
    pub fn to_description(&self) -> String {
        let scene_text = if self.scene_count == 1 { "scene" } else { "scenes" };
        format!(
            "Generate {}s video, {} {} ({})",
            self.duration_seconds, self.scene_count, scene_text, self.style
        )
    }

    /// Convert to metadata for ledger entries.
    ///
    /// Keys produced: `duration_seconds`, `scene_count`, `style`,
    /// `base_credits`, `duration_credits`, `total_credits`.
    pub fn to_metadata(&self) -> HashMap<String, String> {
        let mut metadata = HashMap::new();
        metadata.insert("duration_seconds".to_string(), self.duration_seconds.to_string());
        metadata.insert("scene_count".to_string(), self.scene_count.to_string());
        metadata.insert("style".to_string(), self.style.to_string());
        metadata.insert("base_credits".to_string(), self.base_credits.to_string());
        metadata.insert("duration_credits".to_string(), self.duration_credits.to_string());
        metadata.insert("total_credits".to_string(), self.total.to_string());
        metadata
    }
}

// =============================================================================
// Cost Calculator
// =============================================================================

/// Builder for calculating job prices.
#[derive(Debug, Clone)]
pub struct JobCostCalculator {
    duration_seconds: u32,
    scene_count: u32,
    style: VideoStyle,
    base_credits: i64,
    credits_per_second: i64,
}

impl JobCostCalculator {
    pub fn new(duration_seconds: u32, scene_count: u32) -> Self {
        Self {
            duration_seconds,
            scene_count,
            style: VideoStyle::default(),
            base_credits: DEFAULT_BASE_CREDITS,
            credits_per_second: DEFAULT_CREDITS_PER_SECOND,
        }
    }

    pub fn with_style(mut self, style: VideoStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_base_credits(mut self, credits: i64) -> Self {
        self.base_credits = credits.max(0);
        self
    }

    pub fn with_credits_per_second(mut self, credits: i64) -> Self {
        self.credits_per_second = credits.max(0);
        self
    }

    pub fn calculate(&self) -> CostBreakdown {
        let duration_credits = self.credits_per_second * i64::from(self.duration_seconds);
        CostBreakdown {
            base_credits: self.base_credits,
            duration_credits,
            duration_seconds: self.duration_seconds,
            scene_count: self.scene_count,
            style: self.style,
            total: self.base_credits + duration_credits,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
