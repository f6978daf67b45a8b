//! Pure aggregation over completed measurement sequences
//!
//! Everything here is a stateless function over finished data: quantiles
//! with linear interpolation between order statistics, batch throughput
//! summed across prompts (per-prompt averaging would bias toward short
//! completions), and classification accuracy. Empty input always yields
//! zeros, never an error.

#![allow(clippy::cast_precision_loss)] // Statistical functions need usize->f64

use serde::{Deserialize, Serialize};

/// Average and tail quantiles of one metric
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QuantileSummary {
    /// Arithmetic mean
    pub average: f64,
    /// Median (linear interpolation)
    pub p50: f64,
    /// 95th percentile (linear interpolation)
    pub p95: f64,
}

/// Compute average, p50, and p95 of a measurement sequence
///
/// Percentiles use linear interpolation between order statistics at rank
/// `(n - 1) * p`. Empty input yields an all-zero summary.
#[must_use]
pub fn quantiles(values: &[u64]) -> QuantileSummary {
    if values.is_empty() {
        return QuantileSummary::default();
    }

    let n = values.len();
    let average = values.iter().sum::<u64>() as f64 / n as f64;

    let mut sorted = values.to_vec();
    sorted.sort_unstable();

    QuantileSummary {
        average,
        p50: interpolated_percentile(&sorted, 0.50),
        p95: interpolated_percentile(&sorted, 0.95),
    }
}

/// Percentile by linear interpolation over a sorted sequence
fn interpolated_percentile(sorted: &[u64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0] as f64;
    }
    let rank = (n - 1) as f64 * p;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] as f64 * (1.0 - weight) + sorted[upper.min(n - 1)] as f64 * weight
}

/// Batch throughput in tokens per second
///
/// Total completion tokens divided by total generation time, summed across
/// prompts. Zero total time yields zero.
#[must_use]
pub fn batch_throughput(total_completion_tokens: usize, total_generation_ms: u64) -> f64 {
    if total_generation_ms == 0 {
        return 0.0;
    }
    total_completion_tokens as f64 / (total_generation_ms as f64 / 1000.0)
}

/// Fraction of prompts whose produced label matched ground truth
///
/// Zero totals yield zero. Callers that skipped classification report 1.0
/// by convention before reaching here.
#[must_use]
pub fn classification_accuracy(matched: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    matched as f64 / total as f64
}
