//! # Medir
//!
//! Benchmarking and routing-evaluation harness for an on-device
//! language-model serving engine.
//!
//! Medir (Spanish: "to measure") takes a batch of prompts and, per prompt,
//! classifies it into one of five task categories, routes it to a
//! category-appropriate model variant, runs a streamed generation while
//! measuring latency, throughput, memory, CPU time, and estimated energy,
//! then aggregates run-level statistics. Two comparison modes bypass
//! routing: a direct mode that pins every prompt to one model and a
//! quantization-comparison mode that runs every prompt on two model
//! variants back-to-back.
//!
//! The inference engine itself is an external collaborator behind the
//! [`engine::InferenceEngine`] contract: the harness loads and unloads
//! models through it and consumes its completion streams, but never
//! implements inference. Energy figures are derived estimates from CPU
//! time and thermal state, not hardware readings.
//!
//! ## Example
//!
//! ```rust
//! use medir::bench::BenchmarkRunner;
//! use medir::energy::{EnergyConfig, EnergyEstimator, RusageProbe};
//! use medir::engine::MockEngine;
//!
//! let estimator = EnergyEstimator::new(Box::new(RusageProbe::new()), EnergyConfig::default());
//! let runner = BenchmarkRunner::new(MockEngine::new(), estimator);
//! assert!(!runner.snapshot().running);
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)] // usize -> f64 for statistics is acceptable
#![allow(clippy::cast_possible_truncation)] // u128 -> u64 for millisecond timings is safe
#![allow(clippy::must_use_candidate)] // Not all methods need #[must_use]
#![allow(clippy::missing_panics_doc)] // Lock poisoning paths are unreachable in practice
#![allow(clippy::uninlined_format_args)] // Prefer explicit format args

/// Benchmark orchestration: run modes, per-prompt pipeline, summaries
pub mod bench;
/// Prompt catalog data model: categories and prompt items
pub mod catalog;
/// Zero-shot classification with a deterministic keyword fallback
pub mod classify;
/// Energy, memory, and CPU-time estimation over OS probe readings
pub mod energy;
/// Inference engine contract and the scripted mock engine
pub mod engine;
pub mod error;
/// Resource loading contracts and the JSON-backed loader
pub mod registry;
/// Report rendering: JSON and flattened CSV
pub mod report;
/// Category-to-model routing
pub mod route;
/// Pure statistical aggregation: quantiles, throughput, accuracy
pub mod stats;

// Re-exports for convenience
pub use error::{MedirError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.contains('.'));
        assert!(VERSION.len() >= 3);
    }
}
