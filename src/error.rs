//! Error types for the benchmark harness
//!
//! Two classes of failure exist and they are handled differently:
//! abort-class errors (missing resources, unusable configuration) stop a
//! run before or at its boundary with no summary produced, while
//! recoverable per-prompt faults (load or generation failures, routing
//! misses) are caught inside the run loop and surface only in the run log.
//! Only abort-class errors are represented here; per-prompt faults never
//! escape the orchestrator.

use thiserror::Error;

/// Errors that abort a benchmark run or fail an export
#[derive(Debug, Error)]
pub enum MedirError {
    /// A required bundled resource is absent or unreadable
    #[error("Resource missing: {resource}: {reason}")]
    ResourceMissing {
        /// Name of the resource that could not be loaded
        resource: String,
        /// Why loading failed
        reason: String,
    },

    /// Run configuration cannot produce any work (whole-run precondition)
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Description of the configuration mismatch
        reason: String,
    },

    /// The engine failed to load a model
    #[error("Model load failed for '{model_id}': {reason}")]
    ModelLoadError {
        /// Model that failed to load
        model_id: String,
        /// Engine-reported reason
        reason: String,
    },

    /// The engine failed while producing a completion
    #[error("Inference failed: {reason}")]
    InferenceError {
        /// Engine-reported reason
        reason: String,
    },

    /// Report serialization failed
    #[error("Report serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for harness operations
pub type Result<T> = std::result::Result<T, MedirError>;
