//! Benchmark orchestration
//!
//! Drives the three run modes over a shared per-prompt pipeline:
//! classify (routed mode only), route, load the target model into the
//! exclusively-owned engine, consume the completion stream while
//! measuring, unload, record. The engine holds at most one model at any
//! point; `unload` runs on success and failure paths alike before a
//! result may be recorded.
//!
//! A run is strictly sequential. Cancellation is cooperative and polled
//! once per prompt boundary, never inside the stream-consumption loop, so
//! resource cleanup ordering is preserved; a cancelled run produces a
//! valid partial summary.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::catalog::{CategoryLabel, PromptItem};
use crate::classify::{Classifier, DEFAULT_CLASSIFIER_MAX_TOKENS};
use crate::energy::{EnergyEstimator, EnergySample};
use crate::engine::{ChatMessage, InferenceEngine, SamplingParams};
use crate::error::{MedirError, Result};
use crate::registry::{ModelRegistry, ResourceLoader};
use crate::route::{self, RoutingTable};
use crate::stats::{self, QuantileSummary};

// ============================================================================
// Results and summaries
// ============================================================================

/// Measurements for one processed prompt
///
/// Appended in submission order, never mutated. Token counts are
/// whitespace-delimited word estimates with a floor of 1, not tokenizer
/// counts; `tokens_per_second` inherits that approximation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptResult {
    /// Prompt id (derived `original * 1000 + variant` in comparison mode)
    pub id: u64,
    /// Label the run assigned (classifier output, or ground truth when
    /// classification was skipped)
    pub category: CategoryLabel,
    /// Model that served the generation
    pub model_id: String,
    /// Time from request submission to the first generated-text chunk
    pub ttft_ms: u64,
    /// Time from first generated text to stream completion
    pub generation_ms: u64,
    /// Estimated prompt token count
    pub prompt_tokens: usize,
    /// Estimated completion token count
    pub completion_tokens: usize,
    /// Completion tokens divided by generation seconds
    pub tokens_per_second: f64,
    /// Full generated text
    pub completion: String,
    /// Ground-truth category from the prompt catalog
    pub expected_category: CategoryLabel,
    /// Whether `category` equals `expected_category`
    pub category_matched: bool,
}

/// Aggregate statistics over one completed (possibly partial) run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Number of recorded results (skips excluded)
    pub total_prompts: usize,
    /// Time-to-first-token statistics in milliseconds
    pub ttft_ms: QuantileSummary,
    /// Generation-time statistics in milliseconds
    pub generation_ms: QuantileSummary,
    /// Estimated prompt tokens across all results
    pub total_prompt_tokens: usize,
    /// Estimated completion tokens across all results
    pub total_completion_tokens: usize,
    /// Batch throughput: total completion tokens over total generation time
    pub tokens_per_second: f64,
    /// Fraction of results whose label matched ground truth (1.0 by
    /// convention when classification was skipped)
    pub classification_accuracy: f64,
    /// Cumulative estimated energy in millijoules
    pub total_energy_mj: f64,
    /// Peak resident memory observed during streaming
    pub peak_memory_bytes: u64,
    /// Cumulative CPU time in seconds
    pub cpu_time_s: f64,
    /// Wall-clock run duration in seconds
    pub wall_time_s: f64,
}

/// Everything a run produces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Aggregate statistics
    pub summary: RunSummary,
    /// Per-prompt results in submission order
    pub results: Vec<PromptResult>,
    /// Progress and skip log
    pub log: Vec<String>,
    /// Energy samples in append order
    pub energy_samples: Vec<EnergySample>,
}

/// Read-only observer view of a run in flight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// Fraction of prompts processed
    pub progress: f64,
    /// Whether a run is active
    pub running: bool,
    /// Results recorded so far
    pub results_recorded: usize,
    /// Log lines emitted so far
    pub log_lines: usize,
}

/// Options shared by all run modes
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Model id backing the zero-shot classifier (routed mode)
    pub router_model: String,
    /// Sampling settings for benchmark generations
    pub sampling: SamplingParams,
    /// Output budget for classification completions
    pub classifier_max_tokens: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            router_model: "router".to_string(),
            sampling: SamplingParams::default(),
            classifier_max_tokens: DEFAULT_CLASSIFIER_MAX_TOKENS,
        }
    }
}

impl RunOptions {
    /// Set the router model id
    #[must_use]
    pub fn with_router_model(mut self, model_id: &str) -> Self {
        self.router_model = model_id.to_string();
        self
    }

    /// Set the generation sampling settings
    #[must_use]
    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }
}

/// Cooperative cancellation flag, polled at prompt boundaries
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Request cancellation; takes effect at the next prompt boundary
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Estimate a token count by whitespace word splitting
///
/// An approximation by design: this harness reasons about engine-level
/// behavior, not tokenizer internals. Floors at 1 so throughput division
/// is always defined.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.split_whitespace().count().max(1)
}

struct GenerationMeasurement {
    ttft_ms: u64,
    generation_ms: u64,
    completion: String,
}

// ============================================================================
// Runner
// ============================================================================

/// Orchestrates benchmark runs over an exclusively-owned engine
///
/// One runner owns one engine for the duration of a run; no concurrent
/// run may share it. Results, log, and progress are mutated only by the
/// runner's sequential loop and exposed read-only to observers.
pub struct BenchmarkRunner<E> {
    engine: E,
    estimator: EnergyEstimator,
    options: RunOptions,
    results: Vec<PromptResult>,
    log: Vec<String>,
    progress: f64,
    running: bool,
    cancel: CancelToken,
}

impl<E: InferenceEngine> BenchmarkRunner<E> {
    /// Create a runner over an engine and an energy estimator
    #[must_use]
    pub fn new(engine: E, estimator: EnergyEstimator) -> Self {
        Self {
            engine,
            estimator,
            options: RunOptions::default(),
            results: Vec::new(),
            log: Vec::new(),
            progress: 0.0,
            running: false,
            cancel: CancelToken::default(),
        }
    }

    /// Override run options
    #[must_use]
    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Use an externally created cancellation token
    ///
    /// Lets an observer hold the handle before the run starts. The token
    /// is reset at every run start.
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Cancellation handle for observers
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Read-only view of the run in flight
    #[must_use]
    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            progress: self.progress,
            running: self.running,
            results_recorded: self.results.len(),
            log_lines: self.log.len(),
        }
    }

    /// Results recorded so far, in submission order
    #[must_use]
    pub fn results(&self) -> &[PromptResult] {
        &self.results
    }

    /// Progress and skip log emitted so far
    #[must_use]
    pub fn log(&self) -> &[String] {
        &self.log
    }

    /// The owned engine, for inspection after a run
    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Run the routed pipeline: classify, route, generate
    ///
    /// Pre-flight validation aborts the whole run before any prompt is
    /// processed when the router model is not installed or no routing
    /// entry targets an installed model.
    ///
    /// # Errors
    /// Returns [`MedirError::ResourceMissing`] when a resource cannot be
    /// loaded and [`MedirError::InvalidConfiguration`] on a failed
    /// pre-flight check. Per-prompt faults never surface here.
    pub fn run_routed(
        &mut self,
        resources: &dyn ResourceLoader,
        registry: &dyn ModelRegistry,
    ) -> Result<RunReport> {
        self.begin_run();
        let outcome = self.routed_inner(resources, registry);
        self.end_run();
        outcome
    }

    /// Run every prompt on one fixed model, skipping classification
    ///
    /// # Errors
    /// Returns [`MedirError::ResourceMissing`] when the prompt catalog
    /// cannot be loaded.
    pub fn run_direct(
        &mut self,
        resources: &dyn ResourceLoader,
        registry: &dyn ModelRegistry,
        model_id: &str,
    ) -> Result<RunReport> {
        self.begin_run();
        let outcome = self.fixed_models_inner(resources, registry, &[model_id]);
        self.end_run();
        outcome
    }

    /// Run every prompt on two model variants back-to-back
    ///
    /// Result ids are derived as `original * 1000 + variant` (variants 1
    /// and 2) so both variants coexist in one ordered result sequence.
    ///
    /// # Errors
    /// Returns [`MedirError::ResourceMissing`] when the prompt catalog
    /// cannot be loaded.
    pub fn run_comparison(
        &mut self,
        resources: &dyn ResourceLoader,
        registry: &dyn ModelRegistry,
        model_a: &str,
        model_b: &str,
    ) -> Result<RunReport> {
        self.begin_run();
        let outcome = self.fixed_models_inner(resources, registry, &[model_a, model_b]);
        self.end_run();
        outcome
    }

    // ------------------------------------------------------------------
    // Run skeletons
    // ------------------------------------------------------------------

    fn begin_run(&mut self) {
        self.results.clear();
        self.log.clear();
        self.progress = 0.0;
        self.running = true;
        self.cancel.reset();
    }

    fn end_run(&mut self) {
        // Every exit path releases the engine before the runner returns
        // to its not-running state.
        self.engine.unload();
        self.running = false;
    }

    fn routed_inner(
        &mut self,
        resources: &dyn ResourceLoader,
        registry: &dyn ModelRegistry,
    ) -> Result<RunReport> {
        let prompts = resources.load_prompts()?;
        let table = resources.load_routing_table()?;
        let installed = resources.load_installed_models()?;

        let router = registry
            .descriptor(&self.options.router_model)
            .ok_or_else(|| MedirError::InvalidConfiguration {
                reason: format!(
                    "router model '{}' is not installed",
                    self.options.router_model
                ),
            })?;
        if route::usable_entries(&table, &installed) == 0 {
            return Err(MedirError::InvalidConfiguration {
                reason: "routing table has no entry targeting an installed model".to_string(),
            });
        }
        let classifier =
            Classifier::new(router).with_max_tokens(self.options.classifier_max_tokens);

        self.log_line(&format!("routed run started: {} prompts", prompts.len()));
        self.estimator.start();
        let run_started = Instant::now();
        let total = prompts.len().max(1);

        for (index, item) in prompts.iter().enumerate() {
            if self.cancel.is_cancelled() {
                self.log_line(&format!(
                    "run cancelled after {index} of {} prompts",
                    prompts.len()
                ));
                break;
            }
            self.process_routed_prompt(item, &classifier, &table, &installed, registry);
            self.progress = (index + 1) as f64 / total as f64;
            self.estimator.record_sample();
        }

        self.estimator.stop();
        self.log_line(&format!("run complete: {} results", self.results.len()));
        Ok(self.build_report(run_started))
    }

    fn fixed_models_inner(
        &mut self,
        resources: &dyn ResourceLoader,
        registry: &dyn ModelRegistry,
        models: &[&str],
    ) -> Result<RunReport> {
        let prompts = resources.load_prompts()?;

        self.log_line(&format!(
            "fixed-model run started: {} prompts on {models:?}",
            prompts.len()
        ));
        self.estimator.start();
        let run_started = Instant::now();
        let total = prompts.len().max(1);
        let comparison = models.len() > 1;

        for (index, item) in prompts.iter().enumerate() {
            if self.cancel.is_cancelled() {
                self.log_line(&format!(
                    "run cancelled after {index} of {} prompts",
                    prompts.len()
                ));
                break;
            }
            for (variant, model_id) in models.iter().enumerate() {
                let result_id = if comparison {
                    item.id * 1000 + variant as u64 + 1
                } else {
                    item.id
                };
                self.process_fixed_prompt(item, result_id, model_id, registry);
            }
            self.progress = (index + 1) as f64 / total as f64;
            self.estimator.record_sample();
        }

        self.estimator.stop();
        self.log_line(&format!("run complete: {} results", self.results.len()));
        Ok(self.build_report(run_started))
    }

    // ------------------------------------------------------------------
    // Per-prompt pipeline
    // ------------------------------------------------------------------

    fn process_routed_prompt(
        &mut self,
        item: &PromptItem,
        classifier: &Classifier,
        table: &RoutingTable,
        installed: &HashSet<String>,
        registry: &dyn ModelRegistry,
    ) {
        let label = classifier.classify(&mut self.engine, &item.prompt);
        let Some(model_id) = route::resolve(label, table, installed) else {
            self.log_line(&format!(
                "prompt {}: no installed model for category '{label}', skipped",
                item.id
            ));
            return;
        };
        let model_id = model_id.to_string();
        match self.run_generation(&model_id, registry, &item.prompt) {
            Ok(measurement) => {
                self.push_result(item, item.id, label, &model_id, measurement);
            },
            Err(e) => {
                self.log_line(&format!(
                    "prompt {}: model '{model_id}': {e}, skipped",
                    item.id
                ));
            },
        }
    }

    fn process_fixed_prompt(
        &mut self,
        item: &PromptItem,
        result_id: u64,
        model_id: &str,
        registry: &dyn ModelRegistry,
    ) {
        match self.run_generation(model_id, registry, &item.prompt) {
            Ok(measurement) => {
                // Classification skipped: the label is ground truth and
                // counts as correct by convention.
                self.push_result(item, result_id, item.category, model_id, measurement);
            },
            Err(e) => {
                self.log_line(&format!(
                    "prompt {}: model '{model_id}': {e}, skipped",
                    item.id
                ));
            },
        }
    }

    fn run_generation(
        &mut self,
        model_id: &str,
        registry: &dyn ModelRegistry,
        prompt: &str,
    ) -> Result<GenerationMeasurement> {
        let descriptor = registry
            .descriptor(model_id)
            .ok_or_else(|| MedirError::ModelLoadError {
                model_id: model_id.to_string(),
                reason: "not in the installed-model registry".to_string(),
            })?;
        if let Err(e) = self.engine.reload(&descriptor) {
            // Force-unload even on a failed load so the engine never keeps
            // a half-loaded model behind.
            self.engine.unload();
            return Err(e);
        }
        // Unloaded on success and failure alike.
        let outcome = self.consume_stream(prompt);
        self.engine.unload();
        outcome
    }

    fn consume_stream(&mut self, prompt: &str) -> Result<GenerationMeasurement> {
        let messages = [ChatMessage::user(prompt)];
        let request_at = Instant::now();
        let stream = self
            .engine
            .stream_completion(&messages, &self.options.sampling)?;

        let mut completion = String::new();
        let mut first_token_at: Option<Instant> = None;
        for chunk in stream {
            let chunk = chunk?;
            self.estimator.sample_memory();
            if let Some(text) = chunk.text {
                if !text.is_empty() {
                    if first_token_at.is_none() {
                        first_token_at = Some(Instant::now());
                    }
                    completion.push_str(&text);
                }
            }
        }
        let ended_at = Instant::now();

        let Some(first) = first_token_at else {
            return Err(MedirError::InferenceError {
                reason: "stream produced no generated text".to_string(),
            });
        };
        Ok(GenerationMeasurement {
            ttft_ms: first.duration_since(request_at).as_millis() as u64,
            generation_ms: ended_at.duration_since(first).as_millis() as u64,
            completion,
        })
    }

    fn push_result(
        &mut self,
        item: &PromptItem,
        result_id: u64,
        category: CategoryLabel,
        model_id: &str,
        measurement: GenerationMeasurement,
    ) {
        let prompt_tokens = estimate_tokens(&item.prompt);
        let completion_tokens = estimate_tokens(&measurement.completion);
        self.results.push(PromptResult {
            id: result_id,
            category,
            model_id: model_id.to_string(),
            ttft_ms: measurement.ttft_ms,
            generation_ms: measurement.generation_ms,
            prompt_tokens,
            completion_tokens,
            tokens_per_second: stats::batch_throughput(
                completion_tokens,
                measurement.generation_ms,
            ),
            completion: measurement.completion,
            expected_category: item.category,
            category_matched: category == item.category,
        });
    }

    fn build_report(&self, run_started: Instant) -> RunReport {
        let ttfts: Vec<u64> = self.results.iter().map(|r| r.ttft_ms).collect();
        let generations: Vec<u64> = self.results.iter().map(|r| r.generation_ms).collect();
        let total_prompt_tokens: usize = self.results.iter().map(|r| r.prompt_tokens).sum();
        let total_completion_tokens: usize =
            self.results.iter().map(|r| r.completion_tokens).sum();
        let total_generation_ms: u64 = generations.iter().sum();
        let matched = self.results.iter().filter(|r| r.category_matched).count();

        let summary = RunSummary {
            total_prompts: self.results.len(),
            ttft_ms: stats::quantiles(&ttfts),
            generation_ms: stats::quantiles(&generations),
            total_prompt_tokens,
            total_completion_tokens,
            tokens_per_second: stats::batch_throughput(
                total_completion_tokens,
                total_generation_ms,
            ),
            classification_accuracy: stats::classification_accuracy(matched, self.results.len()),
            total_energy_mj: self.estimator.total_energy_mj(),
            peak_memory_bytes: self.estimator.peak_memory_bytes(),
            cpu_time_s: self.estimator.cpu_time().as_secs_f64(),
            wall_time_s: run_started.elapsed().as_secs_f64(),
        };
        RunReport {
            summary,
            results: self.results.clone(),
            log: self.log.clone(),
            energy_samples: self.estimator.samples().to_vec(),
        }
    }

    fn log_line(&mut self, line: &str) {
        self.log.push(line.to_string());
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod bench_tests;
