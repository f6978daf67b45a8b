//! Inference engine contract
//!
//! The engine is an external, exclusively-owned, stateful resource: it
//! holds at most one loaded model, `reload` replaces whatever was loaded
//! before, and `unload` is idempotent. Completions are consumed as a
//! pull-based, finite sequence of chunks; a new request must be issued to
//! regenerate. The harness only ever talks to the engine through this
//! contract.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::{MedirError, Result};
use crate::registry::ModelDescriptor;

/// One message in a chat completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role (`system` or `user`)
    pub role: String,
    /// Message content
    pub content: String,
}

impl ChatMessage {
    /// Build a system message
    #[must_use]
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    /// Build a user message
    #[must_use]
    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

/// Sampling settings for a completion request
///
/// Benchmark runs use deterministic-leaning settings: low temperature,
/// bounded top-p, bounded output length.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Maximum tokens to generate
    pub max_tokens: usize,
    /// Sampling temperature
    pub temperature: f64,
    /// Nucleus sampling bound
    pub top_p: f64,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_tokens: 256,
            temperature: 0.2,
            top_p: 0.9,
        }
    }
}

impl SamplingParams {
    /// Set max tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set top-p
    #[must_use]
    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = top_p;
        self
    }
}

/// Token counts an engine may report on the final chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt
    pub prompt_tokens: usize,
    /// Tokens generated
    pub completion_tokens: usize,
}

/// One chunk of a streamed completion
///
/// `text` is absent on control chunks (stream start, usage-only trailer);
/// `usage` rides the final chunk when the engine reports counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionChunk {
    /// Incremental generated text, if any
    pub text: Option<String>,
    /// Engine-reported token usage, if any
    pub usage: Option<TokenUsage>,
}

impl CompletionChunk {
    /// Chunk carrying generated text
    #[must_use]
    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            usage: None,
        }
    }

    /// Final chunk carrying token usage
    #[must_use]
    pub fn usage(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            text: None,
            usage: Some(TokenUsage {
                prompt_tokens,
                completion_tokens,
            }),
        }
    }
}

/// Lazy, finite chunk sequence for one completion request
pub type CompletionStream = Box<dyn Iterator<Item = Result<CompletionChunk>> + Send>;

/// Contract the harness holds with the inference engine
///
/// Implementations must be safely callable repeatedly within one run:
/// `reload` is exclusive and invalidates any previously loaded model,
/// `unload` is safe even when nothing is loaded.
pub trait InferenceEngine {
    /// Load a model, replacing any previously loaded one
    ///
    /// # Errors
    /// Returns [`MedirError::ModelLoadError`] if the engine cannot load the
    /// model.
    fn reload(&mut self, descriptor: &ModelDescriptor) -> Result<()>;

    /// Unload the current model; no-op when nothing is loaded
    fn unload(&mut self);

    /// Start a streamed chat completion
    ///
    /// # Errors
    /// Returns [`MedirError::InferenceError`] if no model is loaded or the
    /// request cannot be started. Mid-stream failures surface as `Err`
    /// items on the stream itself.
    fn stream_completion(
        &mut self,
        messages: &[ChatMessage],
        params: &SamplingParams,
    ) -> Result<CompletionStream>;
}

// ============================================================================
// Mock engine
// ============================================================================

/// Engine lifecycle call, recorded by [`MockEngine`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    /// `reload` was invoked for a model id
    Reload(String),
    /// `unload` was invoked
    Unload,
    /// `stream_completion` was invoked against a loaded model id
    Stream(String),
}

/// Scripted in-process engine for tests and the CLI demo path
///
/// Completions are served from a FIFO script; when the script is empty a
/// fixed deterministic completion is produced. Every lifecycle call is
/// recorded so tests can assert load/unload ordering.
pub struct MockEngine {
    loaded: Option<String>,
    script: VecDeque<Vec<Result<CompletionChunk>>>,
    fail_reload: HashSet<String>,
    calls: Arc<Mutex<Vec<EngineCall>>>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// Create an empty mock engine
    #[must_use]
    pub fn new() -> Self {
        Self {
            loaded: None,
            script: VecDeque::new(),
            fail_reload: HashSet::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a completion made of the given text chunks
    pub fn push_completion(&mut self, chunks: &[&str]) {
        let total: usize = chunks
            .iter()
            .map(|c| c.split_whitespace().count())
            .sum::<usize>()
            .max(1);
        let mut scripted: Vec<Result<CompletionChunk>> = chunks
            .iter()
            .map(|c| Ok(CompletionChunk::text(c)))
            .collect();
        scripted.push(Ok(CompletionChunk::usage(0, total)));
        self.script.push_back(scripted);
    }

    /// Queue a completion that fails mid-stream after the given chunks
    pub fn push_failing_completion(&mut self, chunks: &[&str], reason: &str) {
        let mut scripted: Vec<Result<CompletionChunk>> = chunks
            .iter()
            .map(|c| Ok(CompletionChunk::text(c)))
            .collect();
        scripted.push(Err(MedirError::InferenceError {
            reason: reason.to_string(),
        }));
        self.script.push_back(scripted);
    }

    /// Make `reload` fail for a model id
    pub fn fail_reload_for(&mut self, model_id: &str) {
        self.fail_reload.insert(model_id.to_string());
    }

    /// Shared handle to the recorded call sequence
    #[must_use]
    pub fn call_log(&self) -> Arc<Mutex<Vec<EngineCall>>> {
        Arc::clone(&self.calls)
    }

    /// Currently loaded model id, if any
    #[must_use]
    pub fn loaded_model(&self) -> Option<&str> {
        self.loaded.as_deref()
    }

    fn record(&self, call: EngineCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn default_completion() -> Vec<Result<CompletionChunk>> {
        vec![
            Ok(CompletionChunk::text("Deterministic ")),
            Ok(CompletionChunk::text("mock ")),
            Ok(CompletionChunk::text("completion ")),
            Ok(CompletionChunk::text("for ")),
            Ok(CompletionChunk::text("benchmarking.")),
            Ok(CompletionChunk::usage(0, 5)),
        ]
    }
}

impl InferenceEngine for MockEngine {
    fn reload(&mut self, descriptor: &ModelDescriptor) -> Result<()> {
        self.record(EngineCall::Reload(descriptor.model_id.clone()));
        if self.fail_reload.contains(&descriptor.model_id) {
            return Err(MedirError::ModelLoadError {
                model_id: descriptor.model_id.clone(),
                reason: "scripted load failure".to_string(),
            });
        }
        self.loaded = Some(descriptor.model_id.clone());
        Ok(())
    }

    fn unload(&mut self) {
        self.record(EngineCall::Unload);
        self.loaded = None;
    }

    fn stream_completion(
        &mut self,
        _messages: &[ChatMessage],
        _params: &SamplingParams,
    ) -> Result<CompletionStream> {
        let Some(model) = self.loaded.clone() else {
            return Err(MedirError::InferenceError {
                reason: "no model loaded".to_string(),
            });
        };
        self.record(EngineCall::Stream(model));
        let chunks = self
            .script
            .pop_front()
            .unwrap_or_else(Self::default_completion);
        Ok(Box::new(chunks.into_iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(id: &str) -> ModelDescriptor {
        ModelDescriptor {
            model_id: id.to_string(),
            local_path: format!("/models/{id}"),
            library: "lib".to_string(),
            estimated_memory_bytes: 0,
        }
    }

    #[test]
    fn test_stream_without_load_fails() {
        let mut engine = MockEngine::new();
        let err = match engine
            .stream_completion(&[ChatMessage::user("hi")], &SamplingParams::default())
        {
            Ok(_) => panic!("expected error"),
            Err(e) => e,
        };
        assert!(err.to_string().contains("no model loaded"));
    }

    #[test]
    fn test_reload_replaces_loaded_model() {
        let mut engine = MockEngine::new();
        engine.reload(&descriptor("A")).unwrap();
        engine.reload(&descriptor("B")).unwrap();
        assert_eq!(engine.loaded_model(), Some("B"));
        engine.unload();
        assert_eq!(engine.loaded_model(), None);
        // Idempotent
        engine.unload();
        assert_eq!(engine.loaded_model(), None);
    }

    #[test]
    fn test_scripted_completion_order_and_usage_trailer() {
        let mut engine = MockEngine::new();
        engine.push_completion(&["one ", "two"]);
        engine.reload(&descriptor("A")).unwrap();
        let chunks: Vec<_> = engine
            .stream_completion(&[ChatMessage::user("hi")], &SamplingParams::default())
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text.as_deref(), Some("one "));
        assert_eq!(chunks[2].usage.unwrap().completion_tokens, 2);
    }

    #[test]
    fn test_failing_completion_yields_err_item() {
        let mut engine = MockEngine::new();
        engine.push_failing_completion(&["partial "], "engine crashed");
        engine.reload(&descriptor("A")).unwrap();
        let items: Vec<_> = engine
            .stream_completion(&[ChatMessage::user("hi")], &SamplingParams::default())
            .unwrap()
            .collect();
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }

    #[test]
    fn test_call_log_records_lifecycle() {
        let mut engine = MockEngine::new();
        let log = engine.call_log();
        engine.reload(&descriptor("A")).unwrap();
        engine.unload();
        let calls = log.lock().unwrap();
        assert_eq!(
            *calls,
            vec![EngineCall::Reload("A".to_string()), EngineCall::Unload]
        );
    }

    #[test]
    fn test_scripted_reload_failure() {
        let mut engine = MockEngine::new();
        engine.fail_reload_for("bad");
        assert!(engine.reload(&descriptor("bad")).is_err());
        assert_eq!(engine.loaded_model(), None);
        assert!(engine.reload(&descriptor("good")).is_ok());
    }
}
