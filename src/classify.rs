//! Zero-shot prompt classification
//!
//! Classification asks the router model to name one category from the
//! closed label set, then matches the normalized output against the
//! canonical names. When the engine is unavailable, errors, or answers
//! off-script, a deterministic keyword heuristic over the original prompt
//! text takes over. The result is total: every input string maps to a
//! label, never an error.

use crate::catalog::CategoryLabel;
use crate::engine::{ChatMessage, InferenceEngine, SamplingParams};
use crate::registry::ModelDescriptor;

/// Default output budget for the classification completion
///
/// A category name is a single word; anything beyond a few tokens is
/// wasted work.
pub const DEFAULT_CLASSIFIER_MAX_TOKENS: usize = 15;

/// Zero-shot classifier backed by a router model
pub struct Classifier {
    router_model: ModelDescriptor,
    max_tokens: usize,
}

impl Classifier {
    /// Create a classifier over the given router model
    #[must_use]
    pub fn new(router_model: ModelDescriptor) -> Self {
        Self {
            router_model,
            max_tokens: DEFAULT_CLASSIFIER_MAX_TOKENS,
        }
    }

    /// Override the classification output budget
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Classify a prompt into one of the five categories
    ///
    /// Total over the label set: any engine failure, including mid-stream
    /// errors, degrades to [`keyword_fallback`] over the original text.
    pub fn classify<E: InferenceEngine>(&self, engine: &mut E, text: &str) -> CategoryLabel {
        self.classify_via_engine(engine, text)
            .unwrap_or_else(|| keyword_fallback(text))
    }

    fn classify_via_engine<E: InferenceEngine>(
        &self,
        engine: &mut E,
        text: &str,
    ) -> Option<CategoryLabel> {
        engine.reload(&self.router_model).ok()?;
        let messages = [
            ChatMessage::system(&instruction_prompt()),
            ChatMessage::user(text),
        ];
        let params = SamplingParams::default()
            .with_max_tokens(self.max_tokens)
            .with_temperature(0.1);
        let stream = engine.stream_completion(&messages, &params).ok()?;

        let mut output = String::new();
        for chunk in stream {
            let chunk = chunk.ok()?;
            if let Some(piece) = chunk.text {
                output.push_str(&piece);
            }
        }
        match_label(&output)
    }
}

/// Build the fixed zero-shot instruction prompt
///
/// Enumerates the five categories with their one-line descriptions and
/// constrains the answer to exactly one category name.
#[must_use]
pub fn instruction_prompt() -> String {
    let mut prompt = String::from(
        "Classify the user's prompt into exactly one of these categories:\n",
    );
    for label in CategoryLabel::ALL {
        prompt.push_str(&format!("- {}: {}\n", label.as_str(), label.description()));
    }
    prompt.push_str("Answer with exactly one category name and nothing else.");
    prompt
}

/// Match classifier output text against the label set
///
/// The output is trimmed and lowercased, then matched in order: exact
/// equality, label-is-prefix-of-output, label-is-substring-of-output.
#[must_use]
pub fn match_label(output: &str) -> Option<CategoryLabel> {
    let normalized = output.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }
    CategoryLabel::ALL
        .iter()
        .find(|label| normalized == label.as_str())
        .or_else(|| {
            CategoryLabel::ALL
                .iter()
                .find(|label| normalized.starts_with(label.as_str()))
        })
        .or_else(|| {
            CategoryLabel::ALL
                .iter()
                .find(|label| normalized.contains(label.as_str()))
        })
        .copied()
}

const ROLE_CUES: &[&str] = &["you are", "act as", "pretend", "role play", "roleplay"];
const INSTRUCTION_CUES: &[&str] = &["step", "how to", "guide", "tutorial", "instructions"];
const CREATIVE_CUES: &[&str] = &["story", "poem", "haiku", "fiction"];
const REASONING_CUES: &[&str] = &["solve", "calculate", "logic", "proof", "algorithm"];

/// Deterministic keyword classification over the original prompt text
///
/// Cue groups are checked in a fixed priority order: role cues first
/// (structural, most specific), then instruction, then creative, then
/// reasoning; `Factual` when nothing matches. "write" is a creative cue
/// only when "code" is absent.
#[must_use]
pub fn keyword_fallback(text: &str) -> CategoryLabel {
    let lower = text.to_lowercase();
    let has = |cues: &[&str]| cues.iter().any(|cue| lower.contains(cue));

    if has(ROLE_CUES) {
        CategoryLabel::RolePlay
    } else if has(INSTRUCTION_CUES) {
        CategoryLabel::Instruction
    } else if has(CREATIVE_CUES) || (lower.contains("write") && !lower.contains("code")) {
        CategoryLabel::Creative
    } else if has(REASONING_CUES) {
        CategoryLabel::Reasoning
    } else {
        CategoryLabel::Factual
    }
}
