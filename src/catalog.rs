//! Prompt catalog data model
//!
//! A benchmark batch is an ordered list of [`PromptItem`]s, each carrying a
//! ground-truth [`CategoryLabel`] from a fixed closed set. The label set is
//! shared by the classifier, the routing table, and the report layer; no
//! other label may ever be produced or consumed.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of task categories a prompt can belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryLabel {
    /// Fact lookup and short factual answers
    Factual,
    /// Multi-step reasoning, math, logic
    Reasoning,
    /// Open-ended creative writing
    Creative,
    /// Step-by-step instructions and how-to guides
    Instruction,
    /// Persona adoption and role play
    RolePlay,
}

impl CategoryLabel {
    /// All labels, in classifier-prompt enumeration order
    pub const ALL: [CategoryLabel; 5] = [
        Self::Factual,
        Self::Reasoning,
        Self::Creative,
        Self::Instruction,
        Self::RolePlay,
    ];

    /// Canonical lowercase name, used for classifier matching and reports
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Factual => "factual",
            Self::Reasoning => "reasoning",
            Self::Creative => "creative",
            Self::Instruction => "instruction",
            Self::RolePlay => "roleplay",
        }
    }

    /// One-line description used in the zero-shot classification prompt
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Factual => "asks for a fact or a short factual answer",
            Self::Reasoning => "requires step-by-step reasoning, math, or logic",
            Self::Creative => "asks for creative writing such as a story or poem",
            Self::Instruction => "asks for instructions, a guide, or a tutorial",
            Self::RolePlay => "asks the model to adopt a persona or role",
        }
    }

    /// Parse from a canonical name
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "factual" => Some(Self::Factual),
            "reasoning" => Some(Self::Reasoning),
            "creative" => Some(Self::Creative),
            "instruction" => Some(Self::Instruction),
            "roleplay" | "role-play" | "role play" => Some(Self::RolePlay),
            _ => None,
        }
    }
}

impl fmt::Display for CategoryLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One prompt in a benchmark batch
///
/// Immutable during a run; `id` is unique within the batch and result
/// ordering follows batch ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptItem {
    /// Unique id within the batch
    pub id: u64,
    /// Ground-truth category
    pub category: CategoryLabel,
    /// Prompt text submitted to the engine
    pub prompt: String,
}

impl PromptItem {
    /// Create a new prompt item
    #[must_use]
    pub fn new(id: u64, category: CategoryLabel, prompt: &str) -> Self {
        Self {
            id,
            category,
            prompt: prompt.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_roundtrip_through_canonical_name() {
        for label in CategoryLabel::ALL {
            assert_eq!(CategoryLabel::parse(label.as_str()), Some(label));
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(
            CategoryLabel::parse("Reasoning"),
            Some(CategoryLabel::Reasoning)
        );
        assert_eq!(
            CategoryLabel::parse("ROLE-PLAY"),
            Some(CategoryLabel::RolePlay)
        );
        assert_eq!(CategoryLabel::parse("unknown"), None);
        assert_eq!(CategoryLabel::parse(""), None);
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&CategoryLabel::Instruction).unwrap();
        assert_eq!(json, "\"instruction\"");
        let back: CategoryLabel = serde_json::from_str("\"roleplay\"").unwrap();
        assert_eq!(back, CategoryLabel::RolePlay);
    }

    #[test]
    fn test_prompt_item_construction() {
        let item = PromptItem::new(7, CategoryLabel::Creative, "Write a haiku about rain.");
        assert_eq!(item.id, 7);
        assert_eq!(item.category, CategoryLabel::Creative);
        assert!(item.prompt.contains("haiku"));
    }

    #[test]
    fn test_all_labels_are_distinct() {
        for (i, a) in CategoryLabel::ALL.iter().enumerate() {
            for (j, b) in CategoryLabel::ALL.iter().enumerate() {
                assert_eq!(i == j, a == b);
            }
        }
    }
}
