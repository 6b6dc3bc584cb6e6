//! Thoughts and memories produced during an agent's decision cycle.
//!
//! A [`Thought`] is the output of one think step; plugins observe it in
//! their post-think hook. A [`Memory`] is a retained record of something
//! the agent experienced, kept by memory-capture plugins and recalled
//! into future think inputs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How much deliberation went into a thought.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ThoughtMode {
    /// A quick, reactive thought.
    #[default]
    Fast,
    /// A deliberate, multi-step thought.
    Slow,
}

/// The result of one think step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thought {
    /// The thought content.
    pub content: String,
    /// Fast or slow deliberation.
    pub mode: ThoughtMode,
    /// When the thought was produced.
    pub timestamp: DateTime<Utc>,
    /// Identifiers of memories that informed this thought.
    pub related_memories: Vec<String>,
}

impl Thought {
    /// Create a fast thought with the given content, stamped now.
    pub fn fast(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            mode: ThoughtMode::Fast,
            timestamp: Utc::now(),
            related_memories: Vec::new(),
        }
    }
}

/// A single retained memory entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    /// Unique identifier for this memory.
    pub id: String,
    /// The memory content.
    pub content: String,
    /// When the memory was recorded.
    pub timestamp: DateTime<Utc>,
    /// Arbitrary metadata (e.g. the action kind that produced it).
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Memory {
    /// Create a memory with the given content, stamped now.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            content: content.into(),
            timestamp: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    /// Insert a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
