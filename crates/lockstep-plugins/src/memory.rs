//! Bounded memory capture and recall for agents.
//!
//! Records every thought and action outcome as a [`Memory`], keeps the
//! most recent entries up to a fixed capacity, and prepends a recall
//! block to the agent's think input so earlier ticks inform later ones.

use std::collections::VecDeque;

use lockstep_core::plugin::{AgentPlugin, Plugin, PluginError};
use lockstep_types::{Action, Memory, PluginKind, Thought};
use tracing::debug;

const DEFAULT_CAPACITY: usize = 32;

/// Agent plugin that retains a sliding window of memories.
#[derive(Debug)]
pub struct MemoryPlugin {
    agent_id: String,
    capacity: usize,
    memories: VecDeque<Memory>,
    /// How many memories to recall into each think input.
    recall: usize,
}

impl MemoryPlugin {
    /// Create a plugin retaining up to `capacity` memories.
    pub fn new(capacity: usize) -> Self {
        Self {
            agent_id: String::new(),
            capacity: capacity.max(1),
            memories: VecDeque::new(),
            recall: 5,
        }
    }

    /// Change how many memories are recalled into each think input.
    #[must_use]
    pub fn with_recall(mut self, recall: usize) -> Self {
        self.recall = recall;
        self
    }

    /// The `count` most recent memories, newest last.
    pub fn recent(&self, count: usize) -> Vec<Memory> {
        let skip = self.memories.len().saturating_sub(count);
        self.memories.iter().skip(skip).cloned().collect()
    }

    /// Number of retained memories.
    pub fn len(&self) -> usize {
        self.memories.len()
    }

    /// Whether no memories are retained.
    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }

    fn record(&mut self, memory: Memory) {
        if self.memories.len() == self.capacity {
            self.memories.pop_front();
        }
        self.memories.push_back(memory);
    }
}

impl Default for MemoryPlugin {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Plugin for MemoryPlugin {
    fn kind(&self) -> PluginKind {
        PluginKind::Memory
    }

    fn name(&self) -> &str {
        "memory"
    }

    fn description(&self) -> &str {
        "retains recent thoughts and outcomes and recalls them into think inputs"
    }
}

impl AgentPlugin for MemoryPlugin {
    fn on_load(&mut self, agent_id: &str) -> Result<(), PluginError> {
        self.agent_id = agent_id.to_owned();
        debug!(agent_id, capacity = self.capacity, "memory plugin loaded");
        Ok(())
    }

    fn pre_think(&mut self, input: String) -> Result<String, PluginError> {
        if self.memories.is_empty() || self.recall == 0 {
            return Ok(input);
        }
        let mut block = String::from("Recent memories:\n");
        for memory in self.recent(self.recall) {
            block.push_str("- ");
            block.push_str(&memory.content);
            block.push('\n');
        }
        block.push('\n');
        block.push_str(&input);
        Ok(block)
    }

    fn post_think(&mut self, thought: &Thought) -> Result<(), PluginError> {
        self.record(
            Memory::new(format!("I thought: {}", thought.content))
                .with_metadata("source", serde_json::json!("thought")),
        );
        Ok(())
    }

    fn post_action(&mut self, action: &Action) -> Result<(), PluginError> {
        self.record(
            Memory::new(format!("I did {} ({})", action.kind, action.intent))
                .with_metadata("source", serde_json::json!("action"))
                .with_metadata("kind", serde_json::json!(action.kind)),
        );
        Ok(())
    }
}
