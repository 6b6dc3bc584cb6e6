//! The action an agent submits to the world at the end of its decision
//! cycle.
//!
//! Actions are deliberately open-ended: the orchestrator never interprets
//! them, it only carries them from the agent to the world and into the
//! `agent_action` event payload. What an action kind means, and whether
//! it is valid, is entirely the world's business.

use serde::{Deserialize, Serialize};

/// Kind tag for the do-nothing action every agent can always take.
pub const NOOP_ACTION_KIND: &str = "noop";

/// An intent submitted by an agent for resolution by the world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Identifier of the agent initiating the action.
    pub initiator: String,
    /// Identifier of the target agent or entity, if directed.
    #[serde(default)]
    pub target: Option<String>,
    /// World-defined kind tag (e.g. `"move"`, `"speak"`, `"noop"`).
    pub kind: String,
    /// Free-form description of what the agent intends to do.
    #[serde(default)]
    pub intent: String,
}

impl Action {
    /// Create an action of the given kind with no target.
    pub fn new(
        initiator: impl Into<String>,
        kind: impl Into<String>,
        intent: impl Into<String>,
    ) -> Self {
        Self {
            initiator: initiator.into(),
            target: None,
            kind: kind.into(),
            intent: intent.into(),
        }
    }

    /// Create the do-nothing action for the given agent.
    pub fn noop(initiator: impl Into<String>) -> Self {
        Self::new(initiator, NOOP_ACTION_KIND, "do nothing this tick")
    }

    /// Set the target identifier.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Whether this is the do-nothing action.
    pub fn is_noop(&self) -> bool {
        self.kind == NOOP_ACTION_KIND
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn noop_is_noop() {
        let action = Action::noop("agent-1");
        assert!(action.is_noop());
        assert_eq!(action.initiator, "agent-1");
        assert!(action.target.is_none());
    }

    #[test]
    fn deserializes_with_missing_optional_fields() {
        let action: Action =
            serde_json::from_str(r#"{"initiator":"a","kind":"move"}"#).unwrap();
        assert_eq!(action.kind, "move");
        assert!(action.target.is_none());
        assert!(action.intent.is_empty());
    }

    #[test]
    fn targeted_action_carries_target() {
        let action = Action::new("a", "speak", "greet b").with_target("b");
        assert_eq!(action.target.as_deref(), Some("b"));
        assert!(!action.is_noop());
    }
}
