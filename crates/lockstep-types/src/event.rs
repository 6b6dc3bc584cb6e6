//! Observability events published on the simulation's event bus.
//!
//! Events are immutable value objects: the bus delivers them to
//! subscribers and does not retain them afterwards. Every event names a
//! source (agent id, world id, or `"simulation"` for the orchestrator
//! itself), an optional target, and an arbitrary key-value payload.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::EventId;

/// The kind of an [`Event`], used as the subscription key on the bus.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// An agent was registered with the simulation.
    AgentJoined,
    /// An agent was removed from the simulation.
    AgentLeft,
    /// An agent completed its action for a tick.
    AgentAction,
    /// The world's state changed outside of an agent action.
    WorldStateChange,
    /// Two agents interacted directly.
    AgentInteraction,
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::AgentJoined => "agent_joined",
            Self::AgentLeft => "agent_left",
            Self::AgentAction => "agent_action",
            Self::WorldStateChange => "world_state_change",
            Self::AgentInteraction => "agent_interaction",
        };
        f.write_str(name)
    }
}

/// A single immutable event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier for this event.
    pub id: EventId,
    /// The event kind.
    pub kind: EventKind,
    /// When the event occurred. The orchestrator stamps events with
    /// simulated time, not wall-clock time.
    pub timestamp: DateTime<Utc>,
    /// Identifier of the source (agent id, world id, or `"simulation"`).
    pub source: String,
    /// Identifier of the target, if the event is directed at one.
    pub target: Option<String>,
    /// Arbitrary event payload.
    pub payload: BTreeMap<String, serde_json::Value>,
}

impl Event {
    /// Create an event of the given kind from the given source,
    /// stamped with the current wall-clock time.
    pub fn new(kind: EventKind, source: impl Into<String>) -> Self {
        Self::at(Utc::now(), kind, source)
    }

    /// Create an event with an explicit timestamp (simulated time).
    pub fn at(timestamp: DateTime<Utc>, kind: EventKind, source: impl Into<String>) -> Self {
        Self {
            id: EventId::new(),
            kind,
            timestamp,
            source: source.into(),
            target: None,
            payload: BTreeMap::new(),
        }
    }

    /// Set the target identifier.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Insert a payload entry.
    #[must_use]
    pub fn with_payload(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }
}
