//! Shared type definitions for the Lockstep simulation orchestrator.
//!
//! This crate is the single source of truth for the value types that flow
//! between the orchestrator, agents, worlds, plugins, and event bus
//! subscribers. It holds no behavior beyond construction and accessors.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrapper for event identifiers
//! - [`event`] -- Observability events and their kinds
//! - [`action`] -- The action an agent submits to the world each tick
//! - [`cognition`] -- Thoughts and memories produced by an agent's cycle
//! - [`plugin_kind`] -- Stable kind tags for hook-pipeline plugins

pub mod action;
pub mod cognition;
pub mod event;
pub mod ids;
pub mod plugin_kind;

// Re-export all public types at crate root for convenience.
pub use action::{Action, NOOP_ACTION_KIND};
pub use cognition::{Memory, Thought, ThoughtMode};
pub use event::{Event, EventKind};
pub use ids::EventId;
pub use plugin_kind::PluginKind;
