//! Stock plugins for the Lockstep hook pipeline.
//!
//! - [`memory`] -- Bounded memory capture and recall for agents.
//! - [`trace`] -- Structured log lines at every hook point.
//! - [`validation`] -- Action vetoing against a deny list.

pub mod memory;
pub mod trace;
pub mod validation;

pub use memory::MemoryPlugin;
pub use trace::{TraceAgentPlugin, TraceWorldPlugin};
pub use validation::ActionGuardPlugin;
