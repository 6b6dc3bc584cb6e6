//! Tick orchestration core for the Lockstep simulation.
//!
//! This crate owns the four tightly coupled pieces every other part of
//! the system depends on: the tick orchestrator, the simulated clock,
//! the event bus, and the plugin hook pipeline.
//!
//! # Modules
//!
//! - [`clock`] -- Simulated clock with speed dilation and pause accounting.
//! - [`bus`] -- In-process publish/subscribe event bus.
//! - [`plugin`] -- Agent/world plugin traits and the ordered hook pipeline.
//! - [`agent`] -- The [`Agent`] collaborator contract and the LLM-backed
//!   [`DefaultAgent`].
//! - [`world`] -- The [`World`] collaborator contract and the in-memory
//!   [`SimpleWorld`].
//! - [`simulation`] -- The [`Simulation`] orchestrator: registry, run
//!   loop, per-tick concurrent agent execution.
//! - [`config`] -- Configuration loading from YAML into typed structs.
//!
//! [`Agent`]: agent::Agent
//! [`DefaultAgent`]: agent::DefaultAgent
//! [`World`]: world::World
//! [`SimpleWorld`]: world::SimpleWorld
//! [`Simulation`]: simulation::Simulation

pub mod agent;
pub mod bus;
pub mod clock;
pub mod config;
pub mod plugin;
pub mod simulation;
pub mod world;
