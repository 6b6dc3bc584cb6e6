//! LLM reasoning-provider boundary for the Lockstep simulation.
//!
//! Agents delegate their reasoning to a chat-completion provider behind
//! this crate's [`LlmProvider`]. The orchestrator core never talks to a
//! provider directly; agents do, through the narrow request/response
//! types defined here.
//!
//! # Modules
//!
//! - [`types`] -- Chat messages, requests, responses, token usage
//! - [`provider`] -- Enum-dispatched provider backends
//! - [`config`] -- Typed provider configuration and defaults
//! - [`error`] -- Provider error type

pub mod config;
pub mod error;
pub mod provider;
pub mod types;

pub use config::LlmConfig;
pub use error::LlmError;
pub use provider::{LlmProvider, OpenRouterProvider, StubProvider};
pub use types::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
