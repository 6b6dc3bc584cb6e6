//! The agent collaborator contract and the LLM-backed default agent.
//!
//! An [`Agent`] is anything the orchestrator can tick: it thinks, decides
//! an action, and receives the outcome the world produced for that
//! action. [`DefaultAgent`] is the standard implementation, driving a
//! persona prompt through an [`LlmProvider`] and running the agent
//! plugin pipeline around each step.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use lockstep_llm::{ChatMessage, ChatRequest, LlmError, LlmProvider};
use lockstep_types::{Action, PluginKind, Thought};
use tracing::debug;

use crate::plugin::{AgentPlugin, PluginError, PluginSet};

/// Errors that can occur while an agent thinks or acts.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// A required configuration field was empty.
    #[error("agent configuration is missing {field}")]
    MissingConfig {
        /// The absent field.
        field: &'static str,
    },

    /// The language model backend failed.
    #[error("language model call failed")]
    Llm {
        /// The underlying provider error.
        #[from]
        source: LlmError,
    },

    /// A plugin hook rejected or aborted the step.
    #[error("plugin pipeline failed")]
    Plugin {
        /// The underlying pipeline error.
        #[from]
        source: PluginError,
    },

    /// A failure internal to the agent implementation.
    #[error("agent internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

/// An autonomous participant the orchestrator ticks once per step.
///
/// Implementations must be shareable across tasks; the orchestrator
/// holds agents behind `Arc<dyn Agent>` and ticks them concurrently
/// within a step.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Stable unique identifier.
    fn id(&self) -> &str;

    /// Human-readable display name.
    fn name(&self) -> &str;

    /// Run one cognition pass over the agent's current context.
    async fn think(&self) -> Result<(), AgentError>;

    /// Decide the action to submit to the world this tick.
    async fn decide_action(&self) -> Result<Action, AgentError>;

    /// Receive the outcome the world produced for the agent's action.
    async fn receive_outcome(&self, action: &Action, outcome: &str) -> Result<(), AgentError>;

    /// Attach a plugin to this agent's hook pipeline.
    fn register_plugin(&self, plugin: Box<dyn AgentPlugin>) -> Result<(), PluginError>;

    /// Kind tags of the registered plugins, in pipeline order.
    fn plugin_kinds(&self) -> Vec<PluginKind>;
}

/// Static configuration for a [`DefaultAgent`].
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Stable unique identifier.
    pub id: String,
    /// Display name used in prompts and logs.
    pub name: String,
    /// Persona text injected as the system prompt.
    pub persona: String,
    /// Model identifier passed to the provider.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token cap, if any.
    pub max_tokens: Option<u32>,
}

/// The standard LLM-driven agent.
///
/// Each tick the agent builds a context block from its mutable state,
/// threads it through the pre-think pipeline, asks the provider for a
/// thought, and later for a structured action decision. State and the
/// plugin pipeline live behind std locks that are never held across an
/// await point.
pub struct DefaultAgent {
    config: AgentConfig,
    provider: Arc<LlmProvider>,
    plugins: Mutex<PluginSet<dyn AgentPlugin>>,
    state: RwLock<BTreeMap<String, serde_json::Value>>,
    last_thought: Mutex<Option<Thought>>,
}

impl DefaultAgent {
    /// Build an agent from its configuration and a shared provider.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::MissingConfig`] if the id, name, or model is
    /// empty.
    pub fn new(config: AgentConfig, provider: Arc<LlmProvider>) -> Result<Self, AgentError> {
        if config.id.trim().is_empty() {
            return Err(AgentError::MissingConfig { field: "id" });
        }
        if config.name.trim().is_empty() {
            return Err(AgentError::MissingConfig { field: "name" });
        }
        if config.model.trim().is_empty() {
            return Err(AgentError::MissingConfig { field: "model" });
        }
        Ok(Self {
            config,
            provider,
            plugins: Mutex::new(PluginSet::new()),
            state: RwLock::new(BTreeMap::new()),
            last_thought: Mutex::new(None),
        })
    }

    /// The thought produced by the most recent [`think`](Agent::think)
    /// call, if any.
    pub fn last_thought(&self) -> Option<Thought> {
        self.lock_thought().clone()
    }

    /// Read a value from the agent's mutable state.
    pub fn state_value(&self, key: &str) -> Option<serde_json::Value> {
        self.read_state().get(key).cloned()
    }

    /// Write a value into the agent's mutable state.
    pub fn set_state_value(&self, key: impl Into<String>, value: serde_json::Value) {
        self.write_state().insert(key.into(), value);
    }

    fn context_block(&self) -> String {
        let state = self.read_state();
        let mut lines = vec![format!("You are {}.", self.config.name)];
        if !state.is_empty() {
            lines.push(String::from("Current state:"));
            for (key, value) in state.iter() {
                lines.push(format!("- {key}: {value}"));
            }
        }
        lines.join("\n")
    }

    fn chat_request(&self, user_content: String) -> ChatRequest {
        ChatRequest {
            messages: vec![
                ChatMessage::system(self.config.persona.clone()),
                ChatMessage::user(user_content),
            ],
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, serde_json::Value>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, serde_json::Value>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_plugins(&self) -> std::sync::MutexGuard<'_, PluginSet<dyn AgentPlugin>> {
        self.plugins.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_thought(&self) -> std::sync::MutexGuard<'_, Option<Thought>> {
        self.last_thought
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl core::fmt::Debug for DefaultAgent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DefaultAgent")
            .field("id", &self.config.id)
            .field("name", &self.config.name)
            .field("model", &self.config.model)
            .finish()
    }
}

#[async_trait]
impl Agent for DefaultAgent {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    async fn think(&self) -> Result<(), AgentError> {
        // Run the pre-think pipeline before the await so the plugin lock
        // is released while the provider call is in flight.
        let input = {
            let raw = self.context_block();
            self.lock_plugins().run_pre_think(raw)?
        };

        let prompt = format!(
            "{input}\n\nReflect briefly on your situation and what you intend to do next."
        );
        let response = self.provider.chat_completion(&self.chat_request(prompt)).await?;

        let thought = Thought::fast(response.content);
        self.lock_plugins().run_post_think(&thought)?;
        debug!(agent_id = %self.config.id, mode = ?thought.mode, "thought produced");
        *self.lock_thought() = Some(thought);
        Ok(())
    }

    async fn decide_action(&self) -> Result<Action, AgentError> {
        let context = self.context_block();
        let thought_line = self
            .lock_thought()
            .as_ref()
            .map(|t| format!("Your latest thought: {}\n\n", t.content))
            .unwrap_or_default();
        let prompt = format!(
            "{context}\n\n{thought_line}Decide your next action. Respond with a JSON object: \
             {{\"kind\": \"<verb>\", \"target\": \"<agent id or null>\", \
             \"intent\": \"<what you are trying to achieve>\"}}"
        );

        let response = self.provider.chat_completion(&self.chat_request(prompt)).await?;
        let action = parse_action(&self.config.id, &response.content);

        self.lock_plugins().run_pre_action(&action)?;
        Ok(action)
    }

    async fn receive_outcome(&self, action: &Action, outcome: &str) -> Result<(), AgentError> {
        self.write_state().insert(
            String::from("last_outcome"),
            serde_json::Value::String(outcome.to_owned()),
        );
        self.lock_plugins().run_post_action(action)?;
        Ok(())
    }

    fn register_plugin(&self, mut plugin: Box<dyn AgentPlugin>) -> Result<(), PluginError> {
        let mut plugins = self.lock_plugins();
        if plugins.contains(plugin.kind()) {
            return Err(PluginError::Duplicate {
                kind: plugin.kind(),
            });
        }
        plugin.on_load(&self.config.id)?;
        plugins.register(plugin)
    }

    fn plugin_kinds(&self) -> Vec<PluginKind> {
        self.lock_plugins().kinds()
    }
}

/// Shape of the action decision the model is asked to emit.
#[derive(Debug, serde::Deserialize)]
struct ActionDecision {
    kind: String,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    intent: String,
}

/// Extract an action from a model reply.
///
/// Models wrap JSON in prose and code fences often enough that we scan
/// for the outermost braces rather than parsing the reply verbatim. An
/// unparseable reply degrades to a noop so one bad completion never
/// fails the whole tick.
fn parse_action(initiator: &str, content: &str) -> Action {
    let Some(start) = content.find('{') else {
        return Action::noop(initiator);
    };
    let Some(end) = content.rfind('}') else {
        return Action::noop(initiator);
    };
    if end < start {
        return Action::noop(initiator);
    }
    let candidate = content.get(start..=end).unwrap_or_default();

    match serde_json::from_str::<ActionDecision>(candidate) {
        Ok(decision) if !decision.kind.trim().is_empty() => {
            let mut action = Action::new(initiator, decision.kind, decision.intent);
            if let Some(target) = decision.target.filter(|t| !t.trim().is_empty()) {
                action = action.with_target(target);
            }
            action
        }
        _ => {
            debug!(agent_id = %initiator, "unparseable action reply, falling back to noop");
            Action::noop(initiator)
        }
    }
}
