//! The world collaborator contract and an in-memory reference world.
//!
//! The world is the single authority over shared simulation state. The
//! orchestrator routes every agent action through it and never mutates
//! state itself. [`SimpleWorld`] keeps its state in one in-memory map
//! and accepts any non-empty action kind; richer environments implement
//! [`World`] directly.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError, RwLock};

use lockstep_types::Action;
use tracing::debug;

use crate::plugin::{PluginError, PluginSet, WorldPlugin};

/// Errors that can occur while the world resolves actions or updates.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The submitted action is not valid in this world.
    #[error("action kind {kind:?} is not valid in this world")]
    InvalidAction {
        /// The rejected kind tag.
        kind: String,
    },

    /// A world plugin hook failed.
    #[error("world plugin pipeline failed")]
    Plugin {
        /// The underlying pipeline error.
        #[from]
        source: PluginError,
    },
}

/// The shared environment agents act within.
///
/// Implementations must be shareable across tasks; the orchestrator
/// holds the world behind `Arc<dyn World>` and resolves actions from
/// concurrently running agent tasks.
pub trait World: Send + Sync {
    /// Snapshot of the current world state.
    fn state(&self) -> BTreeMap<String, serde_json::Value>;

    /// Replace the world state wholesale.
    ///
    /// # Errors
    ///
    /// Implementations may reject states that violate their invariants.
    fn set_state(&self, state: BTreeMap<String, serde_json::Value>) -> Result<(), WorldError>;

    /// Whether the given action could be applied right now.
    fn is_valid_action(&self, action: &Action) -> bool;

    /// Resolve an action against the world and return its outcome text.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidAction`] for actions the world does
    /// not accept.
    fn apply_action(&self, action: &Action) -> Result<String, WorldError>;
}

/// An in-memory world backed by a single key/value state map.
///
/// Accepts any action with a non-empty kind, records the last action and
/// a running count into its state, and reports a uniform `"ok"` outcome.
/// Useful as a default environment and in tests.
#[derive(Default)]
pub struct SimpleWorld {
    state: RwLock<BTreeMap<String, serde_json::Value>>,
    plugins: Mutex<PluginSet<dyn WorldPlugin>>,
}

impl SimpleWorld {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a plugin to this world's hook pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Duplicate`] for a kind that is already
    /// registered, or the plugin's own `on_load` failure.
    pub fn register_plugin(&self, mut plugin: Box<dyn WorldPlugin>) -> Result<(), PluginError> {
        let mut plugins = self.lock_plugins();
        if plugins.contains(plugin.kind()) {
            return Err(PluginError::Duplicate {
                kind: plugin.kind(),
            });
        }
        plugin.on_load()?;
        plugins.register(plugin)
    }

    /// Run one world update pass: pre-update hooks, then post-update
    /// hooks. The base world has no intrinsic dynamics of its own.
    ///
    /// # Errors
    ///
    /// Propagates the first failing hook.
    pub fn update(&self) -> Result<(), WorldError> {
        let mut plugins = self.lock_plugins();
        plugins.run_pre_update()?;
        plugins.run_post_update()?;
        Ok(())
    }

    /// Tell world plugins an agent joined.
    ///
    /// # Errors
    ///
    /// Propagates the first failing hook.
    pub fn notify_agent_added(&self, agent_id: &str) -> Result<(), WorldError> {
        self.lock_plugins().notify_agent_added(agent_id)?;
        Ok(())
    }

    /// Tell world plugins an agent left.
    ///
    /// # Errors
    ///
    /// Propagates the first failing hook.
    pub fn notify_agent_removed(&self, agent_id: &str) -> Result<(), WorldError> {
        self.lock_plugins().notify_agent_removed(agent_id)?;
        Ok(())
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, serde_json::Value>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, serde_json::Value>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_plugins(&self) -> std::sync::MutexGuard<'_, PluginSet<dyn WorldPlugin>> {
        self.plugins.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl core::fmt::Debug for SimpleWorld {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimpleWorld")
            .field("state_keys", &self.read_state().len())
            .finish()
    }
}

impl World for SimpleWorld {
    fn state(&self) -> BTreeMap<String, serde_json::Value> {
        self.read_state().clone()
    }

    fn set_state(&self, state: BTreeMap<String, serde_json::Value>) -> Result<(), WorldError> {
        *self.write_state() = state;
        Ok(())
    }

    fn is_valid_action(&self, action: &Action) -> bool {
        !action.kind.trim().is_empty()
    }

    fn apply_action(&self, action: &Action) -> Result<String, WorldError> {
        if !self.is_valid_action(action) {
            return Err(WorldError::InvalidAction {
                kind: action.kind.clone(),
            });
        }

        let mut state = self.write_state();
        let applied = state
            .get("actions_applied")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0)
            .saturating_add(1);
        state.insert(String::from("actions_applied"), applied.into());
        state.insert(
            String::from("last_action"),
            serde_json::to_value(action).unwrap_or(serde_json::Value::Null),
        );
        drop(state);

        debug!(
            initiator = action.initiator,
            kind = action.kind,
            "action applied"
        );
        Ok(String::from("ok"))
    }
}
