//! Plugin hook pipeline: ordered pre/post hooks around an agent's
//! think/act cycle and a world's update cycle.
//!
//! Cross-cutting behavior (logging, memory capture, validation) observes
//! the lifecycle through these hooks without the orchestrator knowing
//! about specific plugin implementations. The pipeline is a simple
//! ordered pass over the owner's registered plugins: no tree, no
//! reordering. A hook error stops the remaining plugins for that hook
//! call and propagates to the caller.
//!
//! Duplicate detection compares [`PluginKind`] tags by value; an owner
//! holds at most one plugin per kind.

use lockstep_types::{Action, PluginKind, Thought};

/// Errors that can occur in the plugin pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// A plugin with the same kind tag is already registered.
    #[error("plugin kind {kind} already registered")]
    Duplicate {
        /// The conflicting kind tag.
        kind: PluginKind,
    },

    /// A plugin hook failed.
    #[error("plugin {plugin} {hook} hook failed: {message}")]
    Hook {
        /// Name of the failing plugin.
        plugin: String,
        /// The hook point that failed.
        hook: &'static str,
        /// Description of the failure.
        message: String,
    },
}

impl PluginError {
    /// Build a hook failure for the given plugin and hook point.
    pub fn hook(
        plugin: impl Into<String>,
        hook: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::Hook {
            plugin: plugin.into(),
            hook,
            message: message.into(),
        }
    }
}

/// Identity common to agent and world plugins.
pub trait Plugin {
    /// Stable kind tag, compared by value for duplicate detection.
    fn kind(&self) -> PluginKind;

    /// Human-readable plugin name.
    fn name(&self) -> &str;

    /// One-line description of what the plugin does.
    fn description(&self) -> &str {
        ""
    }
}

/// Hooks around an agent's think/act cycle.
///
/// All hooks default to no-ops so implementations only override the
/// points they care about.
pub trait AgentPlugin: Plugin + Send + Sync {
    /// Called once when the plugin is registered with an agent.
    fn on_load(&mut self, _agent_id: &str) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called when the plugin is removed or its agent shuts down.
    fn on_unload(&mut self) {}

    /// Observe and possibly transform the agent's think input.
    fn pre_think(&mut self, input: String) -> Result<String, PluginError> {
        Ok(input)
    }

    /// Observe the thought the think step produced.
    fn post_think(&mut self, _thought: &Thought) -> Result<(), PluginError> {
        Ok(())
    }

    /// Inspect (and possibly veto, by erroring) the decided action
    /// before it reaches the world.
    fn pre_action(&mut self, _action: &Action) -> Result<(), PluginError> {
        Ok(())
    }

    /// Observe the action after its outcome was delivered to the agent.
    fn post_action(&mut self, _action: &Action) -> Result<(), PluginError> {
        Ok(())
    }
}

/// Hooks around a world's update cycle and agent membership.
pub trait WorldPlugin: Plugin + Send + Sync {
    /// Called once when the plugin is registered with a world.
    fn on_load(&mut self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called when the plugin is removed or its world shuts down.
    fn on_unload(&mut self) {}

    /// Called before the world applies its per-tick update.
    fn pre_update(&mut self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called after the world applied its per-tick update.
    fn post_update(&mut self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called when an agent is added to the world.
    fn on_agent_added(&mut self, _agent_id: &str) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called when an agent is removed from the world.
    fn on_agent_removed(&mut self, _agent_id: &str) -> Result<(), PluginError> {
        Ok(())
    }
}

/// An ordered plugin registry with duplicate-kind rejection.
///
/// Iteration order is registration order, which is the hook invocation
/// order for every pipeline pass.
pub struct PluginSet<P: Plugin + ?Sized> {
    entries: Vec<Box<P>>,
}

impl<P: Plugin + ?Sized> PluginSet<P> {
    /// Create an empty set.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a plugin at the end of the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Duplicate`] if a plugin with the same kind
    /// tag is already registered; the set is left unchanged.
    pub fn register(&mut self, plugin: Box<P>) -> Result<(), PluginError> {
        let kind = plugin.kind();
        if self.contains(kind) {
            return Err(PluginError::Duplicate { kind });
        }
        self.entries.push(plugin);
        Ok(())
    }

    /// Whether a plugin with the given kind is registered.
    pub fn contains(&self, kind: PluginKind) -> bool {
        self.entries.iter().any(|p| p.kind() == kind)
    }

    /// Kind tags in registration order.
    pub fn kinds(&self) -> Vec<PluginKind> {
        self.entries.iter().map(|p| p.kind()).collect()
    }

    /// Number of registered plugins.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate plugins in registration order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<P>> {
        self.entries.iter_mut()
    }
}

impl<P: Plugin + ?Sized> Default for PluginSet<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Plugin + ?Sized> core::fmt::Debug for PluginSet<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PluginSet")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl PluginSet<dyn AgentPlugin> {
    /// Run the pre-think pipeline, threading the input through each
    /// plugin in order. Stops at the first hook error.
    pub fn run_pre_think(&mut self, input: String) -> Result<String, PluginError> {
        let mut current = input;
        for plugin in &mut self.entries {
            current = plugin.pre_think(current)?;
        }
        Ok(current)
    }

    /// Run the post-think pipeline. Stops at the first hook error.
    pub fn run_post_think(&mut self, thought: &Thought) -> Result<(), PluginError> {
        for plugin in &mut self.entries {
            plugin.post_think(thought)?;
        }
        Ok(())
    }

    /// Run the pre-action pipeline. A hook error vetoes the action.
    pub fn run_pre_action(&mut self, action: &Action) -> Result<(), PluginError> {
        for plugin in &mut self.entries {
            plugin.pre_action(action)?;
        }
        Ok(())
    }

    /// Run the post-action pipeline. Stops at the first hook error.
    pub fn run_post_action(&mut self, action: &Action) -> Result<(), PluginError> {
        for plugin in &mut self.entries {
            plugin.post_action(action)?;
        }
        Ok(())
    }

    /// Unload every plugin, in registration order.
    pub fn unload_all(&mut self) {
        for plugin in &mut self.entries {
            plugin.on_unload();
        }
    }
}

impl PluginSet<dyn WorldPlugin> {
    /// Run the pre-update pipeline. Stops at the first hook error.
    pub fn run_pre_update(&mut self) -> Result<(), PluginError> {
        for plugin in &mut self.entries {
            plugin.pre_update()?;
        }
        Ok(())
    }

    /// Run the post-update pipeline. Stops at the first hook error.
    pub fn run_post_update(&mut self) -> Result<(), PluginError> {
        for plugin in &mut self.entries {
            plugin.post_update()?;
        }
        Ok(())
    }

    /// Notify plugins that an agent joined the world.
    pub fn notify_agent_added(&mut self, agent_id: &str) -> Result<(), PluginError> {
        for plugin in &mut self.entries {
            plugin.on_agent_added(agent_id)?;
        }
        Ok(())
    }

    /// Notify plugins that an agent left the world.
    pub fn notify_agent_removed(&mut self, agent_id: &str) -> Result<(), PluginError> {
        for plugin in &mut self.entries {
            plugin.on_agent_removed(agent_id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct Recording {
        kind: PluginKind,
        label: &'static str,
        log: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
        fail_pre_action: bool,
    }

    impl Plugin for Recording {
        fn kind(&self) -> PluginKind {
            self.kind
        }
        fn name(&self) -> &str {
            self.label
        }
    }

    impl AgentPlugin for Recording {
        fn pre_think(&mut self, input: String) -> Result<String, PluginError> {
            self.log.lock().unwrap().push(format!("{}:pre_think", self.label));
            Ok(format!("{input}+{}", self.label))
        }

        fn pre_action(&mut self, _action: &Action) -> Result<(), PluginError> {
            self.log.lock().unwrap().push(format!("{}:pre_action", self.label));
            if self.fail_pre_action {
                return Err(PluginError::hook(self.label, "pre_action", "vetoed"));
            }
            Ok(())
        }
    }

    fn recording(
        kind: PluginKind,
        label: &'static str,
        log: &std::sync::Arc<std::sync::Mutex<Vec<String>>>,
        fail_pre_action: bool,
    ) -> Box<dyn AgentPlugin> {
        Box::new(Recording {
            kind,
            label,
            log: std::sync::Arc::clone(log),
            fail_pre_action,
        })
    }

    #[test]
    fn duplicate_kind_is_rejected_and_first_survives() {
        let log = std::sync::Arc::default();
        let mut set: PluginSet<dyn AgentPlugin> = PluginSet::new();

        set.register(recording(PluginKind::Memory, "a", &log, false))
            .unwrap();
        let result = set.register(recording(PluginKind::Memory, "b", &log, false));

        assert!(matches!(
            result,
            Err(PluginError::Duplicate {
                kind: PluginKind::Memory
            })
        ));
        assert_eq!(set.len(), 1);
        assert_eq!(set.kinds(), vec![PluginKind::Memory]);
    }

    #[test]
    fn distinct_kinds_coexist() {
        let log = std::sync::Arc::default();
        let mut set: PluginSet<dyn AgentPlugin> = PluginSet::new();
        set.register(recording(PluginKind::Memory, "a", &log, false))
            .unwrap();
        set.register(recording(PluginKind::Custom("audit"), "b", &log, false))
            .unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn pre_think_threads_input_in_registration_order() {
        let log = std::sync::Arc::default();
        let mut set: PluginSet<dyn AgentPlugin> = PluginSet::new();
        set.register(recording(PluginKind::Memory, "a", &log, false))
            .unwrap();
        set.register(recording(PluginKind::Trace, "b", &log, false))
            .unwrap();

        let output = set.run_pre_think(String::from("x")).unwrap();
        assert_eq!(output, "x+a+b");
    }

    #[test]
    fn hook_error_stops_subsequent_plugins() {
        let log: std::sync::Arc<std::sync::Mutex<Vec<String>>> = std::sync::Arc::default();
        let mut set: PluginSet<dyn AgentPlugin> = PluginSet::new();
        set.register(recording(PluginKind::Validation, "guard", &log, true))
            .unwrap();
        set.register(recording(PluginKind::Trace, "after", &log, false))
            .unwrap();

        let action = Action::noop("agent-1");
        let result = set.run_pre_action(&action);

        assert!(matches!(result, Err(PluginError::Hook { hook, .. }) if hook == "pre_action"));
        let calls = log.lock().unwrap().clone();
        assert_eq!(calls, vec!["guard:pre_action"]);
    }
}
