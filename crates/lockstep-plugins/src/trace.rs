//! Structured log lines at every hook point.
//!
//! Pure observers: neither plugin mutates anything or ever fails, they
//! just narrate the lifecycle at debug level under the owner's id.

use lockstep_core::plugin::{AgentPlugin, Plugin, PluginError, WorldPlugin};
use lockstep_types::{Action, PluginKind, Thought};
use tracing::debug;

/// Agent plugin that logs each hook invocation.
#[derive(Debug, Default)]
pub struct TraceAgentPlugin {
    agent_id: String,
}

impl TraceAgentPlugin {
    /// Create a trace plugin.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Plugin for TraceAgentPlugin {
    fn kind(&self) -> PluginKind {
        PluginKind::Trace
    }

    fn name(&self) -> &str {
        "trace"
    }

    fn description(&self) -> &str {
        "logs every agent hook invocation at debug level"
    }
}

impl AgentPlugin for TraceAgentPlugin {
    fn on_load(&mut self, agent_id: &str) -> Result<(), PluginError> {
        self.agent_id = agent_id.to_owned();
        debug!(agent_id, "trace plugin loaded");
        Ok(())
    }

    fn on_unload(&mut self) {
        debug!(agent_id = self.agent_id, "trace plugin unloaded");
    }

    fn pre_think(&mut self, input: String) -> Result<String, PluginError> {
        debug!(agent_id = self.agent_id, input_len = input.len(), "pre_think");
        Ok(input)
    }

    fn post_think(&mut self, thought: &Thought) -> Result<(), PluginError> {
        debug!(
            agent_id = self.agent_id,
            mode = ?thought.mode,
            content_len = thought.content.len(),
            "post_think"
        );
        Ok(())
    }

    fn pre_action(&mut self, action: &Action) -> Result<(), PluginError> {
        debug!(
            agent_id = self.agent_id,
            kind = action.kind,
            target = action.target.as_deref(),
            "pre_action"
        );
        Ok(())
    }

    fn post_action(&mut self, action: &Action) -> Result<(), PluginError> {
        debug!(agent_id = self.agent_id, kind = action.kind, "post_action");
        Ok(())
    }
}

/// World plugin that logs each hook invocation.
#[derive(Debug, Default)]
pub struct TraceWorldPlugin;

impl TraceWorldPlugin {
    /// Create a trace plugin.
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for TraceWorldPlugin {
    fn kind(&self) -> PluginKind {
        PluginKind::Trace
    }

    fn name(&self) -> &str {
        "trace"
    }

    fn description(&self) -> &str {
        "logs every world hook invocation at debug level"
    }
}

impl WorldPlugin for TraceWorldPlugin {
    fn on_load(&mut self) -> Result<(), PluginError> {
        debug!("world trace plugin loaded");
        Ok(())
    }

    fn pre_update(&mut self) -> Result<(), PluginError> {
        debug!("world pre_update");
        Ok(())
    }

    fn post_update(&mut self) -> Result<(), PluginError> {
        debug!("world post_update");
        Ok(())
    }

    fn on_agent_added(&mut self, agent_id: &str) -> Result<(), PluginError> {
        debug!(agent_id, "agent added to world");
        Ok(())
    }

    fn on_agent_removed(&mut self, agent_id: &str) -> Result<(), PluginError> {
        debug!(agent_id, "agent removed from world");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn agent_hooks_pass_through() {
        let mut plugin = TraceAgentPlugin::new();
        plugin.on_load("agent-1").unwrap();

        let input = plugin.pre_think(String::from("context")).unwrap();
        assert_eq!(input, "context");

        let action = Action::noop("agent-1");
        plugin.pre_action(&action).unwrap();
        plugin.post_action(&action).unwrap();
        plugin.post_think(&Thought::fast("fine")).unwrap();
    }

    #[test]
    fn world_hooks_never_fail() {
        let mut plugin = TraceWorldPlugin::new();
        plugin.on_load().unwrap();
        plugin.pre_update().unwrap();
        plugin.post_update().unwrap();
        plugin.on_agent_added("agent-1").unwrap();
        plugin.on_agent_removed("agent-1").unwrap();
    }
}
