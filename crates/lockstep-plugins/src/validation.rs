//! Action vetoing against a deny list.
//!
//! Sits in the pre-action hook and fails any action whose kind is on
//! the configured deny list, which surfaces to the orchestrator as that
//! agent's fault for the step.

use std::collections::BTreeSet;

use lockstep_core::plugin::{AgentPlugin, Plugin, PluginError};
use lockstep_types::{Action, PluginKind};
use tracing::warn;

/// Agent plugin that vetoes actions by kind.
#[derive(Debug, Default)]
pub struct ActionGuardPlugin {
    denied: BTreeSet<String>,
}

impl ActionGuardPlugin {
    /// Create a guard denying the given action kinds.
    pub fn new(denied: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            denied: denied.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the given kind would be vetoed.
    pub fn denies(&self, kind: &str) -> bool {
        self.denied.contains(kind)
    }
}

impl Plugin for ActionGuardPlugin {
    fn kind(&self) -> PluginKind {
        PluginKind::Validation
    }

    fn name(&self) -> &str {
        "action-guard"
    }

    fn description(&self) -> &str {
        "vetoes actions whose kind is on a deny list"
    }
}

impl AgentPlugin for ActionGuardPlugin {
    fn pre_action(&mut self, action: &Action) -> Result<(), PluginError> {
        if self.denies(&action.kind) {
            warn!(
                initiator = action.initiator,
                kind = action.kind,
                "action vetoed"
            );
            return Err(PluginError::hook(
                "action-guard",
                "pre_action",
                format!("action kind {:?} is denied", action.kind),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn denied_kind_is_vetoed() {
        let mut guard = ActionGuardPlugin::new(["attack", "steal"]);
        let result = guard.pre_action(&Action::new("a", "attack", "strike first"));
        assert!(matches!(result, Err(PluginError::Hook { hook, .. }) if hook == "pre_action"));
    }

    #[test]
    fn other_kinds_pass() {
        let mut guard = ActionGuardPlugin::new(["attack"]);
        guard.pre_action(&Action::new("a", "speak", "say hi")).unwrap();
        guard.pre_action(&Action::noop("a")).unwrap();
    }

    #[test]
    fn empty_deny_list_passes_everything() {
        let mut guard = ActionGuardPlugin::default();
        guard.pre_action(&Action::new("a", "attack", "")).unwrap();
    }
}
