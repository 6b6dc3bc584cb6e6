//! Stable kind tags for hook-pipeline plugins.
//!
//! Duplicate-plugin detection compares these tags by value. Each plugin
//! implementation declares exactly one kind; an owner (agent or world)
//! may hold at most one plugin per kind. Out-of-tree plugins use
//! [`PluginKind::Custom`] with a unique static name.

use core::fmt;

/// The kind of a plugin, compared by value for duplicate detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    /// Captures and recalls agent memories.
    Memory,
    /// Emits structured logs from lifecycle hooks.
    Trace,
    /// Validates or vetoes actions before they reach the world.
    Validation,
    /// An out-of-tree plugin identified by a unique static name.
    Custom(&'static str),
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::Trace => f.write_str("trace"),
            Self::Validation => f.write_str("validation"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_compare_by_value() {
        assert_eq!(PluginKind::Memory, PluginKind::Memory);
        assert_ne!(PluginKind::Memory, PluginKind::Trace);
        assert_eq!(PluginKind::Custom("metrics"), PluginKind::Custom("metrics"));
        assert_ne!(PluginKind::Custom("metrics"), PluginKind::Custom("audit"));
    }

    #[test]
    fn display_names() {
        assert_eq!(PluginKind::Validation.to_string(), "validation");
        assert_eq!(PluginKind::Custom("audit").to_string(), "audit");
    }
}
