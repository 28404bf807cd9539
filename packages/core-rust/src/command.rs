//! Allow-list of store commands whose notifications are actionable.

use std::collections::HashSet;

/// Immutable set of supported command names, loaded once at startup.
///
/// Membership is a literal, case-sensitive comparison with no wildcard
/// support.
#[derive(Debug, Clone, Default)]
pub struct CommandFilter {
    commands: HashSet<String>,
}

impl CommandFilter {
    /// Builds a filter from command names. Names are trimmed and empty names
    /// are dropped.
    #[must_use]
    pub fn new<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let commands = commands
            .into_iter()
            .map(|c| c.as_ref().trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        Self { commands }
    }

    /// Parses a comma-separated command list such as `"set,hset,del"`.
    #[must_use]
    pub fn from_csv(list: &str) -> Self {
        Self::new(list.split(','))
    }

    #[must_use]
    pub fn is_supported(&self, command: &str) -> bool {
        self.commands.contains(command)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
