//! Decides which target functions an event triggers.

use crate::command::CommandFilter;
use crate::event::InboundEvent;
use crate::route::RouteEntry;

/// Result of matching one event against one table snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Target of every matching entry, in table order, duplicates preserved.
    pub targets: Vec<String>,
    /// `true` iff the event's command passed the filter. May be `true` with
    /// no targets: checked, nothing to do.
    pub actionable: bool,
}

impl MatchOutcome {
    fn not_actionable() -> Self {
        Self::default()
    }
}

/// Applies the command filter, then pattern-matches every table entry.
#[derive(Debug, Clone)]
pub struct Matcher {
    filter: CommandFilter,
}

impl Matcher {
    #[must_use]
    pub fn new(filter: CommandFilter) -> Self {
        Self { filter }
    }

    #[must_use]
    pub fn filter(&self) -> &CommandFilter {
        &self.filter
    }

    /// Matches `event` against `entries`.
    ///
    /// Unsupported (or missing) command tokens short-circuit to an empty,
    /// non-actionable outcome regardless of the table contents.
    #[must_use]
    pub fn match_event(&self, event: &InboundEvent, entries: &[RouteEntry]) -> MatchOutcome {
        let supported = event
            .command()
            .is_some_and(|command| self.filter.is_supported(command));
        if !supported {
            return MatchOutcome::not_actionable();
        }

        let targets = entries
            .iter()
            .filter(|entry| entry.matches(&event.payload))
            .map(|entry| entry.target.clone())
            .collect();

        MatchOutcome {
            targets,
            actionable: true,
        }
    }
}
