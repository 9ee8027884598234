//! Per-session conversation state. Each turn consumes a context and yields
//! the next one; nothing is mutated in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::intent::Intent;

/// One question and the answer that was given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub user: String,
    pub assistant: String,
    pub timestamp: DateTime<Utc>,
}

impl Exchange {
    pub fn now(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    last_intent: Option<Intent>,
    last_entity: Option<String>,
    history: Vec<Exchange>,
}

impl ConversationContext {
    pub fn last_intent(&self) -> Option<Intent> {
        self.last_intent
    }

    pub fn last_entity(&self) -> Option<&str> {
        self.last_entity.as_deref()
    }

    pub fn history(&self) -> &[Exchange] {
        &self.history
    }

    /// The most recent `n` exchanges, oldest first.
    pub fn recent(&self, n: usize) -> &[Exchange] {
        &self.history[self.history.len().saturating_sub(n)..]
    }

    /// Next context after a turn. The entity is only replaced when the turn
    /// named one; history keeps at most `max_history` exchanges.
    pub fn record(
        self,
        intent: Intent,
        entity: Option<String>,
        exchange: Exchange,
        max_history: usize,
    ) -> Self {
        let mut history = self.history;
        history.push(exchange);
        if history.len() > max_history {
            history.drain(..history.len() - max_history);
        }
        Self {
            last_intent: Some(intent),
            last_entity: entity.or(self.last_entity),
            history,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_bounded_and_ordered() {
        let mut ctx = ConversationContext::default();
        for i in 0..5 {
            ctx = ctx.record(Intent::Npa, None, Exchange::now(format!("q{i}"), "a"), 3);
        }
        let users: Vec<&str> = ctx.history().iter().map(|e| e.user.as_str()).collect();
        assert_eq!(users, vec!["q2", "q3", "q4"]);
        assert_eq!(ctx.recent(2)[0].user, "q3");
        assert_eq!(ctx.recent(10).len(), 3);
    }

    #[test]
    fn entity_sticks_until_replaced() {
        let ctx = ConversationContext::default()
            .record(Intent::EntityReference, Some("B1".into()), Exchange::now("a", "b"), 10)
            .record(Intent::Casa, None, Exchange::now("c", "d"), 10);
        assert_eq!(ctx.last_entity(), Some("B1"));
        assert_eq!(ctx.last_intent(), Some(Intent::Casa));
        let ctx = ctx.record(Intent::EntityReference, Some("B2".into()), Exchange::now("e", "f"), 10);
        assert_eq!(ctx.last_entity(), Some("B2"));
    }

    #[test]
    fn zero_history_keeps_nothing() {
        let ctx = ConversationContext::default().record(Intent::Help, None, Exchange::now("a", "b"), 0);
        assert!(ctx.history().is_empty());
        assert_eq!(ctx.last_intent(), Some(Intent::Help));
    }
}
