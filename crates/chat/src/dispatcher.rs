//! One conversation turn: resolve the intent, try each backend once in
//! priority order, fall back to the local responder.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use vista_core::Config;
use vista_llm::{BackendHandle, BackendRegistry, Message};

use crate::context::{ConversationContext, Exchange};
use crate::intent::{Intent, IntentResolver, Resolution};
use crate::local::{LocalResponder, Reply};
use crate::prompt::{build_messages, dataset_brief};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Timeout,
    Error,
    TooShort,
}

/// What happened when one backend was tried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub backend: String,
    pub outcome: AttemptOutcome,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "backend")]
pub enum ReplySource {
    Backend(String),
    Local,
}

/// Result of one turn, including the context for the next one.
#[derive(Debug, Clone)]
pub struct Turn {
    pub reply: Reply,
    pub context: ConversationContext,
    pub resolution: Resolution,
    /// Intent actually answered (after follow-up substitution).
    pub intent: Intent,
    pub attempts: Vec<AttemptRecord>,
    pub source: ReplySource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSettings {
    pub timeout: Duration,
    pub min_response_chars: usize,
    /// Exchanges replayed into the backend prompt.
    pub history_turns: usize,
    /// Exchanges kept in the context.
    pub max_history: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl DispatchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: Duration::from_secs(config.llm.timeout_secs.max(1)),
            min_response_chars: config.llm.min_response_chars,
            history_turns: config.chat.history_turns,
            max_history: config.chat.max_history.max(config.chat.history_turns),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            min_response_chars: 10,
            history_turns: 3,
            max_history: 50,
            temperature: 0.2,
            max_tokens: 1024,
        }
    }
}

pub struct Dispatcher {
    resolver: IntentResolver,
    local: LocalResponder,
    registry: Arc<BackendRegistry>,
    settings: DispatchSettings,
    brief: String,
}

impl Dispatcher {
    pub fn new(local: LocalResponder, registry: Arc<BackendRegistry>, settings: DispatchSettings) -> Self {
        Self {
            resolver: IntentResolver::for_records(local.records()),
            brief: dataset_brief(&local),
            local,
            registry,
            settings,
        }
    }

    pub fn local(&self) -> &LocalResponder {
        &self.local
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    pub async fn respond(&self, utterance: &str, context: ConversationContext) -> Turn {
        let resolution = self.resolver.resolve(utterance, &context);
        let intent = match resolution.intent {
            Intent::FollowUp => context.last_intent().unwrap_or(Intent::Overview),
            other => other,
        };
        let entity = resolution.entity.clone();
        debug!(%intent, entity = ?entity, score = resolution.score, "resolved");

        let local = self.local.answer(intent, entity.as_deref());
        let focus = entity
            .as_deref()
            .and_then(|id| self.local.find(id))
            .map(|r| self.local.entity_card(r));
        let messages = build_messages(
            &self.brief,
            intent,
            focus.as_deref(),
            context.recent(self.settings.history_turns),
            utterance,
        );

        let handles = self.registry.handles().await;
        let (attempts, answer) = self.try_backends(handles, messages).await;
        let (reply, source) = fold_answer(answer, local);

        info!(
            %intent,
            source = ?source,
            attempts = attempts.len(),
            "turn answered"
        );

        let context = context.record(
            intent,
            entity,
            Exchange::now(utterance, reply.text.clone()),
            self.settings.max_history,
        );
        Turn {
            reply,
            context,
            resolution,
            intent,
            attempts,
            source,
        }
    }

    /// Each backend gets exactly one bounded attempt; the first acceptable
    /// answer stops the chain.
    async fn try_backends(
        &self,
        handles: &[BackendHandle],
        messages: Vec<Message>,
    ) -> (Vec<AttemptRecord>, Option<(String, String)>) {
        let mut attempts = Vec::with_capacity(handles.len());
        for handle in handles {
            let started = Instant::now();
            let call = handle.provider.complete(
                messages.clone(),
                self.settings.temperature,
                self.settings.max_tokens,
            );
            let result = tokio::time::timeout(self.settings.timeout, call).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let (outcome, text) = match result {
                Err(_) => {
                    warn!(backend = %handle.name, elapsed_ms, "backend timed out");
                    (AttemptOutcome::Timeout, None)
                }
                Ok(Err(e)) => {
                    warn!(backend = %handle.name, elapsed_ms, error = %e, "backend failed");
                    (AttemptOutcome::Error, None)
                }
                Ok(Ok(text)) if text.trim().chars().count() < self.settings.min_response_chars => {
                    warn!(backend = %handle.name, elapsed_ms, chars = text.trim().chars().count(), "backend reply too short");
                    (AttemptOutcome::TooShort, None)
                }
                Ok(Ok(text)) => {
                    info!(backend = %handle.name, elapsed_ms, "backend answered");
                    (AttemptOutcome::Success, Some(text.trim().to_string()))
                }
            };

            attempts.push(AttemptRecord {
                backend: handle.name.clone(),
                outcome,
                elapsed_ms,
            });
            if let Some(text) = text {
                return (attempts, Some((handle.name.clone(), text)));
            }
        }
        (attempts, None)
    }
}

/// A backend answer keeps the local chart; no answer means the local reply.
fn fold_answer(answer: Option<(String, String)>, local: Reply) -> (Reply, ReplySource) {
    match answer {
        Some((backend, text)) => (
            Reply {
                text,
                chart: local.chart,
            },
            ReplySource::Backend(backend),
        ),
        None => (local, ReplySource::Local),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_prefers_backend_text_and_keeps_chart() {
        let local = Reply {
            text: "local".into(),
            chart: None,
        };
        let (reply, source) = fold_answer(Some(("openai".into(), "remote".into())), local.clone());
        assert_eq!(reply.text, "remote");
        assert_eq!(source, ReplySource::Backend("openai".into()));

        let (reply, source) = fold_answer(None, local);
        assert_eq!(reply.text, "local");
        assert_eq!(source, ReplySource::Local);
    }

    #[test]
    fn settings_follow_config() {
        let mut cfg = Config::for_profile("VISTA_CHAT_TEST_UNSET");
        cfg.llm.timeout_secs = 0;
        cfg.chat.history_turns = 4;
        cfg.chat.max_history = 2;
        let s = DispatchSettings::from_config(&cfg);
        assert_eq!(s.timeout, Duration::from_secs(1));
        assert_eq!(s.max_history, 4);
    }

    #[test]
    fn attempt_records_serialize_snake_case() {
        let a = AttemptRecord {
            backend: "gemini".into(),
            outcome: AttemptOutcome::TooShort,
            elapsed_ms: 12,
        };
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            r#"{"backend":"gemini","outcome":"too_short","elapsed_ms":12}"#
        );
    }
}
