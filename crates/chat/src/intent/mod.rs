//! Map free text to a topic or a branch, deterministically.
//!
//! Resolution order: continuation phrases, then an exact (word-bounded)
//! branch name or id, then a typo-tolerant branch name, then keyword
//! scoring across topics. Ties between topics go to declaration order in
//! [`vocabulary::TOPICS`]; ties between branches go to the longest name,
//! then input order.

pub mod similarity;
pub mod vocabulary;

use serde::{Deserialize, Serialize};

use vista_core::MetricsRecord;

use crate::context::ConversationContext;
use similarity::{best_match, contains_phrase, name_similarity, FUZZY_CUTOFF};
pub use vocabulary::Vocabulary;

const WHOLE_KEYWORD: f64 = 2.0;
const EXTRA_WORD_BONUS: f64 = 0.5;
const PARTIAL_WORD: f64 = 0.5;
const FUZZY_WEIGHT: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Npa,
    Casa,
    TopPerformers,
    Weak,
    Deposits,
    Advances,
    Staff,
    Target,
    Anomaly,
    Zone,
    Overview,
    Help,
    FollowUp,
    EntityReference,
    Unknown,
}

impl Intent {
    pub fn label(self) -> &'static str {
        match self {
            Intent::Npa => "NPA",
            Intent::Casa => "CASA",
            Intent::TopPerformers => "TOP_PERFORMERS",
            Intent::Weak => "WEAK",
            Intent::Deposits => "DEPOSITS",
            Intent::Advances => "ADVANCES",
            Intent::Staff => "STAFF",
            Intent::Target => "TARGET",
            Intent::Anomaly => "ANOMALY",
            Intent::Zone => "ZONE",
            Intent::Overview => "OVERVIEW",
            Intent::Help => "HELP",
            Intent::FollowUp => "FOLLOW_UP",
            Intent::EntityReference => "ENTITY_REFERENCE",
            Intent::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of resolving one utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub intent: Intent,
    /// Branch id: the matched branch, or the carried-over one for follow-ups.
    pub entity: Option<String>,
    /// Strength of the winning match. Topic scores and name similarities
    /// are on different scales; compare only within one kind.
    pub score: f64,
}

impl Resolution {
    fn new(intent: Intent, entity: Option<String>, score: f64) -> Self {
        Self { intent, entity, score }
    }
}

/// A branch as the resolver sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityName {
    pub id: String,
    pub name: String,
    norm_id: String,
    norm_name: String,
}

impl EntityName {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let (id, name) = (id.into(), name.into());
        Self {
            norm_id: normalize(&id),
            norm_name: normalize(&name),
            id,
            name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntentResolver {
    vocabulary: Vocabulary,
    entities: Vec<EntityName>,
}

impl IntentResolver {
    pub fn new(vocabulary: Vocabulary, entities: Vec<EntityName>) -> Self {
        Self { vocabulary, entities }
    }

    /// Standard vocabulary over the given branches.
    pub fn for_records(records: &[MetricsRecord]) -> Self {
        Self::new(
            Vocabulary::standard(),
            records
                .iter()
                .map(|r| EntityName::new(r.id.clone(), r.name.clone()))
                .collect(),
        )
    }

    pub fn entities(&self) -> &[EntityName] {
        &self.entities
    }

    pub fn resolve(&self, utterance: &str, context: &ConversationContext) -> Resolution {
        let text = normalize(utterance);
        if text.is_empty() {
            return Resolution::new(Intent::Unknown, None, 0.0);
        }

        if self.is_follow_up(&text) {
            return Resolution::new(Intent::FollowUp, context.last_entity().map(str::to_string), 1.0);
        }

        let tokens: Vec<&str> = text.split(' ').collect();
        if let Some((entity, score)) = self
            .exact_entity(&text)
            .map(|e| (e, 1.0))
            .or_else(|| self.fuzzy_entity(&tokens))
        {
            return Resolution::new(Intent::EntityReference, Some(entity.id.clone()), score);
        }

        self.best_topic(&text, &tokens)
    }

    fn is_follow_up(&self, text: &str) -> bool {
        let text = text.strip_suffix(" please").unwrap_or(text);
        self.vocabulary.follow_ups.iter().any(|p| p == text)
    }

    fn exact_entity(&self, text: &str) -> Option<&EntityName> {
        let mut best: Option<&EntityName> = None;
        for e in &self.entities {
            if !(contains_phrase(text, &e.norm_name) || contains_phrase(text, &e.norm_id)) {
                continue;
            }
            if best.map_or(true, |b| e.norm_name.len() > b.norm_name.len()) {
                best = Some(e);
            }
        }
        best
    }

    fn fuzzy_entity(&self, tokens: &[&str]) -> Option<(&EntityName, f64)> {
        let mut best: Option<(&EntityName, f64)> = None;
        for e in &self.entities {
            if let Some(r) = name_similarity(tokens, &e.norm_name) {
                if best.map_or(true, |(_, b)| r > b) {
                    best = Some((e, r));
                }
            }
        }
        best
    }

    fn best_topic(&self, text: &str, tokens: &[&str]) -> Resolution {
        let mut best = Resolution::new(Intent::Unknown, None, 0.0);
        for topic in &self.vocabulary.topics {
            let score = topic_score(topic, text, tokens);
            if score > best.score {
                best = Resolution::new(topic.intent, None, score);
            }
        }
        best
    }
}

fn topic_score(topic: &vocabulary::Topic, text: &str, tokens: &[&str]) -> f64 {
    let mut score = 0.0;
    for kw in &topic.keywords {
        if contains_phrase(text, &kw.phrase) {
            score += WHOLE_KEYWORD + EXTRA_WORD_BONUS * (kw.words.len() - 1) as f64;
        } else if kw.words.len() > 1 {
            let hits = kw.words.iter().filter(|w| tokens.contains(&w.as_str())).count();
            score += PARTIAL_WORD * hits as f64;
        }
    }

    // Typos: tokens that are not already a keyword in their own right.
    let phrases = || topic.keywords.iter().map(|k| k.phrase.as_str());
    for token in tokens {
        if phrases().any(|p| p == *token) {
            continue;
        }
        if let Some(r) = best_match(token, phrases()) {
            debug_assert!(r >= FUZZY_CUTOFF);
            score += FUZZY_WEIGHT * r;
        }
    }
    score
}

/// Lowercase, punctuation to spaces, single-spaced.
pub fn normalize(text: &str) -> String {
    let mapped: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ConversationContext;

    fn resolver() -> IntentResolver {
        IntentResolver::new(
            Vocabulary::standard(),
            vec![
                EntityName::new("B1003", "Hyderabad Main"),
                EntityName::new("B1005", "Warangal"),
                EntityName::new("B9000", "Hyderabad"),
                EntityName::new("B2003", "Guntur"),
            ],
        )
    }

    fn intent_of(text: &str) -> Intent {
        resolver().resolve(text, &ConversationContext::default()).intent
    }

    #[test]
    fn bad_loans_question_is_npa() {
        assert_eq!(intent_of("Which loans are bad?"), Intent::Npa);
    }

    #[test]
    fn keyword_topics() {
        assert_eq!(intent_of("show me the worst branches"), Intent::Weak);
        assert_eq!(intent_of("who are the top performers"), Intent::TopPerformers);
        assert_eq!(intent_of("CASA ratio please"), Intent::Casa);
        assert_eq!(intent_of("any outliers?"), Intent::Anomaly);
        assert_eq!(intent_of("zone wise numbers"), Intent::Zone);
        assert_eq!(intent_of("help"), Intent::Help);
        assert_eq!(intent_of("the weather in Paris"), Intent::Unknown);
        assert_eq!(intent_of(""), Intent::Unknown);
    }

    #[test]
    fn typos_still_score() {
        assert_eq!(intent_of("deposts this quarter"), Intent::Deposits);
    }

    #[test]
    fn ties_go_to_declaration_order() {
        let r = resolver().resolve("casa and npa", &ConversationContext::default());
        assert_eq!(r.intent, Intent::Npa);
        assert_eq!(r.score, WHOLE_KEYWORD);
    }

    #[test]
    fn branch_name_beats_topic_words() {
        let r = resolver().resolve("what is the npa of Warangal", &ConversationContext::default());
        assert_eq!(r.intent, Intent::EntityReference);
        assert_eq!(r.entity.as_deref(), Some("B1005"));
    }

    #[test]
    fn longest_name_wins_and_ids_match() {
        let ctx = ConversationContext::default();
        assert_eq!(
            resolver().resolve("hyderabad main deposits", &ctx).entity.as_deref(),
            Some("B1003")
        );
        assert_eq!(resolver().resolve("hyderabad", &ctx).entity.as_deref(), Some("B9000"));
        assert_eq!(resolver().resolve("details for b2003", &ctx).entity.as_deref(), Some("B2003"));
    }

    #[test]
    fn misspelled_branch_is_found() {
        let r = resolver().resolve("how is warangl doing", &ConversationContext::default());
        assert_eq!(r.intent, Intent::EntityReference);
        assert_eq!(r.entity.as_deref(), Some("B1005"));
        assert!(r.score < 1.0);
    }

    #[test]
    fn follow_up_carries_last_entity() {
        let ctx = ConversationContext::default().record(
            Intent::EntityReference,
            Some("B1005".into()),
            crate::context::Exchange::now("warangal", "..."),
            10,
        );
        let r = resolver().resolve("Tell me more", &ctx);
        assert_eq!(r.intent, Intent::FollowUp);
        assert_eq!(r.entity.as_deref(), Some("B1005"));
        assert_eq!(resolver().resolve("yes please", &ctx).intent, Intent::FollowUp);
    }

    #[test]
    fn resolution_is_deterministic() {
        let ctx = ConversationContext::default();
        let r = resolver();
        for text in ["which loans are bad", "casa and npa", "deposts", "hyderbad main"] {
            assert_eq!(r.resolve(text, &ctx), r.resolve(text, &ctx));
        }
    }

    #[test]
    fn normalize_strips_punctuation() {
        assert_eq!(normalize("  Non-Performing   Assets?! "), "non performing assets");
    }
}
