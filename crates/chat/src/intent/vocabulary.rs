//! Topic keyword tables. Entries are stored normalized (lowercase, single
//! spaces, no punctuation) so they compare directly against normalized text.

use super::Intent;

/// Topics in declaration order; score ties go to the earlier entry.
pub const TOPICS: &[(Intent, &[&str])] = &[
    (
        Intent::Npa,
        &[
            "npa", "npas", "non performing", "bad", "bad loans", "bad loan", "bad debt",
            "asset quality", "stressed assets", "defaults", "overdue", "delinquency",
        ],
    ),
    (
        Intent::Casa,
        &[
            "casa", "current account", "savings account", "savings", "low cost deposits",
            "cheap funds",
        ],
    ),
    (
        Intent::TopPerformers,
        &[
            "top", "best", "top performers", "best performing", "leaders", "highest score",
            "star branches", "excellent",
        ],
    ),
    (
        Intent::Weak,
        &[
            "weak", "weakest", "worst", "poor", "underperforming", "bottom", "struggling",
            "lagging", "needs attention", "problem branches",
        ],
    ),
    (
        Intent::Deposits,
        &[
            "deposits", "deposit", "deposit growth", "deposit target", "mobilisation",
            "mobilization", "liabilities",
        ],
    ),
    (
        Intent::Advances,
        &["advances", "advance", "loans", "loan book", "credit", "lending", "disbursement"],
    ),
    (
        Intent::Staff,
        &[
            "staff", "employees", "productivity", "per staff", "headcount", "business per staff",
            "profit per staff", "manpower",
        ],
    ),
    (
        Intent::Target,
        &["target", "targets", "achievement", "achieved", "shortfall", "gap", "budget", "on track"],
    ),
    (
        Intent::Anomaly,
        &[
            "anomaly", "anomalies", "outlier", "outliers", "unusual", "abnormal", "strange",
            "z score", "deviation",
        ],
    ),
    (
        Intent::Zone,
        &["zone", "zones", "region", "regional", "zone wise", "zonal", "state wise"],
    ),
    (
        Intent::Overview,
        &[
            "overview", "summary", "overall", "portfolio", "dashboard", "big picture",
            "all branches", "how are we doing",
        ],
    ),
    (
        Intent::Help,
        &["help", "what can you do", "commands", "options", "how to use", "examples"],
    ),
];

/// Whole utterances that continue the previous topic.
pub const FOLLOW_UP_PATTERNS: &[&str] = &[
    "tell me more",
    "more",
    "more please",
    "more details",
    "details",
    "yes",
    "yeah",
    "yep",
    "sure",
    "ok",
    "okay",
    "go on",
    "continue",
    "what about that",
    "and that",
    "elaborate",
    "explain further",
    "why",
];

/// One topic's keyword list, pre-split into words.
#[derive(Debug, Clone)]
pub struct Topic {
    pub intent: Intent,
    pub keywords: Vec<Keyword>,
}

#[derive(Debug, Clone)]
pub struct Keyword {
    pub phrase: String,
    pub words: Vec<String>,
}

impl Keyword {
    pub fn new(phrase: &str) -> Self {
        let phrase = super::normalize(phrase);
        let words = phrase.split(' ').map(str::to_string).collect();
        Self { phrase, words }
    }
}

#[derive(Debug, Clone)]
pub struct Vocabulary {
    pub topics: Vec<Topic>,
    pub follow_ups: Vec<String>,
}

impl Vocabulary {
    pub fn standard() -> Self {
        Self::from_tables(TOPICS, FOLLOW_UP_PATTERNS)
    }

    pub fn from_tables(topics: &[(Intent, &[&str])], follow_ups: &[&str]) -> Self {
        Self {
            topics: topics
                .iter()
                .map(|(intent, words)| Topic {
                    intent: *intent,
                    keywords: words.iter().map(|w| Keyword::new(w)).collect(),
                })
                .collect(),
            follow_ups: follow_ups.iter().map(|p| super::normalize(p)).collect(),
        }
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_topic_intent_is_listed_once() {
        let mut seen = std::collections::HashSet::new();
        for (intent, words) in TOPICS {
            assert!(seen.insert(*intent), "{intent:?} listed twice");
            assert!(!words.is_empty());
        }
        assert!(!seen.contains(&Intent::FollowUp));
        assert!(!seen.contains(&Intent::Unknown));
    }

    #[test]
    fn tables_are_already_normalized() {
        for (_, words) in TOPICS {
            for w in *words {
                assert_eq!(&super::super::normalize(w), w);
            }
        }
    }
}
