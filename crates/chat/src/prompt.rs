//! Prompt assembly for external backends.

use vista_compute::ranking::rank_by_score;
use vista_compute::{PortfolioOverview, RankOrder};
use vista_llm::Message;

use crate::context::Exchange;
use crate::intent::Intent;
use crate::local::LocalResponder;

const PREAMBLE: &str = "You are a banking performance analyst. Answer the user's question using only \
the figures below. Be concise and specific; quote branch names and numbers. \
Amounts are in crores (Cr) unless stated otherwise.";

const BRIEF_RANK: usize = 3;

/// Deterministic summary of the loaded dataset.
pub fn dataset_brief(local: &LocalResponder) -> String {
    let records = local.records();
    if records.is_empty() {
        return "Dataset: no branches loaded.".into();
    }
    let engine = local.engine();
    let o = PortfolioOverview::compute(records, engine);

    let ranked = |order| {
        rank_by_score(records, engine, order, BRIEF_RANK)
            .iter()
            .map(|(r, s)| format!("{} {:.1} ({})", r.name, s.total, s.grade))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let anomalies: Vec<String> = local
        .detector()
        .detect(records)
        .iter()
        .map(|a| format!("{} {} {:.2} (z {:+.2})", a.entity_name, a.metric.key(), a.value, a.z_score))
        .collect();

    let mut lines = vec![
        format!("Dataset: {} branches.", o.branches),
        format!("Average score {:.1}, average NPA {:.2}%, average CASA {:.1}%.", o.avg_score, o.avg_npa, o.avg_casa),
        format!(
            "Deposits {:.2} Cr of {:.2} Cr target; advances {:.2} Cr of {:.2} Cr target.",
            o.total_deposits, o.deposit_target, o.total_advances, o.advance_target
        ),
        format!("Top performers: {}.", ranked(RankOrder::Descending)),
        format!("Lowest scores: {}.", ranked(RankOrder::Ascending)),
    ];
    lines.push(if anomalies.is_empty() {
        "Anomalies: none.".to_string()
    } else {
        format!("Anomalies: {}.", anomalies.join("; "))
    });
    lines.join("\n")
}

/// System message (brief, topic and optional branch card), then the recent
/// history, then the question.
pub fn build_messages(
    brief: &str,
    intent: Intent,
    focus: Option<&str>,
    history: &[Exchange],
    utterance: &str,
) -> Vec<Message> {
    let mut system = format!("{PREAMBLE}\n\n{brief}\n\nQuestion topic: {intent}.");
    if let Some(card) = focus {
        system.push_str("\n\nBranch in focus:\n");
        system.push_str(card);
    }

    let mut messages = Vec::with_capacity(history.len() * 2 + 2);
    messages.push(Message::system(system));
    for e in history {
        messages.push(Message::user(e.user.clone()));
        messages.push(Message::assistant(e.assistant.clone()));
    }
    messages.push(Message::user(utterance));
    messages
}
