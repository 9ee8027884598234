//! Conversation export: a JSON array of `{ user, assistant, timestamp }`
//! with RFC 3339 timestamps.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::Exchange;
use crate::error::ChatError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedExchange {
    pub user: String,
    pub assistant: String,
    pub timestamp: String,
}

impl From<&Exchange> for ExportedExchange {
    fn from(e: &Exchange) -> Self {
        Self {
            user: e.user.clone(),
            assistant: e.assistant.clone(),
            timestamp: rfc3339(e.timestamp),
        }
    }
}

fn rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

pub fn export_history(history: &[Exchange]) -> Result<String, ChatError> {
    let rows: Vec<ExportedExchange> = history.iter().map(ExportedExchange::from).collect();
    Ok(serde_json::to_string_pretty(&rows)?)
}

pub fn write_history(history: &[Exchange], path: &Path) -> Result<(), ChatError> {
    std::fs::write(path, export_history(history)?)?;
    tracing::info!(path = %path.display(), exchanges = history.len(), "conversation exported");
    Ok(())
}
