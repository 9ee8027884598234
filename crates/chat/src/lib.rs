//! Conversational analytics over branch metrics: intent resolution,
//! backend fallback and deterministic local answers.

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod export;
pub mod intent;
pub mod local;
pub mod prompt;
pub mod service;

pub use context::{ConversationContext, Exchange};
pub use dispatcher::{AttemptOutcome, AttemptRecord, DispatchSettings, Dispatcher, ReplySource, Turn};
pub use error::ChatError;
pub use export::{export_history, write_history, ExportedExchange};
pub use intent::{Intent, IntentResolver, Resolution};
pub use local::{ChartKind, ChartSpec, LocalResponder, Reply, Series};
pub use service::ChatService;
