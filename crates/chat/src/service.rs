//! Session-keyed front door. Turns within a session run one at a time, in
//! arrival order; sessions never share state.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::context::{ConversationContext, Exchange};
use crate::dispatcher::{Dispatcher, Turn};
use crate::error::ChatError;
use crate::export::export_history;

type Session = Arc<Mutex<ConversationContext>>;

pub struct ChatService {
    dispatcher: Arc<Dispatcher>,
    sessions: Mutex<HashMap<String, Session>>,
}

impl ChatService {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Open a session with a fresh id.
    pub async fn create_session(&self) -> String {
        let id = Uuid::new_v4().to_string();
        self.sessions
            .lock()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(ConversationContext::default())));
        info!(session = %id, "chat session created");
        id
    }

    /// Handle one message. Unknown ids open a new session under that id.
    pub async fn ask(&self, session_id: &str, text: &str) -> Result<Turn, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyUtterance);
        }
        let session = self.session_or_create(session_id).await;

        // Held across the dispatch so a second message waits its turn.
        let mut context = session.lock().await;
        // Stored only once the turn completes; a dropped future leaves it intact.
        let turn = self.dispatcher.respond(text, context.clone()).await;
        *context = turn.context.clone();
        debug!(session = %session_id, history = context.history().len(), "turn stored");
        Ok(turn)
    }

    pub async fn history(&self, session_id: &str) -> Result<Vec<Exchange>, ChatError> {
        let session = self.session(session_id).await?;
        let context = session.lock().await;
        Ok(context.history().to_vec())
    }

    /// JSON export of a session's exchanges.
    pub async fn export(&self, session_id: &str) -> Result<String, ChatError> {
        let session = self.session(session_id).await?;
        let context = session.lock().await;
        export_history(context.history())
    }

    /// Forget a session. Returns whether it existed.
    pub async fn close(&self, session_id: &str) -> bool {
        self.sessions.lock().await.remove(session_id).is_some()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    async fn session(&self, session_id: &str) -> Result<Session, ChatError> {
        self.sessions
            .lock()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| ChatError::UnknownSession(session_id.to_string()))
    }

    async fn session_or_create(&self, session_id: &str) -> Session {
        self.sessions
            .lock()
            .await
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }
}
