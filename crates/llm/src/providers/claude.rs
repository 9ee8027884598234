use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::provider::{read_json, split_system, text_at, LlmError, LlmProvider, Message};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

pub struct ClaudeProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl ClaudeProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
        }
    }

    /// The messages API takes the system prompt as a top-level field.
    fn request_body(&self, messages: &[Message], temperature: f32, max_tokens: u32) -> serde_json::Value {
        let (system, rest) = split_system(messages);
        let api_messages: Vec<serde_json::Value> = rest
            .iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let mut body = json!({
            "model": self.model,
            "messages": api_messages,
            "temperature": temperature,
            "max_tokens": max_tokens,
        });
        if let Some(system) = system {
            body["system"] = json!(system);
        }
        body
    }
}

#[async_trait]
impl LlmProvider for ClaudeProvider {
    async fn complete(
        &self,
        messages: Vec<Message>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        debug!(model = %self.model, "anthropic request");

        let response = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&self.request_body(&messages, temperature, max_tokens))
            .send()
            .await?;

        let resp = read_json(response).await?;
        text_at(&resp, "/content/0/text")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_moves_to_top_level() {
        let p = ClaudeProvider::new("k".into(), "claude".into());
        let body = p.request_body(
            &[Message::system("brief"), Message::user("q"), Message::assistant("a")],
            0.1,
            128,
        );
        assert_eq!(body["system"], "brief");
        let msgs = body["messages"].as_array().unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[1]["role"], "assistant");
    }

    #[test]
    fn no_system_field_without_system_message() {
        let p = ClaudeProvider::new("k".into(), "claude".into());
        let body = p.request_body(&[Message::user("q")], 0.1, 128);
        assert!(body.get("system").is_none());
    }
}
