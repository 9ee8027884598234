use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::provider::{read_json, split_system, text_at, LlmError, LlmProvider, Message, Role};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
        }
    }

    /// `generateContent` body: the system prompt goes to `system_instruction`
    /// and the assistant role is called `model`.
    fn request_body(messages: &[Message], temperature: f32, max_tokens: u32) -> serde_json::Value {
        let (system, rest) = split_system(messages);
        let contents: Vec<serde_json::Value> = rest
            .iter()
            .map(|m| {
                let role = if m.role == Role::Assistant { "model" } else { "user" };
                json!({ "role": role, "parts": [{ "text": m.content }] })
            })
            .collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": temperature,
                "maxOutputTokens": max_tokens,
            },
        });
        if let Some(system) = system {
            body["system_instruction"] = json!({ "parts": [{ "text": system }] });
        }
        body
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn complete(
        &self,
        messages: Vec<Message>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let url = format!("{API_BASE}/{}:generateContent", self.model);
        debug!(model = %self.model, "gemini request");

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&Self::request_body(&messages, temperature, max_tokens))
            .send()
            .await?;

        let resp = read_json(response).await?;
        text_at(&resp, "/candidates/0/content/parts/0/text")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_structure() {
        let messages = vec![
            Message::system("You are a banking analyst."),
            Message::user("Which branch is weakest?"),
            Message::assistant("Warangal."),
            Message::user("Why?"),
        ];

        let body = GeminiProvider::request_body(&messages, 0.1, 4096);

        assert_eq!(
            body["system_instruction"]["parts"][0]["text"].as_str().unwrap(),
            "You are a banking analyst.",
        );
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["parts"][0]["text"], "Why?");

        let temp = body["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((temp - 0.1).abs() < 1e-6);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 4096);
    }

    #[test]
    fn request_body_without_system() {
        let body = GeminiProvider::request_body(&[Message::user("Hello")], 0.5, 2048);
        assert!(body.get("system_instruction").is_none());
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
    }
}
