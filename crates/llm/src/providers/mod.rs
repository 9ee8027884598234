pub mod claude;
pub mod gemini;
pub mod ollama;
pub mod openai;

use std::sync::Arc;

use tracing::{debug, info};
use vista_core::config::{Config, LlmConfig, OllamaConfig};

use crate::provider::{LlmError, LlmProvider};
use crate::registry::BackendHandle;

const OPENAI_DEFAULT_BASE: &str = "https://api.openai.com";

/// Build one named provider. Missing credentials are `NotConfigured`.
pub fn create_provider(
    name: &str,
    llm: &LlmConfig,
    ollama: &OllamaConfig,
) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let missing = |key: &str| LlmError::NotConfigured(format!("{key} not set"));
    match name {
        "openai" => {
            let api_key = llm.openai_api_key.clone().ok_or_else(|| missing("OPENAI_API_KEY"))?;
            let base_url = llm.openai_base_url.as_deref().unwrap_or(OPENAI_DEFAULT_BASE);
            Ok(Arc::new(openai::OpenAiProvider::new(
                api_key,
                llm.openai_model.clone(),
                base_url.to_string(),
            )))
        }
        "anthropic" | "claude" => {
            let api_key = llm.anthropic_api_key.clone().ok_or_else(|| missing("ANTHROPIC_API_KEY"))?;
            Ok(Arc::new(claude::ClaudeProvider::new(api_key, llm.anthropic_model.clone())))
        }
        "gemini" => {
            let api_key = llm.gemini_api_key.clone().ok_or_else(|| missing("GEMINI_API_KEY"))?;
            Ok(Arc::new(gemini::GeminiProvider::new(api_key, llm.gemini_model.clone())))
        }
        "ollama" if ollama.enabled => Ok(Arc::new(ollama::OllamaProvider::new(
            ollama.url.clone(),
            ollama.model.clone(),
        ))),
        "ollama" => Err(missing("OLLAMA_URL")),
        other => Err(LlmError::NotConfigured(format!("unknown LLM provider: '{other}'"))),
    }
}

/// Every provider in `LLM_PRIORITY` order that has its credential.
/// Unconfigured or unknown names are skipped, not errors.
pub fn create_providers(config: &Config) -> Vec<BackendHandle> {
    let handles: Vec<BackendHandle> = config
        .llm
        .priority
        .iter()
        .filter(|name| {
            let ready = config.llm.has_credentials(name, &config.ollama);
            if !ready {
                debug!(backend = %name, "no credentials, skipping backend");
            }
            ready
        })
        .filter_map(|name| match create_provider(name, &config.llm, &config.ollama) {
            Ok(provider) => Some(BackendHandle::new(name.clone(), provider)),
            Err(e) => {
                debug!(backend = %name, error = %e, "skipping backend");
                None
            }
        })
        .collect();
    let names: Vec<&str> = handles.iter().map(|h| h.name.as_str()).collect();
    info!(backends = %names.join(","), "LLM backends initialized");
    handles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(priority: &[&str]) -> Config {
        let mut cfg = Config::for_profile("VISTA_LLM_TEST_UNSET");
        cfg.llm.priority = priority.iter().map(|s| s.to_string()).collect();
        cfg.llm.openai_api_key = None;
        cfg.llm.anthropic_api_key = None;
        cfg.llm.gemini_api_key = None;
        cfg.ollama.enabled = false;
        cfg
    }

    #[test]
    fn missing_keys_are_skipped_and_order_kept() {
        let mut cfg = config(&["anthropic", "openai", "gemini", "ollama", "bogus"]);
        cfg.llm.gemini_api_key = Some("g".into());
        cfg.ollama.enabled = true;
        let names: Vec<String> = create_providers(&cfg).into_iter().map(|h| h.name).collect();
        assert_eq!(names, vec!["gemini", "ollama"]);
    }

    #[test]
    fn credential_check_matches_construction() {
        let mut cfg = config(&[]);
        cfg.llm.openai_api_key = Some("sk".into());
        for name in ["openai", "anthropic", "claude", "gemini", "ollama", "bogus"] {
            assert_eq!(
                cfg.llm.has_credentials(name, &cfg.ollama),
                create_provider(name, &cfg.llm, &cfg.ollama).is_ok(),
                "{name}"
            );
        }
    }

    #[test]
    fn nothing_configured_is_empty_not_error() {
        assert!(create_providers(&config(&["anthropic", "openai"])).is_empty());
    }

    #[test]
    fn unknown_name_is_not_configured() {
        let cfg = config(&[]);
        let err = create_provider("mistral", &cfg.llm, &cfg.ollama).err().unwrap();
        assert!(matches!(err, LlmError::NotConfigured(_)));
    }
}
