use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::VistaError;
use crate::scoring_config::ScoringConfig;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_f64(profile: &str, key: &str, default: f64) -> f64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .filter(|v: &f64| v.is_finite())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub llm: LlmConfig,
    pub ollama: OllamaConfig,
    pub chat: ChatConfig,
    pub anomaly: AnomalyConfig,
    pub scoring: ScoringSource,
}

/// Well-known env keys that identify a profile when prefixed.
const PROFILE_MARKER_KEYS: &[&str] = &[
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
    "GEMINI_API_KEY",
    "OLLAMA_URL",
    "SCORING_CONFIG",
];

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `VISTA_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("VISTA_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            llm: LlmConfig::from_env_profiled(p),
            ollama: OllamaConfig::from_env_profiled(p),
            chat: ChatConfig::from_env_profiled(p),
            anomaly: AnomalyConfig::from_env_profiled(p),
            scoring: ScoringSource::from_env_profiled(p),
        }
    }

    /// Discover available profiles by scanning env vars for `{PREFIX}_{MARKER_KEY}` patterns.
    /// Always includes "default" (the unprefixed config).
    pub fn available_profiles() -> Vec<String> {
        let mut profiles = std::collections::BTreeSet::new();
        profiles.insert("default".to_string());

        for (key, _) in env::vars() {
            for marker in PROFILE_MARKER_KEYS {
                if let Some(prefix) = key.strip_suffix(&format!("_{}", marker)) {
                    if !prefix.is_empty()
                        && prefix.chars().all(|c| c.is_ascii_uppercase() || c == '_')
                    {
                        profiles.insert(prefix.to_string());
                    }
                }
            }
        }

        profiles.into_iter().collect()
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  llm:      priority={}, timeout={}s", self.llm.priority.join(","), self.llm.timeout_secs);
        tracing::info!("  backends: {}", self.llm.configured_providers().join(","));
        tracing::info!("  chat:     history_turns={}, top_n={}", self.chat.history_turns, self.chat.top_n);
        tracing::info!("  anomaly:  z_threshold={}", self.anomaly.z_threshold);
        tracing::info!(
            "  scoring:  {}",
            self.scoring.path.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "(canonical)".into())
        );
    }

    /// Return a redacted view safe for API responses (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "available_profiles": Self::available_profiles(),
            "llm": {
                "priority": self.llm.priority,
                "configured": self.llm.configured_providers(),
                "timeout_secs": self.llm.timeout_secs,
            },
            "ollama": { "url": self.ollama.url, "model": self.ollama.model },
            "chat": { "history_turns": self.chat.history_turns, "top_n": self.chat.top_n },
            "anomaly": { "z_threshold": self.anomaly.z_threshold },
            "scoring": { "path": self.scoring.path },
        })
    }
}

// ── LLM backends ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider names in the order they are attempted.
    pub priority: Vec<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Upper bound for a single backend attempt.
    pub timeout_secs: u64,
    /// Responses shorter than this are treated as failures.
    pub min_response_chars: usize,
}

pub const DEFAULT_PROVIDER_PRIORITY: &str = "anthropic,openai,gemini,ollama";

impl LlmConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            priority: parse_priority(&profiled_env_or(p, "LLM_PRIORITY", DEFAULT_PROVIDER_PRIORITY)),
            openai_api_key: profiled_env_opt(p, "OPENAI_API_KEY"),
            openai_model: profiled_env_or(p, "OPENAI_MODEL", "gpt-4o-mini"),
            openai_base_url: profiled_env_opt(p, "OPENAI_BASE_URL"),
            anthropic_api_key: profiled_env_opt(p, "ANTHROPIC_API_KEY"),
            anthropic_model: profiled_env_or(p, "ANTHROPIC_MODEL", "claude-sonnet-4-5-20250929"),
            gemini_api_key: profiled_env_opt(p, "GEMINI_API_KEY"),
            gemini_model: profiled_env_or(p, "GEMINI_MODEL", "gemini-2.0-flash"),
            temperature: profiled_env_or(p, "LLM_TEMPERATURE", "0.2")
                .parse()
                .unwrap_or(0.2),
            max_tokens: profiled_env_u32(p, "LLM_MAX_TOKENS", 1024),
            timeout_secs: profiled_env_u64(p, "LLM_TIMEOUT_SECS", 20),
            min_response_chars: profiled_env_u32(p, "LLM_MIN_RESPONSE_CHARS", 10) as usize,
        }
    }

    /// Whether the named provider has the credential it needs.
    /// Ollama is keyless; it is enabled by an explicit `OLLAMA_URL`.
    pub fn has_credentials(&self, provider: &str, ollama: &OllamaConfig) -> bool {
        match provider {
            "openai" => self.openai_api_key.is_some(),
            "anthropic" | "claude" => self.anthropic_api_key.is_some(),
            "gemini" => self.gemini_api_key.is_some(),
            "ollama" => ollama.enabled,
            _ => false,
        }
    }

    /// Providers in the priority list that have keys set (Ollama excluded,
    /// its availability lives in [`OllamaConfig`]).
    pub fn configured_providers(&self) -> Vec<String> {
        self.priority
            .iter()
            .filter(|name| match name.as_str() {
                "openai" => self.openai_api_key.is_some(),
                "anthropic" | "claude" => self.anthropic_api_key.is_some(),
                "gemini" => self.gemini_api_key.is_some(),
                _ => false,
            })
            .cloned()
            .collect()
    }
}

fn parse_priority(raw: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

// ── Ollama (local models) ─────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// True only when `OLLAMA_URL` is set explicitly.
    pub enabled: bool,
    pub url: String,
    pub model: String,
}

impl OllamaConfig {
    fn from_env_profiled(p: &str) -> Self {
        let url = profiled_env_opt(p, "OLLAMA_URL");
        Self {
            enabled: url.is_some(),
            url: url.unwrap_or_else(|| "http://localhost:11434".to_string()),
            model: profiled_env_or(p, "OLLAMA_MODEL", "llama3.2"),
        }
    }
}

// ── Chat ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Most recent turns replayed into a backend prompt.
    pub history_turns: usize,
    /// Turns retained in a session context.
    pub max_history: usize,
    /// Rows shown in ranked local answers.
    pub top_n: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_turns: 3,
            max_history: 50,
            top_n: 5,
        }
    }
}

impl ChatConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            history_turns: profiled_env_u32(p, "CHAT_HISTORY_TURNS", d.history_turns as u32) as usize,
            max_history: profiled_env_u32(p, "CHAT_MAX_HISTORY", d.max_history as u32) as usize,
            top_n: profiled_env_u32(p, "CHAT_TOP_N", d.top_n as u32).max(1) as usize,
        }
    }
}

// ── Anomaly detection ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyConfig {
    pub z_threshold: f64,
}

pub const DEFAULT_Z_THRESHOLD: f64 = 2.0;

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            z_threshold: DEFAULT_Z_THRESHOLD,
        }
    }
}

impl AnomalyConfig {
    fn from_env_profiled(p: &str) -> Self {
        let z = profiled_env_f64(p, "ANOMALY_Z_THRESHOLD", DEFAULT_Z_THRESHOLD);
        Self {
            z_threshold: if z > 0.0 { z } else { DEFAULT_Z_THRESHOLD },
        }
    }
}

// ── Scoring table source ──────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringSource {
    /// YAML scoring config; the canonical table is used when unset.
    pub path: Option<PathBuf>,
}

impl ScoringSource {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            path: profiled_env_opt(p, "SCORING_CONFIG").map(PathBuf::from),
        }
    }

    pub fn load(&self) -> Result<ScoringConfig, VistaError> {
        match &self.path {
            Some(path) => ScoringConfig::from_path(path),
            None => Ok(ScoringConfig::canonical()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_is_trimmed_lowercased_and_deduplicated() {
        let p = parse_priority(" OpenAI, anthropic,,openai ,Gemini");
        assert_eq!(p, vec!["openai", "anthropic", "gemini"]);
    }

    #[test]
    fn missing_credentials_disable_providers() {
        let llm = LlmConfig {
            priority: parse_priority(DEFAULT_PROVIDER_PRIORITY),
            openai_api_key: Some("sk-test".into()),
            openai_model: "m".into(),
            openai_base_url: None,
            anthropic_api_key: None,
            anthropic_model: "m".into(),
            gemini_api_key: None,
            gemini_model: "m".into(),
            temperature: 0.2,
            max_tokens: 100,
            timeout_secs: 5,
            min_response_chars: 10,
        };
        let ollama = OllamaConfig {
            enabled: false,
            url: "http://localhost:11434".into(),
            model: "llama3.2".into(),
        };
        assert!(llm.has_credentials("openai", &ollama));
        assert!(!llm.has_credentials("anthropic", &ollama));
        assert!(!llm.has_credentials("ollama", &ollama));
        assert_eq!(llm.configured_providers(), vec!["openai"]);
    }

    #[test]
    fn canonical_scoring_when_no_path() {
        let cfg = ScoringSource::default().load().unwrap();
        assert_eq!(cfg, ScoringConfig::canonical());
    }
}
