//! Reasoner configuration loaded from `.env` / environment.
//!
//! Everything the pipeline needs from the outside world lives here: the oracle
//! endpoint and credentials, the trace database path, and the provision
//! catalog path. No process-wide singletons; the gateway builds the config
//! once and injects it into the collaborators it constructs.

use serde::{Deserialize, Serialize};

const DEFAULT_ORACLE_ENDPOINT: &str = "https://openrouter.ai/api/v1";
const DEFAULT_ORACLE_MODEL: &str = "openai/gpt-4.1";
const DEFAULT_TRACE_DB_PATH: &str = "./data/ukfw_traces";
const DEFAULT_PROVISION_CATALOG: &str = "./data/provisions.json";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";

/// Oracle (LLM) connection settings.
///
/// | Env | Default | Description |
/// |-----|---------|-------------|
/// | UKFW_ORACLE_ENDPOINT | openrouter.ai/api/v1 | OpenAI-compatible API base. |
/// | UKFW_ORACLE_API_KEY / OPENROUTER_API_KEY | (none) | Bearer token. |
/// | UKFW_ORACLE_MODEL | openai/gpt-4.1 | Model identifier recorded on every step. |
/// | UKFW_ORACLE_TIMEOUT_SECS | 60 | Per-call HTTP timeout. |
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ORACLE_ENDPOINT.to_string(),
            api_key: None,
            model: DEFAULT_ORACLE_MODEL.to_string(),
            timeout_secs: 60,
            temperature: 0.7,
            max_tokens: 2048,
        }
    }
}

impl OracleConfig {
    /// Load oracle settings from environment. Unset or invalid => defaults.
    pub fn from_env() -> Self {
        let api_key = env_opt_string("UKFW_ORACLE_API_KEY")
            .or_else(|| env_opt_string("OPENROUTER_API_KEY"));
        Self {
            endpoint: env_string("UKFW_ORACLE_ENDPOINT", DEFAULT_ORACLE_ENDPOINT),
            api_key,
            model: env_string("UKFW_ORACLE_MODEL", DEFAULT_ORACLE_MODEL),
            timeout_secs: env_u64("UKFW_ORACLE_TIMEOUT_SECS", 60),
            temperature: env_f32("UKFW_ORACLE_TEMPERATURE", 0.7).clamp(0.0, 2.0),
            max_tokens: env_u64("UKFW_ORACLE_MAX_TOKENS", 2048) as u32,
        }
    }
}

/// Top-level reasoner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonerConfig {
    pub oracle: OracleConfig,
    /// Sled database holding one persisted trace per task id.
    pub trace_db_path: String,
    /// JSON provision catalog consumed by the grounding lookup.
    pub provision_catalog_path: String,
    /// Gateway bind address.
    pub bind_addr: String,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            oracle: OracleConfig::default(),
            trace_db_path: DEFAULT_TRACE_DB_PATH.to_string(),
            provision_catalog_path: DEFAULT_PROVISION_CATALOG.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

impl ReasonerConfig {
    pub fn from_env() -> Self {
        Self {
            oracle: OracleConfig::from_env(),
            trace_db_path: env_string("UKFW_TRACE_DB_PATH", DEFAULT_TRACE_DB_PATH),
            provision_catalog_path: env_string("UKFW_PROVISION_CATALOG", DEFAULT_PROVISION_CATALOG),
            bind_addr: env_string("UKFW_BIND_ADDR", DEFAULT_BIND_ADDR),
        }
    }
}

fn env_string(name: &str, default: &str) -> String {
    env_opt_string(name).unwrap_or_else(|| default.to_string())
}

fn env_opt_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_u64(name: &str, default: u64) -> u64 {
    match std::env::var(name) {
        Ok(v) => v.trim().parse().unwrap_or(default),
        Err(_) => default,
    }
}

fn env_f32(name: &str, default: f32) -> f32 {
    match std::env::var(name) {
        Ok(v) => v.trim().parse().unwrap_or(default),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = ReasonerConfig::default();
        assert_eq!(cfg.oracle.timeout_secs, 60);
        assert!(cfg.oracle.api_key.is_none());
        assert_eq!(cfg.bind_addr, "127.0.0.1:8000");
    }
}
