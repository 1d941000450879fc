//! Environment configuration
//!
//! Binaries call `dotenv::dotenv()` first, then [`AppConfig::from_env`].

use crate::completion::CompletionService;
use crate::error::AgentError;
use crate::gemini::{GeminiClient, RetryPolicy, DEFAULT_MODEL};
use crate::router::RouterConfig;
use crate::Result;
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Absent → fallback-only routing
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub ai_timeout: Duration,
    pub ai_max_attempts: u32,
    pub ai_retry_base: Duration,
    pub context_max_messages: usize,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_model: DEFAULT_MODEL.to_string(),
            ai_timeout: Duration::from_millis(8_000),
            ai_max_attempts: 2,
            ai_retry_base: Duration::from_millis(250),
            context_max_messages: 10,
            port: 8080,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; malformed numbers are errors
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get("PORT").or_else(|| get("API_PORT")) {
            Some(raw) => parse_value("PORT", &raw)?,
            None => defaults.port,
        };

        Ok(Self {
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: get("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            ai_timeout: get("AI_TIMEOUT_MS")
                .map(|raw| parse_value("AI_TIMEOUT_MS", &raw).map(Duration::from_millis))
                .transpose()?
                .unwrap_or(defaults.ai_timeout),
            ai_max_attempts: get("AI_MAX_ATTEMPTS")
                .map(|raw| parse_value("AI_MAX_ATTEMPTS", &raw))
                .transpose()?
                .unwrap_or(defaults.ai_max_attempts),
            ai_retry_base: get("AI_RETRY_BASE_MS")
                .map(|raw| parse_value("AI_RETRY_BASE_MS", &raw).map(Duration::from_millis))
                .transpose()?
                .unwrap_or(defaults.ai_retry_base),
            context_max_messages: get("CONTEXT_MAX_MESSAGES")
                .map(|raw| parse_value("CONTEXT_MAX_MESSAGES", &raw))
                .transpose()?
                .unwrap_or(defaults.context_max_messages),
            port,
        })
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            ai_timeout: self.ai_timeout,
            max_context_messages: self.context_max_messages,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.ai_max_attempts, self.ai_retry_base)
    }

    /// Gemini client when a key is configured
    pub fn completion_service(&self) -> Result<Option<Arc<dyn CompletionService>>> {
        let Some(key) = self.gemini_api_key.clone() else {
            warn!("GEMINI_API_KEY not set, routing with pattern fallback only");
            return Ok(None);
        };

        let client = GeminiClient::new(key, &self.gemini_model, self.retry_policy())?;
        Ok(Some(Arc::new(client)))
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse::<T>()
        .map_err(|_| AgentError::ConfigError(format!("{} has an invalid value: '{}'", key, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();

        assert!(config.gemini_api_key.is_none());
        assert_eq!(config.gemini_model, DEFAULT_MODEL);
        assert_eq!(config.port, 8080);
        assert_eq!(config.router_config().max_context_messages, 10);
        assert!(config.completion_service().unwrap().is_none());
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "secret"),
            ("GEMINI_MODEL", "gemini-1.5-pro"),
            ("AI_TIMEOUT_MS", "1500"),
            ("AI_MAX_ATTEMPTS", "4"),
            ("AI_RETRY_BASE_MS", "100"),
            ("CONTEXT_MAX_MESSAGES", "6"),
            ("API_PORT", "9000"),
        ]))
        .unwrap();

        assert_eq!(config.gemini_api_key.as_deref(), Some("secret"));
        assert_eq!(config.ai_timeout, Duration::from_millis(1500));
        assert_eq!(config.retry_policy().max_attempts, 4);
        assert_eq!(config.retry_policy().base_delay, Duration::from_millis(100));
        assert_eq!(config.context_max_messages, 6);
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn test_port_takes_precedence() {
        let config =
            AppConfig::from_lookup(lookup(&[("PORT", "3000"), ("API_PORT", "9000")])).unwrap();
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_blank_key_means_disabled() {
        let config = AppConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "  ")])).unwrap();
        assert!(config.gemini_api_key.is_none());
    }

    #[test]
    fn test_malformed_number_is_config_error() {
        let result = AppConfig::from_lookup(lookup(&[("AI_TIMEOUT_MS", "soon")]));
        assert!(matches!(result, Err(AgentError::ConfigError(_))));

        let result = AppConfig::from_lookup(lookup(&[("PORT", "99999")]));
        assert!(matches!(result, Err(AgentError::ConfigError(_))));
    }
}
