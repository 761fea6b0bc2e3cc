use anyhow::{Context, Result, bail};
use compliance_flow::FlowConfig;
use compliance_flow::llm::openrouter::DEFAULT_MODEL;
use compliance_flow::pdf::DEFAULT_BRAND;
use compliance_flow::speech::{DEFAULT_TTS_MODEL, DEFAULT_VOICE};
use std::time::Duration;

/// Process configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub openrouter_api_key: String,
    pub llm_model: String,
    /// Speech requests end in an `error` status when unset
    pub gemini_api_key: Option<String>,
    pub tts_model: String,
    pub tts_voice: String,
    pub port: u16,
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub brand_name: String,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = FlowConfig::default();

        let Some(openrouter_api_key) = var("OPENROUTER_API_KEY") else {
            bail!("OPENROUTER_API_KEY environment variable is required");
        };

        let port = match var("PORT") {
            Some(port) => port.parse().context("PORT must be a valid port number")?,
            None => 3000,
        };
        let batch_size = match var("BATCH_SIZE") {
            Some(size) => size.parse().context("BATCH_SIZE must be a positive integer")?,
            None => defaults.batch_size,
        };
        let batch_delay = match var("BATCH_DELAY_MS") {
            Some(ms) => Duration::from_millis(ms.parse().context("BATCH_DELAY_MS must be an integer")?),
            None => defaults.batch_delay,
        };

        Ok(Self {
            openrouter_api_key,
            llm_model: var("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            gemini_api_key: var("GEMINI_API_KEY"),
            tts_model: var("TTS_MODEL").unwrap_or_else(|| DEFAULT_TTS_MODEL.to_string()),
            tts_voice: var("TTS_VOICE").unwrap_or_else(|| DEFAULT_VOICE.to_string()),
            port,
            batch_size,
            batch_delay,
            brand_name: var("BRAND_NAME").unwrap_or_else(|| DEFAULT_BRAND.to_string()),
        })
    }

    pub fn flow_config(&self) -> FlowConfig {
        FlowConfig::default().with_batching(self.batch_size, self.batch_delay)
    }
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
    fn defaults_apply_when_only_key_is_set() {
        let config = ServiceConfig::from_lookup(lookup(&[("OPENROUTER_API_KEY", "k")])).unwrap();
        assert_eq!(config.llm_model, "google/gemini-2.5-flash");
        assert_eq!(config.port, 3000);
        assert_eq!(config.tts_voice, "Kore");
        assert_eq!(config.brand_name, "DentEdTeck");
        assert_eq!(config.gemini_api_key, None);
        assert_eq!(config.flow_config().batch_size, 5);
        assert_eq!(config.flow_config().batch_delay, Duration::from_millis(500));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("OPENROUTER_API_KEY", "k"),
            ("PORT", "8080"),
            ("BATCH_SIZE", "3"),
            ("BATCH_DELAY_MS", "0"),
            ("GEMINI_API_KEY", "g"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.flow_config().batch_size, 3);
        assert_eq!(config.flow_config().batch_delay, Duration::ZERO);
        assert_eq!(config.gemini_api_key.as_deref(), Some("g"));
    }

    #[test]
    fn missing_key_or_bad_number_is_an_error() {
        assert!(ServiceConfig::from_lookup(lookup(&[])).is_err());
        assert!(
            ServiceConfig::from_lookup(lookup(&[("OPENROUTER_API_KEY", "k"), ("PORT", "http")]))
                .is_err()
        );
    }
}
