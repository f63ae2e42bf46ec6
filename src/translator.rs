//! Client for the external OpenAI-compatible chat-completion endpoint.
//!
//! Retries and backoff run through the circuit breaker and rate limiter
//! below, with every wait a blocking sleep rather than an async one, to
//! match the thread-per-connection server model.

use crate::config::{ResilienceConfig, TranslatorConfig};
use crate::error::{ProxyError, Result};
use crate::resilience::{CircuitBreaker, CircuitBreakerStats, RateLimiter};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

static CIRCUIT_BREAKER: OnceLock<CircuitBreaker> = OnceLock::new();
static RATE_LIMITER: OnceLock<RateLimiter> = OnceLock::new();
static HTTP_CLIENT: OnceLock<reqwest::blocking::Client> = OnceLock::new();

fn get_circuit_breaker(config: &ResilienceConfig) -> &'static CircuitBreaker {
    CIRCUIT_BREAKER.get_or_init(|| CircuitBreaker::new(config))
}

fn get_rate_limiter() -> &'static RateLimiter {
    RATE_LIMITER.get_or_init(RateLimiter::new)
}

fn get_http_client(resilience: &ResilienceConfig) -> &'static reqwest::blocking::Client {
    HTTP_CLIENT.get_or_init(|| {
        reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(resilience.timeout_secs))
            .connect_timeout(Duration::from_secs(resilience.connect_timeout_secs))
            .gzip(true)
            .build()
            .expect("failed to build http client")
    })
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Stateless wrapper around the configured chat-completion endpoint.
pub struct Translator {
    config: TranslatorConfig,
    resilience: ResilienceConfig,
}

impl Translator {
    pub fn new(config: TranslatorConfig, resilience: ResilienceConfig) -> Self {
        Self { config, resilience }
    }

    /// Translate `text` from `from_lang` to `to_lang`, retrying transient
    /// failures with circuit-breaker protection.
    pub fn translate(&self, from_lang: &str, to_lang: &str, text: &str) -> Result<String> {
        let cb = get_circuit_breaker(&self.resilience);
        let rl = get_rate_limiter();

        if !cb.allow_request() {
            return Err(ProxyError::CircuitOpen(
                self.resilience.circuit_breaker_reset_secs,
            ));
        }

        let mut last_error = None;

        for attempt in 0..self.resilience.max_retries {
            rl.wait_if_needed();

            match self.call_once(from_lang, to_lang, text) {
                Ok(result) => {
                    cb.record_success();
                    rl.record_success();
                    return Ok(result);
                }
                Err(e) => {
                    if let Some(retry_after) = e.retry_after_secs() {
                        rl.record_rate_limit(Some(retry_after));
                    } else if matches!(e, ProxyError::RateLimited { .. }) {
                        rl.record_rate_limit(None);
                    }

                    let is_retryable = e.is_retryable();
                    if !is_retryable || attempt == self.resilience.max_retries - 1 {
                        cb.record_failure();
                        return Err(e);
                    }

                    last_error = Some(e);

                    let base_delay = self.resilience.retry_base_delay_ms * (1u64 << attempt);
                    let jitter = fastrand::u64(0..100);
                    std::thread::sleep(Duration::from_millis(base_delay + jitter));
                }
            }
        }

        cb.record_failure();
        Err(last_error.unwrap_or_else(|| ProxyError::Translation("max retries exceeded".into())))
    }

    fn call_once(&self, from_lang: &str, to_lang: &str, text: &str) -> Result<String> {
        let api_key = self.config.api_key().ok_or_else(|| {
            ProxyError::Config(format!(
                "environment variable {} is not set",
                self.config.api_key_env
            ))
        })?;

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt(from_lang, to_lang),
                },
                ChatMessage {
                    role: "user",
                    content: text.to_string(),
                },
            ],
            temperature: 0.0,
        };

        let response = get_http_client(&self.resilience)
            .post(&self.config.base_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_secs = if status.as_u16() == 429 {
                response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
            } else {
                None
            };
            return Err(ProxyError::from_status_with_retry_after(
                status,
                retry_after_secs,
            ));
        }

        let body: ChatResponse = response.json()?;
        let translated = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ProxyError::Translation("empty choices in response".into()))?;

        if translated.trim().is_empty() {
            return Err(ProxyError::Translation("empty translation".into()));
        }

        Ok(translated)
    }
}

/// A fixed system prompt; no templating beyond language substitution.
fn system_prompt(from_lang: &str, to_lang: &str) -> String {
    format!(
        "You are a translation engine. Translate the user's message from \
         language code \"{from_lang}\" to language code \"{to_lang}\". \
         Respond with only the translated text and nothing else."
    )
}

/// Resilience statistics for the `/health` endpoint.
#[derive(Debug)]
pub struct ResilienceStats {
    pub circuit_breaker: CircuitBreakerStats,
    pub rate_limit_delay_ms: u64,
    pub rate_limit_hits: u32,
}

pub fn get_resilience_stats(resilience: &ResilienceConfig) -> ResilienceStats {
    ResilienceStats {
        circuit_breaker: get_circuit_breaker(resilience).stats(),
        rate_limit_delay_ms: get_rate_limiter().current_delay_ms(),
        rate_limit_hits: get_rate_limiter().rate_limit_hits(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_mentions_both_languages() {
        let prompt = system_prompt("kor", "eng");
        assert!(prompt.contains("kor"));
        assert!(prompt.contains("eng"));
    }

    #[test]
    fn missing_api_key_env_is_a_config_error() {
        // Use a env var name guaranteed unset.
        let config = TranslatorConfig {
            api_key_env: "TRANSLATE_PROXY_TEST_UNSET_KEY_XYZ".into(),
            ..TranslatorConfig::default()
        };
        let translator = Translator::new(config, ResilienceConfig::default());
        let err = translator.call_once("kor", "eng", "안녕").unwrap_err();
        assert!(matches!(err, ProxyError::Config(_)));
    }

    #[test]
    fn chat_request_serializes_expected_shape() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "sys".into(),
                },
                ChatMessage {
                    role: "user",
                    content: "hello".into(),
                },
            ],
            temperature: 0.0,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hello");
    }
}
