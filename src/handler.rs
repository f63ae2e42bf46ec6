//! Request handler integration: ties the cache façade and translator
//! together via the five-step lookup-translate-reconcile flow.

use crate::cache::CacheFacade;
use crate::error::{ProxyError, Result};
use crate::translator::Translator;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The `POST /translate` request body. Timestamp/uuid/language code syntax
/// validation is assumed already performed upstream; this handler only
/// enforces non-emptiness.
#[derive(Debug, Clone, Deserialize)]
pub struct TranslateRequest {
    pub timestamp: String,
    pub uuid: String,
    pub from: String,
    pub to: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranslateResponse {
    pub uuid: String,
    pub translated_text: String,
    pub cached: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub code: &'static str,
    pub message: String,
}

impl From<&ProxyError> for ErrorEnvelope {
    fn from(err: &ProxyError) -> Self {
        Self {
            code: err.error_code(),
            message: err.to_string(),
        }
    }
}

/// Ties the cache façade to the external translator for a single request.
pub struct Handler {
    cache: Arc<CacheFacade>,
    translator: Arc<Translator>,
}

impl Handler {
    pub fn new(cache: Arc<CacheFacade>, translator: Arc<Translator>) -> Self {
        Self { cache, translator }
    }

    /// Handle one `/translate` request end to end: validate, look up, call
    /// out on miss/unconfirmed, reconcile, respond.
    pub fn handle_translate(&self, request: &TranslateRequest) -> Result<TranslateResponse> {
        validate_request(request)?;

        let lookup_now = chrono::Utc::now().timestamp();
        if let Some(outcome) = self.cache.lookup_confirmed(
            &request.from,
            &request.to,
            &request.text,
            lookup_now,
        )? {
            tracing::info!(uuid = %request.uuid, cached = true, "translate request served");
            return Ok(TranslateResponse {
                uuid: request.uuid.clone(),
                translated_text: outcome.translation().to_string(),
                cached: true,
            });
        }

        let translated = self
            .translator
            .translate(&request.from, &request.to, &request.text)?;

        let now = chrono::Utc::now().timestamp();
        let outcome = self.cache.reconcile_translation(
            &request.from,
            &request.to,
            &request.text,
            &translated,
            now,
        )?;

        tracing::info!(uuid = %request.uuid, cached = false, "translate request served");

        Ok(TranslateResponse {
            uuid: request.uuid.clone(),
            translated_text: outcome.translation().to_string(),
            cached: false,
        })
    }
}

fn validate_request(request: &TranslateRequest) -> Result<()> {
    if request.uuid.trim().is_empty() {
        return Err(ProxyError::Validation("uuid must not be empty".into()));
    }
    if request.timestamp.trim().is_empty() {
        return Err(ProxyError::Validation("timestamp must not be empty".into()));
    }
    if request.from.trim().is_empty() {
        return Err(ProxyError::Validation("from must not be empty".into()));
    }
    if request.to.trim().is_empty() {
        return Err(ProxyError::Validation("to must not be empty".into()));
    }
    if request.text.is_empty() {
        return Err(ProxyError::Validation("text must not be empty".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::text_backend::TextBackend;
    use crate::config::{ResilienceConfig, TranslatorConfig};

    fn request(from: &str, to: &str, text: &str) -> TranslateRequest {
        TranslateRequest {
            timestamp: "2026-07-29T00:00:00Z".into(),
            uuid: "11111111-1111-4111-8111-111111111111".into(),
            from: from.into(),
            to: to.into(),
            text: text.into(),
        }
    }

    #[test]
    fn rejects_empty_fields() {
        assert!(validate_request(&request("", "eng", "hi")).is_err());
        assert!(validate_request(&request("kor", "", "hi")).is_err());
        assert!(validate_request(&request("kor", "eng", "")).is_err());
    }

    #[test]
    fn accepts_well_formed_request() {
        assert!(validate_request(&request("kor", "eng", "안녕")).is_ok());
    }

    #[test]
    fn error_envelope_carries_stable_code() {
        let err = ProxyError::Validation("x".into());
        let envelope = ErrorEnvelope::from(&err);
        assert_eq!(envelope.code, "VALIDATION_ERROR");
    }

    #[test]
    fn handle_translate_rejects_malformed_request_before_touching_cache_or_translator() {
        let dir = tempfile::tempdir().unwrap();
        let backend = TextBackend::open(dir.path().join("cache.jsonl")).unwrap();
        let cache = Arc::new(CacheFacade::new(Box::new(backend), 2, 3600));
        let translator = Arc::new(Translator::new(
            TranslatorConfig::default(),
            ResilienceConfig::default(),
        ));
        let handler = Handler::new(cache, translator);

        let err = handler
            .handle_translate(&request("", "eng", "hi"))
            .unwrap_err();
        assert!(matches!(err, ProxyError::Validation(_)));
    }
}
