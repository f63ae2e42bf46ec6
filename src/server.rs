//! Thread-per-connection HTTP server: one OS thread per accepted connection,
//! no async executor. `tiny_http` supplies the minimum framing needed to
//! receive the JSON envelope; everything past that is this crate's own
//! dispatch and handler logic.

use crate::cache::CacheFacade;
use crate::config::ResilienceConfig;
use crate::handler::{Handler, TranslateRequest};
use crate::translator::{self, Translator};
use serde_json::{json, Value};
use std::io::Read;
use std::sync::Arc;
use tiny_http::{Header, Method, Response, Server};

/// Run the accept loop until the listener is closed or the process exits.
/// Each accepted connection is served on its own spawned thread; the facade
/// lock is never held across the blocking external-translator call — it is
/// released by `CacheFacade::lookup_confirmed` before returning, and
/// re-acquired only inside `reconcile_translation`.
pub fn run(
    bind_addr: &str,
    cache: Arc<CacheFacade>,
    translator: Arc<Translator>,
    resilience: ResilienceConfig,
) -> std::io::Result<()> {
    let server = Server::http(bind_addr)
        .map_err(|e| std::io::Error::other(format!("failed to bind {bind_addr}: {e}")))?;

    tracing::info!(addr = %bind_addr, "translate-proxy listening");

    let handler = Arc::new(Handler::new(Arc::clone(&cache), translator));

    for request in server.incoming_requests() {
        let handler = Arc::clone(&handler);
        let cache = Arc::clone(&cache);
        let resilience = resilience.clone();
        std::thread::spawn(move || {
            serve_one(request, &handler, &cache, &resilience);
        });
    }

    Ok(())
}

fn serve_one(
    mut request: tiny_http::Request,
    handler: &Handler,
    cache: &CacheFacade,
    resilience: &ResilienceConfig,
) {
    let method = request.method().clone();
    let url = request.url().to_string();
    let start = std::time::Instant::now();

    let (status, body) = match (&method, url.as_str()) {
        (Method::Post, "/translate") => route_translate(&mut request, handler),
        (Method::Get, "/health") => route_health(cache, resilience),
        _ => (
            404,
            json!({"code": "NOT_FOUND", "message": "no such route"}),
        ),
    };

    let elapsed_ms = start.elapsed().as_millis();
    let header = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
        .expect("static header is valid");
    let response = Response::from_string(body.to_string())
        .with_status_code(status)
        .with_header(header);

    if request.respond(response).is_err() {
        tracing::warn!(%url, "failed to write response");
    }

    tracing::info!(%method, %url, status, elapsed_ms, "request handled");
}

fn route_translate(request: &mut tiny_http::Request, handler: &Handler) -> (u16, Value) {
    let mut body = String::new();
    if let Err(e) = request.as_reader().read_to_string(&mut body) {
        return (
            400,
            json!({"code": "MALFORMED_BODY", "message": format!("failed to read body: {e}")}),
        );
    }

    let parsed: TranslateRequest = match serde_json::from_str(&body) {
        Ok(r) => r,
        Err(e) => {
            return (
                400,
                json!({"code": "MALFORMED_BODY", "message": format!("invalid JSON: {e}")}),
            )
        }
    };

    match handler.handle_translate(&parsed) {
        Ok(response) => (200, serde_json::to_value(response).expect("response serializes")),
        Err(e) => {
            let status = e.http_status();
            (
                status,
                json!({"code": e.error_code(), "message": e.to_string()}),
            )
        }
    }
}

fn route_health(cache: &CacheFacade, resilience: &ResilienceConfig) -> (u16, Value) {
    let now = chrono::Utc::now().timestamp();
    match cache.stats(now) {
        Ok(stats) => {
            let resilience_stats = translator::get_resilience_stats(resilience);
            (
                200,
                json!({
                    "status": "ok",
                    "cache": {
                        "total": stats.total,
                        "active": stats.active,
                        "expired": stats.expired,
                    },
                    "circuit_breaker": format!("{:?}", resilience_stats.circuit_breaker.state),
                }),
            )
        }
        Err(e) => (
            500,
            json!({"code": "INTERNAL_ERROR", "message": e.to_string()}),
        ),
    }
}

