//! `translate-proxyd` — the translation proxy daemon.
//!
//! Loads configuration, opens the cache backend, starts the background
//! maintainer thread, then runs the thread-per-connection HTTP server until
//! the process is asked to stop.

use std::sync::Arc;
use translate_proxy::cache::CacheFacade;
use translate_proxy::config::load_config;
use translate_proxy::maintainer::Maintainer;
use translate_proxy::output::print_error;
use translate_proxy::translator::Translator;

fn init_logging() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

fn main() {
    init_logging();

    let config = load_config();

    let cache = match CacheFacade::open(&config.cache) {
        Ok(cache) => Arc::new(cache),
        Err(e) => {
            print_error(&format!("failed to open cache backend: {e}"));
            std::process::exit(1);
        }
    };

    let translator = Arc::new(Translator::new(
        config.translator.clone(),
        config.resilience.clone(),
    ));

    let maintainer = Maintainer::spawn(
        Arc::clone(&cache),
        config.cache.ttl_days,
        config.cache.cleanup_enabled,
    );

    let result = translate_proxy::server::run(
        &config.server.bind_addr,
        Arc::clone(&cache),
        translator,
        config.resilience.clone(),
    );

    maintainer.shutdown();
    if let Err(e) = cache.shutdown() {
        tracing::warn!(error = %e, "failed to flush cache on shutdown");
    }

    if let Err(e) = result {
        print_error(&format!("server error: {e}"));
        std::process::exit(1);
    }
}
