pub mod catalog;
pub mod clippings;
pub mod config;
pub mod ingest;
pub mod mail;
pub mod models;

use env_logger::Env;
use std::sync::Once;

static LOGGER: Once = Once::new();

/// Initialize `env_logger` once; later calls are no-ops.
pub fn init_logger() {
    LOGGER.call_once(|| {
        let _ = env_logger::Builder::from_env(
            Env::default().default_filter_or("info,reqwest=warn,hyper=warn"),
        )
        .try_init();
    });
}
