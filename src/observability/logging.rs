//! Structured logging setup.
//!
//! `RUST_LOG` takes precedence; otherwise the configured level applies to
//! this crate and `tower_http`, with everything else at `warn`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber. Safe to call more than once; later
/// calls are ignored.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

fn default_directives(level: &str) -> String {
    format!("warn,upstream_bridge={level},tower_http={level}")
}
