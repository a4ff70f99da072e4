//! Console logging setup.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static TRACING_INITIALIZED: OnceLock<bool> = OnceLock::new();

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs a console subscriber filtered by `RUST_LOG` (default `info`).
///
/// Only the first call to this function or [`init_json_tracing`] attempts
/// the install; every call returns whether that first attempt succeeded.
/// A subscriber installed elsewhere is left in place and yields `false`.
pub fn init_tracing() -> bool {
    *TRACING_INITIALIZED.get_or_init(|| {
        tracing_subscriber::registry()
            .with(env_filter())
            .with(fmt::layer().with_target(true))
            .try_init()
            .is_ok()
    })
}

/// Same as [`init_tracing`], with one JSON object per line.
pub fn init_json_tracing() -> bool {
    *TRACING_INITIALIZED.get_or_init(|| {
        tracing_subscriber::registry()
            .with(env_filter())
            .with(fmt::layer().json().with_current_span(true))
            .try_init()
            .is_ok()
    })
}
