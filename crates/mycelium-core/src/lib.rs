//! Shared error type, logging bootstrap and time helpers.
//!
//! Every other `mycelium-*` crate depends on this one instead of reading
//! process-wide state or rolling its own error type.

mod error;
mod time;

pub use error::{Error, Result};
pub use time::now_ns;

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Install a global `tracing` subscriber. Safe to call more than once (and
/// from more than one binary/test in the same process) — only the first
/// call takes effect.
pub fn init_tracing(json: bool) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
        if json {
            subscriber.json().init();
        } else {
            subscriber.init();
        }
    });
}
