//! Core error type (spec §7 "Error kinds").

use thiserror::Error;

/// Errors surfaced by the placement and reconfiguration core.
///
/// One variant per §7 error kind. All errors ultimately reach their caller
/// through a single result callback/future — nothing here is meant to
/// unwind across an event-loop boundary.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// A Registry key was missing. Callers decide the fallback (treat as
    /// zero, skip, or retry) per §7 — this variant only carries the key.
    #[error("not found: {key}")]
    NotFound { key: String },

    /// A second placement was requested while one was already in flight.
    #[error("placement already in flight for application {app_id}")]
    Reentry { app_id: String },

    /// The deploy watchdog expired before the placement converged.
    #[error("placement for application {app_id} timed out after {timeout_ms}ms")]
    Timeout { app_id: String, timeout_ms: u64 },

    /// An RPC to a peer node failed during a destroy or lazy-resource fetch.
    #[error("peer unreachable: node {node_id} ({reason})")]
    PeerUnreachable { node_id: String, reason: String },

    /// A `set_avail`/`set_bandwidth`/`set_latency` value was out of range.
    /// Clamped, not rejected — see spec §9 Open Question 2.
    #[error("invalid bucket value {value} for {resource}, clamped")]
    InvalidBucket { resource: String, value: f64 },

    /// Catch-all for configuration and construction errors that don't fit
    /// the above (bad TOML, missing section, malformed requirement clause).
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

/// Result alias used throughout the placement core instead of `anyhow::Result`.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn reentry(app_id: impl Into<String>) -> Self {
        Self::Reentry { app_id: app_id.into() }
    }

    pub fn timeout(app_id: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout { app_id: app_id.into(), timeout_ms }
    }

    pub fn peer_unreachable(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PeerUnreachable { node_id: node_id.into(), reason: reason.into() }
    }

    pub fn invalid_bucket(resource: impl Into<String>, value: f64) -> Self {
        Self::InvalidBucket { resource: resource.into(), value }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }
}
