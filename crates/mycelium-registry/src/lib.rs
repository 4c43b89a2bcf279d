//! Distributed key/value store with prefixed keys and multi-level indices
//! (§2, §6). Only the in-memory reference backend is implemented —
//! persistence backends are explicitly out of scope (§1) beyond this
//! abstract contract, the same way an actor registry can sit behind an
//! in-memory reference implementation without committing callers to it.

mod index_iter;
mod memory;

pub use index_iter::IndexIter;
pub use memory::InMemoryRegistry;

use async_trait::async_trait;
use mycelium_core::Result;
use serde_json::Value;
use std::collections::HashSet;

/// The Registry interface consumed by every other component (§6).
///
/// Index paths are ordered path segments (`['node','resource','cpuAvail',
/// '100']`); `root_prefix_level` marks how many leading segments form the
/// "root" that a range query like `get_index_iter` groups under — e.g. a
/// caller asking for "nodes with ≥ bucket_k" scans only the sub-path at and
/// above that bucket.
#[async_trait]
pub trait Registry: Send + Sync {
    async fn get(&self, prefix: &str, key: &str) -> Result<Value>;
    async fn set(&self, prefix: &str, key: &str, value: Value) -> Result<()>;
    async fn delete(&self, prefix: &str, key: &str) -> Result<()>;

    async fn add_index(&self, index_path: &[String], value: &str, root_prefix_level: usize);
    async fn remove_index(&self, index_path: &[String], value: &str, root_prefix_level: usize);
    async fn get_index(&self, index_path: &[String], root_prefix_level: usize) -> HashSet<String>;

    /// Lazy-looking iterator over every value indexed at or below
    /// `index_path`. The in-memory backend has no real async streaming, so
    /// it runs the scan eagerly and hands back an already-`finalize`d
    /// iterator — callers (the matcher's `node_resource_min` fan-out) only
    /// ever observe the `.set_name`/`.append`/`.is_final` contract, never
    /// the backend's actual eagerness.
    async fn get_index_iter(&self, index_path: &[String]) -> IndexIter;

    /// Convenience over `get("", "batch")`: whether batch mode suppresses
    /// resource-monitor writes (§4.1, §4.4.7). Defaults to `false` if unset.
    async fn batch(&self) -> bool {
        match self.get("", "batch").await {
            Ok(Value::Bool(b)) => b,
            _ => false,
        }
    }
}
