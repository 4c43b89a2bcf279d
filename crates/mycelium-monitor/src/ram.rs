//! `RamMonitor` (§4.1): same discipline as `CpuMonitor`, different bucket
//! table and key prefixes.

use crate::buckets::RAM_BYTES_BUCKETS;
use crate::scalar::{ScalarResourceConfig, ScalarResourceMonitor};
use mycelium_core::Result;
use mycelium_registry::Registry;
use mycelium_types::NodeId;
use std::sync::Arc;

pub struct RamMonitor<R: Registry> {
    inner: ScalarResourceMonitor<R>,
}

impl<R: Registry> RamMonitor<R> {
    pub fn new(registry: Arc<R>, node_id: NodeId) -> Self {
        Self {
            inner: ScalarResourceMonitor::new(
                registry,
                node_id,
                ScalarResourceConfig {
                    resource_name: "mem",
                    avail_prefix: "nodeMemAvail-",
                    total_prefix: "nodeMemTotal-",
                    raw_prefix: "nodeRam-",
                    total_buckets: RAM_BYTES_BUCKETS,
                },
            ),
        }
    }

    pub async fn set_avail(&self, pct: f64) -> Result<()> {
        self.inner.set_avail(pct).await
    }

    pub async fn force_set_avail(&self, pct: f64) -> Result<()> {
        self.inner.force_set_avail(pct).await
    }

    pub async fn set_total_bytes(&self, bytes: u64) -> Result<()> {
        self.inner.set_total(bytes).await
    }

    pub async fn avail_bytes(&self) -> u64 {
        self.inner.raw_avail().await
    }

    pub async fn stop(&self) -> Result<()> {
        self.inner.stop().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mycelium_registry::InMemoryRegistry;

    #[tokio::test]
    async fn set_avail_round_trips_through_bucket() {
        let registry = Arc::new(InMemoryRegistry::new());
        let node = NodeId::new();
        let monitor = RamMonitor::new(registry.clone(), node);
        monitor.set_total_bytes(1_000_000_000).await.unwrap();
        monitor.set_avail(50.0).await.unwrap();
        assert_eq!(monitor.avail_bytes().await, 500_000_000);

        let path = vec!["node".into(), "resource".into(), "memAvail".into(), "50".into()];
        assert!(registry.get_index(&path, 2).await.contains(&node.to_string()));
    }
}
