//! `CpuMonitor` (§4.1), grounded on `calvin/runtime/north/resource_monitor/
//! cpu.py`'s `CpuMonitor`/`_set_avail_aux` read-old/remove/write/add order.

use crate::buckets::CPU_MIPS_BUCKETS;
use crate::scalar::{ScalarResourceConfig, ScalarResourceMonitor};
use mycelium_core::Result;
use mycelium_registry::Registry;
use mycelium_types::NodeId;
use std::sync::Arc;

pub struct CpuMonitor<R: Registry> {
    inner: ScalarResourceMonitor<R>,
}

impl<R: Registry> CpuMonitor<R> {
    pub fn new(registry: Arc<R>, node_id: NodeId) -> Self {
        Self {
            inner: ScalarResourceMonitor::new(
                registry,
                node_id,
                ScalarResourceConfig {
                    resource_name: "cpu",
                    avail_prefix: "nodeCpuAvail-",
                    total_prefix: "nodeCpuTotal-",
                    raw_prefix: "nodeCpu-",
                    total_buckets: CPU_MIPS_BUCKETS,
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

    pub async fn set_total_mips(&self, mips: u64) -> Result<()> {
        self.inner.set_total(mips).await
    }

    pub async fn avail_mips(&self) -> u64 {
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
    async fn set_avail_publishes_bucket_index_and_clears_old_one() {
        let registry = Arc::new(InMemoryRegistry::new());
        let node = NodeId::new();
        let monitor = CpuMonitor::new(registry.clone(), node);
        monitor.set_total_mips(1000).await.unwrap();

        monitor.set_avail(60.0).await.unwrap();
        let path = vec!["node".into(), "resource".into(), "cpuAvail".into(), "50".into()];
        assert!(registry.get_index(&path, 2).await.contains(&node.to_string()));
        assert_eq!(monitor.avail_mips().await, 500);

        monitor.set_avail(10.0).await.unwrap();
        assert!(!registry.get_index(&path, 2).await.contains(&node.to_string()));
        let new_path = vec!["node".into(), "resource".into(), "cpuAvail".into(), "0".into()];
        assert!(registry.get_index(&new_path, 2).await.contains(&node.to_string()));
    }

    #[tokio::test]
    async fn stop_clears_all_indices() {
        let registry = Arc::new(InMemoryRegistry::new());
        let node = NodeId::new();
        let monitor = CpuMonitor::new(registry.clone(), node);
        monitor.set_total_mips(1000).await.unwrap();
        monitor.set_avail(75.0).await.unwrap();

        monitor.stop().await.unwrap();

        let avail_path = vec!["node".into(), "resource".into(), "cpuAvail".into(), "75".into()];
        assert!(!registry.get_index(&avail_path, 2).await.contains(&node.to_string()));
        let total_path = vec!["node".into(), "attribute".into(), "cpuTotal".into(), "1000".into()];
        assert!(!registry.get_index(&total_path, 2).await.contains(&node.to_string()));
    }

    #[tokio::test]
    async fn batch_mode_suppresses_avail_update() {
        let registry = Arc::new(InMemoryRegistry::new());
        let node = NodeId::new();
        registry.set("", "batch", serde_json::json!(true)).await.unwrap();
        let monitor = CpuMonitor::new(registry.clone(), node);

        monitor.set_avail(90.0).await.unwrap();
        let path = vec!["node".into(), "resource".into(), "cpuAvail".into(), "100".into()];
        assert!(!registry.get_index(&path, 2).await.contains(&node.to_string()));
    }
}
