//! `LinkMonitor` (§4.1 last paragraph), grounded on `calvin/runtime/north/
//! resource_monitor/link.py`'s `LinkMonitor.start`/`stop` full-mesh
//! bootstrap and teardown (`_verify_links_init_step1/2`, `_create_links`,
//! `_delete_links_cb`).

use crate::buckets::{bandwidth_number2text, latency_number2text, nearest_bucket, BANDWIDTH_VALUES, LATENCY_VALUES};
use mycelium_core::{Error, Result};
use mycelium_registry::Registry;
use mycelium_types::{NodeId, PhysLinkId, PhysicalLink};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

const DEFAULT_BANDWIDTH_KBIT: u64 = 1_000_000; // max bucket, "1G"
const DEFAULT_LATENCY_US: u64 = 100; // min bucket, "100us"

pub struct LinkMonitor<R: Registry> {
    registry: Arc<R>,
}

fn rt_key(a: NodeId, b: NodeId) -> String {
    if a.uuid() <= b.uuid() {
        format!("{a}|{b}")
    } else {
        format!("{b}|{a}")
    }
}

impl<R: Registry> LinkMonitor<R> {
    pub fn new(registry: Arc<R>) -> Self {
        Self { registry }
    }

    fn phys_links_index_path(node: NodeId) -> Vec<String> {
        vec!["phyLinks".into(), node.to_string()]
    }

    fn bandwidth_index_path(bucket: u64) -> Vec<String> {
        vec!["links".into(), "resource".into(), "bandwidth".into(), bucket.to_string()]
    }

    fn latency_index_path(bucket: u64) -> Vec<String> {
        vec!["links".into(), "resource".into(), "latency".into(), bucket.to_string()]
    }

    pub async fn find_phys_link(&self, a: NodeId, b: NodeId) -> Option<PhysLinkId> {
        self.registry
            .get("rt-link-", &rt_key(a, b))
            .await
            .ok()
            .and_then(|v| v.as_str().and_then(|s| s.parse().ok()))
    }

    pub async fn get_info(&self, id: PhysLinkId) -> Result<PhysicalLink> {
        let raw = self.registry.get("phyLink-", &id.to_string()).await?;
        serde_json::from_value(raw).map_err(|e| Error::configuration(e.to_string()))
    }

    async fn store_link(&self, link: &PhysicalLink) -> Result<()> {
        self.registry
            .set("phyLink-", &link.id.to_string(), serde_json::to_value(link).unwrap())
            .await?;
        self.registry
            .set("rt-link-", &rt_key(link.runtime1, link.runtime2), json!(link.id.to_string()))
            .await?;
        self.registry
            .add_index(&Self::phys_links_index_path(link.runtime1), &link.id.to_string(), 1)
            .await;
        self.registry
            .add_index(&Self::phys_links_index_path(link.runtime2), &link.id.to_string(), 1)
            .await;
        Ok(())
    }

    async fn create_default_link(&self, a: NodeId, b: NodeId) -> Result<PhysLinkId> {
        let link = PhysicalLink {
            id: PhysLinkId::new(),
            runtime1: a,
            runtime2: b,
            bandwidth: DEFAULT_BANDWIDTH_KBIT,
            latency: DEFAULT_LATENCY_US,
        };
        self.store_link(&link).await?;
        self.registry
            .add_index(&Self::bandwidth_index_path(link.bandwidth), &link.id.to_string(), 3)
            .await;
        self.registry
            .add_index(&Self::latency_index_path(link.latency), &link.id.to_string(), 3)
            .await;
        debug!(%a, %b, id = %link.id, "bootstrapped default physical link");
        Ok(link.id)
    }

    /// Bootstrap a full mesh between `own_node` and every other known node:
    /// confirm a `phyLink-` record exists, or create one at max
    /// bandwidth / zero latency.
    pub async fn start(&self, own_node: NodeId, known_nodes: &[NodeId]) -> Result<()> {
        for &peer in known_nodes {
            if peer == own_node {
                continue;
            }
            if self.find_phys_link(own_node, peer).await.is_none() {
                self.create_default_link(own_node, peer).await?;
            }
        }
        info!(%own_node, peers = known_nodes.len(), "link mesh bootstrapped");
        Ok(())
    }

    /// Tear down every physical link touching `own_node`, symmetrically.
    pub async fn stop(&self, own_node: NodeId) -> Result<()> {
        let ids = self
            .registry
            .get_index(&Self::phys_links_index_path(own_node), 1)
            .await;

        for id_str in ids {
            let Ok(id) = id_str.parse::<PhysLinkId>() else { continue };
            let Ok(link) = self.get_info(id).await else { continue };

            self.registry
                .remove_index(&Self::phys_links_index_path(link.runtime1), &id_str, 1)
                .await;
            self.registry
                .remove_index(&Self::phys_links_index_path(link.runtime2), &id_str, 1)
                .await;
            self.registry
                .remove_index(&Self::bandwidth_index_path(link.bandwidth), &id_str, 3)
                .await;
            self.registry
                .remove_index(&Self::latency_index_path(link.latency), &id_str, 3)
                .await;
            self.registry.delete("phyLink-", &id_str).await?;
            self.registry
                .delete("rt-link-", &rt_key(link.runtime1, link.runtime2))
                .await?;
        }
        Ok(())
    }

    /// Snap `value` (kbit/s) to the nearest bucket and publish it. Out-of-
    /// range input snaps to the closest defined bucket rather than being
    /// rejected (§9 Open Question: "clamp, do not reject").
    pub async fn set_bandwidth(&self, id: PhysLinkId, value_kbit: u64) -> Result<()> {
        let bucket = nearest_bucket(BANDWIDTH_VALUES, value_kbit);
        let mut link = self.get_info(id).await?;
        if link.bandwidth == bucket {
            return Ok(());
        }
        self.registry
            .remove_index(&Self::bandwidth_index_path(link.bandwidth), &id.to_string(), 3)
            .await;
        link.bandwidth = bucket;
        self.store_link(&link).await?;
        self.registry
            .add_index(&Self::bandwidth_index_path(bucket), &id.to_string(), 3)
            .await;
        debug!(%id, label = bandwidth_number2text(bucket), "bandwidth updated");
        Ok(())
    }

    pub async fn set_latency(&self, id: PhysLinkId, value_us: u64) -> Result<()> {
        let bucket = nearest_bucket(LATENCY_VALUES, value_us);
        let mut link = self.get_info(id).await?;
        if link.latency == bucket {
            return Ok(());
        }
        self.registry
            .remove_index(&Self::latency_index_path(link.latency), &id.to_string(), 3)
            .await;
        link.latency = bucket;
        self.store_link(&link).await?;
        self.registry
            .add_index(&Self::latency_index_path(bucket), &id.to_string(), 3)
            .await;
        debug!(%id, label = latency_number2text(bucket), "latency updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mycelium_registry::InMemoryRegistry;

    #[tokio::test]
    async fn start_bootstraps_full_mesh_with_defaults() {
        let registry = Arc::new(InMemoryRegistry::new());
        let monitor = LinkMonitor::new(registry.clone());
        let a = NodeId::new();
        let b = NodeId::new();
        let c = NodeId::new();

        monitor.start(a, &[a, b, c]).await.unwrap();

        let ab = monitor.find_phys_link(a, b).await.unwrap();
        let ac = monitor.find_phys_link(a, c).await.unwrap();
        assert_ne!(ab, ac);

        let info = monitor.get_info(ab).await.unwrap();
        assert_eq!(info.bandwidth, DEFAULT_BANDWIDTH_KBIT);
        assert_eq!(info.latency, DEFAULT_LATENCY_US);
    }

    #[tokio::test]
    async fn set_bandwidth_moves_the_index_bucket() {
        let registry = Arc::new(InMemoryRegistry::new());
        let monitor = LinkMonitor::new(registry.clone());
        let a = NodeId::new();
        let b = NodeId::new();
        monitor.start(a, &[a, b]).await.unwrap();
        let id = monitor.find_phys_link(a, b).await.unwrap();

        monitor.set_bandwidth(id, 10_000).await.unwrap();

        let old_path = vec!["links".into(), "resource".into(), "bandwidth".into(), DEFAULT_BANDWIDTH_KBIT.to_string()];
        let new_path = vec!["links".into(), "resource".into(), "bandwidth".into(), "10000".into()];
        assert!(!registry.get_index(&old_path, 3).await.contains(&id.to_string()));
        assert!(registry.get_index(&new_path, 3).await.contains(&id.to_string()));
    }

    #[tokio::test]
    async fn stop_tears_down_symmetrically() {
        let registry = Arc::new(InMemoryRegistry::new());
        let monitor = LinkMonitor::new(registry.clone());
        let a = NodeId::new();
        let b = NodeId::new();
        monitor.start(a, &[a, b]).await.unwrap();
        let id = monitor.find_phys_link(a, b).await.unwrap();

        monitor.stop(a).await.unwrap();

        assert!(monitor.get_info(id).await.is_err());
        assert!(monitor.find_phys_link(a, b).await.is_none());
        let path_b = vec!["phyLinks".into(), b.to_string()];
        assert!(registry.get_index(&path_b, 1).await.is_empty());
    }
}
