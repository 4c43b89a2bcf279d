//! Shared machinery behind `CpuMonitor` and `RamMonitor`: both publish an
//! availability percentage and a total capacity for one node, under the
//! same read-old → remove-old → write-new → add-new discipline (§4.1,
//! §5 "Shared-resource policy"). Parameterized instead of duplicated,
//! since the two monitors differ only in key prefixes and the total-bucket
//! table.

use crate::buckets::{floor_bucket, round_avail_pct};
use mycelium_core::Result;
use mycelium_registry::Registry;
use mycelium_types::NodeId;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ScalarResourceConfig {
    /// `"cpu"` or `"ram"`, used only in index category names.
    pub resource_name: &'static str,
    pub avail_prefix: &'static str,
    pub total_prefix: &'static str,
    /// Absolute-units raw key the planner reads (`nodeCpu-`/`nodeRam-`).
    pub raw_prefix: &'static str,
    pub total_buckets: &'static [u64],
}

pub struct ScalarResourceMonitor<R: Registry> {
    registry: Arc<R>,
    node_id: NodeId,
    cfg: ScalarResourceConfig,
}

impl<R: Registry> ScalarResourceMonitor<R> {
    pub fn new(registry: Arc<R>, node_id: NodeId, cfg: ScalarResourceConfig) -> Self {
        Self { registry, node_id, cfg }
    }

    fn avail_index_path(&self, bucket: u32) -> Vec<String> {
        vec![
            "node".into(),
            "resource".into(),
            format!("{}Avail", self.cfg.resource_name),
            bucket.to_string(),
        ]
    }

    fn total_index_path(&self, bucket: u64) -> Vec<String> {
        vec![
            "node".into(),
            "attribute".into(),
            format!("{}Total", self.cfg.resource_name),
            bucket.to_string(),
        ]
    }

    /// Publish a new availability percentage. Suppressed while `batch` mode
    /// is set in the Registry (§4.1) — call [`Self::force_set_avail`] for
    /// the planner's explicit batch write-back, which must bypass this.
    pub async fn set_avail(&self, pct: f64) -> Result<()> {
        if self.registry.batch().await {
            debug!(node_id = %self.node_id, pct, "batch mode: avail update suppressed");
            return Ok(());
        }
        self.force_set_avail(pct).await
    }

    /// Apply an availability update unconditionally, ignoring `batch` mode.
    pub async fn force_set_avail(&self, pct: f64) -> Result<()> {
        let (bucket, clamped) = round_avail_pct(pct);
        if clamped {
            warn!(node_id = %self.node_id, pct, "avail value out of range, clamped");
        }
        let id = self.node_id.to_string();

        let old_bucket = self
            .registry
            .get(self.cfg.avail_prefix, &id)
            .await
            .ok()
            .and_then(|v| v.as_f64())
            .map(|v| round_avail_pct(v).0);

        if old_bucket == Some(bucket) {
            return Ok(());
        }

        if let Some(old) = old_bucket {
            self.registry
                .remove_index(&self.avail_index_path(old), &id, 2)
                .await;
        }

        self.registry
            .set(self.cfg.avail_prefix, &id, json!(pct.clamp(0.0, 100.0)))
            .await?;
        self.registry
            .add_index(&self.avail_index_path(bucket), &id, 2)
            .await;

        let total = self.total_raw().await;
        let absolute = (pct.clamp(0.0, 100.0) / 100.0) * total as f64;
        self.registry
            .set(self.cfg.raw_prefix, &id, json!(absolute as u64))
            .await?;

        Ok(())
    }

    /// Publish total capacity (called once, at node registration).
    pub async fn set_total(&self, raw: u64) -> Result<()> {
        let (bucket, clamped) = floor_bucket(self.cfg.total_buckets, raw);
        if clamped {
            warn!(node_id = %self.node_id, raw, "total capacity below smallest bucket, clamped");
        }
        let id = self.node_id.to_string();

        let old_bucket = self
            .registry
            .get(self.cfg.total_prefix, &id)
            .await
            .ok()
            .and_then(|v| v.as_u64())
            .map(|v| floor_bucket(self.cfg.total_buckets, v).0);

        if old_bucket == Some(bucket) {
            return Ok(());
        }

        if let Some(old) = old_bucket {
            self.registry
                .remove_index(&self.total_index_path(old), &id, 2)
                .await;
        }

        self.registry.set(self.cfg.total_prefix, &id, json!(raw)).await?;
        self.registry
            .add_index(&self.total_index_path(bucket), &id, 2)
            .await;
        Ok(())
    }

    async fn total_raw(&self) -> u64 {
        // NOT_FOUND treated as value=0 for resource totals (§7).
        self.registry
            .get(self.cfg.total_prefix, &self.node_id.to_string())
            .await
            .ok()
            .and_then(|v| v.as_u64())
            .unwrap_or(0)
    }

    /// Current available amount in absolute units (mips/bytes), as the
    /// planner reads it (`nodeCpu-`/`nodeRam-`).
    pub async fn raw_avail(&self) -> u64 {
        self.registry
            .get(self.cfg.raw_prefix, &self.node_id.to_string())
            .await
            .ok()
            .and_then(|v| v.as_u64())
            .unwrap_or(0)
    }

    /// De-register: remove this node from every bucket it currently
    /// occupies for this resource.
    pub async fn stop(&self) -> Result<()> {
        let id = self.node_id.to_string();

        if let Ok(v) = self.registry.get(self.cfg.avail_prefix, &id).await {
            if let Some(pct) = v.as_f64() {
                let (bucket, _) = round_avail_pct(pct);
                self.registry
                    .remove_index(&self.avail_index_path(bucket), &id, 2)
                    .await;
            }
            self.registry.delete(self.cfg.avail_prefix, &id).await?;
        }

        if let Ok(v) = self.registry.get(self.cfg.total_prefix, &id).await {
            if let Some(raw) = v.as_u64() {
                let (bucket, _) = floor_bucket(self.cfg.total_buckets, raw);
                self.registry
                    .remove_index(&self.total_index_path(bucket), &id, 2)
                    .await;
            }
            self.registry.delete(self.cfg.total_prefix, &id).await?;
        }

        self.registry.delete(self.cfg.raw_prefix, &id).await?;
        Ok(())
    }
}
