//! Shared process state: one node's identity, its resource monitors, and
//! the placement/application managers built on top of them.

use mycelium_appmgr::AppManager;
use mycelium_config::MyceliumConfig;
use mycelium_farseeing::FarseeingScheduler;
use mycelium_monitor::{CpuMonitor, LinkMonitor, RamMonitor};
use mycelium_placement::PlacementPlanner;
use mycelium_registry::InMemoryRegistry;
use mycelium_types::{Node, NodeId};
use std::sync::Arc;
use tracing::info;

/// Starting capacity published at registration (§4.1 "total capacity,
/// published once at node registration"). A real deployment would probe
/// the host; the reference node takes it from config or a flat default.
const DEFAULT_CPU_MIPS: u64 = 1000;
const DEFAULT_RAM_BYTES: u64 = 1_000_000_000;

/// §4.7 "oracle lead time": how far ahead of a scheduled state change the
/// Farseeing scheduler wakes up so a migration can land before it's due.
const ORACLE_LEAD_TIME_NS: u64 = 2_000_000_000;

pub struct AppState {
    pub node_id: NodeId,
    pub registry: Arc<InMemoryRegistry>,
    pub cpu: CpuMonitor<InMemoryRegistry>,
    pub ram: RamMonitor<InMemoryRegistry>,
    pub link: LinkMonitor<InMemoryRegistry>,
    pub planner: Arc<PlacementPlanner<InMemoryRegistry>>,
    pub appmgr: Arc<AppManager<InMemoryRegistry>>,
    pub farseeing: Arc<FarseeingScheduler>,
}

impl AppState {
    /// Registers this node in the Registry (`node-` record + `['node','all']`
    /// index, §6) and publishes its starting CPU/RAM capacity and full
    /// availability.
    pub async fn bootstrap(config: MyceliumConfig, reachable_addresses: Vec<String>) -> mycelium_core::Result<Self> {
        let registry = Arc::new(InMemoryRegistry::new());
        let node = Node::new(reachable_addresses);
        let node_id = node.id;

        registry.set("node-", &node_id.to_string(), serde_json::to_value(&node).unwrap()).await?;
        registry.add_index(&["node".into(), "all".into()], &node_id.to_string(), 0).await;

        let cpu = CpuMonitor::new(registry.clone(), node_id);
        let ram = RamMonitor::new(registry.clone(), node_id);
        let link = LinkMonitor::new(registry.clone());

        cpu.set_total_mips(DEFAULT_CPU_MIPS).await?;
        cpu.set_avail(100.0).await?;
        ram.set_total_bytes(DEFAULT_RAM_BYTES).await?;
        ram.set_avail(100.0).await?;
        link.start(node_id, &[node_id]).await?;

        let planner = Arc::new(PlacementPlanner::new(registry.clone(), config.global.clone()));
        let appmgr = Arc::new(AppManager::new(registry.clone(), planner.clone()));
        let farseeing = Arc::new(FarseeingScheduler::new(ORACLE_LEAD_TIME_NS));

        info!(%node_id, "node registered");
        Ok(Self { node_id, registry, cpu, ram, link, planner, appmgr, farseeing })
    }
}
