//! Discretized resource monitors (§4.1): `CpuMonitor`, `RamMonitor`,
//! `LinkMonitor`. Each publishes a raw value and a bucketed Registry index,
//! maintaining the read-old → remove-old → write-new → add-new order the
//! rest of the core depends on (§5 "Shared-resource policy").

pub mod buckets;
mod cpu;
mod link;
mod ram;
mod scalar;

pub use cpu::CpuMonitor;
pub use link::LinkMonitor;
pub use ram::RamMonitor;
