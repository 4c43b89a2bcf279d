//! Shared data model for the placement and reconfiguration core (spec §3).
//!
//! Every other `mycelium-*` crate (besides `mycelium-core`/`mycelium-config`)
//! depends on this one for `Node`/`Link`/`Application`/`Requirement` rather
//! than defining its own view of them.

pub mod actor;
pub mod application;
pub mod candidates;
pub mod ids;
pub mod learn_state;
pub mod link;
pub mod node;
pub mod placement;
pub mod requirement;

pub use actor::Actor;
pub use application::{Application, DeployInfo};
pub use candidates::Candidates;
pub use ids::{ActorId, AppId, LinkId, NodeId, PhysLinkId};
pub use learn_state::{LearnState, TrialState};
pub use link::{Link, PhysicalLink};
pub use node::{Node, NodeAttributes};
pub use placement::{ActorPlacement, PlacementContext, PlacementOption, ResourceDemand};
pub use requirement::Requirement;
