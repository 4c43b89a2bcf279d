//! Adaptive per-application migration engine (§4.5). Exposes a common
//! [`Bandit`] interface over four online-learning algorithms and the
//! [`TrialAndError`] meta-policy that decides when a bandit is allowed to
//! act on its own reselection.

mod bandit;
mod estimator;
mod ew;
mod sao;
mod trial;
mod ucb;

pub use bandit::Bandit;
pub use estimator::{calculate_v, estimator_v1, estimator_v2, estimator_v2_single_token};
pub use ew::EwBandit;
pub use mycelium_config::EstimatorVersion;
pub use sao::SaoBandit;
pub use trial::TrialAndError;
pub use ucb::{Ucb2Bandit, UcbBandit};
