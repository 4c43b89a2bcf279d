//! Algorithm-selector enums for the `[global]`/`[learn]` config sections.
//!
//! Calvin picks these by string name at runtime (`ReconfigAlgos.is_learn()`
//! and friends in `appdeployer.py`); we use real enums instead so an unknown
//! name is caught at config-load time rather than at the first placement.

use serde::{Deserialize, Serialize};

/// Which reconfiguration strategy an application uses once placed.
///
/// `app_none` disables adaptive migration entirely; the remaining variants
/// select a bandit per spec §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconfigAlgorithm {
    AppNone,
    AppEw,
    AppUcb,
    AppUcb2,
    AppSao,
}

/// Which placement algorithm `decide_placement` dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentAlgorithm {
    Random,
    Latency,
    Green,
    Best,
    Worst,
    Money,
    Grasp,
}

/// GRASP construction/local-search variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraspVariant {
    V0,
    V1,
    V2,
}

/// Which full-info estimator the EW bandit blends with its observed gain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorVersion {
    V1,
    V2,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_snake_case_names() {
        let v: DeploymentAlgorithm = serde_json::from_str("\"grasp\"").unwrap();
        assert_eq!(v, DeploymentAlgorithm::Grasp);
        let v: ReconfigAlgorithm = serde_json::from_str("\"app_ucb2\"").unwrap();
        assert_eq!(v, ReconfigAlgorithm::AppUcb2);
    }
}
