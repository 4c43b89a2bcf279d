//! Requirement clauses (§3 "Requirement clause", §4.2).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A placement requirement attached to an actor or an application link.
///
/// `BTreeMap` (not `HashMap`) because the matcher formats these into an
/// index path and needs stable key ordering (§4.2 "stable key ordering").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Requirement {
    NodeAttrMatch { index: BTreeMap<String, String> },
    LinkAttrMatch { index: BTreeMap<String, String> },
    NodeResourceMin { resource: BTreeMap<String, f64> },
    /// Handled by the replication supervisor, excluded from placement
    /// (supplemented feature: kept as a passthrough variant so the matcher
    /// can recognize and skip it rather than erroring on an unknown op).
    Replication { replication_id: String },
    Composite { requirements: Vec<Requirement> },
}

impl Requirement {
    /// Flatten one level of `Composite` nesting, per §4.2 "flatten one
    /// level and intersect child results set-theoretically".
    pub fn flatten(&self) -> Vec<&Requirement> {
        match self {
            Requirement::Composite { requirements } => requirements.iter().collect(),
            other => vec![other],
        }
    }

    pub fn is_replication(&self) -> bool {
        matches!(self, Requirement::Replication { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_flattens_one_level() {
        let leaf = Requirement::NodeAttrMatch {
            index: BTreeMap::from([("name".to_string(), "n3".to_string())]),
        };
        let composite = Requirement::Composite {
            requirements: vec![leaf.clone()],
        };
        assert_eq!(composite.flatten(), vec![&leaf]);
    }

    #[test]
    fn non_composite_flattens_to_itself() {
        let leaf = Requirement::NodeResourceMin {
            resource: BTreeMap::from([("cpu".to_string(), 100.0)]),
        };
        assert_eq!(leaf.flatten(), vec![&leaf]);
    }
}
