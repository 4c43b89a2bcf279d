//! Centralized configuration for the Mycelium placement core.
//!
//! Loads the `[global]` and `[learn]` sections of §6 from a TOML file with
//! `MYCELIUM_`-prefixed environment overrides, on the same `config` +
//! `toml` stack used elsewhere in this workspace for service configuration.
//! Every field has a sensible default so a node can start with no config
//! file at all, falling back to built-in defaults.

mod algorithms;

pub use algorithms::{DeploymentAlgorithm, EstimatorVersion, GraspVariant, ReconfigAlgorithm};

use config_crate::{Config, Environment, File};
use mycelium_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// `[global]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GlobalConfig {
    pub reconfig_algorithm: ReconfigAlgorithm,
    pub deployment_algorithm: DeploymentAlgorithm,
    pub deployment_n_samples: usize,
    pub deployment_tolerance: f64,
    pub deployment_epsilon_greedy: f64,
    pub grasp: GraspVariant,
    pub storage_type: String,
    pub storage_proxy: Option<String>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            reconfig_algorithm: ReconfigAlgorithm::AppNone,
            deployment_algorithm: DeploymentAlgorithm::Money,
            deployment_n_samples: 10,
            deployment_tolerance: 1.5,
            deployment_epsilon_greedy: 0.1,
            grasp: GraspVariant::V1,
            storage_type: "local".to_string(),
            storage_proxy: None,
        }
    }
}

/// `[learn]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LearnConfig {
    pub k: usize,
    pub epsilon: f64,
    pub f_max: f64,
    pub lambda: f64,
    pub learn_rate: f64,
    pub alpha: f64,
    pub beta: f64,
    pub estimator: EstimatorVersion,
    pub n_watch: u32,
    pub n_giveup: usize,
    pub time_giveup_secs: f64,
    pub nice_mode: bool,
}

impl Default for LearnConfig {
    fn default() -> Self {
        Self {
            k: 5,
            epsilon: 0.1,
            f_max: 5.0,
            lambda: 0.5,
            learn_rate: 1.0,
            alpha: 0.5,
            beta: 10.0,
            estimator: EstimatorVersion::V1,
            n_watch: 10,
            n_giveup: 5,
            time_giveup_secs: 300.0,
            nice_mode: false,
        }
    }
}

/// Top-level configuration for one node.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MyceliumConfig {
    pub global: GlobalConfig,
    pub learn: LearnConfig,
}

impl MyceliumConfig {
    /// Load from an optional TOML file plus `MYCELIUM_` environment
    /// overrides (e.g. `MYCELIUM_GLOBAL_DEPLOYMENT_ALGORITHM=latency`).
    /// A missing file is not an error — defaults apply, matching Calvin's
    /// "config file is optional, built-ins otherwise" behavior.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            if path.exists() {
                debug!(?path, "loading mycelium config file");
                builder = builder.add_source(File::from(path));
            } else {
                warn!(?path, "config file not found, using defaults");
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("MYCELIUM")
                .separator("_")
                .try_parsing(true),
        );

        let built = builder
            .build()
            .map_err(|e| Error::configuration(format!("building config: {e}")))?;

        // `try_deserialize` on an entirely-empty source set falls back to
        // `#[serde(default)]` on every field above.
        built
            .try_deserialize()
            .map_err(|e| Error::configuration(format!("deserializing config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_when_no_file_present() {
        let cfg = MyceliumConfig::load(None).unwrap();
        assert_eq!(cfg.global.deployment_algorithm, DeploymentAlgorithm::Money);
        assert_eq!(cfg.learn.k, 5);
    }

    #[test]
    fn loads_overrides_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [global]
            deployment_algorithm = "grasp"
            deployment_n_samples = 20

            [learn]
            k = 8
            epsilon = 0.25
            "#
        )
        .unwrap();

        let cfg = MyceliumConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.global.deployment_algorithm, DeploymentAlgorithm::Grasp);
        assert_eq!(cfg.global.deployment_n_samples, 20);
        assert_eq!(cfg.learn.k, 8);
        assert_eq!(cfg.learn.epsilon, 0.25);
        // untouched fields keep their defaults
        assert_eq!(cfg.global.deployment_tolerance, 1.5);
    }
}
