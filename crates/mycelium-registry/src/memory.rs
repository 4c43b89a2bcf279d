//! In-memory reference `Registry`: state behind `Arc<RwLock<HashMap<...>>>`,
//! cloned cheaply, safe to share across the single-threaded-cooperative core
//! and the REST handlers that feed it.

use crate::{IndexIter, Registry};
use async_trait::async_trait;
use mycelium_core::{Error, Result};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::trace;

#[derive(Clone, Default)]
pub struct InMemoryRegistry {
    kv: Arc<RwLock<HashMap<(String, String), Value>>>,
    indices: Arc<RwLock<HashMap<Vec<String>, HashSet<String>>>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Registry for InMemoryRegistry {
    async fn get(&self, prefix: &str, key: &str) -> Result<Value> {
        let full_key = (prefix.to_string(), key.to_string());
        self.kv
            .read()
            .await
            .get(&full_key)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("{prefix}{key}")))
    }

    async fn set(&self, prefix: &str, key: &str, value: Value) -> Result<()> {
        trace!(prefix, key, "registry set");
        self.kv
            .write()
            .await
            .insert((prefix.to_string(), key.to_string()), value);
        Ok(())
    }

    async fn delete(&self, prefix: &str, key: &str) -> Result<()> {
        trace!(prefix, key, "registry delete");
        self.kv
            .write()
            .await
            .remove(&(prefix.to_string(), key.to_string()));
        Ok(())
    }

    async fn add_index(&self, index_path: &[String], value: &str, root_prefix_level: usize) {
        debug_assert!(
            index_path.len() > root_prefix_level,
            "index path shorter than its own root prefix level"
        );
        self.indices
            .write()
            .await
            .entry(index_path.to_vec())
            .or_default()
            .insert(value.to_string());
    }

    async fn remove_index(&self, index_path: &[String], value: &str, _root_prefix_level: usize) {
        if let Some(set) = self.indices.write().await.get_mut(index_path) {
            set.remove(value);
        }
    }

    async fn get_index(&self, index_path: &[String], _root_prefix_level: usize) -> HashSet<String> {
        self.indices
            .read()
            .await
            .get(index_path)
            .cloned()
            .unwrap_or_default()
    }

    async fn get_index_iter(&self, index_path: &[String]) -> IndexIter {
        let iter = IndexIter::new();
        iter.set_name(index_path.join("/"));
        let indices = self.indices.read().await;
        for (path, values) in indices.iter() {
            if path.starts_with(index_path) {
                for v in values {
                    iter.append(v.clone());
                }
            }
        }
        iter.finalize();
        iter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_on_missing_key_is_not_found() {
        let reg = InMemoryRegistry::new();
        let err = reg.get("nodeCpu-", "abc").await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let reg = InMemoryRegistry::new();
        reg.set("nodeCpu-", "abc", Value::from(100)).await.unwrap();
        let got = reg.get("nodeCpu-", "abc").await.unwrap();
        assert_eq!(got, Value::from(100));
    }

    #[tokio::test]
    async fn index_add_remove_and_lookup() {
        let reg = InMemoryRegistry::new();
        let path = vec!["node".to_string(), "resource".to_string(), "cpuAvail".to_string(), "100".to_string()];
        reg.add_index(&path, "n1", 2).await;
        reg.add_index(&path, "n2", 2).await;
        let found = reg.get_index(&path, 2).await;
        assert_eq!(found, HashSet::from(["n1".to_string(), "n2".to_string()]));

        reg.remove_index(&path, "n1", 2).await;
        let found = reg.get_index(&path, 2).await;
        assert_eq!(found, HashSet::from(["n2".to_string()]));
    }

    #[tokio::test]
    async fn get_index_iter_scans_sub_paths() {
        let reg = InMemoryRegistry::new();
        let root = vec!["node".to_string(), "resource".to_string(), "cpuAvail".to_string()];
        let mut leaf = root.clone();
        leaf.push("100".to_string());
        reg.add_index(&leaf, "n1", 2).await;

        let iter = reg.get_index_iter(&root).await;
        assert!(iter.is_final());
        assert_eq!(iter.into_values(), vec!["n1".to_string()]);
    }

    #[tokio::test]
    async fn batch_defaults_to_false() {
        let reg = InMemoryRegistry::new();
        assert!(!reg.batch().await);
        reg.set("", "batch", Value::Bool(true)).await.unwrap();
        assert!(reg.batch().await);
    }
}
