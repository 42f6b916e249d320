use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::model::Entry;

fn default_rate_hours() -> u32 {
    24
}

/// Persisted autopost config. The store only persists and serves it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_rate_hours", alias = "rate_hours")]
    pub rate_hours: u32,
    /// Keys owned by other consumers, kept verbatim across saves.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self { enabled: false, rate_hours: default_rate_hours(), extra: serde_json::Map::new() }
    }
}

/// Durable storage for the entry collection and the config blob.
///
/// `load` must report `StoreNotFound` only when nothing was ever saved and
/// `StoreCorrupt` for anything unreadable. `save` must be atomic.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn load(&self) -> Result<Vec<Entry>>;
    async fn save(&self, entries: &[Entry]) -> Result<()>;
    async fn load_config(&self) -> Result<GalleryConfig>;
    async fn save_config(&self, config: &GalleryConfig) -> Result<()>;
}

/// In-process store for embedders and tests. `fail_next_save` makes the next
/// save report `WriteFailed` without touching the held state.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<Option<Vec<Entry>>>,
    config: Mutex<Option<GalleryConfig>>,
    fail_next_save: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<Entry>) -> Self {
        Self { entries: Mutex::new(Some(entries)), ..Self::default() }
    }

    pub fn fail_next_save(&self) {
        *self.fail_next_save.lock() = true;
    }

    /// What a fresh `load` would return, if anything was saved.
    pub fn persisted(&self) -> Option<Vec<Entry>> {
        self.entries.lock().clone()
    }

    fn take_failure(&self) -> bool {
        std::mem::take(&mut *self.fail_next_save.lock())
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn load(&self) -> Result<Vec<Entry>> {
        self.entries
            .lock()
            .clone()
            .ok_or_else(|| StoreError::StoreNotFound("memory".into()).into())
    }

    async fn save(&self, entries: &[Entry]) -> Result<()> {
        if self.take_failure() {
            return Err(StoreError::write_failed("simulated failure").into());
        }
        *self.entries.lock() = Some(entries.to_vec());
        Ok(())
    }

    async fn load_config(&self) -> Result<GalleryConfig> {
        Ok(self.config.lock().clone().unwrap_or_default())
    }

    async fn save_config(&self, config: &GalleryConfig) -> Result<()> {
        if self.take_failure() {
            return Err(StoreError::write_failed("simulated failure").into());
        }
        *self.config.lock() = Some(config.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_when_fields_missing() {
        let cfg: GalleryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, GalleryConfig::default());
        assert!(!cfg.enabled);
        assert_eq!(cfg.rate_hours, 24);
    }

    #[test]
    fn config_keeps_unknown_keys() {
        let raw = r#"{"enabled":true,"rateHours":6,"channels_allow":[1,2]}"#;
        let cfg: GalleryConfig = serde_json::from_str(raw).unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.rate_hours, 6);
        let back = serde_json::to_value(&cfg).unwrap();
        assert_eq!(back["channels_allow"], serde_json::json!([1, 2]));
    }

    #[test]
    fn config_reads_snake_case_rate_hours_without_duplicating_it() {
        let cfg: GalleryConfig = serde_json::from_str(r#"{"enabled":false,"rate_hours":6}"#).unwrap();
        assert_eq!(cfg.rate_hours, 6);
        assert!(cfg.extra.is_empty());
        let back = serde_json::to_value(&cfg).unwrap();
        assert_eq!(back["rateHours"], 6);
        assert!(back.get("rate_hours").is_none());
    }

    #[tokio::test]
    async fn memory_store_reports_first_run() {
        let store = MemoryStore::new();
        let err = store.load().await.unwrap_err();
        assert!(err.is_not_found());
        store.save(&[]).await.unwrap();
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn memory_store_simulated_failure_keeps_state() {
        let store = MemoryStore::with_entries(Vec::new());
        store.fail_next_save();
        assert!(store.save(&[]).await.is_err());
        assert_eq!(store.persisted(), Some(Vec::new()));
        store.save(&[]).await.unwrap();
    }
}
