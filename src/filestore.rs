use std::collections::HashSet;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::model::{Entry, MediaType};
use crate::storage::{GalleryConfig, Storage};

pub const ENTRIES_FILE: &str = "gallery.json";
pub const CONFIG_FILE: &str = "config.json";

/// JSON files in a data directory: `gallery.json` for entries, `config.json` for config.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entries_path(&self) -> PathBuf {
        self.dir.join(ENTRIES_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }
}

pub fn default_data_dir() -> anyhow::Result<PathBuf> {
    use anyhow::Context;
    let proj = ProjectDirs::from("dev", "gallery", "gallery")
        .context("unable to determine data directory for the gallery store")?;
    Ok(proj.data_dir().to_path_buf())
}

#[async_trait]
impl Storage for JsonFileStore {
    async fn load(&self) -> Result<Vec<Entry>> {
        let path = self.entries_path();
        let entries = blocking(move || read_entries(&path), StoreError::StoreCorrupt).await??;
        info!(count = entries.len(), dir = %self.dir.display(), "loaded gallery entries");
        Ok(entries)
    }

    async fn save(&self, entries: &[Entry]) -> Result<()> {
        let path = self.entries_path();
        let entries = entries.to_vec();
        let count = entries.len();
        let write = move || write_atomic(&path, |w| serde_json::to_writer_pretty(w, &entries).map_err(io::Error::from));
        blocking(write, StoreError::WriteFailed).await??;
        debug!(count, "saved gallery entries");
        Ok(())
    }

    async fn load_config(&self) -> Result<GalleryConfig> {
        let path = self.config_path();
        let cfg = blocking(
            move || match read_json::<GalleryConfig>(&path) {
                Err(StoreError::StoreNotFound(_)) => {
                    info!("gallery config not found; using defaults");
                    Ok(GalleryConfig::default())
                }
                other => other,
            },
            StoreError::StoreCorrupt,
        )
        .await??;
        Ok(cfg)
    }

    async fn save_config(&self, config: &GalleryConfig) -> Result<()> {
        let path = self.config_path();
        let config = config.clone();
        let write = move || write_atomic(&path, |w| serde_json::to_writer_pretty(w, &config).map_err(io::Error::from));
        blocking(write, StoreError::WriteFailed).await??;
        Ok(())
    }
}

/// Run file I/O off the runtime. A panicked or cancelled task is reported
/// through `on_join`, so reads surface as corrupt and writes as failed.
async fn blocking<T, F>(f: F, on_join: fn(String) -> StoreError) -> std::result::Result<T, StoreError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| on_join(format!("storage task failed: {e}")))
}

fn read_raw(path: &Path) -> std::result::Result<String, StoreError> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(raw),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(StoreError::StoreNotFound(path.display().to_string()))
        }
        Err(e) => Err(StoreError::corrupt(format!("reading {}: {e}", path.display()))),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> std::result::Result<T, StoreError> {
    let raw = read_raw(path)?;
    serde_json::from_str(&raw).map_err(|e| StoreError::corrupt(format!("parsing {}: {e}", path.display())))
}

/// Accepts a bare array or the legacy `{"entries": [...]}` wrapper.
/// Records without an id are upgraded in memory; see [`upgrade_legacy`].
fn read_entries(path: &Path) -> std::result::Result<Vec<Entry>, StoreError> {
    let value: Value = read_json(path)?;
    let not_a_list = || StoreError::corrupt(format!("{}: expected an entry array", path.display()));
    let mut items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("entries") {
            Some(Value::Array(items)) => items,
            _ => return Err(not_a_list()),
        },
        _ => return Err(not_a_list()),
    };

    let fallback = fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());
    let mut upgraded = 0usize;
    for record in items.iter_mut().filter_map(Value::as_object_mut) {
        if upgrade_legacy(record, fallback) {
            upgraded += 1;
        }
    }
    if upgraded > 0 {
        info!(upgraded, path = %path.display(), "assigned ids to legacy gallery records");
    }

    let entries: Vec<Entry> = serde_json::from_value(Value::Array(items))
        .map_err(|e| StoreError::corrupt(format!("parsing {}: {e}", path.display())))?;

    let mut seen = HashSet::with_capacity(entries.len());
    if let Some(dup) = entries.iter().find(|e| !seen.insert(e.id)) {
        return Err(StoreError::corrupt(format!("{}: duplicate id {}", path.display(), dup.id)));
    }
    Ok(entries)
}

/// Fill in what an id-less record from older tools lacks: a fresh id,
/// `mediaType` from the URL (or its `type`/`kind`), `addedAt` from
/// `added_at`/`timestamp` (or `fallback`), a title, and normalized tags.
/// Returns false and leaves the record alone when it already has an id.
fn upgrade_legacy(record: &mut Map<String, Value>, fallback: DateTime<Utc>) -> bool {
    if record.contains_key("id") {
        return false;
    }
    record.insert("id".into(), Value::String(Uuid::new_v4().to_string()));

    let url = record.get("url").and_then(Value::as_str).unwrap_or_default().trim().to_string();
    let declared = record
        .remove("type")
        .or_else(|| record.remove("kind"))
        .and_then(|v| serde_json::from_value::<MediaType>(v).ok());
    if !record.contains_key("mediaType") {
        let derived = Url::parse(&url).ok().and_then(|u| MediaType::from_url(&u));
        if let Some(media_type) = derived.or(declared) {
            record.insert("mediaType".into(), Value::String(media_type.as_str().into()));
        }
    }

    if !record.contains_key("addedAt") {
        let stamp = ["added_at", "timestamp"]
            .into_iter()
            .filter_map(|k| record.remove(k))
            .find_map(|v| v.as_str().and_then(parse_stamp));
        record.insert("addedAt".into(), Value::String(stamp.unwrap_or(fallback).to_rfc3339()));
    }

    let titled = record.get("title").and_then(Value::as_str).is_some_and(|t| !t.trim().is_empty());
    if !titled {
        let title = record
            .get("filename")
            .and_then(Value::as_str)
            .filter(|f| !f.trim().is_empty())
            .map_or(url, str::to_string);
        record.insert("title".into(), Value::String(title));
    }

    if let Some(Value::Array(tags)) = record.get_mut("tags") {
        let normalized: std::collections::BTreeSet<String> = tags
            .iter()
            .filter_map(Value::as_str)
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        *tags = normalized.into_iter().map(Value::String).collect();
    }
    true
}

fn parse_stamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok().map(|n| n.and_utc()))
}

/// Write to a temp file beside `path`, sync, then rename over `path`.
/// If `fill` or any later step fails the temp file is dropped and `path` is untouched.
pub(crate) fn write_atomic<F>(path: &Path, fill: F) -> std::result::Result<(), StoreError>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let fail = |stage: &str, e: io::Error| StoreError::write_failed(format!("{stage} {}: {e}", path.display()));

    fs::create_dir_all(dir).map_err(|e| fail("creating directory for", e))?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| fail("creating temp file for", e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        fill(&mut writer).map_err(|e| fail("writing", e))?;
        writer.flush().map_err(|e| fail("flushing", e))?;
    }
    tmp.as_file().sync_all().map_err(|e| fail("syncing", e))?;
    tmp.persist(path).map_err(|e| fail("replacing", e.error))?;
    Ok(())
}
