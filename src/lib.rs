pub mod error;
pub mod filestore;
pub mod index;
pub mod model;
pub mod mutation;
pub mod query;
pub mod settings;
pub mod storage;

// --- Library API for embedding ---

/// Convenience re-exports for embedders.
pub mod prelude {
    pub use crate::error::{GalleryError, QueryError, Result, StoreError, ValidationError};
    pub use crate::model::{Entry, MediaType, NewEntry};
    pub use crate::mutation::{ImportReport, Selector};
    pub use crate::query::{Diagnostics, ListedEntry, Listing};
    pub use crate::settings::Settings;
    pub use crate::storage::{GalleryConfig, Storage};
    pub use crate::Gallery;
}

use std::sync::Arc;

use parking_lot::RwLock;
use rand::Rng;
use tracing::{info, warn};

pub use crate::error::{GalleryError, Result};
use crate::filestore::JsonFileStore;
use crate::index::Snapshot;
use crate::model::{Entry, NewEntry, ValidationLimits};
use crate::mutation::{plan_add, plan_import, plan_remove, ImportReport, Selector};
use crate::query::{Diagnostics, Listing, RandomPolicy};
use crate::settings::Settings;
use crate::storage::{GalleryConfig, Storage};

/// Library entry point. Owns the store handle and the current snapshot.
///
/// Reads clone the current `Arc<Snapshot>` and never block writers for long.
/// Mutations hold `writer` across validate, persist and swap, so they are
/// serialized and a failed save leaves the snapshot as it was.
pub struct Gallery {
    store: Arc<dyn Storage>,
    snapshot: RwLock<Arc<Snapshot>>,
    writer: tokio::sync::Mutex<()>,
    limits: ValidationLimits,
    policy: RandomPolicy,
    recent_limit: usize,
    suggestion_limit: usize,
}

impl Gallery {
    /// Open the JSON store in the data directory named by `settings`.
    pub async fn open(settings: &Settings) -> anyhow::Result<Self> {
        let dir = settings.resolve_data_dir()?;
        let store = JsonFileStore::new(dir);
        Ok(Self::with_storage(Arc::new(store), settings).await?)
    }

    /// Load the pool from `store`. A first-run store starts empty; a corrupt one is an error.
    pub async fn with_storage(store: Arc<dyn Storage>, settings: &Settings) -> Result<Self> {
        let entries = match store.load().await {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() => {
                info!("no gallery store yet; starting with an empty pool");
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        Ok(Self {
            store,
            snapshot: RwLock::new(Arc::new(Snapshot::new(0, entries))),
            writer: tokio::sync::Mutex::new(()),
            limits: settings.limits(),
            policy: settings.random_policy(),
            recent_limit: settings.recent_limit,
            suggestion_limit: settings.suggestion_limit,
        })
    }

    /// The current consistent view of the pool.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.read().clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // --- Queries ---

    pub fn pick_random(&self, allow_nsfw: bool) -> Result<Entry> {
        self.pick_random_with(allow_nsfw, &mut rand::thread_rng())
    }

    pub fn pick_random_with<R: Rng + ?Sized>(&self, allow_nsfw: bool, rng: &mut R) -> Result<Entry> {
        let snap = self.snapshot();
        Ok(query::pick_random(&snap.index, allow_nsfw, self.policy, rng)?)
    }

    pub fn pick_random_by_tag(&self, tag: &str, allow_nsfw: bool) -> Result<Entry> {
        let snap = self.snapshot();
        Ok(query::pick_random_by_tag(&snap.index, tag, allow_nsfw, self.policy, &mut rand::thread_rng())?)
    }

    /// Look up by id or title; see [`query::show`].
    pub fn show(&self, title_or_id: &str, allow_nsfw: bool) -> Result<Entry> {
        let snap = self.snapshot();
        Ok(query::show(&snap.index, title_or_id, allow_nsfw)?)
    }

    pub fn list(&self, allow_nsfw: bool) -> Listing {
        let snap = self.snapshot();
        query::list(&snap.index, snap.generation, allow_nsfw)
    }

    /// Admin diagnostics; `recent` defaults to the configured limit.
    pub fn diagnostics(&self, recent: Option<usize>) -> Diagnostics {
        let snap = self.snapshot();
        query::diagnostics(&snap.index, recent.unwrap_or(self.recent_limit))
    }

    pub fn suggest_titles(&self, fragment: &str, allow_nsfw: bool) -> Vec<String> {
        let snap = self.snapshot();
        query::suggest_titles(&snap.index, fragment, allow_nsfw, self.suggestion_limit)
    }

    pub async fn config(&self) -> Result<GalleryConfig> {
        self.store.load_config().await
    }

    // --- Mutations (admin) ---

    pub async fn add(&self, candidate: NewEntry, authorized: bool) -> Result<Entry> {
        let res: Result<Entry> = async {
            ensure_authorized(authorized)?;
            let _guard = self.writer.lock().await;
            let current = self.snapshot();
            let (next, entry) = plan_add(&current.index, candidate, &self.limits)?;
            self.commit(&current, next).await?;
            Ok(entry)
        }
        .await;
        match &res {
            Ok(e) => info!(op = "add", id = %e.id, title = %e.title, url = %e.url, nsfw = e.nsfw, "gallery entry stored"),
            Err(e) => warn!(op = "add", error = %e, "gallery mutation rejected"),
        }
        res
    }

    pub async fn remove(&self, selector: Selector, authorized: bool) -> Result<Entry> {
        let res: Result<Entry> = async {
            ensure_authorized(authorized)?;
            let _guard = self.writer.lock().await;
            let current = self.snapshot();
            let (next, removed) = plan_remove(&current, &selector)?;
            self.commit(&current, next).await?;
            Ok(removed)
        }
        .await;
        match &res {
            Ok(e) => info!(op = "remove", id = %e.id, title = %e.title, url = %e.url, "gallery entry removed"),
            Err(e) => warn!(op = "remove", selector = %selector, error = %e, "gallery mutation rejected"),
        }
        res
    }

    /// Re-read the store. On failure the previous snapshot stays in place.
    pub async fn reload(&self, authorized: bool) -> Result<usize> {
        let res: Result<usize> = async {
            ensure_authorized(authorized)?;
            let _guard = self.writer.lock().await;
            let entries = match self.store.load().await {
                Ok(entries) => entries,
                Err(e) if e.is_not_found() => Vec::new(),
                Err(e) => return Err(e),
            };
            let count = entries.len();
            let generation = self.snapshot().generation + 1;
            *self.snapshot.write() = Arc::new(Snapshot::new(generation, entries));
            Ok(count)
        }
        .await;
        match &res {
            Ok(count) => info!(op = "reload", count, "gallery reloaded"),
            Err(e) => warn!(op = "reload", error = %e, "gallery reload failed; keeping previous entries"),
        }
        res
    }

    /// Bulk add. Duplicate URLs are skipped and invalid candidates reported;
    /// the store is written once, and only if something was added.
    pub async fn import(&self, candidates: Vec<NewEntry>, authorized: bool) -> Result<ImportReport> {
        let res: Result<ImportReport> = async {
            ensure_authorized(authorized)?;
            let _guard = self.writer.lock().await;
            let current = self.snapshot();
            let (next, report) = plan_import(&current.index, candidates, &self.limits);
            if report.changed() {
                self.commit(&current, next).await?;
            }
            Ok(report)
        }
        .await;
        match &res {
            Ok(r) => info!(
                op = "import",
                added = r.added.len(),
                duplicates = r.duplicates.len(),
                rejected = r.rejected.len(),
                "gallery import finished"
            ),
            Err(e) => warn!(op = "import", error = %e, "gallery mutation rejected"),
        }
        res
    }

    /// Persist the autopost flag. Nothing in the store acts on it.
    pub async fn set_autopost(&self, enabled: bool, authorized: bool) -> Result<GalleryConfig> {
        let res: Result<GalleryConfig> = async {
            ensure_authorized(authorized)?;
            let _guard = self.writer.lock().await;
            let mut cfg = self.store.load_config().await?;
            cfg.enabled = enabled;
            self.store.save_config(&cfg).await?;
            Ok(cfg)
        }
        .await;
        match &res {
            Ok(cfg) => info!(op = "autopost", enabled = cfg.enabled, "gallery config saved"),
            Err(e) => warn!(op = "autopost", error = %e, "gallery mutation rejected"),
        }
        res
    }

    async fn commit(&self, current: &Snapshot, next: Vec<Entry>) -> Result<()> {
        self.store.save(&next).await?;
        *self.snapshot.write() = Arc::new(Snapshot::new(current.generation + 1, next));
        Ok(())
    }
}

fn ensure_authorized(authorized: bool) -> Result<()> {
    if authorized {
        Ok(())
    } else {
        Err(GalleryError::Unauthorized)
    }
}
