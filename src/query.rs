//! Read-side operations over an [`Index`]. Nothing here mutates.
//!
//! Every read takes `allow_nsfw`, the caller's NSFW context, and applies the
//! gate: entries flagged `nsfw` are invisible unless the context allows them.
//! Random selection is stricter and also needs [`RandomPolicy::nsfw_random`].

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use crate::error::QueryError;
use crate::index::Index;
use crate::model::{Entry, MediaType};

/// Default number of recent entries in diagnostics.
pub const DEFAULT_RECENT_LIMIT: usize = 5;

/// Whether random picks may ever serve NSFW entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPolicy {
    pub nsfw_random: bool,
}

/// An entry with its 1-based position in the pool.
#[derive(Debug, Clone, Serialize)]
pub struct ListedEntry {
    pub index: usize,
    #[serde(flatten)]
    pub entry: Entry,
}

/// Result of `list`; `generation` identifies the snapshot the positions belong to.
#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    pub generation: u64,
    pub items: Vec<ListedEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub total: usize,
    pub nsfw: usize,
    pub by_media_type: HashMap<MediaType, usize>,
    pub by_tag: HashMap<String, usize>,
    pub recent: Vec<Entry>,
}

impl Diagnostics {
    /// Most used tags, count descending then tag ascending.
    pub fn top_tags(&self, n: usize) -> Vec<(&str, usize)> {
        let mut tags: Vec<(&str, usize)> = self.by_tag.iter().map(|(t, c)| (t.as_str(), *c)).collect();
        tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        tags.truncate(n);
        tags
    }

    pub fn count(&self, media_type: MediaType) -> usize {
        self.by_media_type.get(&media_type).copied().unwrap_or(0)
    }
}

pub fn passes_gate(entry: &Entry, allow_nsfw: bool) -> bool {
    !entry.nsfw || allow_nsfw
}

fn random_eligible(entry: &Entry, allow_nsfw: bool, policy: RandomPolicy) -> bool {
    !entry.nsfw || (allow_nsfw && policy.nsfw_random)
}

pub fn pick_random<R: Rng + ?Sized>(
    index: &Index,
    allow_nsfw: bool,
    policy: RandomPolicy,
    rng: &mut R,
) -> Result<Entry, QueryError> {
    let eligible: Vec<&Entry> = index
        .entries()
        .iter()
        .filter(|e| random_eligible(e, allow_nsfw, policy))
        .collect();
    eligible.choose(rng).map(|e| (*e).clone()).ok_or(QueryError::EmptyPool)
}

pub fn pick_random_by_tag<R: Rng + ?Sized>(
    index: &Index,
    tag: &str,
    allow_nsfw: bool,
    policy: RandomPolicy,
    rng: &mut R,
) -> Result<Entry, QueryError> {
    if index.is_empty() {
        return Err(QueryError::EmptyPool);
    }
    let eligible: Vec<&Entry> = index
        .by_tag(tag)
        .into_iter()
        .filter(|e| random_eligible(e, allow_nsfw, policy))
        .collect();
    eligible
        .choose(rng)
        .map(|e| (*e).clone())
        .ok_or_else(|| QueryError::NoMatch(format!("tag {:?}", tag.trim())))
}

/// Resolve by id (if `needle` is a UUID) or by title. Among several title
/// matches the first one in listing order that passes the gate wins.
pub fn show(index: &Index, needle: &str, allow_nsfw: bool) -> Result<Entry, QueryError> {
    let needle = needle.trim();
    if let Ok(id) = Uuid::parse_str(needle) {
        if let Some(entry) = index.by_id(id) {
            return if passes_gate(entry, allow_nsfw) {
                Ok(entry.clone())
            } else {
                Err(QueryError::Forbidden)
            };
        }
    }
    let matches = index.by_title(needle);
    if matches.is_empty() {
        return Err(QueryError::NotFound(needle.to_string()));
    }
    matches
        .into_iter()
        .find(|e| passes_gate(e, allow_nsfw))
        .cloned()
        .ok_or(QueryError::Forbidden)
}

/// Eligible entries in listing order. Positions count hidden entries too, so
/// they match what `remove` by index resolves against.
pub fn list(index: &Index, generation: u64, allow_nsfw: bool) -> Listing {
    let items = index
        .entries()
        .iter()
        .enumerate()
        .filter(|(_, e)| passes_gate(e, allow_nsfw))
        .map(|(pos, e)| ListedEntry { index: pos + 1, entry: e.clone() })
        .collect();
    Listing { generation, items }
}

/// Pool-wide counts. Not gated: this is an admin surface.
pub fn diagnostics(index: &Index, recent_limit: usize) -> Diagnostics {
    let entries = index.entries();
    let mut by_media_type = HashMap::new();
    for e in entries {
        *by_media_type.entry(e.media_type).or_insert(0) += 1;
    }

    // newest first; ties go to the later insertion
    let mut recent: Vec<&Entry> = entries.iter().rev().collect();
    recent.sort_by(|a, b| b.added_at.cmp(&a.added_at));
    recent.truncate(recent_limit);

    Diagnostics {
        total: entries.len(),
        nsfw: entries.iter().filter(|e| e.nsfw).count(),
        by_media_type,
        by_tag: index.tag_counts(),
        recent: recent.into_iter().cloned().collect(),
    }
}

/// Titles containing `fragment` (case-insensitive), gated, capped at `limit`.
pub fn suggest_titles(index: &Index, fragment: &str, allow_nsfw: bool, limit: usize) -> Vec<String> {
    let needle = fragment.trim().to_lowercase();
    index
        .entries()
        .iter()
        .filter(|e| passes_gate(e, allow_nsfw))
        .filter(|e| e.title.to_lowercase().contains(&needle))
        .map(|e| e.title.clone())
        .take(limit)
        .collect()
}
