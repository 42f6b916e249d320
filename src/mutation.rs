//! Write-side planning. Each function takes the current snapshot and returns
//! the complete next collection plus the outcome; the caller persists it and
//! only then swaps the snapshot, so a failed save changes nothing.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::error::{QueryError, ValidationError};
use crate::index::{Index, Snapshot};
use crate::model::{Entry, NewEntry, ValidationLimits};

/// What `remove` targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Unique case-insensitive exact title.
    Title(String),
    /// 1-based position from a listing. With `generation` set, the call is
    /// rejected if the pool changed since that listing was produced.
    Index { position: usize, generation: Option<u64> },
}

impl Selector {
    pub fn title(title: impl Into<String>) -> Self {
        Selector::Title(title.into())
    }

    pub fn index(position: usize) -> Self {
        Selector::Index { position, generation: None }
    }

    pub fn listed(position: usize, generation: u64) -> Self {
        Selector::Index { position, generation: Some(generation) }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Title(t) => write!(f, "title {t:?}"),
            Selector::Index { position, .. } => write!(f, "index {position}"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Rejected {
    pub title: String,
    pub url: String,
    #[serde(serialize_with = "as_display")]
    pub error: ValidationError,
}

fn as_display<S: serde::Serializer>(err: &ValidationError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(err)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub added: Vec<Entry>,
    pub duplicates: Vec<String>,
    pub rejected: Vec<Rejected>,
}

impl ImportReport {
    pub fn changed(&self) -> bool {
        !self.added.is_empty()
    }
}

fn fresh_id(index: &Index, taken: &HashSet<Uuid>, mut id: Uuid) -> Uuid {
    while index.by_id(id).is_some() || taken.contains(&id) {
        id = Uuid::new_v4();
    }
    id
}

pub(crate) fn plan_add(
    index: &Index,
    candidate: NewEntry,
    limits: &ValidationLimits,
) -> Result<(Vec<Entry>, Entry), ValidationError> {
    let mut entry = candidate.validate(limits)?;
    entry.id = fresh_id(index, &HashSet::new(), entry.id);
    let mut next = index.entries().to_vec();
    next.push(entry.clone());
    Ok((next, entry))
}

pub(crate) fn plan_remove(snapshot: &Snapshot, selector: &Selector) -> Result<(Vec<Entry>, Entry), QueryError> {
    let index = &snapshot.index;
    let target = match selector {
        Selector::Title(title) => {
            let hits = index.by_title(title);
            match hits.as_slice() {
                [] => return Err(QueryError::NotFound(title.trim().to_string())),
                [one] => one.id,
                many => {
                    return Err(QueryError::AmbiguousMatch {
                        title: title.trim().to_string(),
                        count: many.len(),
                    })
                }
            }
        }
        Selector::Index { position, generation } => {
            if let Some(listed) = generation {
                if *listed != snapshot.generation {
                    return Err(QueryError::StaleIndex { listed: *listed, current: snapshot.generation });
                }
            }
            index
                .at(*position)
                .map(|e| e.id)
                .ok_or_else(|| QueryError::NotFound(format!("index {position} of {}", index.len())))?
        }
    };

    let pos = index
        .position(target)
        .ok_or_else(|| QueryError::NotFound(selector.to_string()))?;
    let mut next = index.entries().to_vec();
    let removed = next.remove(pos - 1);
    Ok((next, removed))
}

/// Validate a batch, skipping URLs already in the pool or earlier in the batch.
pub(crate) fn plan_import(
    index: &Index,
    candidates: Vec<NewEntry>,
    limits: &ValidationLimits,
) -> (Vec<Entry>, ImportReport) {
    let mut report = ImportReport::default();
    let mut urls: HashSet<String> = index.entries().iter().map(|e| e.url.clone()).collect();
    let mut ids = HashSet::new();
    let mut next = index.entries().to_vec();

    for candidate in candidates {
        let (title, url) = (candidate.title.clone(), candidate.url.clone());
        match candidate.validate(limits) {
            Ok(mut entry) => {
                if !urls.insert(entry.url.clone()) {
                    report.duplicates.push(entry.url);
                    continue;
                }
                entry.id = fresh_id(index, &ids, entry.id);
                ids.insert(entry.id);
                next.push(entry.clone());
                report.added.push(entry);
            }
            Err(error) => report.rejected.push(Rejected { title, url, error }),
        }
    }
    (next, report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> ValidationLimits {
        ValidationLimits::default()
    }

    fn snapshot(titles: &[&str]) -> Snapshot {
        let entries = titles
            .iter()
            .enumerate()
            .map(|(i, t)| NewEntry::new(*t, format!("https://e.com/{i}.png")).validate(&limits()).unwrap())
            .collect();
        Snapshot::new(3, entries)
    }

    #[test]
    fn add_appends_and_leaves_current_untouched() {
        let snap = snapshot(&["a"]);
        let (next, added) = plan_add(&snap.index, NewEntry::new("b", "https://e.com/b.webp"), &limits()).unwrap();
        assert_eq!(next.len(), 2);
        assert_eq!(next[1], added);
        assert_eq!(snap.index.len(), 1);
    }

    #[test]
    fn add_surfaces_validation_errors() {
        let snap = snapshot(&[]);
        let err = plan_add(&snap.index, NewEntry::new("b", "https://e.com/b.txt"), &limits()).unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedMediaType(_)));
    }

    #[test]
    fn remove_by_title_needs_unique_match() {
        let snap = snapshot(&["Dup", "dup", "Solo"]);
        assert_eq!(
            plan_remove(&snap, &Selector::title("DUP")).unwrap_err(),
            QueryError::AmbiguousMatch { title: "DUP".into(), count: 2 }
        );
        assert!(matches!(plan_remove(&snap, &Selector::title("none")), Err(QueryError::NotFound(_))));
        let (next, removed) = plan_remove(&snap, &Selector::title("solo")).unwrap();
        assert_eq!(removed.title, "Solo");
        assert_eq!(next.len(), 2);
    }

    #[test]
    fn remove_by_index_checks_range_and_generation() {
        let snap = snapshot(&["a", "b", "c"]);
        let (next, removed) = plan_remove(&snap, &Selector::listed(2, 3)).unwrap();
        assert_eq!(removed.title, "b");
        assert_eq!(next.iter().map(|e| e.title.as_str()).collect::<Vec<_>>(), vec!["a", "c"]);

        assert!(matches!(plan_remove(&snap, &Selector::index(0)), Err(QueryError::NotFound(_))));
        assert!(matches!(plan_remove(&snap, &Selector::index(4)), Err(QueryError::NotFound(_))));
        assert_eq!(
            plan_remove(&snap, &Selector::listed(1, 2)).unwrap_err(),
            QueryError::StaleIndex { listed: 2, current: 3 }
        );
    }

    #[test]
    fn import_skips_duplicates_and_reports_rejections() {
        let snap = snapshot(&["existing"]);
        let batch = vec![
            NewEntry::new("dup of pool", "https://e.com/0.png"),
            NewEntry::new("new", "https://e.com/new.mp4"),
            NewEntry::new("dup in batch", " https://e.com/new.mp4"),
            NewEntry::new("bad", "ftp://e.com/x.png"),
        ];
        let (next, report) = plan_import(&snap.index, batch, &limits());
        assert_eq!(next.len(), 2);
        assert_eq!(report.added.len(), 1);
        assert_eq!(report.duplicates, vec!["https://e.com/0.png", "https://e.com/new.mp4"]);
        assert_eq!(report.rejected.len(), 1);
        assert!(matches!(report.rejected[0].error, ValidationError::InvalidUrl(_)));
        assert!(report.changed());
    }
}
