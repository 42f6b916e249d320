use std::collections::HashMap;

use uuid::Uuid;

use crate::model::Entry;

fn key(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Lookup tables derived from an entry collection. Never patched in place:
/// every change builds a new `Index` from the full collection.
#[derive(Debug, Default, Clone)]
pub struct Index {
    entries: Vec<Entry>,
    by_title: HashMap<String, Vec<usize>>,
    by_tag: HashMap<String, Vec<usize>>,
    by_id: HashMap<Uuid, usize>,
}

impl Index {
    pub fn rebuild(entries: Vec<Entry>) -> Self {
        let mut by_title: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_tag: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_id = HashMap::with_capacity(entries.len());

        for (pos, entry) in entries.iter().enumerate() {
            by_title.entry(key(&entry.title)).or_default().push(pos);
            for tag in &entry.tags {
                let slots = by_tag.entry(key(tag)).or_default();
                // tags differing only in case collapse to one key
                if slots.last() != Some(&pos) {
                    slots.push(pos);
                }
            }
            by_id.insert(entry.id, pos);
        }

        Self { entries, by_title, by_tag, by_id }
    }

    /// Entries in listing order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive exact title match, in listing order.
    pub fn by_title(&self, title: &str) -> Vec<&Entry> {
        self.resolve(self.by_title.get(&key(title)))
    }

    /// Case-insensitive exact tag match, in listing order.
    pub fn by_tag(&self, tag: &str) -> Vec<&Entry> {
        self.resolve(self.by_tag.get(&key(tag)))
    }

    pub fn by_id(&self, id: Uuid) -> Option<&Entry> {
        self.by_id.get(&id).map(|&pos| &self.entries[pos])
    }

    /// 1-based listing position of `id`.
    pub fn position(&self, id: Uuid) -> Option<usize> {
        self.by_id.get(&id).map(|pos| pos + 1)
    }

    /// Entry at a 1-based listing position.
    pub fn at(&self, position: usize) -> Option<&Entry> {
        position.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    /// Tags with the number of entries carrying each.
    pub fn tag_counts(&self) -> HashMap<String, usize> {
        self.by_tag.iter().map(|(tag, slots)| (tag.clone(), slots.len())).collect()
    }

    fn resolve(&self, slots: Option<&Vec<usize>>) -> Vec<&Entry> {
        slots
            .map(|s| s.iter().map(|&pos| &self.entries[pos]).collect())
            .unwrap_or_default()
    }
}

/// An index paired with the generation it was built at. Readers hold an
/// `Arc<Snapshot>` so they always see one consistent collection.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub generation: u64,
    pub index: Index,
}

impl Snapshot {
    pub fn new(generation: u64, entries: Vec<Entry>) -> Self {
        Self { generation, index: Index::rebuild(entries) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewEntry, ValidationLimits};

    fn entry(title: &str, tags: &str) -> Entry {
        NewEntry::new(title, "https://e.com/x.png")
            .tags(tags)
            .validate(&ValidationLimits::default())
            .unwrap()
    }

    #[test]
    fn title_lookup_is_case_insensitive_and_ordered() {
        let idx = Index::rebuild(vec![entry("Dup", ""), entry("Other", ""), entry("dup ", "")]);
        let hits = idx.by_title("DUP");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Dup");
        assert_eq!(hits[1].title, "dup");
        assert!(idx.by_title("missing").is_empty());
    }

    #[test]
    fn tag_lookup_matches_exactly() {
        let idx = Index::rebuild(vec![entry("a", "cat, dog"), entry("b", "catalog"), entry("c", "CAT")]);
        let titles: Vec<_> = idx.by_tag(" Cat ").into_iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "c"]);
    }

    #[test]
    fn mixed_case_tags_from_disk_do_not_double_count() {
        let mut e = entry("a", "");
        e.tags.insert("Cat".into());
        e.tags.insert("cat".into());
        let idx = Index::rebuild(vec![e]);
        assert_eq!(idx.by_tag("cat").len(), 1);
        assert_eq!(idx.tag_counts().get("cat"), Some(&1));
    }

    #[test]
    fn id_and_position_lookups() {
        let a = entry("a", "");
        let b = entry("b", "");
        let idx = Index::rebuild(vec![a.clone(), b.clone()]);
        assert_eq!(idx.by_id(b.id).map(|e| e.title.as_str()), Some("b"));
        assert_eq!(idx.at(2).map(|e| e.id), Some(b.id));
        assert_eq!(idx.position(a.id), Some(1));
        assert!(idx.at(0).is_none());
        assert!(idx.at(3).is_none());
    }
}
