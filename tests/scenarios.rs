//! End-to-end scenarios against the JSON file store in a temp directory.

use std::fs;
use std::sync::Arc;

use gallery::filestore::JsonFileStore;
use gallery::prelude::*;

async fn open(dir: &std::path::Path) -> Gallery {
    let settings = Settings { data_dir: Some(dir.to_path_buf()), ..Settings::default() };
    Gallery::open(&settings).await.unwrap()
}

#[tokio::test]
async fn scenario_mixed_media_listing_and_diagnostics() {
    let tmp = tempfile::tempdir().unwrap();
    let g = open(tmp.path()).await;
    assert!(g.is_empty());

    for (i, ext) in ["png", "jpg", "gif"].iter().enumerate() {
        g.add(NewEntry::new(format!("Image {i}"), format!("https://cdn.example.com/{i}.{ext}")), true)
            .await
            .unwrap();
    }
    g.add(NewEntry::new("Clip", "https://cdn.example.com/clip.mp4"), true).await.unwrap();

    let listing = g.list(false);
    assert_eq!(listing.items.len(), 4);
    let positions: Vec<_> = listing.items.iter().map(|i| i.index).collect();
    assert_eq!(positions, vec![1, 2, 3, 4]);

    let diag = g.diagnostics(None);
    assert_eq!(diag.total, 4);
    assert_eq!(diag.count(MediaType::Image), 3);
    assert_eq!(diag.count(MediaType::Video), 1);
    assert_eq!(diag.recent.len(), 4);
    assert_eq!(diag.recent[0].title, "Clip");
}

#[tokio::test]
async fn scenario_nsfw_entry_is_gated() {
    let tmp = tempfile::tempdir().unwrap();
    let g = open(tmp.path()).await;
    g.add(NewEntry::new("Safe", "https://e.com/safe.png"), true).await.unwrap();
    g.add(NewEntry::new("After Dark", "https://e.com/dark.webm").nsfw(true), true).await.unwrap();

    for _ in 0..500 {
        assert_eq!(g.pick_random(false).unwrap().title, "Safe");
    }
    assert_eq!(g.show("After Dark", true).unwrap().title, "After Dark");
    let err = g.show("after dark", false).unwrap_err();
    assert!(matches!(err, GalleryError::Query(QueryError::Forbidden)));
    assert!(g.list(false).items.iter().all(|i| !i.entry.nsfw));
    assert_eq!(g.list(true).items.len(), 2);
}

#[tokio::test]
async fn scenario_remove_by_title_then_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let g = open(tmp.path()).await;
    g.add(NewEntry::new("Sample One", "https://e.com/1.png"), true).await.unwrap();
    g.add(NewEntry::new("Sample Two", "https://e.com/2.png"), true).await.unwrap();

    let removed = g.remove(Selector::title("Sample One"), true).await.unwrap();
    assert_eq!(removed.title, "Sample One");
    assert!(g.list(true).items.iter().all(|i| i.entry.title != "Sample One"));

    let err = g.remove(Selector::title("Sample One"), true).await.unwrap_err();
    assert!(matches!(err, GalleryError::Query(QueryError::NotFound(_))));

    // persisted, not just in memory
    let reopened = open(tmp.path()).await;
    assert_eq!(reopened.len(), 1);
}

#[tokio::test]
async fn scenario_duplicate_titles_need_index() {
    let tmp = tempfile::tempdir().unwrap();
    let g = open(tmp.path()).await;
    let first = g.add(NewEntry::new("Dup", "https://e.com/first.png"), true).await.unwrap();
    let second = g.add(NewEntry::new("Dup", "https://e.com/second.png"), true).await.unwrap();

    let err = g.remove(Selector::title("Dup"), true).await.unwrap_err();
    assert!(matches!(err, GalleryError::Query(QueryError::AmbiguousMatch { count: 2, .. })));

    let listing = g.list(true);
    let removed = g.remove(Selector::listed(2, listing.generation), true).await.unwrap();
    assert_eq!(removed.id, second.id);
    let remaining = g.list(true);
    assert_eq!(remaining.items.len(), 1);
    assert_eq!(remaining.items[0].entry.id, first.id);
}

#[tokio::test]
async fn reload_picks_up_out_of_band_edits_and_survives_corruption() {
    let tmp = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(tmp.path());
    let g = open(tmp.path()).await;
    g.add(NewEntry::new("Kept", "https://e.com/kept.png"), true).await.unwrap();

    // out-of-band: another tool appends an entry
    let mut entries = store.load().await.unwrap();
    let extra = NewEntry::new("External", "https://e.com/ext.mov")
        .validate(&Default::default())
        .unwrap();
    entries.push(extra);
    store.save(&entries).await.unwrap();
    assert_eq!(g.reload(true).await.unwrap(), 2);
    assert_eq!(g.show("external", false).unwrap().media_type, MediaType::Video);

    // corrupt file: reload fails and the pool stays as it was
    fs::write(store.entries_path(), "{ not json").unwrap();
    let err = g.reload(true).await.unwrap_err();
    assert!(matches!(err, GalleryError::Store(StoreError::StoreCorrupt(_))));
    assert_eq!(g.len(), 2);
    assert!(g.pick_random(false).is_ok());
}

#[tokio::test]
async fn corrupt_store_refuses_to_open() {
    let tmp = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(tmp.path());
    fs::write(store.entries_path(), "[1, 2, 3]").unwrap();
    let settings = Settings::default();
    let res = Gallery::with_storage(Arc::new(store), &settings).await;
    assert!(matches!(res, Err(GalleryError::Store(StoreError::StoreCorrupt(_)))));
}

#[tokio::test]
async fn import_merges_by_url_and_persists_once() {
    let tmp = tempfile::tempdir().unwrap();
    let g = open(tmp.path()).await;
    g.add(NewEntry::new("Existing", "https://e.com/a.png"), true).await.unwrap();

    let report = g
        .import(
            vec![
                NewEntry::new("a.png", "https://e.com/a.png"),
                NewEntry::new("b.gif", "https://e.com/b.gif").tags("Imported"),
                NewEntry::new("notes.txt", "https://e.com/notes.txt"),
            ],
            true,
        )
        .await
        .unwrap();
    assert_eq!(report.added.len(), 1);
    assert_eq!(report.duplicates.len(), 1);
    assert_eq!(report.rejected.len(), 1);

    let reopened = open(tmp.path()).await;
    assert_eq!(reopened.len(), 2);
    assert_eq!(reopened.pick_random_by_tag("imported", false).unwrap().title, "b.gif");
}

#[tokio::test]
async fn autopost_flag_is_persisted_alongside_entries() {
    let tmp = tempfile::tempdir().unwrap();
    let g = open(tmp.path()).await;
    assert!(!g.config().await.unwrap().enabled);
    g.set_autopost(true, true).await.unwrap();

    let reopened = open(tmp.path()).await;
    assert!(reopened.config().await.unwrap().enabled);
    assert!(reopened.is_empty());
}
