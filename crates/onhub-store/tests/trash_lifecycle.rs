//! End-to-end trash lifecycle coverage on the embedded backend: cascade
//! trash, unconditional restore, the three-way file restore, permanent
//! purge, and emptying the trash.

use serde_json::json;

use onhub_store::{FileRestore, Patch, Store};
use onhub_types::{FileEntry, FileKind, Folder, Meta};

fn folder(name: &str, parent_id: Option<&str>) -> Folder {
    Folder {
        meta: Meta::default(),
        name: name.into(),
        parent_id: parent_id.map(str::to_owned),
        team_id: None,
        owner: "a@x.com".into(),
        color: None,
        deleted: false,
        deleted_at: None,
        original_parent_id: None,
        shared_with: vec![],
    }
}

fn file(name: &str, folder_id: Option<&str>) -> FileEntry {
    FileEntry {
        meta: Meta::default(),
        name: name.into(),
        kind: FileKind::Docx,
        content: "hello".into(),
        file_url: None,
        folder_id: folder_id.map(str::to_owned),
        original_folder_id: None,
        team_id: None,
        owner: "a@x.com".into(),
        deleted: false,
        deleted_at: None,
        shared_with: vec![],
    }
}

fn patch(value: serde_json::Value) -> Patch {
    value.as_object().unwrap().clone()
}

#[tokio::test]
async fn soft_delete_stashes_the_parent_and_restore_brings_it_back() {
    let store = Store::open_in_memory().unwrap();
    let a = store.create(folder("a", None)).await.unwrap();
    let b = store.create(folder("b", Some(&a.meta.id))).await.unwrap();

    let trashed = store.soft_delete_folder(&b.meta.id).await.unwrap();
    assert!(trashed.deleted);
    assert!(trashed.deleted_at.is_some());
    assert_eq!(trashed.parent_id, None);
    assert_eq!(trashed.original_parent_id.as_deref(), Some(a.meta.id.as_str()));

    store.restore_folder(&b.meta.id).await.unwrap();
    let restored: Folder = store.get(&b.meta.id).await.unwrap().unwrap();

    // Identity on content: only delete markers and updated_at may differ
    assert!(!restored.deleted);
    assert_eq!(restored.deleted_at, None);
    assert_eq!(restored.parent_id, b.parent_id);
    assert_eq!(restored.original_parent_id, None);
    assert_eq!(restored.name, b.name);
    assert_eq!(restored.owner, b.owner);
    assert_eq!(restored.meta.created_at, b.meta.created_at);
}

#[tokio::test]
async fn single_soft_delete_does_not_cascade() {
    let store = Store::open_in_memory().unwrap();
    let a = store.create(folder("a", None)).await.unwrap();
    let b = store.create(folder("b", Some(&a.meta.id))).await.unwrap();
    let f = store.create(file("f", Some(&b.meta.id))).await.unwrap();

    let trashed = store.soft_delete_folder(&a.meta.id).await.unwrap();
    assert!(trashed.deleted);
    // Was already at the root
    assert_eq!(trashed.original_parent_id, None);

    // Children are dangling-but-active, untouched by the primitive
    let b_after: Folder = store.get(&b.meta.id).await.unwrap().unwrap();
    let f_after: FileEntry = store.get(&f.meta.id).await.unwrap().unwrap();
    assert!(!b_after.deleted);
    assert_eq!(b_after.parent_id.as_deref(), Some(a.meta.id.as_str()));
    assert!(!f_after.deleted);
}

#[tokio::test]
async fn cascade_trash_stashes_each_nodes_own_parent() {
    let store = Store::open_in_memory().unwrap();
    let a = store.create(folder("a", None)).await.unwrap();
    let b = store.create(folder("b", Some(&a.meta.id))).await.unwrap();
    let f = store.create(file("f", Some(&b.meta.id))).await.unwrap();

    let trashed = store.trash_folder(&a.meta.id).await.unwrap();
    assert_eq!(trashed, 3);

    let a_after: Folder = store.get(&a.meta.id).await.unwrap().unwrap();
    let b_after: Folder = store.get(&b.meta.id).await.unwrap().unwrap();
    let f_after: FileEntry = store.get(&f.meta.id).await.unwrap().unwrap();

    assert!(a_after.deleted && b_after.deleted && f_after.deleted);
    assert_eq!(a_after.original_parent_id, None);
    assert_eq!(b_after.original_parent_id.as_deref(), Some(a.meta.id.as_str()));
    assert_eq!(b_after.parent_id, None);
    assert_eq!(f_after.original_folder_id.as_deref(), Some(b.meta.id.as_str()));
    assert_eq!(f_after.folder_id, None);
}

#[tokio::test]
async fn restore_folder_restores_independently_trashed_descendants() {
    let store = Store::open_in_memory().unwrap();
    let a = store.create(folder("a", None)).await.unwrap();
    let b = store.create(folder("b", Some(&a.meta.id))).await.unwrap();
    let c = store.create(folder("c", Some(&a.meta.id))).await.unwrap();
    let g = store.create(file("g", Some(&b.meta.id))).await.unwrap();

    // The grandchild goes to the trash on its own, before the cascade
    store.soft_delete_file(&g.meta.id).await.unwrap();
    store.trash_folder(&a.meta.id).await.unwrap();

    let restored = store.restore_folder(&a.meta.id).await.unwrap();
    assert_eq!(restored, 4);

    for id in [&a.meta.id, &b.meta.id, &c.meta.id] {
        let f: Folder = store.get(id).await.unwrap().unwrap();
        assert!(!f.deleted, "folder {} should be restored", f.name);
    }
    let g_after: FileEntry = store.get(&g.meta.id).await.unwrap().unwrap();
    assert!(!g_after.deleted);
    assert_eq!(g_after.folder_id.as_deref(), Some(b.meta.id.as_str()));
}

#[tokio::test]
async fn purge_counts_every_descendant_and_leaves_no_references() {
    let store = Store::open_in_memory().unwrap();
    let a = store.create(folder("a", None)).await.unwrap();
    let b = store.create(folder("b", Some(&a.meta.id))).await.unwrap();
    let c = store.create(folder("c", Some(&b.meta.id))).await.unwrap();
    store.create(file("f1", Some(&a.meta.id))).await.unwrap();
    store.create(file("f2", Some(&c.meta.id))).await.unwrap();
    let outside = store.create(file("keep", None)).await.unwrap();

    // N=2 descendant folders, M=2 descendant files
    let removed = store.purge_folder(&a.meta.id).await.unwrap();
    assert_eq!(removed, 5);

    assert!(store.get::<Folder>(&a.meta.id).await.unwrap().is_none());
    let folders: Vec<Folder> = store.list_all().await.unwrap();
    let files: Vec<FileEntry> = store.list_all().await.unwrap();
    assert!(folders.is_empty());
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].meta.id, outside.meta.id);
}

#[tokio::test]
async fn purge_works_on_a_trashed_subtree() {
    let store = Store::open_in_memory().unwrap();
    let a = store.create(folder("a", None)).await.unwrap();
    let b = store.create(folder("b", Some(&a.meta.id))).await.unwrap();
    store.create(file("f", Some(&b.meta.id))).await.unwrap();

    // Trashing nulls live refs; purge must still find children through the stash
    store.trash_folder(&a.meta.id).await.unwrap();
    let removed = store.purge_folder(&a.meta.id).await.unwrap();
    assert_eq!(removed, 3);

    let folders: Vec<Folder> = store.list_all().await.unwrap();
    let files: Vec<FileEntry> = store.list_all().await.unwrap();
    assert!(folders.is_empty());
    assert!(files.is_empty());
}

#[tokio::test]
async fn restoring_a_file_under_a_trashed_folder_needs_a_choice() {
    let store = Store::open_in_memory().unwrap();
    let a = store.create(folder("a", None)).await.unwrap();
    let b = store.create(folder("b", Some(&a.meta.id))).await.unwrap();
    let f = store.create(file("f", Some(&b.meta.id))).await.unwrap();

    store.trash_folder(&b.meta.id).await.unwrap();

    match store.restore_file(&f.meta.id).await.unwrap() {
        FileRestore::NeedsChoice { trashed_folder, .. } => {
            assert_eq!(trashed_folder.meta.id, b.meta.id);
        }
        FileRestore::Restored(_) => panic!("expected a choice, parent is trashed"),
    }

    // Choice (b): file alone, relocated to the grandparent
    let restored = store.restore_file_detached(&f.meta.id).await.unwrap();
    assert!(!restored.deleted);
    assert_eq!(restored.folder_id.as_deref(), Some(a.meta.id.as_str()));

    // The folder stays trashed
    let b_after: Folder = store.get(&b.meta.id).await.unwrap().unwrap();
    assert!(b_after.deleted);
}

#[tokio::test]
async fn restoring_a_file_with_a_live_parent_goes_straight_back() {
    let store = Store::open_in_memory().unwrap();
    let a = store.create(folder("a", None)).await.unwrap();
    let f = store.create(file("f", Some(&a.meta.id))).await.unwrap();

    store.soft_delete_file(&f.meta.id).await.unwrap();
    match store.restore_file(&f.meta.id).await.unwrap() {
        FileRestore::Restored(restored) => {
            assert!(!restored.deleted);
            assert_eq!(restored.folder_id.as_deref(), Some(a.meta.id.as_str()));
            assert_eq!(restored.original_folder_id, None);
        }
        FileRestore::NeedsChoice { .. } => panic!("parent is live"),
    }
}

#[tokio::test]
async fn whole_folder_choice_brings_the_file_back_with_it() {
    let store = Store::open_in_memory().unwrap();
    let a = store.create(folder("a", None)).await.unwrap();
    let b = store.create(folder("b", Some(&a.meta.id))).await.unwrap();
    let f = store.create(file("f", Some(&b.meta.id))).await.unwrap();

    store.trash_folder(&b.meta.id).await.unwrap();

    // Choice (c): restore the whole containing folder instead
    store.restore_folder(&b.meta.id).await.unwrap();
    let b_after: Folder = store.get(&b.meta.id).await.unwrap().unwrap();
    let f_after: FileEntry = store.get(&f.meta.id).await.unwrap().unwrap();
    assert!(!b_after.deleted);
    assert_eq!(b_after.parent_id.as_deref(), Some(a.meta.id.as_str()));
    assert!(!f_after.deleted);
    assert_eq!(f_after.folder_id.as_deref(), Some(b.meta.id.as_str()));
}

#[tokio::test]
async fn empty_trash_purges_only_root_trashed_items() {
    let store = Store::open_in_memory().unwrap();
    let a = store.create(folder("a", None)).await.unwrap();
    let b = store.create(folder("b", Some(&a.meta.id))).await.unwrap();
    store.create(file("f", Some(&b.meta.id))).await.unwrap();
    let loose = store.create(file("loose", None)).await.unwrap();
    let keep = store.create(folder("keep", None)).await.unwrap();

    store.trash_folder(&a.meta.id).await.unwrap();
    store.soft_delete_file(&loose.meta.id).await.unwrap();

    // a, b, f via the root cascade; loose on its own
    let removed = store.empty_trash().await.unwrap();
    assert_eq!(removed, 4);

    let folders: Vec<Folder> = store.list_all().await.unwrap();
    assert_eq!(folders.len(), 1);
    assert_eq!(folders[0].meta.id, keep.meta.id);
    let files: Vec<FileEntry> = store.list_all().await.unwrap();
    assert!(files.is_empty());
}

#[tokio::test]
async fn cascades_terminate_on_a_parent_cycle() {
    let store = Store::open_in_memory().unwrap();
    let x = store.create(folder("x", None)).await.unwrap();
    let y = store.create(folder("y", Some(&x.meta.id))).await.unwrap();

    // Corrupt the linkage into a cycle: x's parent becomes y
    store
        .update::<Folder>(&x.meta.id, patch(json!({ "parent_id": y.meta.id })))
        .await
        .unwrap();

    let trashed = store.trash_folder(&x.meta.id).await.unwrap();
    assert_eq!(trashed, 2);

    let restored = store.restore_folder(&x.meta.id).await.unwrap();
    assert_eq!(restored, 2);

    let removed = store.purge_folder(&x.meta.id).await.unwrap();
    assert_eq!(removed, 2);
}
