//! Soft-delete lifecycle: `Active -> Trashed -> (Active | Removed)`.
//!
//! Trashing stashes the live parent reference in `original_parent_id` /
//! `original_folder_id` and nulls the live one, so trashed items float at
//! the root of the trash view while remembering where to return. Cascades
//! walk a parent → children index built once per invocation, with a
//! visited set so a corrupted `parent_id` cycle cannot loop forever.
//!
//! Cascade operations are N sequential backend calls with no transaction;
//! a crash mid-cascade leaves a partially processed tree.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use onhub_types::{Entity, EntityKind, FileEntry, Folder};

use crate::Store;
use crate::entity::Patch;
use crate::error::{Result, StoreError};

/// Outcome of [`Store::restore_file`]. When the containing folder is itself
/// in the trash, the caller must ask the user: restore the file alone to
/// the grandparent ([`Store::restore_file_detached`]) or bring the whole
/// folder back ([`Store::restore_folder`] on `trashed_folder`).
#[derive(Debug)]
pub enum FileRestore {
    Restored(FileEntry),
    NeedsChoice {
        file: FileEntry,
        trashed_folder: Folder,
    },
}

fn opt_string(value: &Option<String>) -> Value {
    match value {
        Some(s) => Value::String(s.clone()),
        None => Value::Null,
    }
}

fn trash_patch(parent_key: &str, original_key: &str, parent: &Option<String>) -> Result<Patch> {
    let mut patch = Patch::new();
    patch.insert("deleted".into(), Value::Bool(true));
    patch.insert("deleted_at".into(), serde_json::to_value(Utc::now())?);
    patch.insert(original_key.into(), opt_string(parent));
    patch.insert(parent_key.into(), Value::Null);
    Ok(patch)
}

fn restore_patch(parent_key: &str, original_key: &str, target: &Option<String>) -> Patch {
    let mut patch = Patch::new();
    patch.insert("deleted".into(), Value::Bool(false));
    patch.insert("deleted_at".into(), Value::Null);
    patch.insert(parent_key.into(), opt_string(target));
    patch.insert(original_key.into(), Value::Null);
    patch
}

/// The folder a record hangs under, live ref first, stashed ref otherwise.
fn folder_link(folder: &Folder) -> Option<&str> {
    folder
        .parent_id
        .as_deref()
        .or(folder.original_parent_id.as_deref())
}

fn file_link(file: &FileEntry) -> Option<&str> {
    file.folder_id
        .as_deref()
        .or(file.original_folder_id.as_deref())
}

impl Store {
    // -- Primitives (single item, no cascade) --

    /// Soft-delete one folder. Children are left untouched — the cascade is
    /// [`Store::trash_folder`], invoked explicitly.
    pub async fn soft_delete_folder(&self, id: &str) -> Result<Folder> {
        let folder: Folder = self
            .get(id)
            .await?
            .ok_or_else(|| StoreError::not_found(EntityKind::Folder, id))?;
        let patch = trash_patch("parent_id", "original_parent_id", &folder.parent_id)?;
        self.update(id, patch).await
    }

    pub async fn soft_delete_file(&self, id: &str) -> Result<FileEntry> {
        let file: FileEntry = self
            .get(id)
            .await?
            .ok_or_else(|| StoreError::not_found(EntityKind::File, id))?;
        let patch = trash_patch("folder_id", "original_folder_id", &file.folder_id)?;
        self.update(id, patch).await
    }

    // -- Cascades --

    /// Cascade soft-delete: the folder plus every live descendant, matched
    /// by live parent linkage. Each visited node stashes its own current
    /// parent. Descendants already in the trash keep their stash and are
    /// not revisited. Returns the number of records trashed.
    pub async fn trash_folder(&self, id: &str) -> Result<usize> {
        if self.get::<Folder>(id).await?.is_none() {
            return Err(StoreError::not_found(EntityKind::Folder, id));
        }

        let folders: Vec<Folder> = self.list_all().await?;
        let files: Vec<FileEntry> = self.list_all().await?;

        let mut child_folders: HashMap<&str, Vec<&Folder>> = HashMap::new();
        for folder in &folders {
            if let Some(parent) = folder.parent_id.as_deref() {
                child_folders.entry(parent).or_default().push(folder);
            }
        }
        let mut child_files: HashMap<&str, Vec<&FileEntry>> = HashMap::new();
        for file in &files {
            if let Some(parent) = file.folder_id.as_deref() {
                child_files.entry(parent).or_default().push(file);
            }
        }
        let by_id: HashMap<&str, &Folder> = folders.iter().map(|f| (f.id(), f)).collect();

        let mut visited: HashSet<String> = HashSet::new();
        let mut stack = vec![id.to_string()];
        let mut trashed = 0;

        while let Some(folder_id) = stack.pop() {
            if !visited.insert(folder_id.clone()) {
                continue;
            }
            let Some(folder) = by_id.get(folder_id.as_str()) else {
                continue;
            };

            if !folder.deleted {
                let patch = trash_patch("parent_id", "original_parent_id", &folder.parent_id)?;
                self.update::<Folder>(&folder_id, patch).await?;
                trashed += 1;
            }

            for file in child_files.get(folder_id.as_str()).into_iter().flatten() {
                if !file.deleted {
                    let patch = trash_patch("folder_id", "original_folder_id", &file.folder_id)?;
                    self.update::<FileEntry>(file.id(), patch).await?;
                    trashed += 1;
                }
            }

            for child in child_folders.get(folder_id.as_str()).into_iter().flatten() {
                stack.push(child.id().to_string());
            }
        }

        debug!("Trashed {} records under folder {}", trashed, id);
        Ok(trashed)
    }

    /// Restore a folder and, unconditionally, every descendant — including
    /// descendants that were trashed independently before the cascade.
    /// Children are matched through the live or the stashed parent ref.
    /// Returns the number of records brought back.
    pub async fn restore_folder(&self, id: &str) -> Result<usize> {
        if self.get::<Folder>(id).await?.is_none() {
            return Err(StoreError::not_found(EntityKind::Folder, id));
        }

        let folders: Vec<Folder> = self.list_all().await?;
        let files: Vec<FileEntry> = self.list_all().await?;

        let mut child_folders: HashMap<&str, Vec<&Folder>> = HashMap::new();
        for folder in &folders {
            if let Some(parent) = folder_link(folder) {
                child_folders.entry(parent).or_default().push(folder);
            }
        }
        let mut child_files: HashMap<&str, Vec<&FileEntry>> = HashMap::new();
        for file in &files {
            if let Some(parent) = file_link(file) {
                child_files.entry(parent).or_default().push(file);
            }
        }
        let by_id: HashMap<&str, &Folder> = folders.iter().map(|f| (f.id(), f)).collect();

        let mut visited: HashSet<String> = HashSet::new();
        let mut stack = vec![id.to_string()];
        let mut restored = 0;

        while let Some(folder_id) = stack.pop() {
            if !visited.insert(folder_id.clone()) {
                continue;
            }
            let Some(folder) = by_id.get(folder_id.as_str()) else {
                continue;
            };

            if folder.deleted {
                let patch = restore_patch(
                    "parent_id",
                    "original_parent_id",
                    &folder.original_parent_id,
                );
                self.update::<Folder>(&folder_id, patch).await?;
                restored += 1;
            }

            for file in child_files.get(folder_id.as_str()).into_iter().flatten() {
                if file.deleted {
                    let target = file
                        .original_folder_id
                        .clone()
                        .or_else(|| file.folder_id.clone());
                    let patch = restore_patch("folder_id", "original_folder_id", &target);
                    self.update::<FileEntry>(file.id(), patch).await?;
                    restored += 1;
                }
            }

            for child in child_folders.get(folder_id.as_str()).into_iter().flatten() {
                stack.push(child.id().to_string());
            }
        }

        debug!("Restored {} records under folder {}", restored, id);
        Ok(restored)
    }

    // -- File restore (three-way decision) --

    /// Restore a single file. If its containing folder is live or gone, the
    /// file goes straight back; if the folder is itself trashed, returns
    /// [`FileRestore::NeedsChoice`] so the caller can prompt.
    pub async fn restore_file(&self, id: &str) -> Result<FileRestore> {
        let file: FileEntry = self
            .get(id)
            .await?
            .ok_or_else(|| StoreError::not_found(EntityKind::File, id))?;

        if let Some(parent_id) = file_link(&file) {
            if let Some(parent) = self.get::<Folder>(parent_id).await? {
                if parent.deleted {
                    return Ok(FileRestore::NeedsChoice {
                        file,
                        trashed_folder: parent,
                    });
                }
            }
            // Missing parent: orphan tolerant, restore in place
        }

        let target = file
            .original_folder_id
            .clone()
            .or_else(|| file.folder_id.clone());
        let restored = self.restore_file_record(&file, target).await?;
        Ok(FileRestore::Restored(restored))
    }

    /// The file-only choice: leave the trashed folder where it is and
    /// relocate the file to that folder's own original parent.
    pub async fn restore_file_detached(&self, id: &str) -> Result<FileEntry> {
        let file: FileEntry = self
            .get(id)
            .await?
            .ok_or_else(|| StoreError::not_found(EntityKind::File, id))?;

        let target = match file_link(&file) {
            Some(parent_id) => match self.get::<Folder>(parent_id).await? {
                Some(parent) if parent.deleted => parent.original_parent_id.clone(),
                Some(_) => Some(parent_id.to_string()),
                None => None,
            },
            None => None,
        };
        self.restore_file_record(&file, target).await
    }

    async fn restore_file_record(
        &self,
        file: &FileEntry,
        target: Option<String>,
    ) -> Result<FileEntry> {
        let patch = restore_patch("folder_id", "original_folder_id", &target);
        self.update(file.id(), patch).await
    }

    // -- Permanent deletion --

    /// Permanent cascade delete, depth-first: child folders first, then the
    /// node's direct files, then the node itself, each via a physical
    /// backend delete. Returns the number of delete calls that removed a
    /// record (N folders + M files + 1).
    pub async fn purge_folder(&self, id: &str) -> Result<usize> {
        if self.get::<Folder>(id).await?.is_none() {
            return Err(StoreError::not_found(EntityKind::Folder, id));
        }

        let folders: Vec<Folder> = self.list_all().await?;
        let files: Vec<FileEntry> = self.list_all().await?;

        let mut child_folders: HashMap<&str, Vec<&Folder>> = HashMap::new();
        for folder in &folders {
            if let Some(parent) = folder_link(folder) {
                child_folders.entry(parent).or_default().push(folder);
            }
        }
        let mut child_files: HashMap<&str, Vec<&FileEntry>> = HashMap::new();
        for file in &files {
            if let Some(parent) = file_link(file) {
                child_files.entry(parent).or_default().push(file);
            }
        }

        // Post-order walk so every subtree is gone before its parent
        let mut order: Vec<String> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut stack = vec![(id.to_string(), false)];
        while let Some((folder_id, expanded)) = stack.pop() {
            if expanded {
                order.push(folder_id);
                continue;
            }
            if !visited.insert(folder_id.clone()) {
                continue;
            }
            stack.push((folder_id.clone(), true));
            for child in child_folders.get(folder_id.as_str()).into_iter().flatten() {
                stack.push((child.id().to_string(), false));
            }
        }

        let mut removed = 0;
        for folder_id in order {
            for file in child_files.get(folder_id.as_str()).into_iter().flatten() {
                if self.delete::<FileEntry>(file.id()).await? {
                    removed += 1;
                }
            }
            if self.delete::<Folder>(&folder_id).await? {
                removed += 1;
            }
        }

        debug!("Purged {} records under folder {}", removed, id);
        Ok(removed)
    }

    pub async fn purge_file(&self, id: &str) -> Result<bool> {
        self.delete::<FileEntry>(id).await
    }

    /// Permanently delete everything in the trash. Only root trashed items
    /// are walked — an item whose stashed parent is itself trashed goes
    /// down with that parent's cascade, not on its own.
    pub async fn empty_trash(&self) -> Result<usize> {
        let folders: Vec<Folder> = self.list_all().await?;
        let files: Vec<FileEntry> = self.list_all().await?;
        let by_id: HashMap<&str, &Folder> = folders.iter().map(|f| (f.id(), f)).collect();

        let parent_trashed = |parent: Option<&str>| {
            parent
                .and_then(|p| by_id.get(p))
                .map(|f| f.deleted)
                .unwrap_or(false)
        };

        let root_folders: Vec<String> = folders
            .iter()
            .filter(|f| f.deleted && !parent_trashed(folder_link(f)))
            .map(|f| f.id().to_string())
            .collect();

        let mut removed = 0;
        for folder_id in root_folders {
            removed += self.purge_folder(&folder_id).await?;
        }

        for file in &files {
            if file.deleted && !parent_trashed(file_link(file)) {
                if self.delete::<FileEntry>(file.id()).await? {
                    removed += 1;
                }
            }
        }

        debug!("Emptied trash: {} records removed", removed);
        Ok(removed)
    }
}
