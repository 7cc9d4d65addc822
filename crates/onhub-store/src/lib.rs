//! OnHub persistence layer: one typed CRUD surface over two backends — an
//! embedded SQLite store and a remote OnHub REST API — selected per call
//! from the persisted remote config, with the trash/restore lifecycle
//! layered on top.

pub mod auth;
pub mod config;
pub mod entity;
pub mod error;
pub mod local;
pub mod remote;
pub mod trash;

use std::path::Path;

use onhub_types::EntityKind;
use onhub_types::api::SyncResponse;

pub use config::RemoteConfig;
pub use entity::{Patch, generate_id};
pub use error::{Result, StoreError};
pub use local::LocalStore;
pub use remote::RemoteStore;
pub use trash::FileRestore;

/// The entity store. Owns the embedded backend (always present — it also
/// holds the remote config and session keys) and a shared HTTP client for
/// the remote one.
pub struct Store {
    local: LocalStore,
    http: reqwest::Client,
}

/// Which backend a single operation runs against.
pub enum Backend<'a> {
    Local(&'a LocalStore),
    Remote(RemoteStore),
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Store {
            local: LocalStore::open(path)?,
            http: reqwest::Client::new(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Store {
            local: LocalStore::open_in_memory()?,
            http: reqwest::Client::new(),
        })
    }

    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    /// Resolve the backend for one operation. Re-reads the stored config on
    /// every call, so connecting or disconnecting takes effect immediately
    /// and nothing caches connection state across calls.
    pub fn backend(&self) -> Result<Backend<'_>> {
        match self.get_config()? {
            Some(config) if config.is_connected() => {
                Ok(Backend::Remote(RemoteStore::new(self.http.clone(), &config)))
            }
            _ => Ok(Backend::Local(&self.local)),
        }
    }

    /// A remote handle, or `NotConfigured` when no usable config is stored.
    fn remote(&self) -> Result<RemoteStore> {
        match self.get_config()? {
            Some(config) if config.is_connected() => {
                Ok(RemoteStore::new(self.http.clone(), &config))
            }
            _ => Err(StoreError::NotConfigured),
        }
    }

    /// Manual export: push every local record of `kind` to the remote bulk
    /// `/sync` endpoint. Data never migrates between backends on its own.
    pub async fn push_collection(&self, kind: EntityKind) -> Result<SyncResponse> {
        let remote = self.remote()?;
        let data = self.local.list(kind, &Patch::new())?;
        remote.sync(kind.collection(), data).await
    }

    pub async fn ping_remote(&self) -> Result<bool> {
        Ok(self.remote()?.ping().await)
    }
}
