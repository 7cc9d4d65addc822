use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::Store;
use crate::error::Result;

/// The remote config persists as a single JSON blob under this key.
pub const CONFIG_KEY: &str = "onhub_wp_config";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub url: String,
    pub api_key: String,
}

impl RemoteConfig {
    /// Connected iff both fields are non-empty.
    pub fn is_connected(&self) -> bool {
        !self.url.is_empty() && !self.api_key.is_empty()
    }
}

impl Store {
    pub fn get_config(&self) -> Result<Option<RemoteConfig>> {
        let Some(raw) = self.local().kv_get(CONFIG_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                warn!("Ignoring malformed remote config: {}", err);
                Ok(None)
            }
        }
    }

    pub fn set_config(&self, url: &str, api_key: &str) -> Result<()> {
        let config = RemoteConfig {
            url: url.to_string(),
            api_key: api_key.to_string(),
        };
        self.local()
            .kv_set(CONFIG_KEY, &serde_json::to_string(&config)?)
    }

    pub fn clear_config(&self) -> Result<()> {
        self.local().kv_delete(CONFIG_KEY)
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.get_config(), Ok(Some(config)) if config.is_connected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Backend;

    #[test]
    fn unconfigured_store_is_not_connected() {
        let store = Store::open_in_memory().unwrap();
        assert!(!store.is_connected());
        assert!(store.get_config().unwrap().is_none());
    }

    #[test]
    fn either_empty_field_means_disconnected() {
        let store = Store::open_in_memory().unwrap();

        store.set_config("https://wp.example.com", "").unwrap();
        assert!(!store.is_connected());

        store.set_config("", "secret").unwrap();
        assert!(!store.is_connected());

        store.set_config("https://wp.example.com", "secret").unwrap();
        assert!(store.is_connected());
    }

    #[test]
    fn clear_config_disconnects() {
        let store = Store::open_in_memory().unwrap();
        store.set_config("https://wp.example.com", "secret").unwrap();
        assert!(store.is_connected());

        store.clear_config().unwrap();
        assert!(!store.is_connected());
        assert!(store.get_config().unwrap().is_none());
    }

    #[test]
    fn malformed_config_blob_reads_as_absent() {
        let store = Store::open_in_memory().unwrap();
        store.local().kv_set(CONFIG_KEY, "{not json").unwrap();
        assert!(store.get_config().unwrap().is_none());
        assert!(!store.is_connected());
    }

    #[test]
    fn backend_switches_with_config() {
        let store = Store::open_in_memory().unwrap();
        assert!(matches!(store.backend().unwrap(), Backend::Local(_)));

        store.set_config("https://wp.example.com", "secret").unwrap();
        assert!(matches!(store.backend().unwrap(), Backend::Remote(_)));

        // Partial config falls back to local
        store.set_config("https://wp.example.com", "").unwrap();
        assert!(matches!(store.backend().unwrap(), Backend::Local(_)));
    }
}
