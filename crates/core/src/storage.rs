//! Volatile key/value storage backends for the access credential
//!
//! Every operation is infallible. Reads report absence as `None` and a
//! write that cannot be performed is dropped, so callers may probe storage
//! speculatively, e.g. while rendering without a browser.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Tab-scoped string storage
pub trait TokenStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str);
    fn remove_item(&self, key: &str);
}

/// In-process storage, the native stand-in for `sessionStorage`
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TokenStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }

    fn remove_item(&self, key: &str) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

/// Storage for contexts that have none (server-side rendering)
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedStorage;

impl TokenStorage for DetachedStorage {
    fn get_item(&self, _key: &str) -> Option<String> {
        None
    }

    fn set_item(&self, key: &str, _value: &str) {
        tracing::debug!(key, "No storage available, dropping write");
    }

    fn remove_item(&self, _key: &str) {}
}

/// Browser `sessionStorage`
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserSessionStorage;

#[cfg(target_arch = "wasm32")]
impl BrowserSessionStorage {
    fn storage() -> Option<web_sys::Storage> {
        web_sys::window().and_then(|w| w.session_storage().ok().flatten())
    }
}

#[cfg(target_arch = "wasm32")]
impl TokenStorage for BrowserSessionStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        Self::storage().and_then(|s| s.get_item(key).ok().flatten())
    }

    fn set_item(&self, key: &str, value: &str) {
        if let Some(storage) = Self::storage() {
            if storage.set_item(key, value).is_err() {
                tracing::warn!(key, "sessionStorage rejected write");
            }
        }
    }

    fn remove_item(&self, key: &str) {
        if let Some(storage) = Self::storage() {
            let _ = storage.remove_item(key);
        }
    }
}
