//! Credential storage behind a `{get, set, clear}` capability.
//!
//! SYSTEM CONTEXT
//! ==============
//! The session coordinator is written against `TokenStore` only, so the same
//! refresh logic serves a session-scoped store (`MemoryTokenStore`) and a
//! persistent one (`FileTokenStore`).

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::config::TokenStoreKind;

/// Tokens issued by sign-in, sign-up or refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    /// `None` when the server did not rotate the refresh token.
    pub refresh_token: Option<String>,
}

impl TokenPair {
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self { access_token: access_token.into(), refresh_token: Some(refresh_token.into()) }
    }
}

/// Snapshot of whatever is currently stored. Persisted under the
/// `accessToken` / `refreshToken` keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl StoredTokens {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }

    /// Apply a newly issued pair, keeping the prior refresh token when the
    /// pair does not carry one.
    fn apply(&mut self, pair: &TokenPair) {
        self.access_token = Some(pair.access_token.clone());
        if let Some(refresh) = &pair.refresh_token {
            self.refresh_token = Some(refresh.clone());
        }
    }
}

pub trait TokenStore: Send + Sync {
    fn get(&self) -> StoredTokens;
    fn set(&self, pair: &TokenPair);
    fn clear(&self);

    /// Clear the store and return what it held, in one step.
    fn take(&self) -> StoredTokens;

    fn access_token(&self) -> Option<String> {
        self.get().access_token
    }

    fn refresh_token(&self) -> Option<String> {
        self.get().refresh_token
    }
}

/// Open the store described by `kind`.
#[must_use]
pub fn open_store(kind: &TokenStoreKind) -> Arc<dyn TokenStore> {
    match kind {
        TokenStoreKind::Memory => Arc::new(MemoryTokenStore::new()),
        TokenStoreKind::File(path) => Arc::new(FileTokenStore::open(path)),
    }
}

/// Session-scoped store: tokens live as long as the process.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<StoredTokens>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_tokens(pair: &TokenPair) -> Self {
        let store = Self::new();
        store.set(pair);
        store
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> StoredTokens {
        self.tokens.read().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    fn set(&self, pair: &TokenPair) {
        self.tokens
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .apply(pair);
    }

    fn clear(&self) {
        *self.tokens.write().unwrap_or_else(std::sync::PoisonError::into_inner) = StoredTokens::default();
    }

    fn take(&self) -> StoredTokens {
        std::mem::take(&mut *self.tokens.write().unwrap_or_else(std::sync::PoisonError::into_inner))
    }
}

/// Persistent store backed by a small JSON file.
///
/// The in-memory copy is authoritative for the running process; a failed
/// write is logged and does not fail the caller.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    tokens: RwLock<StoredTokens>,
}

impl FileTokenStore {
    /// Load tokens from `path`. A missing or unreadable file starts empty.
    #[must_use]
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let tokens = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice::<StoredTokens>(&bytes).unwrap_or_else(|e| {
                tracing::warn!(error = %e, path = %path.display(), "token file unreadable; starting signed out");
                StoredTokens::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoredTokens::default(),
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "token file open failed; starting signed out");
                StoredTokens::default()
            }
        };
        Self { path, tokens: RwLock::new(tokens) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, tokens: &StoredTokens) {
        let result = if tokens.is_empty() {
            match std::fs::remove_file(&self.path) {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            }
        } else {
            write_tokens(&self.path, tokens)
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, path = %self.path.display(), "token file write failed");
        }
    }
}

fn write_tokens(path: &Path, tokens: &StoredTokens) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let bytes = serde_json::to_vec_pretty(tokens).map_err(std::io::Error::other)?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> StoredTokens {
        self.tokens.read().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    fn set(&self, pair: &TokenPair) {
        let mut tokens = self.tokens.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        tokens.apply(pair);
        self.persist(&tokens);
    }

    fn clear(&self) {
        let mut tokens = self.tokens.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        *tokens = StoredTokens::default();
        self.persist(&tokens);
    }

    fn take(&self) -> StoredTokens {
        let mut tokens = self.tokens.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let previous = std::mem::take(&mut *tokens);
        if !previous.is_empty() {
            self.persist(&tokens);
        }
        previous
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
