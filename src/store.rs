//! Persisted bearer-token storage.
//!
//! SYSTEM CONTEXT
//! ==============
//! The session controller is the only writer. Tokens are kept under the key
//! `token` in a small JSON document scoped to the gateway origin, so two
//! gateways never share credentials. Nothing here expires tokens.
//!
//! ERROR HANDLING
//! ==============
//! Reads never fail: an unreadable or corrupt document is logged and treated
//! as "no token". Writes surface [`StoreError`] so the caller can log them.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};

use crate::types::Token;

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

/// Key under which the bearer token is persisted.
pub const TOKEN_KEY: &str = "token";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session store io failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("session store encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Synchronous key-value storage for the session token.
pub trait SessionStore: Send + Sync {
    /// Return the persisted token, if any. An empty stored value reads as absent.
    fn get(&self) -> Option<Token>;

    /// Persist `token`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing storage cannot be written.
    fn set(&self, token: &Token) -> Result<(), StoreError>;

    /// Remove the persisted token. Clearing an absent token succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing storage cannot be written.
    fn clear(&self) -> Result<(), StoreError>;
}

// =============================================================================
// ORIGIN SCOPING
// =============================================================================

/// Derive a filesystem-safe key from the origin (`scheme://host[:port]`) of `base_url`.
///
/// The scheme's default port is dropped, so `http://host` and `http://host:80` share a key.
#[must_use]
pub fn origin_key(base_url: &str) -> String {
    let trimmed = base_url.trim();
    let (scheme, rest) = trimmed.split_once("://").unwrap_or(("http", trimmed));
    let scheme = scheme.to_ascii_lowercase();
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default().to_ascii_lowercase();
    let authority = match default_port(&scheme) {
        Some(port) => authority.strip_suffix(port).unwrap_or(authority.as_str()),
        None => authority.as_str(),
    };
    let origin = format!("{scheme}_{authority}");
    origin
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

fn default_port(scheme: &str) -> Option<&'static str> {
    match scheme {
        "http" => Some(":80"),
        "https" => Some(":443"),
        _ => None,
    }
}

// =============================================================================
// FILE STORE
// =============================================================================

/// Durable store backed by one JSON document per origin.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Store for the origin of `base_url` inside `state_dir`.
    #[must_use]
    pub fn for_origin(state_dir: &Path, base_url: &str) -> Self {
        Self::at(state_dir.join(format!("{}.json", origin_key(base_url))))
    }

    #[must_use]
    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: io::Error) -> StoreError {
        StoreError::Io { path: self.path.clone(), source }
    }

    fn read_document(&self) -> Map<String, Value> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Map::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "session store unreadable");
                return Map::new();
            }
        };
        match serde_json::from_str::<Map<String, Value>>(&raw) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "session store corrupt; ignoring");
                Map::new()
            }
        }
    }

    fn write_document(&self, doc: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let body = serde_json::to_vec_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(|e| self.io_err(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self) -> Option<Token> {
        match self.read_document().get(TOKEN_KEY) {
            Some(Value::String(s)) if !s.is_empty() => Some(Token::new(s.clone())),
            _ => None,
        }
    }

    fn set(&self, token: &Token) -> Result<(), StoreError> {
        let mut doc = self.read_document();
        doc.insert(TOKEN_KEY.to_owned(), Value::String(token.as_str().to_owned()));
        self.write_document(&doc)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut doc = self.read_document();
        if doc.remove(TOKEN_KEY).is_none() {
            return Ok(());
        }
        self.write_document(&doc)
    }
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// Process-local store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_token(token: &str) -> Self {
        let store = Self::new();
        store.lock().insert(TOKEN_KEY.to_owned(), token.to_owned());
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self) -> Option<Token> {
        self.lock()
            .get(TOKEN_KEY)
            .filter(|value| !value.is_empty())
            .map(Token::new)
    }

    fn set(&self, token: &Token) -> Result<(), StoreError> {
        self.lock().insert(TOKEN_KEY.to_owned(), token.as_str().to_owned());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.lock().remove(TOKEN_KEY);
        Ok(())
    }
}

impl<T: SessionStore + ?Sized> SessionStore for std::sync::Arc<T> {
    fn get(&self) -> Option<Token> {
        (**self).get()
    }

    fn set(&self, token: &Token) -> Result<(), StoreError> {
        (**self).set(token)
    }

    fn clear(&self) -> Result<(), StoreError> {
        (**self).clear()
    }
}
