//! Cache store port and the in-process backend.
//!
//! The cache layer talks to storage only through [`CacheStore`]. A backend
//! keeps bodies against [`CacheKey`]s with last-write-wins semantics and must
//! tolerate concurrent calls from independent requests; the layer does no
//! locking of its own.

use std::{future::Future, pin::Pin};

use bytes::Bytes;
use dashmap::DashMap;
use thiserror::Error;

use super::CacheKey;

/// Failures a backend may report. The cache layer logs them and carries on.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("cache backend error: {0}")]
    Backend(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Boxed future returned by [`CacheStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Key-value storage for cached response bodies.
///
/// - `get` resolves to `Ok(None)` for unknown keys, not an error.
/// - `set` is idempotent; repeated writes to a key keep the last body.
pub trait CacheStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, Option<Bytes>>;

    fn set<'a>(&'a self, key: &'a CacheKey, body: Bytes) -> StoreFuture<'a, ()>;
}

/// Unbounded in-process store backed by a sharded concurrent map.
///
/// Entries live until the store is dropped; there is no expiry.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Bytes>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, Option<Bytes>> {
        Box::pin(async move {
            let hit = self.entries.get(key.as_str()).map(|entry| entry.value().clone());
            Ok(hit)
        })
    }

    fn set<'a>(&'a self, key: &'a CacheKey, body: Bytes) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.entries.insert(key.as_str().to_owned(), body);
            Ok(())
        })
    }
}
