// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::state::{StateError, StateStore};

#[derive(Debug, Clone)]
struct StoredEntry {
    value: Bytes,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// In-memory state adapter with lazy TTL expiry.
///
/// Expired entries are dropped on the next access to their key; there is
/// no background sweeper.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, StoredEntry>,
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

#[async_trait]
impl StateStore for MemoryStore {
    async fn set(
        &self,
        key: &str,
        value: Bytes,
        ttl: Option<Duration>,
    ) -> Result<(), StateError> {
        let expires_at = ttl.map(|d| Instant::now() + d);
        self.entries
            .insert(key.to_string(), StoredEntry { value, expires_at });
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StateError> {
        if let Some(entry) = self.entries.get(key)
            && !entry.expired()
        {
            return Ok(entry.value.clone());
        }
        // Either missing or expired; drop a stale entry on the way out.
        self.entries.remove_if(key, |_, entry| entry.expired());
        Err(StateError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), StateError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StateError> {
        // The read guard must be released before touching the shard again.
        let live = self.entries.get(key).map(|entry| !entry.expired());
        match live {
            Some(true) => Ok(true),
            Some(false) => {
                self.entries.remove_if(key, |_, entry| entry.expired());
                Ok(false)
            },
            None => Ok(false),
        }
    }
}
