// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Process-local adapter.
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state key not found: {0}")]
    NotFound(String),
    #[error("failed to serialize object for key '{key}'")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to deserialize object for key '{key}'")]
    Deserialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("state backend failure: {0}")]
    Backend(String),
}

/// Key/value adapter the core stores volatile game state behind.
///
/// A `ttl` of `None` means the entry never expires. `get` on a missing or
/// expired key is `NotFound`, never an empty value.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn set(
        &self,
        key: &str,
        value: Bytes,
        ttl: Option<Duration>,
    ) -> Result<(), StateError>;

    async fn get(&self, key: &str) -> Result<Bytes, StateError>;

    async fn delete(&self, key: &str) -> Result<(), StateError>;

    async fn exists(&self, key: &str) -> Result<bool, StateError>;
}

/// Stores any serializable object as JSON.
pub async fn set_json<T: Serialize + Sync>(
    store: &dyn StateStore,
    key: &str,
    obj: &T,
    ttl: Option<Duration>,
) -> Result<(), StateError> {
    let raw = serde_json::to_vec(obj).map_err(|source| StateError::Serialization {
        key: key.to_string(),
        source,
    })?;
    store.set(key, Bytes::from(raw), ttl).await
}

/// Fetches and deserializes a JSON object previously stored with
/// [`set_json`].
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn StateStore,
    key: &str,
) -> Result<T, StateError> {
    let raw = store.get(key).await?;
    serde_json::from_slice(&raw).map_err(|source| StateError::Deserialization {
        key: key.to_string(),
        source,
    })
}
