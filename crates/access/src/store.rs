// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::{collections::HashMap, fmt::Display, sync::Arc};
use tokio::sync::RwLock;

/// Opaque async key-value store backing the authorization cache.
///
/// The manager only ever reads, writes and removes whole entries; anything
/// that can persist bytes under a string key can implement this.
#[async_trait]
pub trait DataStore: Send + Sync + 'static {
    type Error: Display + Send;

    async fn insert<T: Serialize + Send + Sync>(
        &mut self,
        key: &str,
        value: &T,
    ) -> Result<(), Self::Error>;

    async fn get<T: DeserializeOwned + Send + Sync>(
        &self,
        key: &str,
    ) -> Result<Option<T>, Self::Error>;

    async fn remove(&mut self, key: &str) -> Result<(), Self::Error>;
}

/// Bincode-serialized in-memory store.
pub struct InMemoryStore {
    data: HashMap<String, Vec<u8>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataStore for InMemoryStore {
    type Error = eyre::Error;

    async fn insert<T: Serialize + Send + Sync>(
        &mut self,
        key: &str,
        value: &T,
    ) -> Result<(), Self::Error> {
        self.data
            .insert(key.to_string(), bincode::serialize(value)?);
        Ok(())
    }

    async fn get<T: DeserializeOwned + Send + Sync>(
        &self,
        key: &str,
    ) -> Result<Option<T>, Self::Error> {
        Ok(self
            .data
            .get(key)
            .map(|bytes| bincode::deserialize(bytes))
            .transpose()?)
    }

    async fn remove(&mut self, key: &str) -> Result<(), Self::Error> {
        self.data.remove(key);
        Ok(())
    }
}

/// Cloneable handle sharing one store across clients.
pub struct SharedStore<S> {
    inner: Arc<RwLock<S>>,
}

impl<S: DataStore> Clone for SharedStore<S> {
    fn clone(&self) -> Self {
        SharedStore {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: DataStore> SharedStore<S> {
    pub fn new(inner: S) -> SharedStore<S> {
        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }
}

#[async_trait]
impl<S: DataStore> DataStore for SharedStore<S> {
    type Error = S::Error;

    async fn insert<T: Serialize + Send + Sync>(
        &mut self,
        key: &str,
        value: &T,
    ) -> Result<(), Self::Error> {
        self.inner.write().await.insert(key, value).await
    }

    async fn get<T: DeserializeOwned + Send + Sync>(
        &self,
        key: &str,
    ) -> Result<Option<T>, Self::Error> {
        self.inner.read().await.get(key).await
    }

    async fn remove(&mut self, key: &str) -> Result<(), Self::Error> {
        self.inner.write().await.remove(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_get_remove_roundtrip() {
        let mut store = InMemoryStore::new();
        store.insert("k", &vec![1u64, 2, 3]).await.unwrap();

        let loaded: Option<Vec<u64>> = store.get("k").await.unwrap();
        assert_eq!(loaded, Some(vec![1, 2, 3]));

        store.remove("k").await.unwrap();
        let gone: Option<Vec<u64>> = store.get("k").await.unwrap();
        assert_eq!(gone, None);
    }

    #[tokio::test]
    async fn shared_store_clones_see_each_others_writes() {
        let mut a = SharedStore::new(InMemoryStore::new());
        let b = a.clone();

        a.insert("k", &7u32).await.unwrap();
        let loaded: Option<u32> = b.get("k").await.unwrap();
        assert_eq!(loaded, Some(7));
    }
}
