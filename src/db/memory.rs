use super::CollectionBackend;
use crate::error::CollectionError;
use crate::models::{CollectionKind, Entry, UserCollection, UserId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Process-local document store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryBackend {
    documents: RwLock<HashMap<(String, CollectionKind), HashMap<String, Entry>>>,
    writes: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents written since creation.
    #[cfg(test)]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CollectionBackend for MemoryBackend {
    async fn load(
        &self,
        owner: &UserId,
        kind: CollectionKind,
    ) -> Result<Option<UserCollection>, CollectionError> {
        let documents = self.documents.read().await;
        Ok(documents
            .get(&(owner.as_str().to_string(), kind))
            .map(|entries| UserCollection {
                owner: owner.clone(),
                kind,
                entries: entries.clone(),
            }))
    }

    async fn save(&self, collection: &UserCollection) -> Result<(), CollectionError> {
        let mut documents = self.documents.write().await;
        documents.insert(
            (collection.owner.as_str().to_string(), collection.kind),
            collection.entries.clone(),
        );
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
