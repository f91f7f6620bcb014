use async_trait::async_trait;
use mentora_rs_memory::{
    CollectionHandle, MemoryError, QueryResult, VectorRecord, VectorStoreClient,
};
use parking_lot::Mutex;
use std::collections::HashMap;

/// In-memory vector store ranking neighbours by Euclidean distance. A
/// failable switch simulates an unreachable store.
pub struct InMemoryVectorStore {
    collections: Mutex<HashMap<String, Vec<VectorRecord>>>,
    failing: Mutex<bool>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            failing: Mutex::new(false),
        }
    }

    /// Toggle simulated unavailability.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    /// Number of records held in the named collection.
    pub fn record_count(&self, name: &str) -> usize {
        self.collections
            .lock()
            .get(name)
            .map(Vec::len)
            .unwrap_or(0)
    }

    fn check(&self) -> Result<(), MemoryError> {
        if *self.failing.lock() {
            Err(MemoryError::StoreUnavailable("stub offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[async_trait]
impl VectorStoreClient for InMemoryVectorStore {
    async fn get_or_create_collection(
        &self,
        name: &str,
    ) -> Result<CollectionHandle, MemoryError> {
        self.check()?;
        self.collections
            .lock()
            .entry(name.to_string())
            .or_default();
        Ok(CollectionHandle {
            id: name.to_string(),
            name: name.to_string(),
        })
    }

    async fn add(
        &self,
        handle: &CollectionHandle,
        record: VectorRecord,
    ) -> Result<(), MemoryError> {
        self.check()?;
        self.collections
            .lock()
            .entry(handle.name.clone())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn query(
        &self,
        handle: &CollectionHandle,
        embedding: &[f32],
        k: usize,
    ) -> Result<QueryResult, MemoryError> {
        self.check()?;
        let collections = self.collections.lock();
        let records = collections.get(&handle.name).cloned().unwrap_or_default();
        let mut scored: Vec<(f32, &VectorRecord)> = records
            .iter()
            .filter_map(|record| {
                record
                    .embedding
                    .as_ref()
                    .map(|vec| (euclidean(vec, embedding), record))
            })
            .collect();
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        let mut result = QueryResult::default();
        for (distance, record) in scored.into_iter().take(k) {
            result.ids.push(record.id.clone());
            result.documents.push(record.document.clone());
            result.metadatas.push(record.metadata.clone());
            result.distances.push(distance);
        }
        Ok(result)
    }

    async fn delete_collection(&self, name: &str) -> Result<(), MemoryError> {
        self.check()?;
        self.collections.lock().remove(name);
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>, MemoryError> {
        self.check()?;
        Ok(self.collections.lock().keys().cloned().collect())
    }
}
