//! Vector store client abstraction and HTTP implementation.

use crate::error::MemoryError;
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Handle to an existing collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionHandle {
    /// Store-assigned collection identifier.
    pub id: String,
    /// Collection name.
    pub name: String,
}

/// One record added to a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    /// Record identifier.
    pub id: String,
    /// Embedding vector; records without one are stored but unsearchable.
    pub embedding: Option<Vec<f32>>,
    /// Searchable document text.
    pub document: String,
    /// Metadata payload.
    pub metadata: serde_json::Value,
}

/// Nearest-neighbour query result, rank-ordered by the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Record identifiers.
    pub ids: Vec<String>,
    /// Document texts.
    pub documents: Vec<String>,
    /// Metadata payloads.
    pub metadatas: Vec<serde_json::Value>,
    /// Euclidean-style distances; smaller means more similar.
    pub distances: Vec<f32>,
}

/// Convert a Euclidean-style distance into a similarity in (0, 1].
pub fn distance_to_similarity(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

#[async_trait]
/// Vector store abstraction used by the memory service.
pub trait VectorStoreClient: Send + Sync {
    /// Create the named collection if absent and return a handle to it.
    async fn get_or_create_collection(
        &self,
        name: &str,
    ) -> Result<CollectionHandle, MemoryError>;

    /// Add a record to a collection.
    async fn add(
        &self,
        handle: &CollectionHandle,
        record: VectorRecord,
    ) -> Result<(), MemoryError>;

    /// Query a collection for the `k` nearest neighbours of `embedding`.
    async fn query(
        &self,
        handle: &CollectionHandle,
        embedding: &[f32],
        k: usize,
    ) -> Result<QueryResult, MemoryError>;

    /// Delete a collection by name. Absent collections are not an error.
    async fn delete_collection(&self, name: &str) -> Result<(), MemoryError>;

    /// List all collection names.
    async fn list_collections(&self) -> Result<Vec<String>, MemoryError>;
}

#[derive(Debug, Serialize)]
struct CreateCollectionBody<'a> {
    name: &'a str,
    get_or_create: bool,
}

#[derive(Debug, Deserialize)]
struct CollectionBody {
    id: String,
    name: String,
}

#[derive(Debug, Serialize)]
struct AddBody {
    ids: Vec<String>,
    embeddings: Vec<Option<Vec<f32>>>,
    documents: Vec<String>,
    metadatas: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct QueryBody<'a> {
    query_embeddings: Vec<&'a [f32]>,
    n_results: usize,
    include: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct QueryResponseBody {
    #[serde(default)]
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Vec<Vec<Option<String>>>,
    #[serde(default)]
    metadatas: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    distances: Vec<Vec<f32>>,
}

/// HTTP client for a Chroma-style vector store REST API.
#[derive(Debug, Clone)]
pub struct HttpVectorStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpVectorStore {
    /// Create a client against the given base URL.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, MemoryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn collections_url(&self) -> String {
        format!("{}/api/v1/collections", self.base_url)
    }
}

#[async_trait]
impl VectorStoreClient for HttpVectorStore {
    async fn get_or_create_collection(
        &self,
        name: &str,
    ) -> Result<CollectionHandle, MemoryError> {
        let body = CreateCollectionBody {
            name,
            get_or_create: true,
        };
        let response = self
            .client
            .post(self.collections_url())
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MemoryError::StoreRejected(format!(
                "create collection {name}: {}",
                response.status()
            )));
        }
        let collection: CollectionBody = response.json().await?;
        debug!(
            "resolved collection (name={}, id={})",
            collection.name, collection.id
        );
        Ok(CollectionHandle {
            id: collection.id,
            name: collection.name,
        })
    }

    async fn add(
        &self,
        handle: &CollectionHandle,
        record: VectorRecord,
    ) -> Result<(), MemoryError> {
        let body = AddBody {
            ids: vec![record.id],
            embeddings: vec![record.embedding],
            documents: vec![record.document],
            metadatas: vec![record.metadata],
        };
        let url = format!("{}/{}/add", self.collections_url(), handle.id);
        let response = self.client.post(url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(MemoryError::StoreRejected(format!(
                "add to {}: {}",
                handle.name,
                response.status()
            )));
        }
        Ok(())
    }

    async fn query(
        &self,
        handle: &CollectionHandle,
        embedding: &[f32],
        k: usize,
    ) -> Result<QueryResult, MemoryError> {
        let body = QueryBody {
            query_embeddings: vec![embedding],
            n_results: k,
            include: vec!["documents", "metadatas", "distances"],
        };
        let url = format!("{}/{}/query", self.collections_url(), handle.id);
        let response = self.client.post(url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(MemoryError::StoreRejected(format!(
                "query {}: {}",
                handle.name,
                response.status()
            )));
        }
        let raw: QueryResponseBody = response.json().await?;
        // The store nests results per query embedding; we only ever send one.
        Ok(QueryResult {
            ids: raw.ids.into_iter().next().unwrap_or_default(),
            documents: raw
                .documents
                .into_iter()
                .next()
                .unwrap_or_default()
                .into_iter()
                .map(Option::unwrap_or_default)
                .collect(),
            metadatas: raw.metadatas.into_iter().next().unwrap_or_default(),
            distances: raw.distances.into_iter().next().unwrap_or_default(),
        })
    }

    async fn delete_collection(&self, name: &str) -> Result<(), MemoryError> {
        let url = format!("{}/{}", self.collections_url(), name);
        let response = self.client.delete(url).send().await?;
        // 404 means the collection is already gone, which is the desired end
        // state for an idempotent delete.
        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND
        {
            return Err(MemoryError::StoreRejected(format!(
                "delete collection {name}: {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>, MemoryError> {
        let response = self.client.get(self.collections_url()).send().await?;
        if !response.status().is_success() {
            return Err(MemoryError::StoreRejected(format!(
                "list collections: {}",
                response.status()
            )));
        }
        let collections: Vec<CollectionBody> = response.json().await?;
        Ok(collections.into_iter().map(|c| c.name).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::distance_to_similarity;

    #[test]
    fn similarity_conversion_is_monotonic() {
        assert_eq!(distance_to_similarity(0.0), 1.0);
        assert!(distance_to_similarity(1.0) > distance_to_similarity(2.0));
        assert!((distance_to_similarity(1.0) - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn negative_distances_clamp_to_full_similarity() {
        assert_eq!(distance_to_similarity(-0.5), 1.0);
    }
}
