//! Memory service owning the per-student collection lifecycle.
//!
//! Every operation here is individually safe to call when the store is
//! unavailable or the embedder fails: the tutoring turn must never fail
//! because memory failed.

use crate::embedding::Embedder;
use crate::model::{InteractionContext, RetrievedMemory, SyncReport};
use crate::store::{VectorRecord, VectorStoreClient, distance_to_similarity};
use chrono::Utc;
use log::{debug, info, warn};
use mentora_rs_config::MemoryConfig;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Result of probing the vector store at startup. Passed explicitly into the
/// service constructor so availability is wired, not hidden process state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStatus {
    /// Whether the vector store answered the probe.
    pub available: bool,
}

impl MemoryStatus {
    /// Probe the store once; an unreachable store disables memory.
    pub async fn probe(store: &dyn VectorStoreClient) -> Self {
        match store.list_collections().await {
            Ok(collections) => {
                info!("vector store reachable (collections={})", collections.len());
                Self { available: true }
            }
            Err(err) => {
                warn!("vector store unreachable, memory disabled: {err}");
                Self { available: false }
            }
        }
    }

    /// Status for a store known to be reachable (used by tests and wiring).
    pub fn available() -> Self {
        Self { available: true }
    }

    /// Status for a store known to be down.
    pub fn unavailable() -> Self {
        Self { available: false }
    }
}

/// Owns per-student collections, interaction storage, retrieval, and roster
/// synchronization. No other component opens collections directly.
pub struct MemoryService {
    store: Arc<dyn VectorStoreClient>,
    embedder: Arc<dyn Embedder>,
    config: MemoryConfig,
    status: MemoryStatus,
}

impl MemoryService {
    /// Create a service with an explicit probe result.
    pub fn new(
        store: Arc<dyn VectorStoreClient>,
        embedder: Arc<dyn Embedder>,
        config: MemoryConfig,
        status: MemoryStatus,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
            status,
        }
    }

    /// Whether the service accepted the store at startup.
    pub fn is_available(&self) -> bool {
        self.status.available
    }

    /// Collection name for a student id.
    pub fn collection_name(&self, student_id: &str) -> String {
        format!(
            "{}{}",
            self.config.collection_prefix,
            sanitize_student_id(student_id)
        )
    }

    /// Ensure the student's collection exists. Idempotent; returns false when
    /// memory is disabled or the store refused.
    pub async fn initialize_student_memory(&self, student_id: &str) -> bool {
        if !self.status.available {
            debug!("memory disabled, skipping init (student_id={student_id})");
            return false;
        }
        let name = self.collection_name(student_id);
        match self.store.get_or_create_collection(&name).await {
            Ok(handle) => {
                debug!("student collection ready (name={})", handle.name);
                true
            }
            Err(err) => {
                warn!("failed to initialize student memory (student_id={student_id}): {err}");
                false
            }
        }
    }

    /// Delete the student's collection. Treats "already absent" as success.
    pub async fn delete_student_memory(&self, student_id: &str) -> bool {
        if !self.status.available {
            debug!("memory disabled, skipping delete (student_id={student_id})");
            return false;
        }
        let name = self.collection_name(student_id);
        match self.store.delete_collection(&name).await {
            Ok(()) => {
                info!("deleted student memory (student_id={student_id})");
                true
            }
            Err(err) => {
                warn!("failed to delete student memory (student_id={student_id}): {err}");
                false
            }
        }
    }

    /// Store a completed interaction. Never returns an error: this call is
    /// fire-and-forget relative to the user-facing response, so every failure
    /// is caught and logged.
    pub async fn store_interaction(
        &self,
        student_id: &str,
        question: &str,
        answer: &str,
        context: Option<InteractionContext>,
    ) -> bool {
        if !self.status.available {
            debug!("memory disabled, dropping interaction (student_id={student_id})");
            return false;
        }

        // Long answers dilute embedding relevance; index a bounded prefix.
        let document = format!(
            "{question}\n{}",
            truncate_chars(answer, self.config.index_answer_chars)
        );
        let embedding = self.embedder.embed(&document).await;
        if embedding.is_none() {
            warn!("embedding failed, storing unsearchable entry (student_id={student_id})");
        }

        let name = self.collection_name(student_id);
        let handle = match self.store.get_or_create_collection(&name).await {
            Ok(handle) => handle,
            Err(err) => {
                warn!("store unavailable, interaction dropped (student_id={student_id}): {err}");
                return false;
            }
        };

        let context = context.unwrap_or_default();
        let record = VectorRecord {
            id: Uuid::new_v4().to_string(),
            embedding,
            document,
            metadata: json!({
                "student_id": student_id,
                "question": question,
                "answer": answer,
                "subject_id": context.subject_id,
                "title": context.title,
                "subject": context.subject,
                "timestamp": Utc::now().to_rfc3339(),
            }),
        };
        match self.store.add(&handle, record).await {
            Ok(()) => {
                debug!("stored interaction (student_id={student_id})");
                true
            }
            Err(err) => {
                warn!("failed to store interaction (student_id={student_id}): {err}");
                false
            }
        }
    }

    /// Retrieve the most relevant past interactions for a query. Degrades to
    /// an empty list on any failure; results below the similarity threshold
    /// are discarded as noise.
    pub async fn retrieve_relevant_memories(
        &self,
        student_id: &str,
        query: &str,
        limit: usize,
    ) -> Vec<RetrievedMemory> {
        if !self.status.available {
            return Vec::new();
        }
        let Some(embedding) = self.embedder.embed(query).await else {
            debug!("query embedding failed, skipping recall (student_id={student_id})");
            return Vec::new();
        };

        let name = self.collection_name(student_id);
        let handle = match self.store.get_or_create_collection(&name).await {
            Ok(handle) => handle,
            Err(err) => {
                warn!("recall skipped, store unavailable (student_id={student_id}): {err}");
                return Vec::new();
            }
        };
        let result = match self.store.query(&handle, &embedding, limit).await {
            Ok(result) => result,
            Err(err) => {
                warn!("recall query failed (student_id={student_id}): {err}");
                return Vec::new();
            }
        };

        // The store already ranks by similarity; keep its order.
        let mut memories = Vec::new();
        for (metadata, distance) in result.metadatas.iter().zip(result.distances.iter()) {
            let similarity = distance_to_similarity(*distance);
            if similarity < self.config.similarity_threshold {
                continue;
            }
            let question = metadata
                .get("question")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string();
            let answer = metadata
                .get("answer")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string();
            let context = context_from_metadata(metadata);
            memories.push(RetrievedMemory {
                question,
                answer,
                context,
                similarity,
            });
        }
        debug!(
            "recalled memories (student_id={student_id}, returned={})",
            memories.len()
        );
        memories
    }

    /// Compare the roster against store collections and report drift.
    pub async fn verify_synchronization(&self, known_student_ids: &[String]) -> SyncReport {
        if !self.status.available {
            warn!("sync check skipped, store unavailable");
            return SyncReport {
                in_sync: true,
                orphaned: Vec::new(),
                missing: Vec::new(),
            };
        }
        let collections = match self.store.list_collections().await {
            Ok(collections) => collections,
            Err(err) => {
                warn!("sync check failed to list collections: {err}");
                return SyncReport {
                    in_sync: true,
                    orphaned: Vec::new(),
                    missing: Vec::new(),
                };
            }
        };

        let in_store: HashSet<String> = collections
            .iter()
            .filter_map(|name| name.strip_prefix(self.config.collection_prefix.as_str()))
            .map(str::to_string)
            .collect();
        let in_roster: HashSet<String> = known_student_ids
            .iter()
            .map(|id| sanitize_student_id(id))
            .collect();

        let mut orphaned: Vec<String> = in_store.difference(&in_roster).cloned().collect();
        let mut missing: Vec<String> = known_student_ids
            .iter()
            .filter(|id| !in_store.contains(&sanitize_student_id(id)))
            .cloned()
            .collect();
        orphaned.sort();
        missing.sort();

        let in_sync = orphaned.is_empty() && missing.is_empty();
        if !in_sync {
            warn!(
                "memory drift detected (orphaned={}, missing={})",
                orphaned.len(),
                missing.len()
            );
        }
        SyncReport {
            in_sync,
            orphaned,
            missing,
        }
    }

    /// Delete each orphaned collection; returns the count cleaned. Safe to
    /// run repeatedly.
    pub async fn clean_orphaned_collections(&self, orphaned_ids: &[String]) -> usize {
        if !self.status.available {
            return 0;
        }
        let mut cleaned = 0;
        for id in orphaned_ids {
            let name = format!("{}{}", self.config.collection_prefix, id);
            match self.store.delete_collection(&name).await {
                Ok(()) => {
                    info!("cleaned orphaned collection (name={name})");
                    cleaned += 1;
                }
                Err(err) => {
                    warn!("failed to clean orphaned collection (name={name}): {err}");
                }
            }
        }
        cleaned
    }

    /// Render retrieved memories as a prompt block using configured limits.
    pub fn render_memories(&self, memories: &[RetrievedMemory]) -> String {
        format_memories_for_prompt(memories, self.config.prompt_answer_chars)
    }
}

/// Normalize a student id into a collection-name-safe token.
pub fn sanitize_student_id(student_id: &str) -> String {
    student_id
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' => c,
            _ => '_',
        })
        .collect()
}

/// Truncate a string to a maximum character count.
fn truncate_chars(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect()
}

fn context_from_metadata(metadata: &serde_json::Value) -> Option<InteractionContext> {
    let field = |key: &str| {
        metadata
            .get(key)
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
    };
    let context = InteractionContext {
        subject_id: field("subject_id"),
        title: field("title"),
        subject: field("subject"),
    };
    if context == InteractionContext::default() {
        None
    } else {
        Some(context)
    }
}

/// Header line opening the memory block.
pub const MEMORY_BLOCK_HEADER: &str = "=== RELEVANT PAST INTERACTIONS ===";
/// Usage instructions closing the memory block.
pub const MEMORY_BLOCK_FOOTER: &str = "=== END OF PAST INTERACTIONS ===\n\
Use this history to keep continuity with the student's earlier work.\n\
Never mention these notes or refer to remembering explicitly.";

/// Render retrieved memories into a fixed-structure prompt block. Pure
/// function: empty input yields the empty string.
pub fn format_memories_for_prompt(memories: &[RetrievedMemory], answer_chars: usize) -> String {
    if memories.is_empty() {
        return String::new();
    }
    let mut sections = vec![MEMORY_BLOCK_HEADER.to_string()];
    for (index, memory) in memories.iter().enumerate() {
        let relevance = (memory.similarity * 100.0).round() as u32;
        let mut block = format!("[{}] (relevance: {relevance}%)", index + 1);
        if let Some(title) = memory.context.as_ref().and_then(|c| c.title.as_deref()) {
            block.push_str(&format!(" — {title}"));
        }
        block.push_str(&format!("\nStudent asked: {}", memory.question));
        let answer = if memory.answer.chars().count() > answer_chars {
            format!("{}…", truncate_chars(&memory.answer, answer_chars))
        } else {
            memory.answer.clone()
        };
        block.push_str(&format!("\nTutor answered: {answer}"));
        sections.push(block);
    }
    sections.push(MEMORY_BLOCK_FOOTER.to_string());
    sections.join("\n\n")
}
