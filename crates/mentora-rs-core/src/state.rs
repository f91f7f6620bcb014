//! Session and message persistence using JSONL rollouts.
//!
//! Each session is an append-only event log replayed into an in-memory
//! record. The assistant placeholder message is finalized by appending a
//! `MessageFinalized` event, so a crash mid-stream leaves a recoverable,
//! if incomplete, record.

use crate::types::{ChatMessage, ChatSession, MessageId, Role, SessionId};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Errors returned by the session queries collaborator.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unsupported schema version: {0}")]
    UnsupportedSchema(u32),
    #[error("missing session metadata")]
    MissingMetadata,
    #[error("session already exists: {0}")]
    SessionExists(SessionId),
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),
    #[error("unknown message: {0}")]
    UnknownMessage(MessageId),
    #[error("message already finalized: {0}")]
    AlreadyFinalized(MessageId),
}

/// Session/message persistence collaborator used by the orchestrator.
pub trait SessionQueries: Send + Sync {
    /// Create a new session for a (subject, student) pair.
    fn create_session(
        &self,
        subject_id: &str,
        student_id: &str,
    ) -> Result<ChatSession, StateError>;

    /// Load a session by id.
    fn get_session(&self, session_id: SessionId) -> Result<Option<ChatSession>, StateError>;

    /// Resolve the session for a (subject, student) pair, creating it on
    /// first interaction.
    fn get_or_create_session(
        &self,
        subject_id: &str,
        student_id: &str,
    ) -> Result<ChatSession, StateError>;

    /// Refresh a session's updated-at timestamp.
    fn touch_session(&self, session_id: SessionId) -> Result<(), StateError>;

    /// Append a message to a session.
    fn create_message(
        &self,
        session_id: SessionId,
        role: Role,
        content: &str,
        question_tag: Option<&str>,
    ) -> Result<ChatMessage, StateError>;

    /// Finalize a message's content exactly once.
    fn update_message_content(
        &self,
        session_id: SessionId,
        message_id: MessageId,
        content: &str,
    ) -> Result<(), StateError>;

    /// Messages for a session in ascending timestamp order. With a limit,
    /// returns the most recent N, still ascending.
    fn get_messages(
        &self,
        session_id: SessionId,
        limit: Option<usize>,
    ) -> Result<Vec<ChatMessage>, StateError>;

    /// All sessions for a student, most recently updated first.
    fn list_sessions(&self, student_id: &str) -> Result<Vec<ChatSession>, StateError>;

    /// Delete a session and its backing storage.
    fn delete_session(&self, session_id: SessionId) -> Result<bool, StateError>;
}

/// Internal JSONL event representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RolloutEvent {
    SchemaVersion {
        version: u32,
    },
    SessionCreated {
        session_id: SessionId,
        subject_id: String,
        student_id: String,
        created_at: DateTime<Utc>,
    },
    MessageCreated {
        message_id: MessageId,
        role: Role,
        content: String,
        question_tag: Option<String>,
        created_at: DateTime<Utc>,
    },
    MessageFinalized {
        message_id: MessageId,
        content: String,
        finalized_at: DateTime<Utc>,
    },
}

/// Replayed per-session state.
#[derive(Debug, Clone)]
struct SessionState {
    session: ChatSession,
    messages: Vec<ChatMessage>,
    finalized: HashSet<MessageId>,
}

#[derive(Default)]
struct RolloutState {
    version: Option<u32>,
    subject_id: Option<String>,
    student_id: Option<String>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    messages: Vec<ChatMessage>,
    finalized: HashSet<MessageId>,
}

impl RolloutState {
    fn apply(&mut self, session_id: SessionId, event: RolloutEvent) -> Result<(), StateError> {
        match event {
            RolloutEvent::SchemaVersion { version } => {
                self.version = Some(version);
                if version > 1 {
                    return Err(StateError::UnsupportedSchema(version));
                }
            }
            RolloutEvent::SessionCreated {
                subject_id,
                student_id,
                created_at,
                ..
            } => {
                self.subject_id = Some(subject_id);
                self.student_id = Some(student_id);
                self.created_at = Some(created_at);
                self.updated_at = Some(created_at);
            }
            RolloutEvent::MessageCreated {
                message_id,
                role,
                content,
                question_tag,
                created_at,
            } => {
                self.messages.push(ChatMessage {
                    id: message_id,
                    session_id,
                    role,
                    content,
                    question_tag,
                    created_at,
                });
                self.updated_at = Some(created_at);
            }
            RolloutEvent::MessageFinalized {
                message_id,
                content,
                finalized_at,
            } => {
                if let Some(message) =
                    self.messages.iter_mut().find(|m| m.id == message_id)
                {
                    message.content = content;
                }
                self.finalized.insert(message_id);
                self.updated_at = Some(finalized_at);
            }
        }
        Ok(())
    }

    fn finish(self, session_id: SessionId) -> Result<SessionState, StateError> {
        let _ = self.version.ok_or(StateError::MissingMetadata)?;
        let subject_id = self.subject_id.ok_or(StateError::MissingMetadata)?;
        let student_id = self.student_id.ok_or(StateError::MissingMetadata)?;
        let created_at = self.created_at.ok_or(StateError::MissingMetadata)?;
        Ok(SessionState {
            session: ChatSession {
                id: session_id,
                subject_id,
                student_id,
                created_at,
                updated_at: self.updated_at.unwrap_or(created_at),
            },
            messages: self.messages,
            finalized: self.finalized,
        })
    }
}

/// JSONL-backed session queries implementation with an in-memory cache.
pub struct JsonlSessionStore {
    /// Root directory for session rollouts.
    root: PathBuf,
    /// Serialize write access to rollout files.
    write_lock: Mutex<()>,
    /// Replayed sessions keyed by id.
    cache: RwLock<HashMap<SessionId, SessionState>>,
    /// (subject_id, student_id) -> session id.
    index: RwLock<HashMap<(String, String), SessionId>>,
}

impl JsonlSessionStore {
    /// Create a store under the given root, replaying existing rollouts.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StateError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        let store = Self {
            root,
            write_lock: Mutex::new(()),
            cache: RwLock::new(HashMap::new()),
            index: RwLock::new(HashMap::new()),
        };
        store.replay_all()?;
        info!(
            "initialized session store (root={}, sessions={})",
            store.root.display(),
            store.cache.read().len()
        );
        Ok(store)
    }

    fn rollout_path(&self, session_id: SessionId) -> PathBuf {
        self.root.join(format!("{session_id}.jsonl"))
    }

    fn replay_all(&self) -> Result<(), StateError> {
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("jsonl") {
                continue;
            }
            let session_id = match path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| Uuid::parse_str(stem).ok())
            {
                Some(id) => id,
                None => continue,
            };
            match self.read_rollout(session_id)? {
                Some(state) => {
                    self.index.write().insert(
                        (
                            state.session.subject_id.clone(),
                            state.session.student_id.clone(),
                        ),
                        session_id,
                    );
                    self.cache.write().insert(session_id, state);
                }
                None => continue,
            }
        }
        Ok(())
    }

    fn read_rollout(&self, session_id: SessionId) -> Result<Option<SessionState>, StateError> {
        let path = self.rollout_path(session_id);
        if !path.exists() {
            return Ok(None);
        }
        let file = OpenOptions::new().read(true).open(&path)?;
        let reader = BufReader::new(file);
        let mut rollout = RolloutState::default();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event: RolloutEvent = serde_json::from_str(&line)?;
            rollout.apply(session_id, event)?;
        }
        Ok(Some(rollout.finish(session_id)?))
    }

    fn write_event(&self, session_id: SessionId, event: &RolloutEvent) -> Result<(), StateError> {
        let _guard = self.write_lock.lock();
        let path = self.rollout_path(session_id);
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let line = serde_json::to_string(event)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    fn write_new_rollout(
        &self,
        session_id: SessionId,
        event: &RolloutEvent,
    ) -> Result<(), StateError> {
        let _guard = self.write_lock.lock();
        let path = self.rollout_path(session_id);
        if path.exists() {
            return Err(StateError::SessionExists(session_id));
        }
        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)?;
        let header = serde_json::to_string(&RolloutEvent::SchemaVersion { version: 1 })?;
        writeln!(file, "{header}")?;
        let line = serde_json::to_string(event)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

impl SessionQueries for JsonlSessionStore {
    /// Create and persist a new session.
    fn create_session(
        &self,
        subject_id: &str,
        student_id: &str,
    ) -> Result<ChatSession, StateError> {
        let now = Utc::now();
        let session = ChatSession {
            id: Uuid::new_v4(),
            subject_id: subject_id.to_string(),
            student_id: student_id.to_string(),
            created_at: now,
            updated_at: now,
        };
        info!(
            "created session (session_id={}, subject_id={subject_id}, student_id={student_id})",
            session.id
        );
        let event = RolloutEvent::SessionCreated {
            session_id: session.id,
            subject_id: subject_id.to_string(),
            student_id: student_id.to_string(),
            created_at: now,
        };
        self.write_new_rollout(session.id, &event)?;
        self.index
            .write()
            .insert((subject_id.to_string(), student_id.to_string()), session.id);
        self.cache.write().insert(
            session.id,
            SessionState {
                session: session.clone(),
                messages: Vec::new(),
                finalized: HashSet::new(),
            },
        );
        Ok(session)
    }

    fn get_session(&self, session_id: SessionId) -> Result<Option<ChatSession>, StateError> {
        Ok(self
            .cache
            .read()
            .get(&session_id)
            .map(|state| state.session.clone()))
    }

    fn get_or_create_session(
        &self,
        subject_id: &str,
        student_id: &str,
    ) -> Result<ChatSession, StateError> {
        let key = (subject_id.to_string(), student_id.to_string());
        if let Some(session_id) = self.index.read().get(&key).copied()
            && let Some(state) = self.cache.read().get(&session_id)
        {
            return Ok(state.session.clone());
        }
        self.create_session(subject_id, student_id)
    }

    /// Updated-at is derived from the last event on replay, so touching only
    /// refreshes the cached record.
    fn touch_session(&self, session_id: SessionId) -> Result<(), StateError> {
        let mut cache = self.cache.write();
        let state = cache
            .get_mut(&session_id)
            .ok_or(StateError::UnknownSession(session_id))?;
        state.session.updated_at = Utc::now();
        Ok(())
    }

    fn create_message(
        &self,
        session_id: SessionId,
        role: Role,
        content: &str,
        question_tag: Option<&str>,
    ) -> Result<ChatMessage, StateError> {
        if !self.cache.read().contains_key(&session_id) {
            return Err(StateError::UnknownSession(session_id));
        }
        let now = Utc::now();
        let message = ChatMessage {
            id: Uuid::new_v4(),
            session_id,
            role,
            content: content.to_string(),
            question_tag: question_tag.map(str::to_string),
            created_at: now,
        };
        debug!(
            "appending message (session_id={session_id}, role={}, content_len={})",
            role.as_str(),
            content.len()
        );
        let event = RolloutEvent::MessageCreated {
            message_id: message.id,
            role,
            content: content.to_string(),
            question_tag: message.question_tag.clone(),
            created_at: now,
        };
        self.write_event(session_id, &event)?;

        let mut cache = self.cache.write();
        let state = cache
            .get_mut(&session_id)
            .ok_or(StateError::UnknownSession(session_id))?;
        state.messages.push(message.clone());
        state.session.updated_at = now;
        Ok(message)
    }

    fn update_message_content(
        &self,
        session_id: SessionId,
        message_id: MessageId,
        content: &str,
    ) -> Result<(), StateError> {
        {
            let cache = self.cache.read();
            let state = cache
                .get(&session_id)
                .ok_or(StateError::UnknownSession(session_id))?;
            if !state.messages.iter().any(|m| m.id == message_id) {
                return Err(StateError::UnknownMessage(message_id));
            }
            if state.finalized.contains(&message_id) {
                return Err(StateError::AlreadyFinalized(message_id));
            }
        }
        let now = Utc::now();
        let event = RolloutEvent::MessageFinalized {
            message_id,
            content: content.to_string(),
            finalized_at: now,
        };
        self.write_event(session_id, &event)?;

        let mut cache = self.cache.write();
        let state = cache
            .get_mut(&session_id)
            .ok_or(StateError::UnknownSession(session_id))?;
        if let Some(message) = state.messages.iter_mut().find(|m| m.id == message_id) {
            message.content = content.to_string();
        }
        state.finalized.insert(message_id);
        state.session.updated_at = now;
        Ok(())
    }

    fn get_messages(
        &self,
        session_id: SessionId,
        limit: Option<usize>,
    ) -> Result<Vec<ChatMessage>, StateError> {
        let cache = self.cache.read();
        let state = cache
            .get(&session_id)
            .ok_or(StateError::UnknownSession(session_id))?;
        let mut messages = state.messages.clone();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        if let Some(limit) = limit {
            let start = messages.len().saturating_sub(limit);
            messages.drain(..start);
        }
        Ok(messages)
    }

    fn list_sessions(&self, student_id: &str) -> Result<Vec<ChatSession>, StateError> {
        let cache = self.cache.read();
        let mut sessions: Vec<ChatSession> = cache
            .values()
            .filter(|state| state.session.student_id == student_id)
            .map(|state| state.session.clone())
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    fn delete_session(&self, session_id: SessionId) -> Result<bool, StateError> {
        let removed = {
            let mut cache = self.cache.write();
            match cache.remove(&session_id) {
                Some(state) => {
                    self.index.write().remove(&(
                        state.session.subject_id.clone(),
                        state.session.student_id.clone(),
                    ));
                    true
                }
                None => false,
            }
        };
        let path = self.rollout_path(session_id);
        if path.exists() {
            info!("deleting session rollout (session_id={session_id})");
            fs::remove_file(path)?;
            Ok(true)
        } else {
            if !removed {
                warn!("session rollout not found (session_id={session_id})");
            }
            Ok(removed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{JsonlSessionStore, SessionQueries, StateError};
    use crate::types::Role;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn get_or_create_resolves_the_same_session() {
        let temp = tempdir().expect("tempdir");
        let store = JsonlSessionStore::new(temp.path()).expect("store");

        let first = store.get_or_create_session("hw-1", "student-1").expect("create");
        let second = store.get_or_create_session("hw-1", "student-1").expect("get");
        assert_eq!(first.id, second.id);

        let other = store.get_or_create_session("hw-2", "student-1").expect("create");
        assert!(other.id != first.id);
    }

    #[test]
    fn messages_round_trip_across_restart() {
        let temp = tempdir().expect("tempdir");
        let session_id = {
            let store = JsonlSessionStore::new(temp.path()).expect("store");
            let session = store.get_or_create_session("hw-1", "student-1").expect("create");
            store
                .create_message(session.id, Role::User, "help me", Some("Q1"))
                .expect("user message");
            let placeholder = store
                .create_message(session.id, Role::Assistant, "", None)
                .expect("placeholder");
            store
                .update_message_content(session.id, placeholder.id, "what do you notice?")
                .expect("finalize");
            session.id
        };

        let store = JsonlSessionStore::new(temp.path()).expect("reopen");
        let messages = store.get_messages(session_id, None).expect("messages");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "help me");
        assert_eq!(messages[0].question_tag.as_deref(), Some("Q1"));
        assert_eq!(messages[1].content, "what do you notice?");

        let session = store
            .get_session(session_id)
            .expect("get")
            .expect("session");
        assert!(session.updated_at >= session.created_at);
    }

    #[test]
    fn finalize_applies_exactly_once() {
        let temp = tempdir().expect("tempdir");
        let store = JsonlSessionStore::new(temp.path()).expect("store");
        let session = store.get_or_create_session("hw-1", "student-1").expect("create");
        let placeholder = store
            .create_message(session.id, Role::Assistant, "", None)
            .expect("placeholder");

        store
            .update_message_content(session.id, placeholder.id, "final")
            .expect("first finalize");
        let err = store
            .update_message_content(session.id, placeholder.id, "again")
            .expect_err("second finalize");
        match err {
            StateError::AlreadyFinalized(id) => assert_eq!(id, placeholder.id),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn most_recent_limit_returns_ascending_order() {
        let temp = tempdir().expect("tempdir");
        let store = JsonlSessionStore::new(temp.path()).expect("store");
        let session = store.get_or_create_session("hw-1", "student-1").expect("create");
        for i in 0..5 {
            store
                .create_message(session.id, Role::User, &format!("message {i}"), None)
                .expect("message");
        }

        let recent = store.get_messages(session.id, Some(2)).expect("messages");
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "message 3");
        assert_eq!(recent[1].content, "message 4");
    }

    #[test]
    fn list_sessions_is_scoped_to_the_student() {
        let temp = tempdir().expect("tempdir");
        let store = JsonlSessionStore::new(temp.path()).expect("store");
        let first = store.get_or_create_session("hw-1", "student-1").expect("create");
        let second = store.get_or_create_session("hw-2", "student-1").expect("create");
        store.get_or_create_session("hw-1", "student-2").expect("create");

        store
            .create_message(second.id, Role::User, "newest activity", None)
            .expect("message");

        let sessions = store.list_sessions("student-1").expect("list");
        assert_eq!(sessions.len(), 2);
        // most recently updated first
        assert_eq!(sessions[0].id, second.id);
        assert_eq!(sessions[1].id, first.id);
        assert_eq!(store.list_sessions("student-3").expect("list"), Vec::new());
    }

    #[test]
    fn delete_session_removes_rollout() {
        let temp = tempdir().expect("tempdir");
        let store = JsonlSessionStore::new(temp.path()).expect("store");
        let session = store.get_or_create_session("hw-1", "student-1").expect("create");

        assert_eq!(store.delete_session(session.id).expect("delete"), true);
        assert_eq!(store.get_session(session.id).expect("get"), None);
        // second delete reports nothing removed
        assert_eq!(store.delete_session(session.id).expect("delete"), false);

        // the pair can start fresh afterwards
        let fresh = store.get_or_create_session("hw-1", "student-1").expect("recreate");
        assert!(fresh.id != session.id);
    }
}
