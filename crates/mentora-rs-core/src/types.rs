//! Core data types shared across the tutoring engine API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a chat session.
pub type SessionId = Uuid;

/// Unique identifier for a chat message.
pub type MessageId = Uuid;

/// Speaker role for a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Student-authored message.
    User,
    /// Tutor-authored message.
    Assistant,
}

impl Role {
    /// Return the role as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One chat session: a (subject, student) conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatSession {
    /// Session identifier.
    pub id: SessionId,
    /// Lesson or homework this conversation is about.
    pub subject_id: String,
    /// Owning student identifier.
    pub student_id: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Touched on every new message.
    pub updated_at: DateTime<Utc>,
}

/// One message side of a turn, ordered by timestamp within its session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// Message identifier.
    pub id: MessageId,
    /// Owning session.
    pub session_id: SessionId,
    /// Speaker role.
    pub role: Role,
    /// Message content. Mutable only for the assistant placeholder until it
    /// is finalized exactly once.
    pub content: String,
    /// Optional tag linking the message to a specific subject question.
    pub question_tag: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Non-sensitive student profile facts used for prompt composition.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StudentProfile {
    /// Student identifier.
    pub id: String,
    /// Display name.
    pub name: Option<String>,
    /// Age in years, when known.
    pub age: Option<u8>,
    /// Grade level, when known.
    pub grade_level: Option<u8>,
    /// Current skill focus (e.g. "long division").
    pub skill_focus: Option<String>,
    /// Personal interests; surfaced only inside the struggle-support block.
    pub interests: Vec<String>,
}

/// One identifiable item of subject matter the generator can reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubjectItem {
    /// Identifier tag (e.g. "Q1").
    pub tag: String,
    /// Item text.
    pub text: String,
}

/// The subject matter a session is anchored to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SubjectContext {
    /// Personalized homework with its questions.
    Homework {
        /// Homework identifier.
        id: String,
        /// Title shown to the student.
        title: String,
        /// Questions, each tagged for reference.
        questions: Vec<SubjectItem>,
    },
    /// Lesson content.
    Lesson {
        /// Lesson identifier.
        id: String,
        /// Title shown to the student.
        title: String,
        /// Content sections, each tagged for reference.
        sections: Vec<SubjectItem>,
    },
}

impl SubjectContext {
    /// Identifier of the underlying lesson or homework.
    pub fn subject_id(&self) -> &str {
        match self {
            SubjectContext::Homework { id, .. } => id,
            SubjectContext::Lesson { id, .. } => id,
        }
    }

    /// Title of the underlying lesson or homework.
    pub fn title(&self) -> &str {
        match self {
            SubjectContext::Homework { title, .. } => title,
            SubjectContext::Lesson { title, .. } => title,
        }
    }

    /// The referenceable items for prompt composition.
    pub fn items(&self) -> &[SubjectItem] {
        match self {
            SubjectContext::Homework { questions, .. } => questions,
            SubjectContext::Lesson { sections, .. } => sections,
        }
    }
}
