//! Chat orchestrator: one tutoring turn from session resolution to the
//! detached memory commit.
//!
//! The turn is a sequential pipeline; token streaming is the only suspension
//! point visible to the caller. Memory retrieval sits on the critical path
//! but degrades to empty, and the memory commit is a detached task that can
//! never retroactively fail a completed turn.

use crate::error::TutorCoreError;
use crate::generation::{GenerationEngine, GenerationOptions};
use crate::persona::Persona;
use crate::prompt::{PromptInputs, compose_system_prompt};
use crate::state::SessionQueries;
use crate::struggle::analyze_struggle;
use crate::types::{ChatMessage, MessageId, Role, SessionId, StudentProfile, SubjectContext};
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use mentora_rs_config::TutorConfig;
use mentora_rs_memory::{InteractionContext, MemoryService};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// One incoming chat turn.
#[derive(Debug, Clone)]
pub struct ChatTurnRequest {
    /// Student profile, already authorized by the caller.
    pub student: StudentProfile,
    /// Homework or lesson this conversation is anchored to.
    pub subject: SubjectContext,
    /// The new student message.
    pub message: String,
    /// Optional tag linking the message to a subject question.
    pub question_tag: Option<String>,
}

/// Caller-facing events for one streamed turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// One generated token.
    Token {
        /// Token text.
        text: String,
    },
    /// Terminal success event; the assistant message is finalized.
    Done {
        /// Session the turn belongs to.
        session_id: SessionId,
        /// Finalized assistant message id.
        message_id: MessageId,
        /// Full assistant response.
        content: String,
    },
    /// Terminal failure event; partial content is preserved.
    Error {
        /// Failure description.
        message: String,
    },
}

/// Orchestrates a tutoring turn across sessions, memory, prompt composition,
/// and the generation engine.
pub struct ChatOrchestrator {
    queries: Arc<dyn SessionQueries>,
    memory: Arc<MemoryService>,
    engine: Arc<dyn GenerationEngine>,
    config: TutorConfig,
}

impl ChatOrchestrator {
    /// Wire an orchestrator from its collaborators.
    pub fn new(
        queries: Arc<dyn SessionQueries>,
        memory: Arc<MemoryService>,
        engine: Arc<dyn GenerationEngine>,
        config: TutorConfig,
    ) -> Self {
        Self {
            queries,
            memory,
            engine,
            config,
        }
    }

    /// Run one chat turn, returning a stream of caller-facing events.
    ///
    /// Session/message persistence failures are hard errors; everything in
    /// the memory subsystem degrades silently.
    pub async fn chat_turn(
        &self,
        request: ChatTurnRequest,
    ) -> Result<ReceiverStream<ChatEvent>, TutorCoreError> {
        let subject_id = request.subject.subject_id().to_string();
        let session = self
            .queries
            .get_or_create_session(&subject_id, &request.student.id)
            .map_err(|err| TutorCoreError::State(err.to_string()))?;
        debug!(
            "session resolved (session_id={}, subject_id={subject_id}, student_id={})",
            session.id, request.student.id
        );

        let history = self
            .queries
            .get_messages(session.id, Some(self.config.sessions.history_window))
            .map_err(|err| TutorCoreError::State(err.to_string()))?;
        let struggle = analyze_struggle(&history, &self.config.struggle);
        if struggle.is_struggling {
            info!(
                "student struggling (session_id={}, failed_attempts={})",
                session.id, struggle.failed_attempts
            );
        }

        let memories = self
            .memory
            .retrieve_relevant_memories(
                &request.student.id,
                &request.message,
                self.config.memory.recall_k,
            )
            .await;
        let memory_block = self.memory.render_memories(&memories);

        let persona = Persona::select(request.student.age, request.student.grade_level);
        let system_prompt = compose_system_prompt(&PromptInputs {
            persona,
            subject: Some(&request.subject),
            profile: Some(&request.student),
            struggle: &struggle,
            memory_block: &memory_block,
        });
        debug!(
            "prompt composed (session_id={}, persona={}, memories={})",
            session.id,
            persona.id(),
            memories.len()
        );

        self.queries
            .create_message(
                session.id,
                Role::User,
                &request.message,
                request.question_tag.as_deref(),
            )
            .map_err(|err| TutorCoreError::State(err.to_string()))?;
        // Empty placeholder first, so a crash mid-stream leaves a
        // recoverable record.
        let placeholder = self
            .queries
            .create_message(session.id, Role::Assistant, "", None)
            .map_err(|err| TutorCoreError::State(err.to_string()))?;

        let prompt = render_transcript(&history, &request.message);
        let options = GenerationOptions::from(&self.config.generation);

        let (tx, rx) = mpsc::channel(32);
        let queries = self.queries.clone();
        let memory = self.memory.clone();
        let engine = self.engine.clone();
        let student_id = request.student.id.clone();
        let question = request.message.clone();
        let context = interaction_context(&request.subject);
        let session_id = session.id;
        let placeholder_id = placeholder.id;

        tokio::spawn(async move {
            let mut stream = match engine
                .generate_stream(&prompt, Some(&system_prompt), &options)
                .await
            {
                Ok(stream) => stream,
                Err(err) => {
                    error!("generation failed to start (session_id={session_id}): {err}");
                    let _ = tx
                        .send(ChatEvent::Error {
                            message: err.to_string(),
                        })
                        .await;
                    return;
                }
            };

            let mut accumulated = String::new();
            let mut stream_error: Option<String> = None;
            let mut cancelled = false;

            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(chunk) => {
                        if !chunk.text.is_empty() {
                            accumulated.push_str(&chunk.text);
                            if tx
                                .send(ChatEvent::Token {
                                    text: chunk.text,
                                })
                                .await
                                .is_err()
                            {
                                // Caller went away; stop consuming upstream.
                                debug!("caller cancelled turn (session_id={session_id})");
                                cancelled = true;
                                break;
                            }
                        }
                        if chunk.done {
                            break;
                        }
                    }
                    Err(err) => {
                        error!("generation stream failed (session_id={session_id}): {err}");
                        stream_error = Some(err.to_string());
                        break;
                    }
                }
            }

            // Partial answers have tutoring value; persist whatever arrived.
            let finalize = stream_error.is_none() || !accumulated.is_empty();
            if finalize
                && let Err(err) =
                    queries.update_message_content(session_id, placeholder_id, &accumulated)
            {
                error!("failed to finalize assistant message (session_id={session_id}): {err}");
            }
            let _ = queries.touch_session(session_id);

            if let Some(message) = stream_error {
                let _ = tx.send(ChatEvent::Error { message }).await;
            } else if !cancelled {
                let _ = tx
                    .send(ChatEvent::Done {
                        session_id,
                        message_id: placeholder_id,
                        content: accumulated.clone(),
                    })
                    .await;
            }

            // Detached commit: skipped only when zero tokens were produced,
            // and never tied to the caller-visible completion above.
            if !accumulated.is_empty() {
                tokio::spawn(async move {
                    let stored = memory
                        .store_interaction(&student_id, &question, &accumulated, Some(context))
                        .await;
                    if !stored {
                        warn!("memory commit failed (student_id={student_id})");
                    }
                });
            }
        });

        Ok(ReceiverStream::new(rx))
    }
}

/// Render the bounded history plus the new message as the generation prompt.
fn render_transcript(history: &[ChatMessage], new_message: &str) -> String {
    let mut lines = Vec::new();
    for message in history {
        let speaker = match message.role {
            Role::User => "Student",
            Role::Assistant => "Tutor",
        };
        if !message.content.is_empty() {
            lines.push(format!("{speaker}: {}", message.content));
        }
    }
    lines.push(format!("Student: {new_message}"));
    lines.join("\n")
}

fn interaction_context(subject: &SubjectContext) -> InteractionContext {
    let subject_kind = match subject {
        SubjectContext::Homework { .. } => "homework",
        SubjectContext::Lesson { .. } => "lesson",
    };
    InteractionContext {
        subject_id: Some(subject.subject_id().to_string()),
        title: Some(subject.title().to_string()),
        subject: Some(subject_kind.to_string()),
    }
}

/// Startup maintenance pass: report roster/store drift and optionally clean
/// orphaned collections. Never fails; drift is logged, not raised.
pub async fn run_synchronization_pass(
    memory: &MemoryService,
    roster_ids: &[String],
    clean_orphans: bool,
) -> mentora_rs_memory::SyncReport {
    let report = memory.verify_synchronization(roster_ids).await;
    if report.in_sync {
        info!("memory in sync with roster (students={})", roster_ids.len());
        return report;
    }
    warn!(
        "memory drift (orphaned={}, missing={})",
        report.orphaned.len(),
        report.missing.len()
    );
    if clean_orphans && !report.orphaned.is_empty() {
        let cleaned = memory.clean_orphaned_collections(&report.orphaned).await;
        info!("cleaned orphaned collections (count={cleaned})");
    }
    for student_id in &report.missing {
        memory.initialize_student_memory(student_id).await;
    }
    report
}

#[cfg(test)]
mod tests {
    use super::render_transcript;
    use crate::types::{ChatMessage, Role};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    #[test]
    fn transcript_renders_speakers_and_skips_empty_messages() {
        let session_id = Uuid::new_v4();
        let message = |role, content: &str| ChatMessage {
            id: Uuid::new_v4(),
            session_id,
            role,
            content: content.to_string(),
            question_tag: None,
            created_at: Utc::now(),
        };
        let history = vec![
            message(Role::User, "help with Q1"),
            message(Role::Assistant, "what have you tried?"),
            message(Role::Assistant, ""),
        ];
        let transcript = render_transcript(&history, "I tried adding them");
        assert_eq!(
            transcript,
            "Student: help with Q1\nTutor: what have you tried?\nStudent: I tried adding them"
        );
    }
}
