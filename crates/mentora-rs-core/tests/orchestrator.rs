//! End-to-end orchestrator tests over stub collaborators.

use futures_util::StreamExt;
use mentora_rs_config::{MemoryConfig, TutorConfig};
use mentora_rs_core::{
    ChatEvent, ChatOrchestrator, ChatTurnRequest, JsonlSessionStore, Role, SessionId,
    SessionQueries, StudentProfile, SubjectContext, SubjectItem, run_synchronization_pass,
};
use mentora_rs_memory::{Embedder, MemoryService, MemoryStatus};
use mentora_rs_test_utils::{InMemoryVectorStore, ScriptedEngine, StubEmbedder};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn student() -> StudentProfile {
    StudentProfile {
        id: "student-1".to_string(),
        name: Some("Sam".to_string()),
        age: Some(12),
        grade_level: Some(6),
        skill_focus: Some("fractions".to_string()),
        interests: vec!["soccer".to_string()],
    }
}

fn homework() -> SubjectContext {
    SubjectContext::Homework {
        id: "hw-1".to_string(),
        title: "Fractions practice".to_string(),
        questions: vec![SubjectItem {
            tag: "Q1".to_string(),
            text: "Add 1/2 and 1/3.".to_string(),
        }],
    }
}

fn request(message: &str) -> ChatTurnRequest {
    ChatTurnRequest {
        student: student(),
        subject: homework(),
        message: message.to_string(),
        question_tag: Some("Q1".to_string()),
    }
}

struct Fixture {
    orchestrator: ChatOrchestrator,
    queries: Arc<JsonlSessionStore>,
    store: Arc<InMemoryVectorStore>,
}

fn fixture(
    root: &std::path::Path,
    engine: ScriptedEngine,
    embedder: Arc<dyn Embedder>,
    status: MemoryStatus,
) -> Fixture {
    let queries = Arc::new(JsonlSessionStore::new(root).expect("session store"));
    let store = Arc::new(InMemoryVectorStore::new());
    let memory = Arc::new(MemoryService::new(
        store.clone(),
        embedder,
        MemoryConfig::default(),
        status,
    ));
    let orchestrator = ChatOrchestrator::new(
        queries.clone(),
        memory,
        Arc::new(engine),
        TutorConfig::default(),
    );
    Fixture {
        orchestrator,
        queries,
        store,
    }
}

async fn wait_for_records(store: &InMemoryVectorStore, name: &str, count: usize) {
    for _ in 0..200 {
        if store.record_count(name) >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("expected {count} records in {name}, found {}", store.record_count(name));
}

#[tokio::test]
async fn turn_streams_tokens_and_commits_memory() {
    let temp = tempdir().expect("tempdir");
    let fixture = fixture(
        temp.path(),
        ScriptedEngine::new(["What ", "do ", "you notice?"]),
        Arc::new(StubEmbedder::new()),
        MemoryStatus::available(),
    );

    let events: Vec<ChatEvent> = fixture
        .orchestrator
        .chat_turn(request("How do I add 1/2 and 1/3?"))
        .await
        .expect("turn")
        .collect()
        .await;

    assert_eq!(events.len(), 4);
    assert_eq!(
        events[0],
        ChatEvent::Token {
            text: "What ".to_string()
        }
    );
    let ChatEvent::Done {
        session_id,
        content,
        ..
    } = events.last().expect("terminal event").clone()
    else {
        panic!("expected Done, got {:?}", events.last());
    };
    assert_eq!(content, "What do you notice?");

    let messages = fixture
        .queries
        .get_messages(session_id, None)
        .expect("messages");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, "How do I add 1/2 and 1/3?");
    assert_eq!(messages[0].question_tag.as_deref(), Some("Q1"));
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, "What do you notice?");

    // detached commit lands after the Done event
    wait_for_records(&fixture.store, "student_memory_student_1", 1).await;
}

#[tokio::test]
async fn turn_completes_when_vector_store_is_down() {
    let temp = tempdir().expect("tempdir");
    let fixture = fixture(
        temp.path(),
        ScriptedEngine::new(["Try ", "a common denominator."]),
        Arc::new(StubEmbedder::new()),
        MemoryStatus::unavailable(),
    );
    fixture.store.set_failing(true);

    let events: Vec<ChatEvent> = fixture
        .orchestrator
        .chat_turn(request("help?"))
        .await
        .expect("turn")
        .collect()
        .await;

    assert!(matches!(events.last(), Some(ChatEvent::Done { .. })));
    assert_eq!(fixture.store.record_count("student_memory_student_1"), 0);
}

#[tokio::test]
async fn midstream_failure_preserves_partial_content() {
    let temp = tempdir().expect("tempdir");
    let fixture = fixture(
        temp.path(),
        ScriptedEngine::new(["Start by ", "never seen"]).failing_after(1),
        Arc::new(StubEmbedder::new()),
        MemoryStatus::available(),
    );

    let events: Vec<ChatEvent> = fixture
        .orchestrator
        .chat_turn(request("help me"))
        .await
        .expect("turn")
        .collect()
        .await;

    assert_eq!(
        events,
        vec![
            ChatEvent::Token {
                text: "Start by ".to_string()
            },
            ChatEvent::Error {
                message: "generation stream failed: stream interrupted".to_string()
            },
        ]
    );

    let session = fixture
        .queries
        .get_or_create_session("hw-1", "student-1")
        .expect("session");
    let messages = fixture
        .queries
        .get_messages(session.id, None)
        .expect("messages");
    assert_eq!(messages[1].content, "Start by ");

    // partial answers still get committed to memory
    wait_for_records(&fixture.store, "student_memory_student_1", 1).await;
}

async fn wait_for_finalized_assistant(fixture: &Fixture, session_id: SessionId) -> String {
    for _ in 0..200 {
        let messages = fixture
            .queries
            .get_messages(session_id, None)
            .expect("messages");
        if let Some(message) = messages
            .iter()
            .find(|m| m.role == Role::Assistant && !m.content.is_empty())
        {
            return message.content.clone();
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("assistant message was never finalized");
}

#[tokio::test]
async fn dropped_stream_stops_forwarding_and_keeps_partial_content() {
    let temp = tempdir().expect("tempdir");
    let script: Vec<String> = (0..200).map(|i| format!("t{i} ")).collect();
    let full_length: usize = script.iter().map(String::len).sum();
    let fixture = fixture(
        temp.path(),
        ScriptedEngine::new(script),
        Arc::new(StubEmbedder::new()),
        MemoryStatus::available(),
    );

    let mut stream = fixture
        .orchestrator
        .chat_turn(request("walk me through this problem"))
        .await
        .expect("turn");
    let first = stream.next().await;
    assert_eq!(
        first,
        Some(ChatEvent::Token {
            text: "t0 ".to_string()
        })
    );
    // Caller goes away mid-stream.
    drop(stream);

    let session = fixture
        .queries
        .get_or_create_session("hw-1", "student-1")
        .expect("session");
    let content = wait_for_finalized_assistant(&fixture, session.id).await;
    assert!(content.starts_with("t0 "));
    // Forwarding stopped well before the script ran out.
    assert!(content.len() < full_length);

    let messages = fixture
        .queries
        .get_messages(session.id, None)
        .expect("messages");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, "walk me through this problem");

    // The partial exchange still reaches memory.
    wait_for_records(&fixture.store, "student_memory_student_1", 1).await;
}

#[tokio::test]
async fn zero_token_failure_skips_memory_commit() {
    let temp = tempdir().expect("tempdir");
    let fixture = fixture(
        temp.path(),
        ScriptedEngine::new(["unreached"]).failing_after(0),
        Arc::new(StubEmbedder::new()),
        MemoryStatus::available(),
    );

    let events: Vec<ChatEvent> = fixture
        .orchestrator
        .chat_turn(request("help me"))
        .await
        .expect("turn")
        .collect()
        .await;
    assert!(matches!(events.as_slice(), [ChatEvent::Error { .. }]));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fixture.store.record_count("student_memory_student_1"), 0);
}

#[tokio::test]
async fn engine_refusing_to_start_surfaces_terminal_error() {
    let temp = tempdir().expect("tempdir");
    let fixture = fixture(
        temp.path(),
        ScriptedEngine::failing_to_start(),
        Arc::new(StubEmbedder::new()),
        MemoryStatus::available(),
    );

    let events: Vec<ChatEvent> = fixture
        .orchestrator
        .chat_turn(request("help me"))
        .await
        .expect("turn")
        .collect()
        .await;
    assert_eq!(
        events,
        vec![ChatEvent::Error {
            message: "generation stream failed: engine refused the request".to_string()
        }]
    );
}

#[tokio::test]
async fn session_is_reused_across_turns() {
    let temp = tempdir().expect("tempdir");
    let fixture = fixture(
        temp.path(),
        ScriptedEngine::new(["ok"]),
        Arc::new(StubEmbedder::new()),
        MemoryStatus::available(),
    );

    let first: Vec<ChatEvent> = fixture
        .orchestrator
        .chat_turn(request("first question"))
        .await
        .expect("turn")
        .collect()
        .await;
    let second: Vec<ChatEvent> = fixture
        .orchestrator
        .chat_turn(request("second question"))
        .await
        .expect("turn")
        .collect()
        .await;

    let session_of = |events: &[ChatEvent]| match events.last() {
        Some(ChatEvent::Done { session_id, .. }) => *session_id,
        other => panic!("expected Done, got {other:?}"),
    };
    let session_id = session_of(&first);
    assert_eq!(session_id, session_of(&second));

    let messages = fixture
        .queries
        .get_messages(session_id, None)
        .expect("messages");
    assert_eq!(messages.len(), 4);
}

#[tokio::test]
async fn synchronization_pass_repairs_drift() {
    let store = Arc::new(InMemoryVectorStore::new());
    let memory = MemoryService::new(
        store.clone(),
        Arc::new(StubEmbedder::new()),
        MemoryConfig::default(),
        MemoryStatus::available(),
    );

    // orphan D, missing A
    memory.initialize_student_memory("B").await;
    memory.initialize_student_memory("D").await;
    let roster = vec!["A".to_string(), "B".to_string()];

    let report = run_synchronization_pass(&memory, &roster, true).await;
    assert_eq!(report.in_sync, false);
    assert_eq!(report.orphaned, vec!["D".to_string()]);
    assert_eq!(report.missing, vec!["A".to_string()]);

    // repair created the missing collection and removed the orphan
    let report = memory.verify_synchronization(&roster).await;
    assert!(report.in_sync);
    assert_eq!(store.record_count("student_memory_D"), 0);
}
