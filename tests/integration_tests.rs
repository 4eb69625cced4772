//! Integration tests for style_imitator library
//!
//! These tests drive the public API end to end: export upload, target
//! selection, reply generation and profile management.

mod commands;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use style_imitator::{
    error::{Error, Result},
    imitator::GENERATION_FALLBACKS,
    profile,
    session::HISTORY_CAP,
    style::{coherence::MAX_REPLY_CHARS, NoiseSettings},
    transcript, GenerationRequest, Generator, ImitationSettings, Imitator, MemoryProfileStore,
    ProfileStore, Reply,
};

const EXPORT: &str = include_str!("fixtures/alice_bob.html");
const REQUESTER: i64 = 1001;

// ============================================================================
// Helpers
// ============================================================================

/// Answers from a script, cycling, and remembers what it was asked.
struct ScriptedGenerator {
    replies: Vec<String>,
    calls: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: replies.iter().map(|r| r.to_string()).collect(),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.replies[n % self.replies.len()].clone())
    }
}

struct BrokenGenerator;

#[async_trait]
impl Generator for BrokenGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
        Err(Error::Generation("upstream returned 503".into()))
    }
}

struct SlowGenerator;

#[async_trait]
impl Generator for SlowGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok("слишком поздно".into())
    }
}

fn settings() -> ImitationSettings {
    ImitationSettings {
        noise: NoiseSettings::silent(),
        seed: Some(42),
        ..Default::default()
    }
}

async fn uploaded(generator: Arc<dyn Generator>, settings: ImitationSettings) -> Imitator {
    let imitator = Imitator::new(Arc::new(MemoryProfileStore::new()), generator, settings);
    imitator
        .ingest_transcript(REQUESTER, "Alice Smith", EXPORT.as_bytes(), "messages.html")
        .await
        .expect("export ingested");
    imitator
}

// ============================================================================
// Upload and profiling
// ============================================================================

#[test]
fn test_extraction_attributes_every_author() {
    let extraction = transcript::extract(EXPORT, None);

    assert_eq!(extraction.owner.as_deref(), Some("Alice"));
    assert_eq!(extraction.owner_messages.len(), 3);
    assert_eq!(extraction.messages_of("Bob").len(), 12);
    assert_eq!(extraction.participants(), vec!["Alice", "Bob", "Carol"]);
    assert!(extraction.messages_of(transcript::UNKNOWN_AUTHOR).is_empty());
    assert!(extraction
        .owner_messages
        .iter()
        .any(|m| m.contains("интервалы & приседания")));
}

#[test]
fn test_profile_average_length_is_floor_of_mean() {
    let bob = transcript::extract(EXPORT, None).messages_of("Bob");
    assert!(bob.iter().all(|m| m.split_whitespace().count() >= 3));

    let total: usize = bob.iter().map(|m| m.chars().count()).sum();
    let fingerprint = profile(&bob);

    assert_eq!(fingerprint.average_length, total / bob.len());
    assert_eq!(fingerprint.emoji_samples, vec!["Ну все, жду тебя там 😉"]);
}

#[tokio::test]
async fn test_ingest_reports_owner_and_participants() {
    let imitator = Imitator::new(
        Arc::new(MemoryProfileStore::new()),
        ScriptedGenerator::new(&["ок"]),
        settings(),
    );

    let report = imitator
        .ingest_transcript(REQUESTER, "Alice Smith", EXPORT.as_bytes(), "Messages.html")
        .await
        .unwrap();

    assert_eq!(report.owner_name, "Alice Smith");
    assert_eq!(report.owner_messages, 3);
    assert_eq!(report.saved_participants, 3);
    assert_eq!(
        imitator.list_targets(REQUESTER).await,
        vec!["Alice", "Alice Smith", "Bob", "Carol"]
    );
    // Other requesters see nothing
    assert!(imitator.list_targets(REQUESTER + 1).await.is_empty());
}

#[tokio::test]
async fn test_reupload_replaces_profiles() {
    let store = Arc::new(MemoryProfileStore::new());
    let imitator = Imitator::new(store.clone(), ScriptedGenerator::new(&["ок"]), settings());

    for _ in 0..2 {
        imitator
            .ingest_transcript(REQUESTER, "Alice Smith", EXPORT.as_bytes(), "messages.html")
            .await
            .unwrap();
    }

    let bob = store.get_messages(REQUESTER, "Bob", 100).await.unwrap();
    assert_eq!(bob.len(), 12);
    assert!(store.get_fingerprint(REQUESTER, "Bob").await.unwrap().is_some());
    assert!(store.get_fingerprint(REQUESTER, "Carol").await.unwrap().is_some());
}

#[tokio::test]
async fn test_non_html_upload_is_rejected() {
    let imitator = Imitator::new(
        Arc::new(MemoryProfileStore::new()),
        ScriptedGenerator::new(&["ок"]),
        settings(),
    );

    let err = imitator
        .ingest_transcript(REQUESTER, "Alice Smith", EXPORT.as_bytes(), "result.json")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(imitator.list_targets(REQUESTER).await.is_empty());
}

// ============================================================================
// Imitation
// ============================================================================

#[tokio::test]
async fn test_end_to_end_imitation() {
    let long = "очень длинный ответ ".repeat(20);
    let generator = ScriptedGenerator::new(&["Да норм все, бегу уже", long.as_str()]);
    let imitator = uploaded(generator.clone(), settings()).await;

    let selected = imitator.select_target(REQUESTER, "Bob").await.unwrap();
    assert_eq!(selected.target, "Bob");
    assert_eq!(selected.samples, 12);
    assert!(selected.has_fingerprint);
    assert!(imitator.is_imitating(REQUESTER).await);

    for input in ["привет, как дела?", "расскажи что-нибудь"] {
        match imitator.reply(REQUESTER, input).await.unwrap() {
            Reply::Generated(reply) => {
                assert!(!reply.trim().is_empty());
                assert!(reply.chars().count() <= MAX_REPLY_CHARS);
            }
            other => panic!("expected a generated reply, got {:?}", other),
        }
    }

    let session = imitator.sessions().snapshot(REQUESTER).await.unwrap();
    assert_eq!(session.history.len(), 4);

    assert_eq!(generator.calls(), 2);
    let requests = generator.requests.lock().unwrap();
    assert_eq!(requests[0].user, "привет, как дела?");
    assert!(requests[0].system.contains("Bob"));
}

#[tokio::test]
async fn test_insufficient_samples_refuse_imitation() {
    let generator = ScriptedGenerator::new(&["ок"]);
    let imitator = uploaded(generator.clone(), settings()).await;

    let err = imitator.select_target(REQUESTER, "Carol").await.unwrap_err();

    assert!(matches!(
        err,
        Error::InsufficientData { ref target, found: 3, required: 5 } if target == "Carol"
    ));
    assert!(imitator.sessions().snapshot(REQUESTER).await.is_none());
    assert_eq!(
        imitator.reply(REQUESTER, "привет").await.unwrap(),
        Reply::NotImitating
    );
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_generator_failure_uses_fallback() {
    let imitator = uploaded(Arc::new(BrokenGenerator), settings()).await;
    imitator.select_target(REQUESTER, "Bob").await.unwrap();

    let reply = imitator.reply(REQUESTER, "ты где?").await.unwrap();

    match reply {
        Reply::Generated(text) => assert!(GENERATION_FALLBACKS.contains(&text.as_str())),
        other => panic!("expected a fallback reply, got {:?}", other),
    }
    assert!(imitator.is_imitating(REQUESTER).await);
}

#[tokio::test]
async fn test_generation_timeout_uses_fallback() {
    let imitator = uploaded(
        Arc::new(SlowGenerator),
        ImitationSettings {
            generation_timeout: Duration::from_millis(50),
            ..settings()
        },
    )
    .await;
    imitator.select_target(REQUESTER, "Bob").await.unwrap();

    let reply = imitator.reply(REQUESTER, "ты где?").await.unwrap();

    assert!(matches!(
        reply,
        Reply::Generated(ref text) if GENERATION_FALLBACKS.contains(&text.as_str())
    ));
}

#[tokio::test]
async fn test_switching_target_resets_history() {
    let imitator = uploaded(ScriptedGenerator::new(&["ну да, наверное"]), settings()).await;
    imitator.select_target(REQUESTER, "Bob").await.unwrap();
    imitator.reply(REQUESTER, "привет").await.unwrap();

    imitator.select_target(REQUESTER, "Alice Smith").await.unwrap_err();
    let session = imitator.sessions().snapshot(REQUESTER).await.unwrap();
    assert_eq!(session.target, "Bob");
    assert_eq!(session.history.len(), 2);

    imitator.select_target(REQUESTER, "Bob").await.unwrap();
    let session = imitator.sessions().snapshot(REQUESTER).await.unwrap();
    assert!(session.history.is_empty());
}

#[tokio::test]
async fn test_session_bound_evicts_oldest_samples() {
    let bob = transcript::extract(EXPORT, None).messages_of("Bob");
    let imitator = uploaded(
        ScriptedGenerator::new(&["ага, понял тебя"]),
        ImitationSettings {
            max_session_samples: bob.len(),
            ..settings()
        },
    )
    .await;
    imitator.select_target(REQUESTER, "Bob").await.unwrap();

    let session = imitator.sessions().snapshot(REQUESTER).await.unwrap();
    assert_eq!(session.samples, bob);

    for input in ["первое новое сообщение", "второе новое сообщение"] {
        imitator.reply(REQUESTER, input).await.unwrap();
    }

    let session = imitator.sessions().snapshot(REQUESTER).await.unwrap();
    let mut expected = bob[2..].to_vec();
    expected.push("первое новое сообщение".to_string());
    expected.push("второе новое сообщение".to_string());
    assert_eq!(session.samples, expected);
    assert!(session.samples.contains(bob.last().unwrap()));
    assert!(!session.samples.contains(&bob[0]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_replies_keep_history_bounded() {
    let generator = ScriptedGenerator::new(&["ага, понял тебя"]);
    let imitator = Arc::new(uploaded(generator.clone(), settings()).await);
    imitator.select_target(REQUESTER, "Bob").await.unwrap();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let imitator = imitator.clone();
            tokio::spawn(async move {
                imitator
                    .reply(REQUESTER, &format!("сообщение номер {}", i))
                    .await
            })
        })
        .collect();
    for handle in handles {
        assert!(matches!(handle.await.unwrap(), Ok(Reply::Generated(_))));
    }

    let session = imitator.sessions().snapshot(REQUESTER).await.unwrap();
    assert_eq!(generator.calls(), 16);
    assert_eq!(session.history.len(), HISTORY_CAP);
    assert_eq!(session.samples.len(), 12 + 16);
}

#[tokio::test]
async fn test_exit_keeps_profiles() {
    let imitator = uploaded(ScriptedGenerator::new(&["ок, давай"]), settings()).await;
    imitator.select_target(REQUESTER, "Bob").await.unwrap();

    assert!(imitator.exit_imitation(REQUESTER).await);

    assert_eq!(
        imitator.reply(REQUESTER, "привет").await.unwrap(),
        Reply::NotImitating
    );
    assert!(imitator.list_targets(REQUESTER).await.contains(&"Bob".to_string()));
}

// ============================================================================
// Profile management
// ============================================================================

#[tokio::test]
async fn test_deleting_active_target_ends_session() {
    let imitator = uploaded(ScriptedGenerator::new(&["ок"]), settings()).await;
    imitator.select_target(REQUESTER, "Bob").await.unwrap();

    assert!(imitator.delete_target(REQUESTER, "Bob").await);

    assert!(imitator.sessions().snapshot(REQUESTER).await.is_none());
    assert!(!imitator.list_targets(REQUESTER).await.contains(&"Bob".to_string()));
    assert!(matches!(
        imitator.select_target(REQUESTER, "Bob").await,
        Err(Error::ProfileNotFound(_))
    ));
}

#[tokio::test]
async fn test_deleting_other_target_keeps_session() {
    let imitator = uploaded(ScriptedGenerator::new(&["ок"]), settings()).await;
    imitator.select_target(REQUESTER, "Bob").await.unwrap();

    assert!(imitator.delete_target(REQUESTER, "Carol").await);

    assert!(imitator.is_imitating(REQUESTER).await);
}

#[tokio::test]
async fn test_clear_all_removes_everything() {
    let imitator = uploaded(ScriptedGenerator::new(&["ок"]), settings()).await;
    imitator.select_target(REQUESTER, "Bob").await.unwrap();

    assert!(imitator.clear_all(REQUESTER).await);

    assert!(imitator.list_targets(REQUESTER).await.is_empty());
    assert!(!imitator.is_imitating(REQUESTER).await);
    assert!(imitator.statistics_report(REQUESTER, "alice").await.is_none());
}

#[tokio::test]
async fn test_statistics_report_covers_all_profiles() {
    let imitator = uploaded(ScriptedGenerator::new(&["ок"]), settings()).await;

    let report = imitator
        .statistics_report(REQUESTER, "alice")
        .await
        .expect("report");

    assert!(report.starts_with("📊 Статистика для пользователя @alice"));
    assert!(report.contains("Общее количество сохраненных профилей: 4"));
    assert!(report.contains("--- Профиль: Bob ---\nСообщений сохранено: 12"));
    assert!(report.contains("Всего сообщений по всем профилям: 21"));
}

// ============================================================================
// Error Tests
// ============================================================================

#[test]
fn test_error_variants_display() {
    let errors = vec![
        Error::Parse("bad html".into()),
        Error::InsufficientData {
            target: "Bob".into(),
            found: 2,
            required: 5,
        },
        Error::ProfileNotFound("Bob".into()),
        Error::Generation("503".into()),
        Error::GenerationTimeout(Duration::from_secs(30)),
        Error::Storage("down".into()),
        Error::StateInconsistency("no target".into()),
        Error::InvalidArgument("bad arg".into()),
        Error::Config("bad yaml".into()),
        Error::SerializationError("json error".into()),
    ];

    for err in errors {
        assert!(!err.to_string().is_empty(), "Error message should not be empty");
    }
}
