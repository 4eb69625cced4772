//! Tests for reply command

use std::path::PathBuf;

use style_imitator::commands::reply::{self, ReplyArgs};

#[tokio::test]
async fn test_reply_run_rejects_missing_export() {
    let args = ReplyArgs {
        path: PathBuf::from("definitely/missing/export.html"),
        target: "Bob".into(),
        messages: vec!["привет".into()],
        config: None,
        seed: Some(1),
    };

    assert!(reply::run(args).await.is_err());
}

#[tokio::test]
#[ignore] // Requires OPENROUTER_API_KEY and network access
async fn test_reply_run_against_live_model() {
    let args = ReplyArgs {
        path: PathBuf::from("tests/fixtures/alice_bob.html"),
        target: "Bob".into(),
        messages: vec!["привет, ты где?".into()],
        config: None,
        seed: Some(1),
    };

    assert!(reply::run(args).await.is_ok());
}
