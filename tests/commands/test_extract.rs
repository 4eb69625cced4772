//! Tests for extract command

use std::io::Write;

use style_imitator::commands::extract::{self, ExtractSummary};
use style_imitator::transcript;

const EXPORT: &str = include_str!("../fixtures/alice_bob.html");

#[test]
fn test_extract_summary_counts_participants() {
    let extraction = transcript::extract(EXPORT, None);
    let summary = ExtractSummary::from_extraction(&extraction);

    assert_eq!(summary.owner.as_deref(), Some("Alice"));
    assert_eq!(summary.owner_messages, 3);
    let bob = summary
        .participants
        .iter()
        .find(|p| p.name == "Bob")
        .expect("Bob listed");
    assert_eq!(bob.messages, 12);
}

#[test]
fn test_extract_owner_override() {
    let extraction = transcript::extract(EXPORT, Some("Bob"));
    assert_eq!(extraction.owner.as_deref(), Some("Bob"));
    assert_eq!(extraction.owner_messages.len(), 12);
}

#[tokio::test]
async fn test_extract_run_reads_html_file() {
    let mut file = tempfile::Builder::new().suffix(".html").tempfile().unwrap();
    file.write_all(EXPORT.as_bytes()).unwrap();

    let result = extract::run(file.path(), None, Some("Bob"), "json").await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_extract_run_rejects_other_extensions() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(b"{}").unwrap();

    assert!(extract::run(file.path(), None, None, "table").await.is_err());
}
