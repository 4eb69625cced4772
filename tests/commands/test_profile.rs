//! Tests for profile command

use style_imitator::commands::profile::fingerprint_for;
use style_imitator::error::Error;
use style_imitator::transcript;

const EXPORT: &str = include_str!("../fixtures/alice_bob.html");

#[test]
fn test_profile_of_known_author() {
    let extraction = transcript::extract(EXPORT, None);
    let fingerprint = fingerprint_for(&extraction, "Bob").unwrap();

    assert!(fingerprint.average_length > 0);
    assert!(fingerprint.keywords.len() <= 5);
    assert!(fingerprint.punctuation_total() > 0);
}

#[test]
fn test_profile_of_unknown_author_fails() {
    let extraction = transcript::extract(EXPORT, None);
    let err = fingerprint_for(&extraction, "Dave").unwrap_err();
    assert!(matches!(err, Error::ProfileNotFound(ref name) if name == "Dave"));
}

#[test]
fn test_profile_is_deterministic() {
    let extraction = transcript::extract(EXPORT, None);
    assert_eq!(
        fingerprint_for(&extraction, "Bob").unwrap(),
        fingerprint_for(&extraction, "Bob").unwrap()
    );
}
