//! Integration tests for the append-only draft store.

use assert_fs::prelude::*;
use assert_fs::TempDir;
use chrono::{Local, TimeZone};
use predicates::prelude::*;

use mailtriage::model::draft::DraftRecord;
use mailtriage::model::mail::{Category, NormalizedEmail};
use mailtriage::store::DraftStore;

fn classified(subject: &str, body: &str) -> NormalizedEmail {
    let mut email = NormalizedEmail::new("1", "Kim <kim@example.com>", "Kim", subject, body, "");
    email.classify();
    email
}

#[test]
fn test_appends_never_overwrite() {
    let dir = TempDir::new().unwrap();
    let file = dir.child("email_drafts.json");
    let store = DraftStore::new(file.path());

    for i in 0..3 {
        let email = classified(&format!("Subject {i}"), "please reply");
        store
            .append(&DraftRecord::from_email(&email, format!("reply {i}")))
            .unwrap();
    }

    let drafts = store.load();
    let replies: Vec<&str> = drafts.iter().map(|d| d.reply_text.as_str()).collect();
    assert_eq!(replies, vec!["reply 0", "reply 1", "reply 2"]);
    assert!(drafts.iter().all(|d| d.category == Category::NeedsReply));
    file.assert(predicate::str::contains("\"Needs Reply\""));
}

#[test]
fn test_serialized_field_names() {
    let dir = TempDir::new().unwrap();
    let file = dir.child("drafts.json");
    let store = DraftStore::new(file.path());
    let saved_at = Local.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
    let email = classified("Outage tonight", "servers rebooting");
    store
        .append(&DraftRecord::at(&email, "Noted, thanks.", saved_at))
        .unwrap();

    for key in ["\"from\"", "\"subject\"", "\"body\"", "\"reply\"", "\"category\"", "\"saved_at\""] {
        file.assert(predicate::str::contains(key));
    }
    file.assert(predicate::str::contains("\"Urgent\""));
    file.assert(predicate::str::contains("2024-03-01T12:30:00"));
}

#[test]
fn test_corrupt_store_does_not_block_append() {
    let dir = TempDir::new().unwrap();
    let file = dir.child("drafts.json");
    file.write_str("[{\"from\": \"truncated").unwrap();

    let store = DraftStore::new(file.path());
    let email = classified("Hi", "");
    store.append(&DraftRecord::from_email(&email, "Hello")).unwrap();

    file.assert(predicate::str::starts_with("["));
    assert_eq!(store.load().len(), 1);
}

#[test]
fn test_legacy_entries_without_category() {
    let dir = TempDir::new().unwrap();
    let file = dir.child("drafts.json");
    file.write_str(
        r#"[{"from": "a@b", "subject": "s", "body": "b", "reply": "r", "category": null, "saved_at": "2023-01-01T00:00:00"}]"#,
    )
    .unwrap();

    let drafts = DraftStore::new(file.path()).load();
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].category, Category::Unclassified);
}

#[test]
fn test_parent_directories_created() {
    let dir = TempDir::new().unwrap();
    let file = dir.child("data").child("mailtriage").child("drafts.json");
    let store = DraftStore::new(file.path());
    store
        .append(&DraftRecord::from_email(&classified("x", "y"), "z"))
        .unwrap();
    file.assert(predicate::path::exists());
    dir.child("data")
        .child("mailtriage")
        .child("drafts.json.tmp")
        .assert(predicate::path::missing());
}
