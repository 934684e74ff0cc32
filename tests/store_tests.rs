//! Integration tests for the directory mail store, alone and driving a
//! full run over `.eml` files.

use std::sync::Arc;

use assert_fs::prelude::*;
use predicates::prelude::*;

use mailpress::convert::UnavailableRenderer;
use mailpress::filter::FilterCriteria;
use mailpress::model::MessageId;
use mailpress::pipeline::{self, Collaborators, NullObserver, PipelineOptions, RunRequest, RunState};
use mailpress::store::{DirectoryStore, MailStore, StoreError};

const INVOICE: &str = "From: Acme Billing <billing@acme.com>\r\n\
Subject: Invoice March\r\n\
Date: Tue, 05 Mar 2024 10:30:00 +0000\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"XX\"\r\n\
\r\n\
--XX\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Please find the invoice attached.\r\n\
--XX\r\n\
Content-Type: text/plain; name=\"details.txt\"\r\n\
Content-Disposition: attachment; filename=\"details.txt\"\r\n\
\r\n\
Item 1: 10.00\r\n\
Item 2: 32.00\r\n\
--XX--\r\n";

const NEWSLETTER: &str = "From: news@example.org\r\n\
Subject: Weekly newsletter\r\n\
Date: Wed, 06 Mar 2024 08:00:00 +0000\r\n\
\r\n\
Nothing to archive here.\r\n";

fn mailbox() -> assert_fs::TempDir {
    let root = assert_fs::TempDir::new().unwrap();
    root.child("Inbox/0001.eml").write_str(INVOICE).unwrap();
    root.child("Inbox/0002.eml").write_str(NEWSLETTER).unwrap();
    root.child("Inbox/notes.txt").write_str("not a message").unwrap();
    root.child("Archive/2024").create_dir_all().unwrap();
    root.child(".hidden").create_dir_all().unwrap();
    root
}

#[test]
fn test_open_requires_directory() {
    let root = assert_fs::TempDir::new().unwrap();
    let file = root.child("plain");
    file.write_str("x").unwrap();
    assert!(matches!(
        DirectoryStore::open(file.path()),
        Err(StoreError::Unavailable(_))
    ));
    assert!(DirectoryStore::open(root.child("missing").path()).is_err());
}

#[test]
fn test_lists_nested_folders_sorted() {
    let root = mailbox();
    let store = DirectoryStore::open(root.path()).unwrap();
    assert_eq!(
        store.list_folders().unwrap(),
        vec!["Archive", "Archive/2024", "Inbox"]
    );
    assert!(store.has_folder("Archive/2024"));
    assert!(!store.has_folder("Missing"));
    assert!(!store.has_folder("../Inbox"));
}

#[test]
fn test_lists_only_eml_files_in_name_order() {
    let root = mailbox();
    let store = DirectoryStore::open(root.path()).unwrap();
    let messages = store.list_messages("Inbox").unwrap();

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].id, MessageId::new("Inbox/0001.eml"));
    assert_eq!(messages[0].subject, "Invoice March");
    assert_eq!(messages[0].attachments.len(), 1);
    assert_eq!(messages[0].attachments[0].filename, "details.txt");
    assert_eq!(messages[1].sender.label(), "Example");
}

#[test]
fn test_missing_folder_is_an_error() {
    let root = mailbox();
    let store = DirectoryStore::open(root.path()).unwrap();
    assert!(matches!(
        store.list_messages("Sent"),
        Err(StoreError::FolderNotFound(_))
    ));
}

#[test]
fn test_categories_go_to_a_sidecar() {
    let root = mailbox();
    let mut store = DirectoryStore::open(root.path()).unwrap();
    let id = MessageId::new("Inbox/0001.eml");

    store.apply_category(&id, "Archived").unwrap();
    store.apply_category(&id, "Archived").unwrap();
    store.apply_category(&id, "Finance").unwrap();

    root.child("Inbox/0001.eml.categories")
        .assert(predicate::str::diff("Archived\nFinance\n"));
    assert_eq!(store.categories(&id).unwrap(), vec!["Archived", "Finance"]);
    assert!(store.apply_category(&id, "  ").is_err());
}

#[test]
fn test_seen_marker_tracks_read_state() {
    let root = mailbox();
    let mut store = DirectoryStore::open(root.path()).unwrap();
    let id = MessageId::new("Inbox/0002.eml");
    assert!(store.list_messages("Inbox").unwrap().iter().all(|m| m.unread));

    store.mark_read(&id).unwrap();
    store.mark_read(&id).unwrap();

    root.child("Inbox/0002.eml.seen").assert(predicate::path::is_file());
    assert!(store.is_read(&id).unwrap());
    let unread: Vec<_> = store
        .list_messages("Inbox")
        .unwrap()
        .into_iter()
        .map(|m| (m.id.to_string(), m.unread))
        .collect();
    assert_eq!(
        unread,
        vec![
            ("Inbox/0001.eml".to_string(), true),
            ("Inbox/0002.eml".to_string(), false)
        ]
    );

    store.move_message(&id, "Archive").unwrap();
    root.child("Archive/0002.eml.seen").assert(predicate::path::exists());
    assert!(!store.list_messages("Archive").unwrap()[0].unread);
    assert!(store.mark_read(&MessageId::new("Inbox/0009.eml")).is_err());
}

#[test]
fn test_move_carries_categories_and_avoids_overwrite() {
    let root = mailbox();
    root.child("Archive/0001.eml").write_str("already here").unwrap();
    let mut store = DirectoryStore::open(root.path()).unwrap();
    let id = MessageId::new("Inbox/0001.eml");

    store.apply_category(&id, "Archived").unwrap();
    store.move_message(&id, "Archive").unwrap();

    root.child("Inbox/0001.eml").assert(predicate::path::missing());
    root.child("Archive/0001.eml").assert("already here");
    root.child("Archive/0001_1.eml")
        .assert(predicate::str::contains("Invoice March"));
    root.child("Archive/0001_1.eml.categories")
        .assert(predicate::str::contains("Archived"));

    assert!(matches!(
        store.move_message(&id, "Archive"),
        Err(StoreError::MessageNotFound(_))
    ));
}

#[test]
fn test_rejects_paths_outside_root() {
    let root = mailbox();
    let mut store = DirectoryStore::open(root.path()).unwrap();
    assert!(store
        .move_message(&MessageId::new("../Inbox/0001.eml"), "Archive")
        .is_err());
    assert!(store
        .move_message(&MessageId::new("Inbox/0001.eml"), "../")
        .is_err());
    root.child("Inbox/0001.eml").assert(predicate::path::exists());
}

#[test]
fn test_full_run_over_directory_store() {
    let root = mailbox();
    let output = assert_fs::TempDir::new().unwrap();
    let store_root = root.path().to_path_buf();

    let request = RunRequest {
        folder: "Inbox".into(),
        criteria: FilterCriteria::parse("invoice", Some("2024-03"), Some("2024")),
        dest_folder: Some("Archive/2024".into()),
        output_dir: output.path().to_path_buf(),
        success_category: Some("Archived".into()),
        error_category: None,
        mark_read: true,
    };
    let report = pipeline::start(
        request,
        PipelineOptions::default(),
        move || {
            Ok(Collaborators::new(
                DirectoryStore::open(&store_root)?,
                UnavailableRenderer,
            ))
        },
        Arc::new(NullObserver),
    )
    .unwrap()
    .wait();

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.statistics.folder_size, 2);
    assert_eq!(report.statistics.succeeded, 1);

    let record = &report.records[0];
    assert_eq!(record.included, 1);
    assert_eq!(record.page_count, 2);

    output
        .child("2024-03-05_Acme_Billing_Invoice_March.pdf")
        .assert(predicate::path::is_file());
    root.child("Archive/2024/0001.eml").assert(predicate::path::exists());
    root.child("Archive/2024/0001.eml.categories").assert("Archived\n");
    root.child("Archive/2024/0001.eml.seen").assert(predicate::path::exists());
    root.child("Inbox/0002.eml.seen").assert(predicate::path::missing());
    root.child("Inbox/0002.eml").assert(predicate::path::exists());
}
