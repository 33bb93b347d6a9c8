//! End-to-end tests for PreIngestTransfer

use chrono::{DateTime, Duration, Utc};
use shelfmark_config::TransferConfig;
use shelfmark_transfer::readiness::FileTimestamp;
use shelfmark_transfer::{
    EventKind, ItemStatus, NotReadyReason, PreIngestTransfer, Readiness, TransferRegistry,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const ONE_YEAR_MS: i64 = 365 * 24 * 60 * 60 * 1000;

struct Layout {
    _temp: TempDir,
    root: PathBuf,
    collection: PathBuf,
    config: TransferConfig,
}

fn layout() -> Layout {
    let temp = TempDir::new().unwrap();
    let root = temp.path().to_path_buf();

    let mut config = TransferConfig::default();
    config.ingest_dir = root.join("ingest");
    config.update_content_dir = root.join("update-content");
    config.update_metadata_dir = root.join("update-metadata");
    for dir in [
        &config.ingest_dir,
        &config.update_content_dir,
        &config.update_metadata_dir,
    ] {
        fs::create_dir(dir).unwrap();
    }

    let collection = root.join("ebooks");
    fs::create_dir(&collection).unwrap();

    Layout {
        _temp: temp,
        root,
        collection,
        config,
    }
}

fn set_mtime(path: &Path, when: DateTime<Utc>) {
    let file = fs::OpenOptions::new().write(true).open(path).unwrap();
    file.set_modified(when.into()).unwrap();
}

fn write_old(path: &Path, contents: &str) {
    fs::write(path, contents).unwrap();
    set_mtime(path, Utc::now() - Duration::days(2));
}

fn publisher_xml(date: &str) -> String {
    format!(
        "<Product><Title>Book</Title><PublicationDate>{}</PublicationDate></Product>",
        date
    )
}

/// Regular files anywhere below `dir`
fn count_files(dir: &Path) -> usize {
    if !dir.exists() {
        return 0;
    }
    fs::read_dir(dir)
        .unwrap()
        .map(|entry| {
            let path = entry.unwrap().path();
            if path.is_dir() {
                count_files(&path)
            } else {
                1
            }
        })
        .sum()
}

/// book42 with a linked PDF deposited 400 days ago and 2020 publisher metadata
#[cfg(unix)]
fn scenario_item(layout: &Layout) -> PathBuf {
    let deposit = layout.root.join("deposit");
    fs::create_dir(&deposit).unwrap();
    let pdf = deposit.join("book42-original.pdf");
    fs::write(&pdf, b"%PDF-1.7 book42").unwrap();
    set_mtime(&pdf, Utc::now() - Duration::days(400));

    let item = layout.collection.join("book42");
    fs::create_dir(&item).unwrap();
    std::os::unix::fs::symlink(&pdf, item.join("book42.pdf")).unwrap();
    write_old(&item.join("book42.xml"), &publisher_xml("01-01-2020"));
    item
}

#[cfg(unix)]
fn scenario_config(layout: &Layout) -> TransferConfig {
    let mut config = layout.config.clone();
    config.required_formats = vec!["pdf".to_string()];
    config.retain_create_date_ms = 0;
    config.retain_modify_date_ms = 0;
    config.retain_publication_date_ms = ONE_YEAR_MS;
    config
}

#[cfg(unix)]
#[test]
fn test_scenario_a_first_ingest() {
    let layout = layout();
    let item = scenario_item(&layout);
    let transfer = PreIngestTransfer::new(scenario_config(&layout));

    assert!(transfer.ready_for_ingest(&item, Utc::now()).unwrap().is_ready());

    let outcome = transfer.process_item(&item);
    assert_eq!(outcome.status, ItemStatus::Ingested { files: 2 });

    let ingested = layout.config.ingest_dir.join("book42");
    assert!(ingested.is_dir());
    let pdf = ingested.join("book42.pdf");
    assert!(fs::symlink_metadata(&pdf).unwrap().file_type().is_file());
    assert_eq!(fs::read(&pdf).unwrap(), b"%PDF-1.7 book42");
    assert!(!ingested.join("transfers.log").exists());
    assert!(!ingested.join("transfers.log.lock").exists());

    let registry = TransferRegistry::new(&item);
    assert!(registry.has_been_ingested());
    assert_eq!(
        registry.latest_update_date().unwrap(),
        registry.ingest_date().unwrap()
    );
}

#[cfg(unix)]
#[test]
fn test_scenario_b_update_after_ingest() {
    let layout = layout();
    let item = scenario_item(&layout);
    let transfer = PreIngestTransfer::new(scenario_config(&layout));

    let ingest_time = Utc::now() - Duration::days(1);
    let outcome = transfer.process_item_at(&item, ingest_time);
    assert!(matches!(outcome.status, ItemStatus::Ingested { .. }));

    let fits = item.join("book42.fits.xml");
    fs::write(&fits, "<fits/>").unwrap();
    set_mtime(&fits, Utc::now() - Duration::hours(1));

    let registry = TransferRegistry::new(&item);
    let events_before = registry.events().unwrap().len();

    let outcome = transfer.process_item(&item);
    assert_eq!(
        outcome.status,
        ItemStatus::Updated {
            content_files: 0,
            metadata_files: 1
        }
    );

    let copied = layout
        .config
        .update_metadata_dir
        .join("book42")
        .join("book42.fits.xml");
    assert_eq!(fs::read_to_string(copied).unwrap(), "<fits/>");
    assert_eq!(count_files(&layout.config.update_content_dir), 0);

    let events = registry.events().unwrap();
    assert_eq!(events.len(), events_before + 1);
    assert_eq!(events.last().unwrap().kind, EventKind::Update);
}

/// `<id>.pdf` linking to a deposit last modified at `deposited`
#[cfg(unix)]
fn linked_item(layout: &Layout, id: &str, deposited: DateTime<Utc>) -> (PathBuf, PathBuf) {
    let deposit = layout.root.join(format!("{}-deposit.pdf", id));
    fs::write(&deposit, b"%PDF-1.7").unwrap();
    set_mtime(&deposit, deposited);

    let item = layout.collection.join(id);
    fs::create_dir(&item).unwrap();
    std::os::unix::fs::symlink(&deposit, item.join(format!("{}.pdf", id))).unwrap();
    (item, deposit)
}

#[cfg(unix)]
fn thirty_day_modify_window(layout: &Layout) -> TransferConfig {
    let mut config = layout.config.clone();
    config.required_formats = vec!["pdf".to_string()];
    config.retain_modify_date_ms = 30 * 24 * 60 * 60 * 1000;
    config
}

#[cfg(unix)]
#[test]
fn test_age_gate_reads_old_link_target() {
    let layout = layout();
    // The link itself is brand new; only its target is old
    let (item, _) = linked_item(&layout, "book42", Utc::now() - Duration::days(400));
    let transfer = PreIngestTransfer::new(thirty_day_modify_window(&layout));

    assert!(transfer.ready_for_ingest(&item, Utc::now()).unwrap().is_ready());
}

#[cfg(unix)]
#[test]
fn test_age_gate_rejects_fresh_link_target() {
    let layout = layout();
    let (item, deposit) = linked_item(&layout, "book43", Utc::now() - Duration::hours(1));
    let transfer = PreIngestTransfer::new(thirty_day_modify_window(&layout));

    let readiness = transfer.ready_for_ingest(&item, Utc::now()).unwrap();
    assert_eq!(
        readiness,
        Readiness::NotReady(NotReadyReason::ContentTooNew {
            path: fs::canonicalize(&deposit).unwrap(),
            timestamp: FileTimestamp::Modified,
        })
    );
}

#[test]
fn test_second_run_copies_nothing() {
    let layout = layout();
    let item = layout.collection.join("book7");
    fs::create_dir(&item).unwrap();
    write_old(&item.join("book7.epub"), "epub");
    write_old(&item.join("book7.xml"), &publisher_xml("05-05-2005"));

    let transfer = PreIngestTransfer::new(layout.config.clone());

    let first = transfer.run(&[layout.collection.clone()]);
    assert_eq!(first.ingested(), 1);
    let ingested_files = count_files(&layout.config.ingest_dir);

    let second = transfer.run(&[layout.collection.clone()]);
    assert_eq!(second.updated(), 1);
    assert_eq!(second.files_copied(), 0);

    let third = transfer.run(&[layout.collection.clone()]);
    assert_eq!(third.files_copied(), 0);

    assert_eq!(count_files(&layout.config.ingest_dir), ingested_files);
    assert_eq!(count_files(&layout.config.update_content_dir), 0);
    assert_eq!(count_files(&layout.config.update_metadata_dir), 0);

    let events = TransferRegistry::new(&item).events().unwrap();
    let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![EventKind::Ingest, EventKind::Update, EventKind::Update]
    );
}

#[test]
fn test_not_ready_item_stays_new() {
    let layout = layout();
    let item = layout.collection.join("book9");
    fs::create_dir(&item).unwrap();
    write_old(&item.join("book9.epub"), "epub");

    let mut config = layout.config.clone();
    config.required_formats = vec!["pdf".to_string()];
    let transfer = PreIngestTransfer::new(config);

    for _ in 0..2 {
        let outcome = transfer.process_item(&item);
        assert_eq!(
            outcome.status,
            ItemStatus::NotReady(NotReadyReason::MissingFormat("pdf".to_string()))
        );
    }

    assert!(!TransferRegistry::new(&item).has_been_ingested());
    assert!(!layout.config.ingest_dir.join("book9").exists());
}

#[test]
fn test_gate_conjunction() {
    let layout = layout();
    let later = Utc::now() + Duration::days(400);

    let make_item = |id: &str, with_pdf: bool, published: DateTime<Utc>| {
        let item = layout.collection.join(id);
        fs::create_dir(&item).unwrap();
        if with_pdf {
            write_old(&item.join(format!("{}.pdf", id)), "pdf");
        } else {
            write_old(&item.join(format!("{}.epub", id)), "epub");
        }
        write_old(
            &item.join(format!("{}.xml", id)),
            &publisher_xml(&published.format("%d-%m-%Y").to_string()),
        );
        item
    };

    let mut config = layout.config.clone();
    config.required_formats = vec!["pdf".to_string()];
    config.retain_create_date_ms = 30 * 24 * 60 * 60 * 1000;
    config.retain_modify_date_ms = 30 * 24 * 60 * 60 * 1000;
    config.retain_publication_date_ms = ONE_YEAR_MS;
    let transfer = PreIngestTransfer::new(config.clone());

    let old_publication = Utc::now() - Duration::days(3 * 365);
    let passes_all = make_item("all", true, old_publication);
    let no_pdf = make_item("nopdf", false, old_publication);
    let recent = make_item("recent", true, later - Duration::days(100));

    assert!(transfer.ready_for_ingest(&passes_all, later).unwrap().is_ready());
    assert!(!transfer.ready_for_ingest(&no_pdf, later).unwrap().is_ready());
    assert!(!transfer.ready_for_ingest(&recent, later).unwrap().is_ready());

    // Only the age gate fails: content modified 2 days ago, window 500 days
    config.retain_modify_date_ms = 500 * 24 * 60 * 60 * 1000;
    let strict = PreIngestTransfer::new(config);
    assert!(!strict.ready_for_ingest(&passes_all, later).unwrap().is_ready());
}

#[cfg(unix)]
#[test]
fn test_bad_item_does_not_abort_batch() {
    let layout = layout();
    for id in ["a-book", "b-book", "c-book"] {
        let item = layout.collection.join(id);
        fs::create_dir(&item).unwrap();
        write_old(&item.join(format!("{}.xml", id)), "<Product/>");
    }
    std::os::unix::fs::symlink(
        layout.root.join("missing.pdf"),
        layout.collection.join("b-book").join("b-book.pdf"),
    )
    .unwrap();

    let transfer = PreIngestTransfer::new(layout.config.clone());
    let report = transfer.run(&[layout.collection.clone()]);

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.ingested(), 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.outcomes[1].item_id, "b-book");
    assert!(matches!(report.outcomes[1].status, ItemStatus::Failed(_)));
    assert!(!TransferRegistry::new(layout.collection.join("b-book")).has_been_ingested());
}

#[test]
fn test_unwritable_destination_fails_item_only() {
    let layout = layout();
    for id in ["book1", "book2"] {
        let item = layout.collection.join(id);
        fs::create_dir(&item).unwrap();
        write_old(&item.join(format!("{}.pdf", id)), "pdf");
    }
    // A plain file where the item's ingest directory should go
    fs::write(layout.config.ingest_dir.join("book1"), b"in the way").unwrap();

    let transfer = PreIngestTransfer::new(layout.config.clone());
    let report = transfer.run(&[layout.collection.clone()]);

    assert!(matches!(report.outcomes[0].status, ItemStatus::Failed(_)));
    assert_eq!(report.outcomes[1].status, ItemStatus::Ingested { files: 1 });
    assert!(!TransferRegistry::new(layout.collection.join("book1")).has_been_ingested());
}

#[test]
fn test_identical_collections_traversed_once() {
    let layout = layout();
    let item = layout.collection.join("book1");
    fs::create_dir(&item).unwrap();
    write_old(&item.join("book1.mp3"), "mp3");

    let transfer = PreIngestTransfer::new(layout.config.clone());
    let report = transfer.run(&[layout.collection.clone(), layout.collection.clone()]);

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.ingested(), 1);
    assert_eq!(TransferRegistry::new(&item).events().unwrap().len(), 1);
}

#[test]
fn test_update_routes_content_and_metadata() {
    let layout = layout();
    let item = layout.collection.join("book5");
    fs::create_dir_all(item.join("extra")).unwrap();
    write_old(&item.join("book5.mp3"), "v1");

    let transfer = PreIngestTransfer::new(layout.config.clone());
    let outcome = transfer.process_item_at(&item, Utc::now() - Duration::days(1));
    assert!(matches!(outcome.status, ItemStatus::Ingested { .. }));

    let changed_at = Utc::now() - Duration::hours(2);
    for (name, body) in [("book5.mp3", "v2"), ("extra/notes.txt", "notes")] {
        fs::write(item.join(name), body).unwrap();
        set_mtime(&item.join(name), changed_at);
    }

    let outcome = transfer.process_item(&item);
    assert_eq!(
        outcome.status,
        ItemStatus::Updated {
            content_files: 1,
            metadata_files: 1
        }
    );
    assert_eq!(
        fs::read_to_string(layout.config.update_content_dir.join("book5/book5.mp3")).unwrap(),
        "v2"
    );
    assert_eq!(
        fs::read_to_string(layout.config.update_metadata_dir.join("book5/extra/notes.txt"))
            .unwrap(),
        "notes"
    );
}

#[test]
fn test_report_serializes_to_json() {
    let layout = layout();
    let item = layout.collection.join("book1");
    fs::create_dir(&item).unwrap();

    let mut config = layout.config.clone();
    config.required_formats = vec!["pdf".to_string()];
    let transfer = PreIngestTransfer::new(config);
    let report = transfer.run(&[layout.collection.clone()]);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["outcomes"][0]["item_id"], "book1");
    assert_eq!(json["outcomes"][0]["status"]["status"], "not_ready");
    assert_eq!(
        json["outcomes"][0]["status"]["detail"]["missing_format"],
        "pdf"
    );
}
