use std::fs;
use std::path::Path;
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};

use curator::services::dupes::{EXACT_DUPES_FOLDER, NAME_COLLISION_FOLDER};
use curator::{
    Classifier, DuplicateDetection, Engine, EngineConfig, ExtensionStrategy, OperationStatus,
    OrganizeRequest, Resolver, UnclassifiedPolicy,
};
use tempfile::TempDir;

fn write_file(dir: &Path, name: &str, contents: &[u8]) {
    fs::write(dir.join(name), contents).unwrap();
}

fn backdate(path: &Path, secs: u64) {
    let stamp = std::time::SystemTime::now() - std::time::Duration::from_secs(secs);
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(stamp)
        .unwrap();
}

fn engine_in(workspace: &TempDir, config: EngineConfig) -> Engine {
    Engine::new(workspace.path().join("curator.db"), config)
}

#[tokio::test]
async fn organize_then_undo_round_trip() {
    let workspace = TempDir::new().unwrap();
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    write_file(source.path(), "vacation-001.jpg", b"one");
    write_file(source.path(), "vacation-002.jpg", b"two");

    let engine = engine_in(&workspace, EngineConfig::default());
    let handle = engine
        .organize(OrganizeRequest::new(
            vec![source.path().to_path_buf()],
            target.path().to_path_buf(),
        ))
        .unwrap();
    let summary = handle.wait().await.unwrap();

    assert_eq!(summary.status, OperationStatus::Completed);
    assert_eq!(summary.moved, 2);
    assert_eq!(summary.failed, 0);
    assert!(target.path().join("Vacation/vacation-001.jpg").exists());
    assert!(target.path().join("Vacation/vacation-002.jpg").exists());
    assert!(!source.path().join("vacation-001.jpg").exists());

    let report = engine.undo(&summary.operation_id).unwrap().wait().await.unwrap();
    assert_eq!(report.restored, 2);
    assert_eq!(report.failed, 0);
    assert!(source.path().join("vacation-001.jpg").exists());
    assert!(source.path().join("vacation-002.jpg").exists());
    assert!(!target.path().join("Vacation/vacation-001.jpg").exists());
    // The folder shell stays behind; only files are restored.
    assert!(target.path().join("Vacation").exists());
}

#[tokio::test]
async fn second_undo_restores_nothing() {
    let workspace = TempDir::new().unwrap();
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    write_file(source.path(), "IMG_0001.jpg", b"photo");

    let engine = engine_in(&workspace, EngineConfig::default());
    let summary = engine
        .organize(OrganizeRequest::new(
            vec![source.path().to_path_buf()],
            target.path().to_path_buf(),
        ))
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(summary.moved, 1);

    let first = engine.undo(&summary.operation_id).unwrap().wait().await.unwrap();
    assert_eq!(first.restored, 1);

    let second = engine.undo(&summary.operation_id).unwrap().wait().await.unwrap();
    assert_eq!(second.restored, 0);
    assert_eq!(second.failed, 0);
    assert!(second.summary.contains("0 moves remaining"));
    assert!(source.path().join("IMG_0001.jpg").exists());
}

#[tokio::test]
async fn identical_content_goes_to_dupes_quarantine() {
    let workspace = TempDir::new().unwrap();
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    write_file(source.path(), "IMG_1000.jpg", b"same bytes");
    write_file(source.path(), "IMG_2000.jpg", b"same bytes");

    let engine = engine_in(&workspace, EngineConfig::default());
    let summary = engine
        .organize(OrganizeRequest::new(
            vec![source.path().to_path_buf()],
            target.path().to_path_buf(),
        ))
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.moved, 2);
    let quarantined = fs::read_dir(target.path().join(EXACT_DUPES_FOLDER))
        .unwrap()
        .count();
    assert_eq!(quarantined, 1);
    assert_eq!(fs::read_dir(target.path().join("IMG")).unwrap().count(), 1);
}

#[tokio::test]
async fn same_name_different_content_goes_to_size_quarantine() {
    let workspace = TempDir::new().unwrap();
    let source_a = TempDir::new().unwrap();
    let source_b = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    write_file(source_a.path(), "IMG_3000.jpg", b"contents alpha");
    write_file(source_b.path(), "IMG_3000.jpg", b"contents beta, longer");

    let engine = engine_in(&workspace, EngineConfig::default());
    let summary = engine
        .organize(OrganizeRequest::new(
            vec![source_a.path().to_path_buf(), source_b.path().to_path_buf()],
            target.path().to_path_buf(),
        ))
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(summary.duplicates, 1);
    assert!(target
        .path()
        .join(NAME_COLLISION_FOLDER)
        .join("IMG_3000.jpg")
        .exists());
    assert!(target.path().join("IMG/IMG_3000.jpg").exists());
}

#[tokio::test]
async fn same_name_different_date_lands_beside_the_original_with_suffix() {
    let workspace = TempDir::new().unwrap();
    let source_a = TempDir::new().unwrap();
    let source_b = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    write_file(source_a.path(), "a.pdf", b"first version");
    write_file(source_b.path(), "a.pdf", b"second version, revised later");
    backdate(&source_b.path().join("a.pdf"), 3600);

    let engine = engine_in(&workspace, EngineConfig::default())
        .with_classifier(Classifier::new(vec![Box::new(ExtensionStrategy)]));
    let summary = engine
        .organize(OrganizeRequest::new(
            vec![source_a.path().to_path_buf(), source_b.path().to_path_buf()],
            target.path().to_path_buf(),
        ))
        .unwrap()
        .wait()
        .await
        .unwrap();

    // Different timestamps mean a new version, not a duplicate: both copies
    // live in the extension folder, the second under a numbered name.
    assert_eq!(summary.duplicates, 0);
    assert_eq!(summary.moved, 2);
    assert!(target.path().join("PDF/a.pdf").exists());
    assert!(target.path().join("PDF/a (2).pdf").exists());
    assert!(!target.path().join(NAME_COLLISION_FOLDER).exists());
}

#[tokio::test]
async fn size_only_mode_never_reads_content() {
    let workspace = TempDir::new().unwrap();
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    // Same length, different bytes: size-only cannot tell them apart.
    write_file(source.path(), "scan-100.png", b"aaaa");
    write_file(source.path(), "scan-200.png", b"bbbb");

    let config = EngineConfig {
        duplicate_detection: DuplicateDetection::SizeOnly,
        ..EngineConfig::default()
    };
    let engine = engine_in(&workspace, config);
    let summary = engine
        .organize(OrganizeRequest::new(
            vec![source.path().to_path_buf()],
            target.path().to_path_buf(),
        ))
        .unwrap()
        .wait()
        .await
        .unwrap();

    // Different names, so no name+size collision either.
    assert_eq!(summary.duplicates, 0);
    assert_eq!(summary.moved, 2);
}

#[tokio::test]
async fn collision_in_destination_gets_numbered_suffix() {
    let workspace = TempDir::new().unwrap();
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    write_file(source.path(), "trip-004.jpg", b"new arrival");
    fs::create_dir_all(target.path().join("Trip")).unwrap();
    write_file(&target.path().join("Trip"), "trip-004.jpg", b"already here");

    let engine = engine_in(&workspace, EngineConfig::default());
    let summary = engine
        .organize(OrganizeRequest::new(
            vec![source.path().to_path_buf()],
            target.path().to_path_buf(),
        ))
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(summary.moved, 1);
    assert!(target.path().join("Trip/trip-004.jpg").exists());
    assert!(target.path().join("Trip/trip-004 (2).jpg").exists());
}

#[tokio::test]
async fn unclassified_files_stay_put_by_default() {
    let workspace = TempDir::new().unwrap();
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    write_file(source.path(), "a.txt", b"no pattern here");

    let engine = engine_in(&workspace, EngineConfig::default());
    let summary = engine
        .organize(OrganizeRequest::new(
            vec![source.path().to_path_buf()],
            target.path().to_path_buf(),
        ))
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(summary.moved, 0);
    assert_eq!(summary.unclassified, 1);
    assert!(source.path().join("a.txt").exists());
}

#[tokio::test]
async fn default_bucket_policy_collects_strays() {
    let workspace = TempDir::new().unwrap();
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    write_file(source.path(), "a.txt", b"no pattern here");

    let config = EngineConfig {
        unclassified_policy: UnclassifiedPolicy::DefaultBucket("Misc".to_string()),
        ..EngineConfig::default()
    };
    let engine = engine_in(&workspace, config);
    let summary = engine
        .organize(OrganizeRequest::new(
            vec![source.path().to_path_buf()],
            target.path().to_path_buf(),
        ))
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(summary.moved, 1);
    assert!(target.path().join("Misc/a.txt").exists());
}

/// Signals when the worker reaches it, then answers only after the test
/// releases it. This pins the worker at a known point mid-run so the tests
/// can cancel or collide with it deterministically.
struct GatedResolver {
    entered: std_mpsc::Sender<()>,
    release: Mutex<std_mpsc::Receiver<()>>,
}

impl GatedResolver {
    fn new() -> (Arc<Self>, std_mpsc::Receiver<()>, std_mpsc::Sender<()>) {
        let (entered_tx, entered_rx) = std_mpsc::channel();
        let (release_tx, release_rx) = std_mpsc::channel();
        let resolver = Arc::new(Self {
            entered: entered_tx,
            release: Mutex::new(release_rx),
        });
        (resolver, entered_rx, release_tx)
    }
}

impl Resolver for GatedResolver {
    fn resolve(&self, _file_name: &str) -> Option<String> {
        let _ = self.entered.send(());
        self.release.lock().unwrap().recv().ok();
        Some("Sorted".to_string())
    }
}

#[tokio::test]
async fn cancellation_stops_between_files() {
    let workspace = TempDir::new().unwrap();
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    write_file(source.path(), "a.txt", b"first");
    write_file(source.path(), "b.log", b"second");

    let (resolver, entered_rx, release_tx) = GatedResolver::new();
    let config = EngineConfig {
        unclassified_policy: UnclassifiedPolicy::Resolve,
        ..EngineConfig::default()
    };
    let engine = engine_in(&workspace, config).with_resolver(resolver);

    let handle = engine
        .organize(OrganizeRequest::new(
            vec![source.path().to_path_buf()],
            target.path().to_path_buf(),
        ))
        .unwrap();

    // Wait until the worker is blocked inside the resolver on its first
    // file, then cancel and release it.
    entered_rx.recv().unwrap();
    handle.cancel.cancel();
    release_tx.send(()).unwrap();
    drop(release_tx);

    let summary = handle.wait().await.unwrap();
    assert_eq!(summary.status, OperationStatus::Cancelled);
    assert_eq!(summary.moved, 1);
}

#[tokio::test]
async fn concurrent_runs_are_rejected() {
    let workspace = TempDir::new().unwrap();
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    write_file(source.path(), "a.txt", b"hold the gate");

    let (resolver, entered_rx, release_tx) = GatedResolver::new();
    let config = EngineConfig {
        unclassified_policy: UnclassifiedPolicy::Resolve,
        ..EngineConfig::default()
    };
    let engine = engine_in(&workspace, config).with_resolver(resolver);

    let handle = engine
        .organize(OrganizeRequest::new(
            vec![source.path().to_path_buf()],
            target.path().to_path_buf(),
        ))
        .unwrap();
    entered_rx.recv().unwrap();

    let second = engine.organize(OrganizeRequest::new(
        vec![source.path().to_path_buf()],
        target.path().to_path_buf(),
    ));
    assert!(matches!(second, Err(curator::EngineError::Busy(_))));

    release_tx.send(()).unwrap();
    drop(release_tx);
    handle.wait().await.unwrap();

    // Gate released: a new run is admitted again.
    let third = engine
        .organize(OrganizeRequest::new(
            vec![source.path().to_path_buf()],
            target.path().to_path_buf(),
        ))
        .unwrap();
    let summary = third.wait().await.unwrap();
    // The only file already moved in the first run.
    assert_eq!(summary.moved, 0);
}

#[tokio::test]
async fn in_place_second_run_moves_nothing() {
    let workspace = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "holiday-001.jpg", b"one");
    write_file(dir.path(), "holiday-002.jpg", b"two");

    let config = EngineConfig {
        in_place: true,
        ..EngineConfig::default()
    };
    let engine = engine_in(&workspace, config.clone());
    let first = engine
        .organize(OrganizeRequest::new(
            vec![dir.path().to_path_buf()],
            dir.path().to_path_buf(),
        ))
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(first.moved, 2);
    assert!(dir.path().join("Holiday/holiday-001.jpg").exists());

    let second = engine
        .organize(OrganizeRequest::new(
            vec![dir.path().to_path_buf()],
            dir.path().to_path_buf(),
        ))
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(second.moved, 0);
    assert!(dir.path().join("Holiday/holiday-001.jpg").exists());
}

#[tokio::test]
async fn resolver_answer_is_learned_for_later_files() {
    let workspace = TempDir::new().unwrap();
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    write_file(source.path(), "inv0001.dat", b"first");
    write_file(source.path(), "inv0002.dat", b"second");

    struct Fixed;
    impl Resolver for Fixed {
        fn resolve(&self, _file_name: &str) -> Option<String> {
            Some("Invoices".to_string())
        }
    }

    let config = EngineConfig {
        unclassified_policy: UnclassifiedPolicy::Resolve,
        ..EngineConfig::default()
    };
    let engine = engine_in(&workspace, config.clone()).with_resolver(Arc::new(Fixed));
    let first = engine
        .organize(OrganizeRequest {
            sources: vec![source.path().to_path_buf()],
            target: target.path().to_path_buf(),
            medium_confirmed: true,
        })
        .unwrap()
        .wait()
        .await
        .unwrap();
    // One file answered by the resolver, the other by the freshly learned
    // mapping (a medium-confidence suggestion, hence the confirmation).
    assert_eq!(first.moved, 2);

    // Same shape, new run, no resolver: the learned mapping answers now.
    write_file(source.path(), "inv0003.dat", b"third");
    let engine = engine_in(&workspace, config);
    let second = engine
        .organize(OrganizeRequest {
            sources: vec![source.path().to_path_buf()],
            target: target.path().to_path_buf(),
            medium_confirmed: true,
        })
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(second.moved, 1);
    assert!(target.path().join("Invoices/inv0003.dat").exists());
}

#[tokio::test]
async fn medium_confidence_suggestion_is_held_without_confirmation() {
    let workspace = TempDir::new().unwrap();
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    write_file(source.path(), "inv0001.dat", b"first");
    write_file(source.path(), "inv0002.dat", b"second");

    struct Fixed;
    impl Resolver for Fixed {
        fn resolve(&self, _file_name: &str) -> Option<String> {
            Some("Invoices".to_string())
        }
    }

    let config = EngineConfig {
        unclassified_policy: UnclassifiedPolicy::Resolve,
        ..EngineConfig::default()
    };
    let engine = engine_in(&workspace, config).with_resolver(Arc::new(Fixed));
    let summary = engine
        .organize(OrganizeRequest::new(
            vec![source.path().to_path_buf()],
            target.path().to_path_buf(),
        ))
        .unwrap()
        .wait()
        .await
        .unwrap();

    // The second file matched the just-learned mapping at medium
    // confidence and was left in place.
    assert_eq!(summary.moved, 1);
    assert_eq!(summary.needs_review, 1);
}

#[tokio::test]
async fn validation_failure_aborts_before_any_move() {
    let workspace = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "vacation-001.jpg", b"one");

    let engine = engine_in(&workspace, EngineConfig::default());
    // Same directory as source and target is rejected outside in-place mode.
    let result = engine.organize(OrganizeRequest::new(
        vec![dir.path().to_path_buf()],
        dir.path().to_path_buf(),
    ));
    assert!(matches!(result, Err(curator::EngineError::Validation(_))));
    assert!(dir.path().join("vacation-001.jpg").exists());
}

#[tokio::test]
async fn progress_reports_the_first_file_of_a_small_run() {
    let workspace = TempDir::new().unwrap();
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    write_file(source.path(), "vacation-001.jpg", b"one");
    write_file(source.path(), "vacation-002.jpg", b"two");

    let engine = engine_in(&workspace, EngineConfig::default());
    let mut handle = engine
        .organize(OrganizeRequest::new(
            vec![source.path().to_path_buf()],
            target.path().to_path_buf(),
        ))
        .unwrap();

    // Well below the default interval of 100 files, the caller still hears
    // from the run before it finishes.
    let first = handle.progress.recv().await.unwrap();
    assert_eq!(first.processed, 1);
    assert!(first.total.is_none());

    let (_tx, drained) = tokio::sync::mpsc::channel(1);
    let mut progress = std::mem::replace(&mut handle.progress, drained);
    let summary = handle.wait().await.unwrap();
    assert_eq!(summary.moved, 2);

    // The final event carries the settled total.
    let mut last = None;
    while let Some(event) = progress.recv().await {
        last = Some(event);
    }
    let last = last.unwrap();
    assert_eq!(last.total, Some(2));
}

#[tokio::test]
async fn history_records_the_completed_run() {
    let workspace = TempDir::new().unwrap();
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    write_file(source.path(), "IMG_5000.jpg", b"photo");

    let engine = engine_in(&workspace, EngineConfig::default());
    let summary = engine
        .organize(OrganizeRequest::new(
            vec![source.path().to_path_buf()],
            target.path().to_path_buf(),
        ))
        .unwrap()
        .wait()
        .await
        .unwrap();

    let recent = engine.recent_operations(10).unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].operation_id, summary.operation_id);
    assert_eq!(recent[0].status, OperationStatus::Completed);
    assert_eq!(recent[0].stats.moved, 1);
}
