//! Session workflow with scripted sources and a temporary photo store.

mod common;

use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;

use common::mock_capture::ScriptedSource;
use common::{ModelCodec, RecordingDisplay, frames};
use fitcam::config::FitTuning;
use fitcam::encode::{BudgetEncoder, JpegCodec};
use fitcam::ledger::{LedgerLog, LedgerReceipt, LedgerUploader, publish_latest};
use fitcam::notify::{BroadcastNotifier, CamEvent, NullNotifier};
use fitcam::session::{CameraSession, READY_HINT};
use fitcam::storage::{PersistenceSink, PhotoStore, StoredPhoto};
use parking_lot::Mutex;

fn session(
    source: ScriptedSource,
    store: PhotoStore,
    display: RecordingDisplay,
    notifier: BroadcastNotifier,
) -> CameraSession {
    let encoder = BudgetEncoder::new(Box::new(JpegCodec), 100 * 1024, FitTuning::default()).unwrap();
    CameraSession::builder()
        .with_source(source)
        .with_encoder(encoder)
        .with_sink(store)
        .with_display(display)
        .with_notifier(notifier)
        .with_holds(Duration::ZERO, Duration::ZERO)
        .build()
        .unwrap()
}

#[tokio::test]
async fn capture_stores_previews_and_notifies() {
    let dir = tempfile::tempdir().unwrap();
    let store = PhotoStore::new(dir.path());
    let display = RecordingDisplay::default();
    let notifier = BroadcastNotifier::new(8);
    let mut events = notifier.subscribe();

    let source = ScriptedSource::new().frame(frames::gradient(1024, 768));
    let mut session = session(source, store.clone(), display.clone(), notifier);

    let report = session.capture_once().await.unwrap();
    assert!(report.fits);
    assert!(report.bytes <= 100 * 1024);
    assert_eq!((report.width, report.height), (1024, 768));
    assert_eq!(std::fs::read(&report.stored.path).unwrap().len(), report.bytes);
    assert_eq!(store.latest("jpg").unwrap(), Some(store.latest_path("jpg")));
    assert_eq!(store.gallery().unwrap().len(), 1);

    assert_eq!(display.first_lines(), vec!["Capturing...", "Ready"]);
    assert_eq!(display.lines.lock()[1].1, READY_HINT);
    assert_eq!(*display.previews.lock(), vec![(128, 128)]);
    assert!(matches!(events.recv().await.unwrap(), CamEvent::Captured { .. }));
}

#[tokio::test]
async fn capture_failure_shows_error_then_ready() {
    let dir = tempfile::tempdir().unwrap();
    let display = RecordingDisplay::default();
    let source = ScriptedSource::new()
        .failure("camera not detected")
        .frame(frames::flat(640, 480));
    let mut session = session(source, PhotoStore::new(dir.path()), display.clone(), BroadcastNotifier::default());

    let err = session.capture_once().await.unwrap_err();
    assert_eq!(err.category(), "capture");
    assert_eq!(display.first_lines(), vec!["Capturing...", "Capture ERR", "Ready"]);
    assert!(display.previews.lock().is_empty());

    // the session keeps working after a failed shot
    let report = session.capture_once().await.unwrap();
    assert_eq!((report.width, report.height), (640, 480));
}

#[tokio::test]
async fn over_budget_frame_is_still_stored() {
    let dir = tempfile::tempdir().unwrap();
    let store = PhotoStore::new(dir.path());
    let encoder = BudgetEncoder::new(Box::new(ModelCodec::new(1)), 10_000, FitTuning::default()).unwrap();
    let mut session = CameraSession::builder()
        .with_source(ScriptedSource::new().frame(frames::flat(1024, 1024)))
        .with_encoder(encoder)
        .with_sink(store.clone())
        .with_display(RecordingDisplay::default())
        .with_holds(Duration::ZERO, Duration::ZERO)
        .build()
        .unwrap();

    let report = session.capture_once().await.unwrap();
    assert!(!report.fits);
    assert_eq!(report.quality, 30);
    assert_eq!((report.width, report.height), (640, 640));
    assert!(report.stored.path.to_string_lossy().ends_with(".bin"));
    assert_eq!(session.encoder().state().bias(), 30);
}

/// Photo store that remembers which thread each write ran on.
#[derive(Clone)]
struct ThreadTrackingStore {
    inner: PhotoStore,
    threads: Arc<Mutex<Vec<ThreadId>>>,
}

impl PersistenceSink for ThreadTrackingStore {
    fn persist(&self, bytes: &[u8], extension: &str) -> fitcam::CamResult<StoredPhoto> {
        self.threads.lock().push(std::thread::current().id());
        self.inner.persist(bytes, extension)
    }
}

#[tokio::test]
async fn photo_is_written_off_the_runtime_thread() {
    let dir = tempfile::tempdir().unwrap();
    let store = ThreadTrackingStore {
        inner: PhotoStore::new(dir.path()),
        threads: Arc::default(),
    };
    let mut session = session_with_sink(
        ScriptedSource::new().frame(frames::flat(320, 240)),
        store.clone(),
    );

    let report = session.capture_once().await.unwrap();
    assert!(report.stored.path.exists());
    let threads = store.threads.lock();
    assert_eq!(threads.len(), 1);
    assert_ne!(threads[0], std::thread::current().id());
}

fn session_with_sink<P: PersistenceSink + 'static>(source: ScriptedSource, sink: P) -> CameraSession {
    let encoder = BudgetEncoder::new(Box::new(JpegCodec), 100 * 1024, FitTuning::default()).unwrap();
    CameraSession::builder()
        .with_source(source)
        .with_encoder(encoder)
        .with_sink(sink)
        .with_display(RecordingDisplay::default())
        .with_holds(Duration::ZERO, Duration::ZERO)
        .build()
        .unwrap()
}

struct FakeUploader;

#[async_trait::async_trait]
impl LedgerUploader for FakeUploader {
    async fn upload(&self, path: &std::path::Path) -> fitcam::CamResult<LedgerReceipt> {
        Ok(LedgerReceipt {
            id: "tx-test".into(),
            url: Some("https://arweave.net/tx-test".into()),
            size: Some(std::fs::metadata(path).unwrap().len()),
            file: Some(path.display().to_string()),
        })
    }
}

#[tokio::test]
async fn publish_latest_logs_and_notifies() {
    let dir = tempfile::tempdir().unwrap();
    let store = PhotoStore::new(dir.path().join("photos"));
    let log = LedgerLog::new(dir.path().join("photos").join("ledger.json"));
    let notifier = BroadcastNotifier::new(4);
    let mut events = notifier.subscribe();

    let err = publish_latest(&store, "webp", &FakeUploader, &log, &NullNotifier)
        .await
        .unwrap_err();
    assert_eq!(err.category(), "ledger");

    store.persist(b"photo", "webp").unwrap();
    let record = publish_latest(&store, "webp", &FakeUploader, &log, &notifier).await.unwrap();
    assert_eq!(record.id, "tx-test");
    assert_eq!(record.size, Some(5));
    assert_eq!(log.records(), vec![record]);
    assert!(matches!(events.recv().await.unwrap(), CamEvent::Uploaded { ref id, .. } if id == "tx-test"));
    // the ledger log is not part of the gallery
    assert_eq!(store.gallery().unwrap().len(), 1);
}
