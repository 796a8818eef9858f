//! End-to-end runs of the pipeline with the real HTTP client against a fake
//! analysis service, and stand-ins for the video host and clip writer.

use async_trait::async_trait;
use faceoff::adapters::local::InMemoryResults;
use faceoff::adapters::remote::{AnalysisClient, RetryPolicy};
use faceoff::application::coordinator::{
    AnalysisHandler, Coordinator, CoordinatorSettings, SlicingHandler,
};
use faceoff::application::fetch_cache::VideoCache;
use faceoff::application::worker::WorkerPool;
use faceoff::domain::errors::{CoordinatorError, FetchError, SliceError};
use faceoff::domain::jobs::{AnalysisOutcome, Trigger};
use faceoff::domain::matches::{Match, Player};
use faceoff::ports::slicer::ClipSlicer;
use faceoff::ports::transport::VideoTransport;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const VIDEO: &str = "https://videos.example.org/final.mp4";

#[derive(Default)]
struct CountingTransport {
    downloads: Arc<AtomicUsize>,
}

#[async_trait]
impl VideoTransport for CountingTransport {
    async fn download(&self, _reference: &str, destination: &Path) -> Result<(), FetchError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(destination, b"match video")
            .await
            .map_err(|e| FetchError::write_failed(destination, e))
    }
}

/// Writes the requested frame list instead of video.
#[derive(Default)]
struct ListingSlicer {
    sliced: Mutex<Vec<(PathBuf, Vec<u64>)>>,
}

#[async_trait]
impl ClipSlicer for ListingSlicer {
    async fn frame_count(&self, _source: &Path) -> Result<u64, SliceError> {
        Ok(1_000)
    }

    async fn slice(&self, _source: &Path, frames: &[u64], output: &Path) -> Result<(), SliceError> {
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SliceError::write_failed(parent, e))?;
        }
        tokio::fs::write(output, format!("{:?}", frames))
            .await
            .map_err(|e| SliceError::write_failed(output, e))?;
        self.sliced
            .lock()
            .unwrap()
            .push((output.to_path_buf(), frames.to_vec()));
        Ok(())
    }
}

struct Pipeline {
    coordinator: Coordinator<CountingTransport, ListingSlicer, InMemoryResults>,
    results: InMemoryResults,
    slicer: Arc<ListingSlicer>,
    downloads: Arc<AtomicUsize>,
    _analysis: WorkerPool<AnalysisHandler<AnalysisClient>>,
    _slicing: WorkerPool<SlicingHandler<ListingSlicer>>,
    dir: TempDir,
}

fn pipeline(server: &MockServer) -> Pipeline {
    let dir = tempfile::tempdir().unwrap();
    let client = AnalysisClient::new(
        &server.uri(),
        Duration::from_secs(5),
        RetryPolicy::default()
            .with_max_attempts(2)
            .with_base_delay(Duration::from_millis(5)),
    )
    .unwrap();

    let slicer = Arc::new(ListingSlicer::default());
    let transport = CountingTransport::default();
    let downloads = transport.downloads.clone();
    let results = InMemoryResults::new();
    let analysis = WorkerPool::new("analysis", AnalysisHandler::new(Arc::new(client)));
    let slicing = WorkerPool::new("slicing", SlicingHandler::new(slicer.clone()));

    let coordinator = Coordinator::new(
        CoordinatorSettings {
            auth_token: "secret".to_string(),
            clips_dir: dir.path().join("clips"),
            lease_ttl: Some(Duration::from_secs(60)),
        },
        VideoCache::new(dir.path().join("cache"), transport),
        slicer.clone(),
        Arc::new(results.clone()),
        analysis.lane(),
        slicing.lane(),
    );
    analysis.start(2);
    slicing.start(2);

    Pipeline {
        coordinator,
        results,
        slicer,
        downloads,
        _analysis: analysis,
        _slicing: slicing,
        dir,
    }
}

fn final_match(id: u64) -> Match {
    Match {
        id,
        video_link: Some(VIDEO.to_string()),
        team_ids: vec![1],
        players: vec![
            Player {
                id: 100,
                team_id: 1,
                number: 7,
            },
            Player {
                id: 101,
                team_id: 1,
                number: 9,
            },
        ],
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_players_get_two_clips() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/process"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"number": 7, "team": 1, "frames": [5]},
            {"number": 9, "team": 1, "frames": [50]}
        ])))
        .expect(1)
        .mount(&server)
        .await;
    let p = pipeline(&server);

    let handle = p.coordinator.submit(&final_match(1), Trigger::Automatic).unwrap();
    assert_eq!(
        handle.outcome().await,
        Some(AnalysisOutcome::Dispatched { clip_jobs: 2 })
    );

    let done = tokio::time::timeout(
        Duration::from_secs(10),
        p.results.wait_until(1, |r| r.clips.len() == 2),
    )
    .await
    .unwrap();

    assert_eq!(done.frames.len(), 2);
    assert_eq!(done.frames[&100], vec![5]);
    assert_eq!(done.frames[&101], vec![50]);
    assert!(done.failures.is_empty());

    let clips_dir = p.dir.path().join("clips").join("1");
    assert_eq!(done.clips[&100], clips_dir.join("player_100.mp4"));
    assert_eq!(done.clips[&101], clips_dir.join("player_101.mp4"));
    assert!(done.clips.values().all(|clip| clip.exists()));

    let mut sliced = p.slicer.sliced.lock().unwrap().clone();
    sliced.sort();
    assert_eq!(sliced.len(), 2);
    assert_eq!(sliced[0].1, vec![5]);
    assert_eq!(sliced[1].1, vec![50]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submits_run_one_analysis() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/process"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"number": 7, "team": 1, "frames": [1, 2]}]))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;
    let p = Arc::new(pipeline(&server));

    let attempts: Vec<_> = (0..12)
        .map(|_| {
            let p = p.clone();
            tokio::spawn(async move { p.coordinator.submit(&final_match(2), Trigger::Automatic) })
        })
        .collect();

    let mut handles = Vec::new();
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(handle) => handles.push(handle),
            Err(e) => assert_eq!(e, CoordinatorError::AlreadyInFlight(2)),
        }
    }
    assert_eq!(handles.len(), 1);

    let outcome = handles.pop().unwrap().outcome().await;
    assert_eq!(outcome, Some(AnalysisOutcome::Dispatched { clip_jobs: 1 }));
    assert!(!p.coordinator.is_in_flight(2));
}

#[tokio::test]
async fn test_rejected_analysis_notifies_once_and_frees_the_match() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/process"))
        .respond_with(ResponseTemplate::new(400).set_body_string("unknown team"))
        .expect(2)
        .mount(&server)
        .await;
    let p = pipeline(&server);

    let handle = p.coordinator.submit(&final_match(3), Trigger::UserRequested).unwrap();
    assert!(matches!(
        handle.outcome().await,
        Some(AnalysisOutcome::Failed { .. })
    ));

    let snapshot = p.results.snapshot(3).unwrap();
    assert_eq!(snapshot.failures.len(), 1);
    assert!(snapshot.failures[0].contains("unknown team"));
    assert!(snapshot.frames.is_empty());

    let retry = p.coordinator.submit(&final_match(3), Trigger::UserRequested).unwrap();
    assert!(matches!(
        retry.outcome().await,
        Some(AnalysisOutcome::Failed { .. })
    ));
    assert_eq!(p.results.snapshot(3).unwrap().failures.len(), 2);
}

#[tokio::test]
async fn test_same_video_is_downloaded_once_across_matches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/process"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"number": 9, "team": 1, "frames": [3]}])),
        )
        .mount(&server)
        .await;
    let p = pipeline(&server);

    for id in [10, 11] {
        let handle = p.coordinator.submit(&final_match(id), Trigger::Automatic).unwrap();
        assert_eq!(
            handle.outcome().await,
            Some(AnalysisOutcome::Dispatched { clip_jobs: 1 })
        );
    }

    assert_eq!(p.downloads.load(Ordering::SeqCst), 1);
}
