//! Match analysis coordinator.
//!
//! Takes a finalized match, makes sure only one analysis of it is in flight,
//! hands the request to the analysis lane and, once the service answers,
//! stores the per-player frames and fans out one clip job per player.

use super::fetch_cache::VideoCache;
use super::lease::{LeaseHandle, LeaseTable, LeaseToken};
use super::worker::{JobHandler, Lane};
use crate::domain::analysis::{AnalysisRequest, AnalysisResult, PlayerFrameRecord};
use crate::domain::errors::{ClientError, CoordinatorError, IngestError, JobError, SliceError};
use crate::domain::jobs::{AnalysisJob, AnalysisOutcome, ClipJob, ClipOutcome, Priority, Trigger};
use crate::domain::matches::{Match, MatchId, PlayerId};
use crate::domain::windows::has_in_range;
use crate::ports::analysis::AnalysisService;
use crate::ports::results::ResultSink;
use crate::ports::slicer::ClipSlicer;
use crate::ports::submission::{JobHandle, MatchSubmitter};
use crate::ports::transport::VideoTransport;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

pub type AnalysisLane = Lane<AnalysisTicket, Result<AnalysisResult, ClientError>>;
pub type SlicingLane = Lane<ClipJob, Result<PathBuf, SliceError>>;

/// An analysis job together with the lease of its match.
#[derive(Debug, Clone)]
pub struct AnalysisTicket {
    pub job: AnalysisJob,
    pub lease: LeaseHandle<MatchId>,
}

/// Runs analysis jobs against the external service.
pub struct AnalysisHandler<A> {
    service: Arc<A>,
}

impl<A> AnalysisHandler<A> {
    pub fn new(service: Arc<A>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<A: AnalysisService + 'static> JobHandler for AnalysisHandler<A> {
    type Job = AnalysisTicket;
    type Output = Result<AnalysisResult, ClientError>;

    async fn handle(&self, ticket: &AnalysisTicket) -> Self::Output {
        let match_id = ticket.job.match_id;
        if !ticket.lease.renew() {
            tracing::warn!(match_id, "lease was released before the analysis started");
        }
        tracing::info!(match_id, "running analysis");
        self.service.analyze(&ticket.job.request).await
    }
}

/// Cuts one player's clip.
pub struct SlicingHandler<S> {
    slicer: Arc<S>,
}

impl<S> SlicingHandler<S> {
    pub fn new(slicer: Arc<S>) -> Self {
        Self { slicer }
    }
}

#[async_trait]
impl<S: ClipSlicer + 'static> JobHandler for SlicingHandler<S> {
    type Job = ClipJob;
    type Output = Result<PathBuf, SliceError>;

    async fn handle(&self, job: &ClipJob) -> Self::Output {
        tracing::debug!(
            match_id = job.match_id,
            player_id = job.player_id,
            detections = job.frames.len(),
            "slicing clip"
        );
        self.slicer
            .slice(&job.source_path, &job.frames, &job.output_path)
            .await
            .map(|_| job.output_path.clone())
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Forwarded untouched to the analysis service.
    pub auth_token: String,
    pub clips_dir: PathBuf,
    /// A running analysis whose lease was not renewed for this long is
    /// treated as lost. Queued analyses never expire.
    pub lease_ttl: Option<Duration>,
}

pub struct Coordinator<T, S, R> {
    inner: Arc<Inner<T, S, R>>,
}

impl<T, S, R> Clone for Coordinator<T, S, R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<T, S, R> {
    settings: CoordinatorSettings,
    leases: Arc<LeaseTable<MatchId>>,
    cache: VideoCache<T>,
    slicer: Arc<S>,
    sink: Arc<R>,
    analysis: AnalysisLane,
    slicing: SlicingLane,
}

impl<T, S, R> Coordinator<T, S, R>
where
    T: VideoTransport + 'static,
    S: ClipSlicer + 'static,
    R: ResultSink + 'static,
{
    pub fn new(
        settings: CoordinatorSettings,
        cache: VideoCache<T>,
        slicer: Arc<S>,
        sink: Arc<R>,
        analysis: AnalysisLane,
        slicing: SlicingLane,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                leases: Arc::new(LeaseTable::new(settings.lease_ttl)),
                settings,
                cache,
                slicer,
                sink,
                analysis,
                slicing,
            }),
        }
    }

    /// Queue an analysis of `game`.
    ///
    /// Fails with `AlreadyInFlight` while an earlier submission of the same
    /// match is still being analysed; that submission will deliver the results.
    pub fn submit(&self, game: &Match, trigger: Trigger) -> Result<JobHandle, CoordinatorError> {
        let video_link = game.validate()?.to_string();
        let priority = trigger.priority();

        let Some(token) = self.inner.leases.acquire(game.id) else {
            tracing::info!(match_id = game.id, ?trigger, "analysis already in flight, coalescing");
            return Err(CoordinatorError::AlreadyInFlight(game.id));
        };

        let request = AnalysisRequest::build(game, &video_link, &self.inner.settings.auth_token);
        let ticket = AnalysisTicket {
            job: AnalysisJob {
                match_id: game.id,
                request,
            },
            lease: LeaseHandle::new(self.inner.leases.clone(), game.id, token),
        };

        let (outcome_tx, outcome_rx) = oneshot::channel();
        let inner = self.inner.clone();
        let roster = game.clone();
        let submitted = self.inner.analysis.submit(priority, ticket, move |result| async move {
            let outcome = inner
                .conclude(&roster, &video_link, priority, token, result)
                .await;
            let _ = outcome_tx.send(outcome);
        });

        match submitted {
            Ok(job_id) => {
                tracing::info!(match_id = game.id, job_id = %job_id, ?priority, "analysis queued");
                Ok(JobHandle::new(job_id, game.id, priority, outcome_rx))
            }
            Err(closed) => {
                self.inner.leases.release_if(&game.id, token);
                Err(CoordinatorError::QueueClosed(closed.0))
            }
        }
    }

    /// Administrative override: forget the in-flight marker of a match so it
    /// can be submitted again.
    pub fn release_lease(&self, match_id: MatchId) -> bool {
        let released = self.inner.leases.release(&match_id);
        tracing::info!(match_id, released, "lease released by override");
        released
    }

    pub fn is_in_flight(&self, match_id: MatchId) -> bool {
        self.inner.leases.is_held(&match_id)
    }
}

impl<T, S, R> MatchSubmitter for Coordinator<T, S, R>
where
    T: VideoTransport + 'static,
    S: ClipSlicer + 'static,
    R: ResultSink + 'static,
{
    fn submit(&self, game: &Match, trigger: Trigger) -> Result<JobHandle, CoordinatorError> {
        Coordinator::submit(self, game, trigger)
    }

    fn release_lease(&self, match_id: MatchId) -> bool {
        Coordinator::release_lease(self, match_id)
    }
}

impl<T, S, R> Inner<T, S, R>
where
    T: VideoTransport + 'static,
    S: ClipSlicer + 'static,
    R: ResultSink + 'static,
{
    async fn conclude(
        &self,
        game: &Match,
        video_link: &str,
        priority: Priority,
        token: LeaseToken,
        result: Result<Result<AnalysisResult, ClientError>, JobError>,
    ) -> AnalysisOutcome {
        // Restart the clock for the ingest phase.
        self.leases.renew(&game.id, token);

        let outcome = match result {
            Ok(Ok(analysis)) => match self.ingest(game, video_link, priority, analysis).await {
                Ok(clip_jobs) => AnalysisOutcome::Dispatched { clip_jobs },
                Err(e) => AnalysisOutcome::Failed {
                    reason: e.to_string(),
                },
            },
            Ok(Err(e)) => AnalysisOutcome::Failed {
                reason: e.to_string(),
            },
            Err(e) => AnalysisOutcome::Failed {
                reason: e.to_string(),
            },
        };

        self.leases.release_if(&game.id, token);

        match &outcome {
            AnalysisOutcome::Dispatched { clip_jobs } => {
                tracing::info!(match_id = game.id, clip_jobs, "analysis ingested");
            }
            AnalysisOutcome::Failed { reason } => {
                tracing::error!(match_id = game.id, reason = %reason, "analysis failed");
                if let Err(e) = self.sink.notify_failure(game.id, reason).await {
                    tracing::error!(match_id = game.id, "failure notification lost: {}", e);
                }
            }
        }
        outcome
    }

    /// Store the frame lists and queue the clips. Returns how many clips were queued.
    async fn ingest(
        &self,
        game: &Match,
        video_link: &str,
        priority: Priority,
        analysis: AnalysisResult,
    ) -> Result<usize, IngestError> {
        let mut records = Vec::with_capacity(analysis.detections.len());
        for detection in analysis.detections {
            match game.player_for(detection.team, detection.number) {
                Some(player_id) => records.push(PlayerFrameRecord {
                    match_id: game.id,
                    player_id,
                    frames: detection.frames,
                }),
                None => tracing::warn!(
                    match_id = game.id,
                    team = detection.team,
                    number = detection.number,
                    "detected player is not on the roster"
                ),
            }
        }

        for record in &records {
            self.sink
                .upsert_player_frames(record.match_id, record.player_id, &record.frames)
                .await?;
        }

        if records.iter().all(|record| record.frames.is_empty()) {
            return Ok(0);
        }

        let source = self.cache.fetch(video_link).await?;
        let frame_count = self.slicer.frame_count(&source).await?;

        let mut queued = 0;
        for record in records {
            if !has_in_range(&record.frames, frame_count) {
                tracing::warn!(
                    match_id = record.match_id,
                    player_id = record.player_id,
                    frame_count,
                    "no detection inside the video, no clip"
                );
                continue;
            }

            let (match_id, player_id) = (record.match_id, record.player_id);
            let job = ClipJob {
                match_id,
                player_id,
                source_path: source.clone(),
                output_path: self.clip_path(match_id, player_id),
                frames: record.frames,
            };
            let sink = self.sink.clone();
            self.slicing
                .submit(priority, job, move |result| async move {
                    report_clip(sink.as_ref(), match_id, player_id, result).await;
                })
                .map_err(|closed| IngestError::QueueClosed(closed.0))?;
            queued += 1;
        }
        Ok(queued)
    }

    fn clip_path(&self, match_id: MatchId, player_id: PlayerId) -> PathBuf {
        self.settings
            .clips_dir
            .join(match_id.to_string())
            .join(format!("player_{}.mp4", player_id))
    }
}

async fn report_clip<R: ResultSink>(
    sink: &R,
    match_id: MatchId,
    player_id: PlayerId,
    result: Result<Result<PathBuf, SliceError>, JobError>,
) {
    let outcome = match result {
        Ok(Ok(path)) => ClipOutcome::Completed(path),
        Ok(Err(e)) => ClipOutcome::Failed(e.to_string()),
        Err(e) => ClipOutcome::Failed(e.to_string()),
    };

    let reported = match &outcome {
        ClipOutcome::Completed(path) => {
            tracing::info!(match_id, player_id, clip = %path.display(), "clip completed");
            sink.record_clip(match_id, player_id, path).await
        }
        ClipOutcome::Failed(reason) => {
            tracing::warn!(match_id, player_id, reason = %reason, "clip failed");
            sink.notify_failure(
                match_id,
                &format!("clip for player {} failed: {}", player_id, reason),
            )
            .await
        }
    };

    if let Err(e) = reported {
        tracing::error!(match_id, player_id, "clip result lost: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::worker::WorkerPool;
    use crate::domain::analysis::PlayerDetection;
    use crate::domain::errors::{FetchError, SinkError};
    use crate::domain::matches::fixtures::two_player_match;
    use crate::ports::analysis::MockAnalysisService;
    use crate::ports::results::MockResultSink;
    use crate::ports::slicer::MockClipSlicer;
    use crate::ports::transport::MockVideoTransport;
    use std::path::Path;
    use tempfile::TempDir;

    type TestCoordinator = Coordinator<MockVideoTransport, MockClipSlicer, MockResultSink>;

    struct Harness {
        coordinator: TestCoordinator,
        analysis: WorkerPool<AnalysisHandler<MockAnalysisService>>,
        slicing: WorkerPool<SlicingHandler<MockClipSlicer>>,
        _dir: TempDir,
    }

    fn harness(
        service: MockAnalysisService,
        transport: MockVideoTransport,
        slicer: MockClipSlicer,
        sink: MockResultSink,
    ) -> Harness {
        harness_with_ttl(service, transport, slicer, sink, None)
    }

    fn harness_with_ttl(
        service: MockAnalysisService,
        transport: MockVideoTransport,
        slicer: MockClipSlicer,
        sink: MockResultSink,
        lease_ttl: Option<Duration>,
    ) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let slicer = Arc::new(slicer);
        let analysis = WorkerPool::new("analysis", AnalysisHandler::new(Arc::new(service)));
        let slicing = WorkerPool::new("slicing", SlicingHandler::new(slicer.clone()));

        let coordinator = Coordinator::new(
            CoordinatorSettings {
                auth_token: "token".to_string(),
                clips_dir: dir.path().join("clips"),
                lease_ttl,
            },
            VideoCache::new(dir.path().join("cache"), transport),
            slicer,
            Arc::new(sink),
            analysis.lane(),
            slicing.lane(),
        );

        Harness {
            coordinator,
            analysis,
            slicing,
            _dir: dir,
        }
    }

    fn writing_transport() -> MockVideoTransport {
        let mut transport = MockVideoTransport::new();
        transport.expect_download().returning(|_, destination: &Path| {
            std::fs::write(destination, b"video").map_err(|e| FetchError::write_failed(destination, e))
        });
        transport
    }

    fn detection(number: u32, frames: Vec<u64>) -> PlayerDetection {
        PlayerDetection {
            number,
            team: 1,
            frames,
        }
    }

    #[tokio::test]
    async fn test_invalid_match_is_rejected_without_lease() {
        let h = harness(
            MockAnalysisService::new(),
            MockVideoTransport::new(),
            MockClipSlicer::new(),
            MockResultSink::new(),
        );
        let mut game = two_player_match(3);
        game.video_link = Some("  ".to_string());

        let result = h.coordinator.submit(&game, Trigger::Automatic);
        assert!(matches!(result, Err(CoordinatorError::InvalidMatch { .. })));
        assert!(!h.coordinator.is_in_flight(3));
    }

    #[tokio::test]
    async fn test_second_submit_coalesces_until_override() {
        let h = harness(
            MockAnalysisService::new(),
            MockVideoTransport::new(),
            MockClipSlicer::new(),
            MockResultSink::new(),
        );
        let game = two_player_match(4);

        let first = h.coordinator.submit(&game, Trigger::Automatic).unwrap();
        assert_eq!(first.priority, Priority::Low);
        assert_eq!(
            h.coordinator.submit(&game, Trigger::UserRequested).unwrap_err(),
            CoordinatorError::AlreadyInFlight(4)
        );

        assert!(h.coordinator.release_lease(4));
        let second = h.coordinator.submit(&game, Trigger::UserRequested).unwrap();
        assert_eq!(second.priority, Priority::High);
        assert_ne!(first.job_id, second.job_id);
    }

    #[tokio::test]
    async fn test_queued_analysis_keeps_lease_past_ttl() {
        let h = harness_with_ttl(
            MockAnalysisService::new(),
            MockVideoTransport::new(),
            MockClipSlicer::new(),
            MockResultSink::new(),
            Some(Duration::from_millis(50)),
        );
        let game = two_player_match(8);

        h.coordinator.submit(&game, Trigger::Automatic).unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(h.coordinator.is_in_flight(8));
        assert_eq!(
            h.coordinator.submit(&game, Trigger::UserRequested).unwrap_err(),
            CoordinatorError::AlreadyInFlight(8)
        );
        assert_eq!(h.analysis.lane().pending(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submits_single_flight() {
        let h = harness(
            MockAnalysisService::new(),
            MockVideoTransport::new(),
            MockClipSlicer::new(),
            MockResultSink::new(),
        );
        let game = two_player_match(5);

        let attempts: Vec<_> = (0..16)
            .map(|_| {
                let coordinator = h.coordinator.clone();
                let game = game.clone();
                tokio::spawn(async move { coordinator.submit(&game, Trigger::Automatic).is_ok() })
            })
            .collect();

        let mut accepted = 0;
        for attempt in attempts {
            if attempt.await.unwrap() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
    }

    #[tokio::test]
    async fn test_result_is_stored_and_fanned_out() {
        let mut service = MockAnalysisService::new();
        service.expect_analyze().times(1).returning(|request| {
            assert_eq!(request.player_numbers, vec![vec![7, 9]]);
            Ok(AnalysisResult {
                detections: vec![
                    detection(7, vec![5, 40]),
                    detection(9, vec![500]),
                    detection(42, vec![1]),
                ],
            })
        });

        let mut slicer = MockClipSlicer::new();
        slicer.expect_frame_count().times(1).returning(|_| Ok(100));
        slicer
            .expect_slice()
            .times(1)
            .withf(|_, frames, output| {
                *frames == [5, 40] && output.ends_with("6/player_100.mp4")
            })
            .returning(|_, _, _| Ok(()));

        let (clip_tx, clip_rx) = oneshot::channel();
        let clip_tx = std::sync::Mutex::new(Some(clip_tx));
        let mut sink = MockResultSink::new();
        sink.expect_upsert_player_frames()
            .times(2)
            .returning(|_, _, _| Ok(()));
        sink.expect_record_clip()
            .times(1)
            .returning(move |match_id, player_id, clip| {
                if let Some(tx) = clip_tx.lock().unwrap().take() {
                    let _ = tx.send((match_id, player_id, clip.to_path_buf()));
                }
                Ok(())
            });
        sink.expect_notify_failure().never();

        let h = harness(service, writing_transport(), slicer, sink);
        h.analysis.start(1);
        h.slicing.start(1);

        let handle = h.coordinator.submit(&two_player_match(6), Trigger::Automatic).unwrap();
        assert_eq!(
            handle.outcome().await,
            Some(AnalysisOutcome::Dispatched { clip_jobs: 1 })
        );
        assert!(!h.coordinator.is_in_flight(6));

        let (match_id, player_id, clip) = clip_rx.await.unwrap();
        assert_eq!((match_id, player_id), (6, 100));
        assert!(clip.ends_with("player_100.mp4"));
    }

    #[tokio::test]
    async fn test_client_failure_notifies_once_and_releases() {
        let mut service = MockAnalysisService::new();
        service.expect_analyze().times(1).returning(|_| {
            Err(ClientError::RejectedByService {
                status: 400,
                body: "bad roster".to_string(),
            })
        });

        let mut sink = MockResultSink::new();
        sink.expect_upsert_player_frames().never();
        sink.expect_notify_failure()
            .times(1)
            .withf(|match_id, reason| *match_id == 8 && reason.contains("bad roster"))
            .returning(|_, _| Ok(()));

        let h = harness(service, MockVideoTransport::new(), MockClipSlicer::new(), sink);
        h.analysis.start(1);

        let handle = h.coordinator.submit(&two_player_match(8), Trigger::UserRequested).unwrap();
        assert!(matches!(
            handle.outcome().await,
            Some(AnalysisOutcome::Failed { .. })
        ));
        assert!(!h.coordinator.is_in_flight(8));
        assert!(h.coordinator.submit(&two_player_match(8), Trigger::UserRequested).is_ok());
    }

    #[tokio::test]
    async fn test_sink_failure_fails_the_analysis() {
        let mut service = MockAnalysisService::new();
        service.expect_analyze().returning(|_| {
            Ok(AnalysisResult {
                detections: vec![detection(7, vec![1])],
            })
        });

        let mut sink = MockResultSink::new();
        sink.expect_upsert_player_frames()
            .returning(|_, _, _| Err(SinkError("database is down".to_string())));
        sink.expect_notify_failure().times(1).returning(|_, _| Ok(()));

        let h = harness(service, MockVideoTransport::new(), MockClipSlicer::new(), sink);
        h.analysis.start(1);

        let handle = h.coordinator.submit(&two_player_match(9), Trigger::Automatic).unwrap();
        match handle.outcome().await {
            Some(AnalysisOutcome::Failed { reason }) => assert!(reason.contains("database is down")),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_frames_means_no_download() {
        let mut service = MockAnalysisService::new();
        service.expect_analyze().returning(|_| {
            Ok(AnalysisResult {
                detections: vec![detection(7, vec![]), detection(9, vec![])],
            })
        });
        let mut sink = MockResultSink::new();
        sink.expect_upsert_player_frames().times(2).returning(|_, _, _| Ok(()));

        let mut transport = MockVideoTransport::new();
        transport.expect_download().never();

        let h = harness(service, transport, MockClipSlicer::new(), sink);
        h.analysis.start(1);

        let handle = h.coordinator.submit(&two_player_match(10), Trigger::Automatic).unwrap();
        assert_eq!(
            handle.outcome().await,
            Some(AnalysisOutcome::Dispatched { clip_jobs: 0 })
        );
    }

    #[tokio::test]
    async fn test_failed_clip_is_reported_with_player() {
        let (tx, rx) = oneshot::channel();
        let tx = std::sync::Mutex::new(Some(tx));
        let mut sink = MockResultSink::new();
        sink.expect_notify_failure().times(1).returning(move |_, reason| {
            if let Some(tx) = tx.lock().unwrap().take() {
                let _ = tx.send(reason.to_string());
            }
            Ok(())
        });

        report_clip(
            &sink,
            1,
            101,
            Ok(Err(SliceError::unreadable("/cache/x.mp4", "moov atom not found"))),
        )
        .await;

        let reason = rx.await.unwrap();
        assert!(reason.starts_with("clip for player 101 failed"));
    }
}
