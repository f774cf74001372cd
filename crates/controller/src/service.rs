use crate::{
    error::{ErrorKind, PipelineError},
    events::{FrameFailure, PipelineEvent, PipelineResult},
    family::ModelFamily,
    mapper::map_detections,
    metrics::PipelineMetrics,
    performance::{PerformanceSnapshot, PerformanceTracker},
    state_machine::{PipelineState, Transition},
};
use inference::{InferenceEngine, InferenceError};
use preprocess::PreprocessResult;
use schema::{Frame, ModelOutput, TimingSample};
use std::{
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Instant,
};
use tokio::sync::{broadcast, watch};
use tracing::Instrument;

const EVENT_CAPACITY: usize = 16;
const STATUS_INTERVAL: u64 = 30;

/// What happened to a submitted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The frame is being processed.
    Accepted,
    /// A run was already in flight; the frame was dropped.
    DroppedBusy,
    /// The pipeline is disposing or disposed; the frame was ignored.
    Disposed,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Stages<E> {
    family: Box<dyn ModelFamily>,
    engine: Option<E>,
}

struct RunOutput {
    output: ModelOutput,
    timing: TimingSample,
    postprocess_error: Option<PipelineError>,
}

struct Shared<E> {
    state: Mutex<PipelineState>,
    state_tx: watch::Sender<PipelineState>,
    disposed: AtomicBool,
    // Only the single in-flight run or the disposal path touches the stages
    stages: Arc<Mutex<Stages<E>>>,
    tracker: Mutex<PerformanceTracker>,
    events: broadcast::Sender<PipelineEvent>,
    metrics: PipelineMetrics,
    dropped_busy: AtomicU64,
    published: AtomicU64,
}

/// Single-flight orchestrator: preprocess, infer, postprocess and map one
/// frame at a time, dropping frames that arrive while busy.
pub struct FramePipelineController<E> {
    shared: Arc<Shared<E>>,
}

impl<E> Clone for FramePipelineController<E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

async fn blocking<T, F>(kind: ErrorKind, f: F) -> Result<T, PipelineError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PipelineError::Aborted {
            kind,
            reason: e.to_string(),
        })
}

impl<E: InferenceEngine> Shared<E> {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn set_state(&self, state: &mut PipelineState, next: PipelineState) {
        *state = next;
        self.state_tx.send_replace(next);
    }

    fn transition(&self, transition: Transition) -> Option<PipelineState> {
        let mut state = lock(&self.state);
        let next = state.next(transition)?;
        self.set_state(&mut state, next);
        Some(next)
    }

    /// Run every stage for `frame`. `Ok(None)` means disposal was observed at
    /// a stage boundary and the rest of the run was skipped.
    async fn execute(&self, frame: Frame) -> Result<Option<RunOutput>, PipelineError> {
        let run_start = Instant::now();

        let stages = self.stages.clone();
        let start = Instant::now();
        let PreprocessResult {
            tensors, transform, ..
        } = blocking(ErrorKind::Preprocessing, move || {
            lock(&stages).family.preprocess(&frame.data)
        })
        .await??;
        let preprocess_time = start.elapsed();

        if self.is_disposed() {
            return Ok(None);
        }

        let stages = self.stages.clone();
        let start = Instant::now();
        let outputs = blocking(ErrorKind::Inference, move || {
            match lock(&stages).engine.as_mut() {
                Some(engine) => engine.forward(tensors),
                None => Err(InferenceError::Released),
            }
        })
        .await??;
        let infer_time = start.elapsed();

        if self.is_disposed() {
            return Ok(None);
        }

        let stages = self.stages.clone();
        let start = Instant::now();
        let (decoded, empty) = blocking(ErrorKind::Postprocessing, move || {
            let stages = lock(&stages);
            (stages.family.postprocess(&outputs), stages.family.empty_output())
        })
        .await?;

        let (output, postprocess_error) = match decoded {
            Ok(output) => (output, None),
            Err(e) => (empty, Some(PipelineError::from(e))),
        };
        let output = match output {
            ModelOutput::Detections(detections) => {
                ModelOutput::Detections(map_detections(detections, transform.as_ref()))
            }
            other => other,
        };
        let postprocess_time = start.elapsed();

        if self.is_disposed() {
            return Ok(None);
        }

        Ok(Some(RunOutput {
            output,
            timing: TimingSample::from_durations(
                preprocess_time,
                infer_time,
                postprocess_time,
                run_start.elapsed(),
            ),
            postprocess_error,
        }))
    }

    fn report_failure(&self, frame_sequence: u64, error: &PipelineError) {
        let kind = error.kind();
        let transient = error.is_transient();
        self.metrics.record_failure(kind);

        match kind {
            ErrorKind::Inference | ErrorKind::Capture | ErrorKind::Configuration => {
                tracing::error!(frame_sequence, %kind, transient, error = %error, "Frame failed");
            }
            ErrorKind::Preprocessing | ErrorKind::Postprocessing => {
                tracing::warn!(frame_sequence, %kind, transient, error = %error, "Frame failed");
            }
        }

        let _ = self.events.send(PipelineEvent::Failed(FrameFailure {
            frame_sequence,
            kind,
            transient,
            message: error.to_string(),
        }));
    }

    fn publish(&self, frame: (u64, u64), run: RunOutput) {
        let (frame_sequence, captured_at_ns) = frame;

        let stats = {
            let mut tracker = lock(&self.tracker);
            tracker.update(run.timing);
            tracker.snapshot()
        };

        let detections = run.output.detections().map_or(0, |d| d.len());
        self.metrics
            .record_published(run.timing.total_ms / 1000.0, detections);

        let published = self.published.fetch_add(1, Ordering::Relaxed) + 1;
        if published % STATUS_INTERVAL == 0 {
            tracing::debug!(
                published,
                dropped_busy = self.dropped_busy.load(Ordering::Relaxed),
                mean_total_ms = stats.running_means.total_ms,
                fps = stats.fps,
                "Pipeline status"
            );
        }

        let _ = self
            .events
            .send(PipelineEvent::Published(Arc::new(PipelineResult {
                frame_sequence,
                captured_at_ns,
                output: run.output,
                timing: run.timing,
                stats,
            })));
    }

    /// Dispose and drop the engine on the blocking pool; native teardown
    /// may block.
    async fn release_engine(&self) {
        let stages = self.stages.clone();
        let released = tokio::task::spawn_blocking(move || {
            let Some(mut engine) = lock(&stages).engine.take() else {
                return false;
            };
            if let Err(e) = engine.dispose() {
                tracing::debug!(error = %e, "Engine dispose failed during shutdown");
            }
            true
        })
        .await;

        match released {
            Ok(true) => tracing::info!("Inference engine released"),
            Ok(false) => {}
            Err(e) => tracing::warn!(error = %e, "Engine release aborted"),
        }
    }

    /// Finish a run: report, publish or discard, and leave `Processing`.
    async fn complete(
        &self,
        frame: (u64, u64),
        outcome: Result<Option<RunOutput>, PipelineError>,
    ) {
        let disposing = self.is_disposed();
        let run = match outcome {
            Ok(Some(mut run)) => {
                if let Some(err) = run.postprocess_error.take()
                    && !disposing
                {
                    self.report_failure(frame.0, &err);
                }
                Some(run)
            }
            Ok(None) => None,
            Err(err) if disposing => {
                tracing::debug!(frame_sequence = frame.0, error = %err, "Failure during disposal suppressed");
                None
            }
            Err(err) => {
                self.report_failure(frame.0, &err);
                None
            }
        };

        let release = {
            let mut state = lock(&self.state);
            let current = *state;
            match current {
                PipelineState::Processing => {
                    // dispose() raises the flag before it takes the state lock
                    match run {
                        Some(run) if !self.is_disposed() => self.publish(frame, run),
                        Some(_) => {
                            tracing::debug!(frame_sequence = frame.0, "Result discarded, dispose requested");
                        }
                        None => {}
                    }
                    self.set_state(&mut state, PipelineState::Idle);
                    false
                }
                PipelineState::Disposing => true,
                other => {
                    tracing::warn!(state = ?other, "Run completed in unexpected state");
                    false
                }
            }
        };

        if release {
            tracing::debug!(frame_sequence = frame.0, "Result discarded, pipeline disposing");
            self.release_engine().await;
            self.transition(Transition::Complete);
        }
    }
}

impl<E: InferenceEngine> FramePipelineController<E> {
    pub fn new(engine: E, family: Box<dyn ModelFamily>) -> Self {
        Self::with_metrics(engine, family, PipelineMetrics::new("controller"))
    }

    pub fn with_metrics(engine: E, family: Box<dyn ModelFamily>, metrics: PipelineMetrics) -> Self {
        let (state_tx, _) = watch::channel(PipelineState::Idle);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(PipelineState::Idle),
                state_tx,
                disposed: AtomicBool::new(false),
                stages: Arc::new(Mutex::new(Stages {
                    family,
                    engine: Some(engine),
                })),
                tracker: Mutex::new(PerformanceTracker::new()),
                events,
                metrics,
                dropped_busy: AtomicU64::new(0),
                published: AtomicU64::new(0),
            }),
        }
    }

    /// Offer a frame. Accepted only when idle; never queues. Must be called
    /// from within a Tokio runtime.
    pub fn submit_frame(&self, frame: Frame) -> SubmitOutcome {
        let shared = &self.shared;
        if shared.is_disposed() {
            return SubmitOutcome::Disposed;
        }

        {
            let mut state = lock(&shared.state);
            match state.next(Transition::Submit) {
                Some(next) => shared.set_state(&mut state, next),
                None if state.is_terminal() => return SubmitOutcome::Disposed,
                None => {
                    shared.dropped_busy.fetch_add(1, Ordering::Relaxed);
                    shared.metrics.record_dropped(1, "busy");
                    tracing::trace!(frame_sequence = frame.sequence, "Pipeline busy, frame dropped");
                    return SubmitOutcome::DroppedBusy;
                }
            }
        }

        let shared = self.shared.clone();
        let frame_key = (frame.sequence, frame.timestamp_ns);
        let span = tracing::info_span!("pipeline_run", frame_sequence = frame.sequence);

        tokio::spawn(
            async move {
                let outcome = shared.execute(frame).await;
                shared.complete(frame_key, outcome).await;
            }
            .instrument(span),
        );

        SubmitOutcome::Accepted
    }

    /// Stop accepting frames, let any in-flight run finish without
    /// publishing, then release the engine. Idempotent.
    pub async fn dispose(&self) {
        let shared = &self.shared;
        shared.disposed.store(true, Ordering::Release);

        let release_now = {
            let mut state = lock(&shared.state);
            let previous = *state;
            match state.next(Transition::Dispose) {
                Some(next) => {
                    shared.set_state(&mut state, next);
                    previous == PipelineState::Idle
                }
                None => false,
            }
        };

        if release_now {
            shared.release_engine().await;
            shared.transition(Transition::Complete);
        }

        let mut state = shared.state_tx.subscribe();
        let reached = state
            .wait_for(|s| *s == PipelineState::Disposed)
            .await
            .map(|_| ())
            .is_ok();
        if reached {
            tracing::info!("Pipeline disposed");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.shared.events.subscribe()
    }

    pub fn state(&self) -> PipelineState {
        *lock(&self.shared.state)
    }

    pub fn state_watch(&self) -> watch::Receiver<PipelineState> {
        self.shared.state_tx.subscribe()
    }

    pub fn reset_stats(&self) {
        lock(&self.shared.tracker).reset();
    }

    pub fn stats(&self) -> PerformanceSnapshot {
        lock(&self.shared.tracker).snapshot()
    }

    /// Frames dropped because a run was in flight.
    pub fn dropped_frames(&self) -> u64 {
        self.shared.dropped_busy.load(Ordering::Relaxed)
    }

    pub(crate) fn record_displaced(&self, count: u64) {
        self.shared.metrics.record_dropped(count, "displaced");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::PipelineConfig, family::ModelKind};
    use inference::{Labels, OutputLayout};
    use schema::{BoundingBox, Detection, TensorBuffer};

    struct EchoEngine {
        disposed: Arc<AtomicU64>,
    }

    impl InferenceEngine for EchoEngine {
        fn load_model(path: &str) -> Result<Self, InferenceError> {
            Err(InferenceError::ModelLoad(path.to_string()))
        }

        fn forward(&mut self, inputs: Vec<TensorBuffer>) -> Result<Vec<TensorBuffer>, InferenceError> {
            Ok(inputs)
        }

        fn dispose(&mut self) -> Result<(), InferenceError> {
            self.disposed.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    fn controller() -> (FramePipelineController<EchoEngine>, Arc<AtomicU64>) {
        let disposed = Arc::new(AtomicU64::new(0));
        let engine = EchoEngine {
            disposed: disposed.clone(),
        };
        let family = ModelKind::Detection(OutputLayout::YoloV8)
            .build(&PipelineConfig::default(), Labels::default());
        (FramePipelineController::new(engine, family), disposed)
    }

    fn finished_run() -> RunOutput {
        RunOutput {
            output: ModelOutput::Detections(vec![Detection {
                class_index: 0,
                class_name: "person".into(),
                confidence: 0.8,
                bbox: BoundingBox::new(0.1, 0.1, 0.2, 0.2),
            }]),
            timing: TimingSample::default(),
            postprocess_error: None,
        }
    }

    #[tokio::test]
    async fn finished_run_is_published_while_live() {
        let (controller, _) = controller();
        let shared = &controller.shared;
        let mut events = controller.subscribe();

        assert_eq!(
            shared.transition(Transition::Submit),
            Some(PipelineState::Processing)
        );
        shared.complete((1, 0), Ok(Some(finished_run()))).await;

        match events.try_recv() {
            Ok(PipelineEvent::Published(result)) => assert_eq!(result.frame_sequence, 1),
            _ => panic!("Expected a published result"),
        }
        assert_eq!(controller.state(), PipelineState::Idle);
        assert_eq!(controller.stats().frame_count, 1);
    }

    /// A run that takes the state lock after dispose() raised the flag, but
    /// before it moved to Disposing, must not publish.
    #[tokio::test]
    async fn run_finishing_after_dispose_flag_is_discarded() {
        let (controller, disposed) = controller();
        let shared = &controller.shared;
        let mut events = controller.subscribe();

        assert_eq!(
            shared.transition(Transition::Submit),
            Some(PipelineState::Processing)
        );
        // First step of dispose(), ahead of its state transition
        shared.disposed.store(true, Ordering::Release);

        shared.complete((1, 0), Ok(Some(finished_run()))).await;

        assert!(events.try_recv().is_err(), "Result published after dispose began");
        assert_eq!(controller.stats().frame_count, 0);
        assert_eq!(controller.state(), PipelineState::Idle);

        controller.dispose().await;
        assert_eq!(controller.state(), PipelineState::Disposed);
        assert_eq!(disposed.load(Ordering::Relaxed), 1, "Engine released exactly once");
    }

    #[tokio::test]
    async fn engine_release_runs_once() {
        let (controller, disposed) = controller();

        controller.dispose().await;
        controller.shared.release_engine().await;
        controller.dispose().await;

        assert_eq!(disposed.load(Ordering::Relaxed), 1);
    }
}
