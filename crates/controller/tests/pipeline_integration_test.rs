use capture::{CameraSource, CaptureError, FrameSender};
use controller::{
    ErrorKind, FramePipelineController, ModelFamily, ModelKind, PipelineEvent, PipelineResult,
    PipelineState, Session, SubmitOutcome,
};
use inference::{InferenceEngine, InferenceError, OutputLayout, PostprocessError};
use preprocess::{PreprocessError, PreprocessResult};
use schema::{BoundingBox, Detection, Frame, LetterboxTransform, ModelOutput, TensorBuffer};
use std::{
    sync::{Arc, Mutex, mpsc},
    time::Duration,
};
use tokio::sync::{broadcast, mpsc as async_mpsc};

const WAIT: Duration = Duration::from_secs(5);

type Log = Arc<Mutex<Vec<&'static str>>>;

enum Step {
    Succeed,
    Fail,
}

/// Engine whose `forward` announces itself on `entered`, then blocks until
/// the test hands it a step.
struct ScriptedEngine {
    steps: mpsc::Receiver<Step>,
    entered: async_mpsc::UnboundedSender<()>,
    log: Log,
}

impl InferenceEngine for ScriptedEngine {
    fn load_model(path: &str) -> Result<Self, InferenceError> {
        Err(InferenceError::ModelLoad(path.to_string()))
    }

    fn forward(&mut self, inputs: Vec<TensorBuffer>) -> Result<Vec<TensorBuffer>, InferenceError> {
        assert_eq!(inputs.len(), 1);
        let _ = self.entered.send(());
        match self.steps.recv() {
            Ok(Step::Succeed) => Ok(vec![TensorBuffer::from_f32(vec![1, 1], &[1.0])?]),
            Ok(Step::Fail) => Err(InferenceError::Forward("scripted failure".into())),
            Err(_) => Err(InferenceError::Forward("script exhausted".into())),
        }
    }

    fn dispose(&mut self) -> Result<(), InferenceError> {
        self.log.lock().unwrap().push("engine");
        Ok(())
    }
}

/// Family that fakes decoding: empty frames fail, anything else is treated
/// as a 1280x720 image letterboxed into 640x640.
struct ScriptedFamily {
    postprocess_fails: bool,
}

fn letterbox_detection() -> Detection {
    // Covers the content area of the letterbox canvas horizontally centered.
    Detection {
        class_index: 0,
        class_name: "person".into(),
        confidence: 0.9,
        bbox: BoundingBox::new(0.25, 140.0 / 640.0, 0.5, 360.0 / 640.0),
    }
}

impl ModelFamily for ScriptedFamily {
    fn kind(&self) -> ModelKind {
        ModelKind::Detection(OutputLayout::YoloV8)
    }

    fn preprocess(&mut self, encoded: &[u8]) -> Result<PreprocessResult, PreprocessError> {
        if encoded.is_empty() {
            return Err(PreprocessError::EmptyInput);
        }
        Ok(PreprocessResult {
            tensors: vec![TensorBuffer::from_f32(vec![1, 3], &[0.0, 0.5, 1.0])?],
            transform: Some(LetterboxTransform::compute((1280, 720), (640, 640))),
            source_size: (1280, 720),
        })
    }

    fn postprocess(&self, outputs: &[TensorBuffer]) -> Result<ModelOutput, PostprocessError> {
        if self.postprocess_fails || outputs.is_empty() {
            return Err(PostprocessError::MissingOutput);
        }
        Ok(ModelOutput::Detections(vec![letterbox_detection()]))
    }

    fn empty_output(&self) -> ModelOutput {
        ModelOutput::Detections(Vec::new())
    }
}

struct Harness {
    controller: FramePipelineController<ScriptedEngine>,
    steps: mpsc::Sender<Step>,
    entered: async_mpsc::UnboundedReceiver<()>,
    events: broadcast::Receiver<PipelineEvent>,
    log: Log,
}

fn harness(postprocess_fails: bool) -> Harness {
    let (steps, rx) = mpsc::channel();
    let (entered_tx, entered) = async_mpsc::unbounded_channel();
    let log = Log::default();
    let engine = ScriptedEngine {
        steps: rx,
        entered: entered_tx,
        log: log.clone(),
    };
    let controller =
        FramePipelineController::new(engine, Box::new(ScriptedFamily { postprocess_fails }));
    let events = controller.subscribe();

    Harness {
        controller,
        steps,
        entered,
        events,
        log,
    }
}

/// Wait until the engine is inside `forward`.
async fn wait_for_forward(entered: &mut async_mpsc::UnboundedReceiver<()>) {
    tokio::time::timeout(WAIT, entered.recv())
        .await
        .expect("timed out waiting for forward")
        .expect("engine dropped");
}

fn frame(sequence: u64) -> Frame {
    Frame::new(sequence, vec![0xFF, 0xD8, 0xFF])
}

async fn next_event(events: &mut broadcast::Receiver<PipelineEvent>) -> PipelineEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for pipeline event")
        .expect("event channel closed")
}

async fn next_result(events: &mut broadcast::Receiver<PipelineEvent>) -> Arc<PipelineResult> {
    match next_event(events).await {
        PipelineEvent::Published(result) => result,
        PipelineEvent::Failed(failure) => panic!("unexpected failure: {failure:?}"),
    }
}

async fn wait_for_state(controller: &FramePipelineController<ScriptedEngine>, state: PipelineState) {
    let mut watch = controller.state_watch();
    tokio::time::timeout(WAIT, watch.wait_for(|s| *s == state))
        .await
        .expect("timed out waiting for state")
        .unwrap();
}

/// Frames arriving while a run is in flight are dropped, never queued.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_single_flight_drops_busy_frames() {
    let mut h = harness(false);

    assert_eq!(h.controller.submit_frame(frame(1)), SubmitOutcome::Accepted);
    assert_eq!(h.controller.state(), PipelineState::Processing);

    // Engine is blocked on the first frame
    assert_eq!(h.controller.submit_frame(frame(2)), SubmitOutcome::DroppedBusy);
    assert_eq!(h.controller.submit_frame(frame(3)), SubmitOutcome::DroppedBusy);
    assert_eq!(h.controller.dropped_frames(), 2);

    h.steps.send(Step::Succeed).unwrap();
    let result = next_result(&mut h.events).await;
    assert_eq!(result.frame_sequence, 1);
    wait_for_state(&h.controller, PipelineState::Idle).await;

    // Idle again: the next frame is accepted
    assert_eq!(h.controller.submit_frame(frame(4)), SubmitOutcome::Accepted);
    h.steps.send(Step::Succeed).unwrap();
    assert_eq!(next_result(&mut h.events).await.frame_sequence, 4);
}

/// Published detections are expressed in source-image coordinates.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_detections_mapped_to_source_space() {
    let mut h = harness(false);
    h.steps.send(Step::Succeed).unwrap();

    let frame = Frame::with_timestamp(9, 1_000, vec![1]);
    assert_eq!(h.controller.submit_frame(frame), SubmitOutcome::Accepted);

    let result = next_result(&mut h.events).await;
    assert_eq!(result.frame_sequence, 9);
    assert_eq!(result.captured_at_ns, 1_000);

    let detections = result.output.detections().unwrap();
    assert_eq!(detections.len(), 1);
    let bbox = detections[0].bbox;
    assert!((bbox.x - 0.25).abs() < 1e-5, "x = {}", bbox.x);
    assert!(bbox.y.abs() < 1e-5, "y = {}", bbox.y);
    assert!((bbox.width - 0.5).abs() < 1e-5);
    assert!((bbox.height - 1.0).abs() < 1e-5);

    assert_eq!(result.stats.frame_count, 1);
    assert!(result.timing.total_ms >= result.timing.infer_ms);
}

/// Disposing while the engine is inside `forward` keeps the engine alive
/// until the run returns, publishes nothing and then releases the engine.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dispose_during_processing_suppresses_publication() {
    let mut h = harness(false);

    assert_eq!(h.controller.submit_frame(frame(1)), SubmitOutcome::Accepted);
    wait_for_forward(&mut h.entered).await;

    let controller = h.controller.clone();
    let disposing = tokio::spawn(async move { controller.dispose().await });
    wait_for_state(&h.controller, PipelineState::Disposing).await;

    // Engine not released while the run still owns it
    assert!(h.log.lock().unwrap().is_empty());
    assert_eq!(h.controller.submit_frame(frame(2)), SubmitOutcome::Disposed);
    assert!(!disposing.is_finished(), "dispose returned before the run drained");

    h.steps.send(Step::Succeed).unwrap();
    tokio::time::timeout(WAIT, disposing).await.unwrap().unwrap();

    assert_eq!(h.controller.state(), PipelineState::Disposed);
    assert_eq!(*h.log.lock().unwrap(), vec!["engine"]);
    assert!(h.events.try_recv().is_err(), "result published after dispose");
}

/// Dispose from idle is immediate and idempotent; later frames are ignored.
#[tokio::test]
async fn test_submit_after_dispose_is_noop() {
    let h = harness(false);

    h.controller.dispose().await;
    assert_eq!(h.controller.state(), PipelineState::Disposed);

    assert_eq!(h.controller.submit_frame(frame(1)), SubmitOutcome::Disposed);
    assert_eq!(h.controller.dropped_frames(), 0);

    h.controller.dispose().await;
    assert_eq!(*h.log.lock().unwrap(), vec!["engine"]);
}

/// A frame that fails preprocessing is reported and the pipeline recovers.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_preprocess_failure_returns_to_idle() {
    let mut h = harness(false);

    assert_eq!(
        h.controller.submit_frame(Frame::new(1, Vec::new())),
        SubmitOutcome::Accepted
    );

    match next_event(&mut h.events).await {
        PipelineEvent::Failed(failure) => {
            assert_eq!(failure.frame_sequence, 1);
            assert_eq!(failure.kind, ErrorKind::Preprocessing);
            assert!(failure.transient);
        }
        PipelineEvent::Published(_) => panic!("empty frame was published"),
    }
    wait_for_state(&h.controller, PipelineState::Idle).await;

    h.steps.send(Step::Succeed).unwrap();
    assert_eq!(h.controller.submit_frame(frame(2)), SubmitOutcome::Accepted);
    assert_eq!(next_result(&mut h.events).await.frame_sequence, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_inference_error_is_reported_transient() {
    let mut h = harness(false);
    h.steps.send(Step::Fail).unwrap();

    h.controller.submit_frame(frame(5));

    match next_event(&mut h.events).await {
        PipelineEvent::Failed(failure) => {
            assert_eq!(failure.kind, ErrorKind::Inference);
            assert!(failure.transient);
            assert!(failure.message.contains("scripted failure"));
        }
        PipelineEvent::Published(_) => panic!("failed frame was published"),
    }
    wait_for_state(&h.controller, PipelineState::Idle).await;
    assert_eq!(h.controller.stats().frame_count, 0);
}

/// Postprocessing failures report the error and still publish an empty
/// output for the frame.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_postprocess_error_publishes_empty_output() {
    let mut h = harness(true);
    h.steps.send(Step::Succeed).unwrap();

    h.controller.submit_frame(frame(3));

    match next_event(&mut h.events).await {
        PipelineEvent::Failed(failure) => assert_eq!(failure.kind, ErrorKind::Postprocessing),
        PipelineEvent::Published(_) => panic!("expected failure first"),
    }

    let result = next_result(&mut h.events).await;
    assert_eq!(result.frame_sequence, 3);
    assert!(result.output.is_empty());
}

/// Camera that records lifecycle calls and pushes `initial` frames on start.
struct RecordingCamera {
    log: Log,
    initial: Vec<Frame>,
    sender: Option<FrameSender>,
}

impl CameraSource for RecordingCamera {
    fn start(&mut self, frames: FrameSender) -> Result<(), CaptureError> {
        for frame in self.initial.drain(..) {
            frames.push(frame);
        }
        self.sender = Some(frames);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.sender = None;
        Ok(())
    }

    fn dispose(&mut self) -> Result<(), CaptureError> {
        self.sender = None;
        self.log.lock().unwrap().push("camera");
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.sender.is_some()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_releases_camera_before_engine() {
    let h = harness(false);
    let camera = RecordingCamera {
        log: h.log.clone(),
        initial: Vec::new(),
        sender: None,
    };

    let mut session = Session::new(camera, h.controller.clone());
    session.start().unwrap();
    assert!(session.is_running());

    tokio::time::timeout(WAIT, session.shutdown()).await.unwrap();

    assert_eq!(*h.log.lock().unwrap(), vec!["camera", "engine"]);
    assert_eq!(h.controller.state(), PipelineState::Disposed);
}

/// Starting a session clears earlier stats; only the newest captured frame
/// reaches the controller.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_session_start_resets_stats() {
    let mut h = harness(false);

    h.steps.send(Step::Succeed).unwrap();
    h.controller.submit_frame(frame(1));
    next_result(&mut h.events).await;
    wait_for_state(&h.controller, PipelineState::Idle).await;
    assert_eq!(h.controller.stats().frame_count, 1);

    let camera = RecordingCamera {
        log: h.log.clone(),
        initial: vec![frame(10), frame(11), frame(12)],
        sender: None,
    };
    let mut session = Session::new(camera, h.controller.clone());

    h.steps.send(Step::Succeed).unwrap();
    session.start().unwrap();
    assert!(session.start().is_err());

    let result = next_result(&mut h.events).await;
    assert_eq!(result.frame_sequence, 12);
    assert_eq!(result.stats.frame_count, 1);

    session.shutdown().await;
}
