use crate::{
    error::PipelineError,
    service::{FramePipelineController, SubmitOutcome},
};
use capture::{CameraSource, CaptureError, FrameReceiver, frame_channel};
use inference::InferenceEngine;
use tokio::task::JoinHandle;

/// Binds a camera to a controller: frames flow from the capture slot into
/// `submit_frame` until the session shuts down.
pub struct Session<C: CameraSource, E: InferenceEngine> {
    camera: C,
    controller: FramePipelineController<E>,
    pump: Option<JoinHandle<()>>,
}

impl<C: CameraSource, E: InferenceEngine> Session<C, E> {
    pub fn new(camera: C, controller: FramePipelineController<E>) -> Self {
        Self {
            camera,
            controller,
            pump: None,
        }
    }

    pub fn controller(&self) -> &FramePipelineController<E> {
        &self.controller
    }

    pub fn is_running(&self) -> bool {
        self.pump.is_some()
    }

    /// Reset performance stats, start the camera and begin forwarding frames.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        if self.pump.is_some() {
            return Err(CaptureError::AlreadyRunning.into());
        }

        self.controller.reset_stats();

        let (sender, receiver) = frame_channel();
        self.camera.start(sender)?;
        self.pump = Some(tokio::spawn(pump(receiver, self.controller.clone())));

        tracing::info!("Session started");
        Ok(())
    }

    /// Stop the camera and the frame pump. The controller stays usable and
    /// the session can be started again.
    pub async fn stop(&mut self) {
        if let Err(e) = self.camera.stop() {
            tracing::warn!(error = %e, "Failed to stop camera");
        }
        self.stop_pump().await;
    }

    async fn stop_pump(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
            let _ = pump.await;
        }
    }

    /// Release the camera, then the controller and its engine.
    pub async fn shutdown(mut self) {
        tracing::info!("Session shutting down");

        if let Err(e) = self.camera.stop() {
            tracing::debug!(error = %e, "Camera stop failed during shutdown");
        }
        if let Err(e) = self.camera.dispose() {
            tracing::debug!(error = %e, "Camera dispose failed during shutdown");
        }
        self.stop_pump().await;

        self.controller.dispose().await;
    }
}

async fn pump<E: InferenceEngine>(mut frames: FrameReceiver, controller: FramePipelineController<E>) {
    let mut displaced_seen = 0;

    while let Some(frame) = frames.recv().await {
        let displaced = frames.displaced_count();
        if displaced > displaced_seen {
            controller.record_displaced(displaced - displaced_seen);
            displaced_seen = displaced;
        }

        if controller.submit_frame(frame) == SubmitOutcome::Disposed {
            break;
        }
    }

    tracing::debug!("Frame pump finished");
}
