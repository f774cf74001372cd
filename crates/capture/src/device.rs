use crate::{CameraSource, CaptureError, CapturePacing, FrameSender};
use schema::Frame;
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::JoinHandle,
    time::Instant,
};
use v4l::{
    Device, FourCC,
    buffer::Type,
    io::{mmap::Stream, traits::CaptureStream},
    video::Capture,
};

const BUFFER_COUNT: u32 = 4;

const FOURCC_MJPG: FourCC = FourCC { repr: *b"MJPG" };

fn find_usable_camera() -> Option<usize> {
    v4l::context::enum_devices()
        .into_iter()
        .find(|dev| {
            Device::with_path(dev.path())
                .and_then(|d| d.query_caps())
                .map(|caps| {
                    caps.capabilities
                        .contains(v4l::capability::Flags::VIDEO_CAPTURE)
                })
                .unwrap_or(false)
        })
        .map(|dev| dev.index())
}

fn open_device(index: u32) -> Result<Device, CaptureError> {
    match Device::new(index as usize) {
        Ok(dev) if dev.query_caps().is_ok() => return Ok(dev),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(CaptureError::PermissionDenied(format!("/dev/video{index}: {e}")));
        }
        _ => {}
    }

    tracing::debug!(
        "Camera index {} busy or missing, scanning alternatives...",
        index
    );

    let fallback = find_usable_camera()
        .ok_or_else(|| CaptureError::DeviceUnavailable("No usable video devices found".into()))?;
    Device::new(fallback).map_err(|e| CaptureError::from_open("fallback camera device", e))
}

/// Open the device and switch it to MJPEG so frames arrive already encoded.
fn configure_mjpeg(index: u32) -> Result<Device, CaptureError> {
    let device = open_device(index)?;

    let caps = device.query_caps()?;
    tracing::info!("Camera opened: {} ({})", caps.card, caps.driver);

    let formats = device.enum_formats()?;
    if !formats.iter().any(|f| f.fourcc == FOURCC_MJPG) {
        return Err(CaptureError::DeviceUnavailable(format!(
            "Camera does not support MJPEG - available: {:?}",
            formats.iter().map(|f| f.fourcc).collect::<Vec<_>>()
        )));
    }

    let mut format = device.format()?;
    format.fourcc = FOURCC_MJPG;
    let format = device.set_format(&format)?;

    tracing::info!(
        "Capture format: {}x{} {:?}",
        format.width,
        format.height,
        format.fourcc
    );
    Ok(device)
}

fn capture_loop(device: Device, frames: FrameSender, pacing: CapturePacing, running: Arc<AtomicBool>) {
    let mut stream = match Stream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create capture stream");
            running.store(false, Ordering::Release);
            return;
        }
    };

    let mut frame_count = 0u64;
    let mut capture_errors = 0u64;

    while running.load(Ordering::Acquire) && !frames.is_closed() {
        let start_time = Instant::now();

        match stream.next() {
            Ok((buf, meta)) => {
                let used = (meta.bytesused as usize).min(buf.len());
                frames.push(Frame::new(frame_count, buf[..used].to_vec()));
                frame_count += 1;

                if frame_count.is_multiple_of(30) {
                    tracing::debug!(
                        "Status: [Frames: {}] [Displaced: {}] [Errors: {}] [V4L seq: {}]",
                        frame_count,
                        frames.displaced_count(),
                        capture_errors,
                        meta.sequence
                    );
                }
            }
            Err(e) => {
                capture_errors += 1;
                tracing::warn!("Frame #{} capture error: {}", frame_count, e);
            }
        }

        if let Some(left) = pacing.remaining(start_time) {
            std::thread::park_timeout(left);
        }
    }

    tracing::info!(
        "Shutdown: {} frames captured, {} errors.",
        frame_count,
        capture_errors
    );
}

/// V4L2 camera delivering MJPEG frames.
pub struct V4lSource {
    index: u32,
    pacing: CapturePacing,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    disposed: bool,
}

impl V4lSource {
    pub fn new(index: u32, pacing: CapturePacing) -> Self {
        Self {
            index,
            pacing,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
            disposed: false,
        }
    }
}

impl CameraSource for V4lSource {
    fn start(&mut self, frames: FrameSender) -> Result<(), CaptureError> {
        if self.disposed {
            return Err(CaptureError::Disposed);
        }
        if self.is_running() {
            return Err(CaptureError::AlreadyRunning);
        }

        let device = configure_mjpeg(self.index)?;

        self.running.store(true, Ordering::Release);
        let running = self.running.clone();
        let pacing = self.pacing;

        let worker = std::thread::Builder::new()
            .name("v4l-capture".into())
            .spawn(move || capture_loop(device, frames, pacing, running))
            .inspect_err(|_| self.running.store(false, Ordering::Release))?;

        self.worker = Some(worker);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.running.store(false, Ordering::Release);

        if let Some(worker) = self.worker.take() {
            worker.thread().unpark();
            if worker.join().is_err() {
                tracing::error!("V4L capture thread panicked");
            }
        }
        Ok(())
    }

    fn dispose(&mut self) -> Result<(), CaptureError> {
        if self.disposed {
            return Ok(());
        }
        self.stop()?;
        self.disposed = true;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
            && self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }
}

impl Drop for V4lSource {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
