use crate::{CaptureError, CameraSource, CapturePacing, FrameSender};
use schema::Frame;
use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::JoinHandle,
    time::Instant,
};

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Replays the encoded images of a directory in name order, looping forever,
/// at most one frame per pacing interval.
pub struct ReplaySource {
    dir: PathBuf,
    pacing: CapturePacing,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    disposed: bool,
}

impl ReplaySource {
    pub fn new(dir: impl Into<PathBuf>, pacing: CapturePacing) -> Self {
        Self {
            dir: dir.into(),
            pacing,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
            disposed: false,
        }
    }

    fn list_images(dir: &Path) -> Result<Vec<PathBuf>, CaptureError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| CaptureError::from_open(&dir.display().to_string(), e))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if is_image && path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            return Err(CaptureError::DeviceUnavailable(format!(
                "no JPEG or PNG files in {}",
                dir.display()
            )));
        }
        Ok(files)
    }
}

const STATUS_INTERVAL: u64 = 30;

/// Replay counters. A status line is due only on a successful push.
#[derive(Debug, Default)]
struct ReplayStats {
    pushed: u64,
    read_failures: u64,
}

impl ReplayStats {
    /// Count a pushed frame; returns true when a status line is due.
    fn record_push(&mut self) -> bool {
        self.pushed += 1;
        self.pushed.is_multiple_of(STATUS_INTERVAL)
    }

    fn record_failure(&mut self) {
        self.read_failures += 1;
    }
}

fn replay_loop(files: Vec<PathBuf>, frames: FrameSender, pacing: CapturePacing, running: Arc<AtomicBool>) {
    let mut stats = ReplayStats::default();

    'outer: loop {
        for path in &files {
            if !running.load(Ordering::Acquire) || frames.is_closed() {
                break 'outer;
            }
            let started = Instant::now();

            match std::fs::read(path) {
                Ok(data) => {
                    frames.push(Frame::new(stats.pushed, data));
                    if stats.record_push() {
                        tracing::debug!(
                            "Status: [Frames: {}] [Displaced: {}] [Read failures: {}]",
                            stats.pushed,
                            frames.displaced_count(),
                            stats.read_failures
                        );
                    }
                }
                Err(e) => {
                    stats.record_failure();
                    tracing::warn!(path = %path.display(), error = %e, "Failed to read replay frame");
                }
            }

            if let Some(left) = pacing.remaining(started) {
                // stop() unparks us early
                std::thread::park_timeout(left);
            }
        }
    }

    tracing::info!(
        "Replay stopped: {} frames pushed, {} displaced.",
        stats.pushed,
        frames.displaced_count()
    );
}

impl CameraSource for ReplaySource {
    fn start(&mut self, frames: FrameSender) -> Result<(), CaptureError> {
        if self.disposed {
            return Err(CaptureError::Disposed);
        }
        if self.is_running() {
            return Err(CaptureError::AlreadyRunning);
        }

        let files = Self::list_images(&self.dir)?;
        tracing::info!(
            dir = %self.dir.display(),
            files = files.len(),
            interval = ?self.pacing.frame_duration(),
            "Starting replay source"
        );

        self.running.store(true, Ordering::Release);
        let running = self.running.clone();
        let pacing = self.pacing;

        let worker = std::thread::Builder::new()
            .name("replay-capture".into())
            .spawn(move || replay_loop(files, frames, pacing, running))
            .inspect_err(|_| self.running.store(false, Ordering::Release))?;

        self.worker = Some(worker);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.running.store(false, Ordering::Release);

        if let Some(worker) = self.worker.take() {
            worker.thread().unpark();
            if worker.join().is_err() {
                tracing::error!("Replay capture thread panicked");
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

impl Drop for ReplaySource {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_channel;
    use std::time::Duration;

    fn write_png(dir: &Path, name: &str, shade: u8) {
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([shade, shade, shade]));
        img.save(dir.join(name)).unwrap();
    }

    #[test]
    fn status_is_due_only_on_pushes() {
        let mut stats = ReplayStats::default();
        for _ in 0..29 {
            assert!(!stats.record_push());
        }
        assert!(stats.record_push(), "30th frame reports status");

        // Failed reads leave the frame count on a multiple of 30
        for _ in 0..5 {
            stats.record_failure();
        }
        assert_eq!(stats.read_failures, 5);
        assert!(!stats.record_push(), "Next push after failures is frame 31");
    }

    #[tokio::test]
    async fn replays_images_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "b.png", 20);
        write_png(dir.path(), "a.png", 10);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut source = ReplaySource::new(dir.path(), CapturePacing::new(Duration::from_millis(50)));
        let (tx, mut rx) = frame_channel();
        source.start(tx).unwrap();
        assert!(source.is_running());

        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.sequence, 0);
        let decoded = image::load_from_memory(&first.data).unwrap().to_rgb8();
        assert_eq!(decoded.get_pixel(0, 0).0, [10, 10, 10], "a.png comes first");

        source.stop().unwrap();
        assert!(!source.is_running());
    }

    #[test]
    fn empty_directory_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ReplaySource::new(dir.path(), CapturePacing::new(Duration::from_millis(10)));
        let (tx, _rx) = frame_channel();

        assert!(matches!(
            source.start(tx),
            Err(CaptureError::DeviceUnavailable(_))
        ));
    }

    #[test]
    fn missing_directory_is_unavailable() {
        let mut source = ReplaySource::new("/nonexistent/frames", CapturePacing::new(Duration::from_millis(10)));
        let (tx, _rx) = frame_channel();

        assert!(matches!(
            source.start(tx),
            Err(CaptureError::DeviceUnavailable(_))
        ));
    }

    #[test]
    fn double_start_and_disposal() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "frame.png", 0);

        let mut source = ReplaySource::new(dir.path(), CapturePacing::new(Duration::from_secs(5)));
        let (tx, _rx) = frame_channel();
        source.start(tx).unwrap();

        let (tx2, _rx2) = frame_channel();
        assert!(matches!(source.start(tx2), Err(CaptureError::AlreadyRunning)));

        // Long pacing interval: stop must not wait it out
        let started = Instant::now();
        source.dispose().unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        source.dispose().unwrap();

        let (tx3, _rx3) = frame_channel();
        assert!(matches!(source.start(tx3), Err(CaptureError::Disposed)));
    }
}
