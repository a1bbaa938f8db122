//! Frame capture and GIF assembly.
//!
//! [`FrameRecorder`] buffers rasterized frames while recording: one at start,
//! one every `frame_interval` updates, and the final frame twice at stop.
//! Turning the buffer into a GIF is slow (every frame is quantized), so
//! [`start_finalize`] runs it on a blocking thread and streams progress back
//! over a channel.  The job can be cancelled through a shared flag.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::codecs::gif::{GifEncoder, Repeat};
use image::imageops::FilterType;
use image::{Delay, Frame, RgbaImage};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

pub const DEFAULT_FRAME_INTERVAL: u32 = 8;
pub const MAX_FRAME_INTERVAL: u32 = 96;
pub const DEFAULT_FRAME_DELAY_MS: u32 = 100;

/// Quantizer speed handed to the GIF encoder (1 = best, 30 = fastest).
const GIF_SPEED: i32 = 10;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("no frames were recorded")]
    NoFrames,

    #[error("GIF rendering was cancelled")]
    Cancelled,

    #[error("failed to encode GIF: {0}")]
    Image(#[from] image::ImageError),

    #[error("failed to write GIF: {0}")]
    Io(#[from] std::io::Error),

    #[error("finalize task failed: {0}")]
    Task(String),
}

/// Snap a requested interval to the slider's steps: nearest multiple of 8,
/// clamped to `1..=96`.
pub fn normalize_frame_interval(raw: u32) -> u32 {
    let stepped = ((f64::from(raw) / 8.0).round() as u32).saturating_mul(8);
    stepped.clamp(1, MAX_FRAME_INTERVAL)
}

// ───────────────────────────────────────── sampler ───────────

#[derive(Debug)]
pub struct FrameRecorder {
    recording: bool,
    interval: u32,
    updates: u64,
    frames: Vec<RgbaImage>,
}

impl Default for FrameRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_INTERVAL)
    }
}

impl FrameRecorder {
    pub fn new(interval: u32) -> Self {
        Self {
            recording: false,
            interval: normalize_frame_interval(interval),
            updates: 0,
            frames: Vec::new(),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    pub fn set_interval(&mut self, raw: u32) {
        self.interval = normalize_frame_interval(raw);
        tracing::debug!("frame interval set to {}", self.interval);
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Begin a fresh recording with `first` as its opening frame.
    pub fn start(&mut self, first: RgbaImage) {
        self.frames.clear();
        self.frames.push(first);
        self.updates = 0;
        self.recording = true;
        tracing::info!("recording started (every {} updates)", self.interval);
    }

    /// Count one update.  Returns `true` when this update should be captured.
    pub fn tick(&mut self) -> bool {
        if !self.recording {
            return false;
        }
        let sample = self.updates % u64::from(self.interval) == 0;
        self.updates += 1;
        sample
    }

    pub fn push(&mut self, frame: RgbaImage) {
        if self.recording {
            self.frames.push(frame);
        }
    }

    /// End the recording.  The final frame is appended twice so the last
    /// state lingers.  Returns the buffered frames.
    pub fn stop(&mut self, last: RgbaImage) -> Vec<RgbaImage> {
        if !self.recording {
            return Vec::new();
        }
        self.recording = false;
        self.frames.push(last.clone());
        self.frames.push(last);
        tracing::info!("recording stopped with {} frames", self.frames.len());
        std::mem::take(&mut self.frames)
    }
}

// ───────────────────────────────────────── encoding ──────────

/// Encode `frames` as a looping GIF.  Frames whose size differs from the
/// first one are resized to match.  `progress` receives the fraction done
/// after each frame; `cancel` is polled between frames.
pub fn encode_gif<W: Write>(
    frames: Vec<RgbaImage>,
    delay_ms: u32,
    out: W,
    cancel: &AtomicBool,
    mut progress: impl FnMut(f32),
) -> Result<(), RecordError> {
    let Some(first) = frames.first() else {
        return Err(RecordError::NoFrames);
    };
    let (width, height) = first.dimensions();
    let total = frames.len();

    let mut encoder = GifEncoder::new_with_speed(out, GIF_SPEED);
    encoder.set_repeat(Repeat::Infinite)?;
    let delay = Delay::from_numer_denom_ms(delay_ms.max(1), 1);

    for (i, frame) in frames.into_iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            return Err(RecordError::Cancelled);
        }
        let frame = if frame.dimensions() == (width, height) {
            frame
        } else {
            image::imageops::resize(&frame, width, height, FilterType::Triangle)
        };
        encoder.encode_frame(Frame::from_parts(frame, 0, 0, delay))?;
        progress((i + 1) as f32 / total as f32);
    }
    Ok(())
}

#[derive(Debug)]
pub enum FinalizeUpdate {
    Progress(f32),
    Done(Result<PathBuf, RecordError>),
}

/// Handle to a running finalize job.
#[derive(Debug, Clone)]
pub struct FinalizeJob {
    pub path: PathBuf,
    cancel: Arc<AtomicBool>,
}

impl FinalizeJob {
    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

/// Encode `frames` into the file at `path`.  A failed or cancelled encode
/// removes the partial file.
fn write_gif(
    frames: Vec<RgbaImage>,
    delay_ms: u32,
    path: &Path,
    cancel: &AtomicBool,
    progress: impl FnMut(f32),
) -> Result<(), RecordError> {
    let result = File::create(path).map_err(RecordError::from).and_then(|file| {
        let mut out = BufWriter::new(file);
        encode_gif(frames, delay_ms, &mut out, cancel, progress)?;
        out.flush()?;
        Ok(())
    });
    if result.is_err() && path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!("could not remove partial {}: {e}", path.display());
        }
    }
    result
}

/// Encode `frames` into `path` on a blocking thread.  Progress and the final
/// outcome arrive on `tx`.  Must be called from within a tokio runtime.
pub fn start_finalize(
    frames: Vec<RgbaImage>,
    delay_ms: u32,
    path: PathBuf,
    tx: UnboundedSender<FinalizeUpdate>,
) -> FinalizeJob {
    let cancel = Arc::new(AtomicBool::new(false));
    let job = FinalizeJob {
        path: path.clone(),
        cancel: Arc::clone(&cancel),
    };

    let handle = tokio::task::spawn_blocking({
        let tx = tx.clone();
        move || {
            write_gif(frames, delay_ms, &path, &cancel, |p| {
                let _ = tx.send(FinalizeUpdate::Progress(p));
            })
            .map(|()| path)
        }
    });

    tokio::spawn(async move {
        let outcome = match handle.await {
            Ok(result) => result,
            Err(e) => Err(RecordError::Task(e.to_string())),
        };
        match &outcome {
            Ok(path) => tracing::info!("GIF written to {}", path.display()),
            Err(e) => tracing::warn!("GIF not written: {e}"),
        }
        let _ = tx.send(FinalizeUpdate::Done(outcome));
    });

    job
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn solid(w: u32, h: u32, v: u8) -> RgbaImage {
        RgbaImage::from_pixel(w, h, image::Rgba([v, v, v, 255]))
    }

    #[test]
    fn interval_snaps_to_slider_steps() {
        assert_eq!(normalize_frame_interval(0), 1);
        assert_eq!(normalize_frame_interval(3), 1);
        assert_eq!(normalize_frame_interval(8), 8);
        assert_eq!(normalize_frame_interval(13), 16);
        assert_eq!(normalize_frame_interval(500), 96);
    }

    #[test]
    fn samples_every_interval_and_doubles_last_frame() {
        let mut rec = FrameRecorder::new(8);
        assert!(!rec.tick());
        rec.start(solid(2, 2, 0));
        let sampled = (0..17).filter(|_| rec.tick()).count();
        assert_eq!(sampled, 3);
        let frames = rec.stop(solid(2, 2, 9));
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1], frames[2]);
        assert!(!rec.is_recording());
        assert!(rec.stop(solid(2, 2, 9)).is_empty());
    }

    #[test]
    fn gif_has_magic_header() {
        let mut buf = Vec::new();
        let frames = vec![solid(4, 4, 0), solid(6, 3, 255)];
        let mut seen = Vec::new();
        encode_gif(frames, 50, &mut buf, &AtomicBool::new(false), |p| seen.push(p)).unwrap();
        assert_eq!(&buf[..6], b"GIF89a");
        assert_eq!(seen, [0.5, 1.0]);
    }

    #[test]
    fn empty_and_cancelled_encodes_fail() {
        let mut buf = Vec::new();
        assert!(matches!(
            encode_gif(Vec::new(), 50, &mut buf, &AtomicBool::new(false), |_| {}),
            Err(RecordError::NoFrames)
        ));
        assert!(matches!(
            encode_gif(vec![solid(2, 2, 0)], 50, &mut buf, &AtomicBool::new(true), |_| {}),
            Err(RecordError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn finalize_writes_file_and_reports_done() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.gif");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let job = start_finalize(vec![solid(3, 3, 10), solid(3, 3, 20)], 100, path.clone(), tx);
        assert_eq!(job.path, path);

        let mut progress = 0;
        let outcome = loop {
            match rx.recv().await.unwrap() {
                FinalizeUpdate::Progress(_) => progress += 1,
                FinalizeUpdate::Done(outcome) => break outcome,
            }
        };
        assert_eq!(outcome.unwrap(), path);
        assert_eq!(progress, 2);
        assert_eq!(&std::fs::read(&path).unwrap()[..6], b"GIF89a");
    }

    #[test]
    fn cancelled_write_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.gif");
        let frames = vec![solid(4, 4, 0), solid(4, 4, 9)];
        let err = write_gif(frames, 100, &path, &AtomicBool::new(true), |_| {}).unwrap_err();
        assert!(matches!(err, RecordError::Cancelled));
        assert!(!path.exists());

        let err = write_gif(Vec::new(), 100, &path, &AtomicBool::new(false), |_| {}).unwrap_err();
        assert!(matches!(err, RecordError::NoFrames));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn cancelled_finalize_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.gif");
        let frames = (0..60).map(|i| solid(200, 200, i as u8)).collect();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let job = start_finalize(frames, 100, path.clone(), tx);
        job.request_cancel();

        let outcome = loop {
            if let FinalizeUpdate::Done(outcome) = rx.recv().await.unwrap() {
                break outcome;
            }
        };
        match outcome {
            Err(RecordError::Cancelled) => assert!(!path.exists()),
            Ok(written) => assert!(written.exists()),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
}
