// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Background capture loop.
//
// One thread per active camera reads frames, publishes the raw frame and an
// enhanced preview through `tokio::sync::watch` channels (latest value only),
// and stops when the shared running flag is cleared.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::Local;
use docscan_core::PaperSize;
use docscan_core::error::{DocscanError, Result};
use docscan_document::ImageProcessor;
use docscan_document::scan::enhance::{ScanEnhancer, laplacian_variance};
use image::imageops;
use image::{DynamicImage, RgbImage};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::traits::{CameraProperties, DeviceInfo, FrameSource};

/// Back-off when the source has no frame ready.
const EMPTY_READ_BACKOFF: Duration = Duration::from_millis(10);
/// Frames sampled by [`CameraHandler::capture_high_quality`].
pub const DEFAULT_CAPTURE_FRAMES: usize = 5;
/// Pause between sampled frames.
pub const DEFAULT_CAPTURE_INTERVAL: Duration = Duration::from_millis(100);

type SharedFrame = Option<Arc<RgbImage>>;

/// State of one running capture thread.
struct Worker {
    thread: JoinHandle<()>,
    preview: watch::Receiver<SharedFrame>,
    raw: watch::Receiver<SharedFrame>,
    properties: mpsc::Sender<CameraProperties>,
}

/// Owns the capture thread and hands out its latest frames.
pub struct CameraHandler {
    running: Arc<AtomicBool>,
    worker: Option<Worker>,
    info: Arc<Mutex<Option<DeviceInfo>>>,
    jpeg_quality: u8,
}

impl Default for CameraHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraHandler {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
            info: Arc::new(Mutex::new(None)),
            jpeg_quality: 95,
        }
    }

    /// JPEG quality used by [`CameraHandler::save_frame`].
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Open a source on a new capture thread and start streaming.
    ///
    /// Blocks until the source has been opened, so a missing camera is
    /// reported here as [`DocscanError::CameraUnavailable`]. A running capture
    /// is stopped first.
    #[instrument(skip_all)]
    pub fn start<F>(&mut self, opener: F) -> Result<()>
    where
        F: FnOnce() -> Result<Box<dyn FrameSource>> + Send + 'static,
    {
        if self.worker.is_some() {
            self.stop();
        }

        let (preview_tx, preview_rx) = watch::channel(None);
        let (raw_tx, raw_rx) = watch::channel(None);
        let (props_tx, props_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        let running = Arc::clone(&self.running);
        let info = Arc::clone(&self.info);
        running.store(true, Ordering::Release);

        let spawned = std::thread::Builder::new()
            .name("docscan-capture".into())
            .spawn(move || {
                let mut source = match opener().and_then(|mut source| {
                    source.open()?;
                    Ok(source)
                }) {
                    Ok(source) => source,
                    Err(err) => {
                        running.store(false, Ordering::Release);
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                set_info(&info, Some(source.info()));
                let _ = ready_tx.send(Ok(()));

                capture_loop(source.as_mut(), &running, &preview_tx, &raw_tx, &props_rx, &info);

                source.close();
                running.store(false, Ordering::Release);
                debug!("Capture thread finished");
            });

        let thread = match spawned {
            Ok(thread) => thread,
            Err(err) => {
                self.running.store(false, Ordering::Release);
                return Err(DocscanError::CameraUnavailable(format!(
                    "cannot spawn capture thread: {err}"
                )));
            }
        };

        let opened = ready_rx.recv().unwrap_or_else(|_| {
            Err(DocscanError::CameraUnavailable(
                "capture thread exited before opening the camera".into(),
            ))
        });
        if let Err(err) = opened {
            let _ = thread.join();
            warn!(%err, "Camera could not be started");
            return Err(err);
        }

        self.worker = Some(Worker {
            thread,
            preview: preview_rx,
            raw: raw_rx,
            properties: props_tx,
        });
        info!(device = ?self.info(), "Capture started");
        Ok(())
    }

    /// Stop the capture thread and forget its frames.
    #[instrument(skip(self))]
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            if worker.thread.join().is_err() {
                warn!("Capture thread panicked");
            }
            info!("Capture stopped");
        }
        set_info(&self.info, None);
    }

    /// Stop the current source and start another.
    pub fn switch<F>(&mut self, opener: F) -> Result<()>
    where
        F: FnOnce() -> Result<Box<dyn FrameSource>> + Send + 'static,
    {
        self.stop();
        self.start(opener)
    }

    /// Whether the capture thread is still delivering frames.
    pub fn is_active(&self) -> bool {
        self.worker.is_some() && self.running.load(Ordering::Acquire)
    }

    pub fn info(&self) -> Option<DeviceInfo> {
        self.info
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Ask the capture thread to change resolution or frame rate.
    pub fn set_properties(&self, properties: CameraProperties) -> Result<()> {
        let worker = self.active_worker()?;
        worker.properties.send(properties).map_err(|_| {
            DocscanError::CameraUnavailable("capture thread is no longer running".into())
        })
    }

    /// Latest enhanced preview frame.
    pub fn frame(&self) -> Option<RgbImage> {
        let worker = self.worker.as_ref()?;
        let latest = worker.preview.borrow().clone();
        latest.map(|frame| (*frame).clone())
    }

    /// Sample up to `count` fresh frames `interval` apart, keep the sharpest
    /// (highest Laplacian variance), and enhance it for scanning.
    ///
    /// Falls back to the latest preview frame when no new frame arrives.
    #[instrument(skip(self))]
    pub fn capture_high_quality(&self, count: usize, interval: Duration) -> Result<RgbImage> {
        let worker = self.active_worker()?;
        let mut raw = worker.raw.clone();
        raw.mark_unchanged();

        let mut best: Option<(f64, Arc<RgbImage>)> = None;
        for _ in 0..count {
            std::thread::sleep(interval);
            if !raw.has_changed().unwrap_or(false) {
                continue;
            }
            let Some(frame) = raw.borrow_and_update().clone() else {
                continue;
            };
            let score = laplacian_variance(&imageops::grayscale(frame.as_ref()));
            debug!(score, "Sampled frame");
            if best.as_ref().is_none_or(|(top, _)| score > *top) {
                best = Some((score, frame));
            }
        }

        match best {
            Some((score, frame)) => {
                info!(score, "Sharpest frame selected");
                let enhanced =
                    ScanEnhancer::from_dynamic(DynamicImage::ImageRgb8((*frame).clone()), PaperSize::A4)
                        .enhance_capture()
                        .into_dynamic();
                Ok(enhanced.to_rgb8())
            }
            None => {
                warn!("No fresh frames; using latest preview");
                self.frame().ok_or_else(|| {
                    DocscanError::CaptureFailed("no frame available".into())
                })
            }
        }
    }

    /// Save the latest preview frame, by default as
    /// `capture_YYYYmmdd_HHMMSS.jpg` in the working directory.
    #[instrument(skip(self))]
    pub fn save_frame(&self, path: Option<&Path>) -> Result<PathBuf> {
        let frame = self.frame().ok_or(DocscanError::NoImage)?;
        let path = path.map(Path::to_path_buf).unwrap_or_else(default_capture_name);
        ImageProcessor::from_dynamic(DynamicImage::ImageRgb8(frame))
            .save(&path, self.jpeg_quality)?;
        info!(path = %path.display(), "Frame saved");
        Ok(path)
    }

    fn active_worker(&self) -> Result<&Worker> {
        match &self.worker {
            Some(worker) if self.running.load(Ordering::Acquire) => Ok(worker),
            _ => Err(DocscanError::CameraUnavailable("camera is not running".into())),
        }
    }
}

impl Drop for CameraHandler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_loop(
    source: &mut dyn FrameSource,
    running: &AtomicBool,
    preview_tx: &watch::Sender<SharedFrame>,
    raw_tx: &watch::Sender<SharedFrame>,
    properties: &mpsc::Receiver<CameraProperties>,
    info: &Mutex<Option<DeviceInfo>>,
) {
    while running.load(Ordering::Acquire) {
        while let Ok(requested) = properties.try_recv() {
            match source.set_properties(&requested) {
                Ok(()) => set_info(info, Some(source.info())),
                Err(err) => warn!(%err, "Camera rejected properties"),
            }
        }

        match source.read_frame() {
            Ok(Some(frame)) => {
                let preview = preview_frame(&frame);
                raw_tx.send_replace(Some(Arc::new(frame)));
                preview_tx.send_replace(Some(Arc::new(preview)));
            }
            Ok(None) => std::thread::sleep(EMPTY_READ_BACKOFF),
            Err(err) => {
                warn!(%err, "Frame read failed; stopping capture");
                break;
            }
        }
    }
}

fn preview_frame(frame: &RgbImage) -> RgbImage {
    ScanEnhancer::from_dynamic(DynamicImage::ImageRgb8(frame.clone()), PaperSize::A4)
        .enhance_frame()
        .into_dynamic()
        .to_rgb8()
}

fn set_info(info: &Mutex<Option<DeviceInfo>>, value: Option<DeviceInfo>) {
    *info.lock().unwrap_or_else(PoisonError::into_inner) = value;
}

/// `capture_YYYYmmdd_HHMMSS.jpg` for the current local time.
pub fn default_capture_name() -> PathBuf {
    PathBuf::from(format!("capture_{}.jpg", Local::now().format("%Y%m%d_%H%M%S")))
}
