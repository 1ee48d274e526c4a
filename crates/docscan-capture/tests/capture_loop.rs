// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Drives `CameraHandler` with in-memory frame sources to check the capture
// thread lifecycle, previews, still capture, and error handling.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use docscan_capture::{CameraHandler, CameraProperties, DeviceInfo, FrameSource, StillImageSource};
use docscan_core::error::{DocscanError, Result};
use image::{Rgb, RgbImage};

fn page_frame() -> RgbImage {
    let mut frame = RgbImage::from_pixel(160, 120, Rgb([40, 40, 40]));
    for y in 20..100 {
        for x in 30..130 {
            frame.put_pixel(x, y, Rgb([230, 230, 230]));
        }
    }
    frame
}

fn still_opener() -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(StillImageSource::from_images(vec![page_frame()])))
}

fn wait_for<T>(mut probe: impl FnMut() -> Option<T>) -> T {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(value) = probe() {
            return value;
        }
        assert!(Instant::now() < deadline, "timed out waiting for capture thread");
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// Delivers a few frames, then fails like an unplugged camera.
struct FlakySource {
    remaining: usize,
    closed: Arc<AtomicUsize>,
}

impl FrameSource for FlakySource {
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.remaining == 0 {
            return Err(DocscanError::CaptureFailed("device unplugged".into()));
        }
        self.remaining -= 1;
        std::thread::sleep(Duration::from_millis(5));
        Ok(Some(page_frame()))
    }

    fn info(&self) -> DeviceInfo {
        DeviceInfo {
            index: 3,
            name: "Flaky".into(),
            width: 160,
            height: 120,
            fps: 30,
        }
    }

    fn set_properties(&mut self, _properties: &CameraProperties) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn preview_frames_flow_until_stopped() {
    let mut handler = CameraHandler::new();
    handler.start(still_opener).expect("start");
    assert!(handler.is_active());
    assert_eq!(handler.info().map(|info| info.name), Some("Still images".into()));

    let frame = wait_for(|| handler.frame());
    assert_eq!(frame.dimensions(), (160, 120));

    handler.stop();
    assert!(!handler.is_active());
    assert!(handler.frame().is_none());
    assert!(handler.info().is_none());
}

#[test]
fn high_quality_capture_returns_enhanced_frame() {
    let mut handler = CameraHandler::new();
    handler.start(still_opener).expect("start");
    wait_for(|| handler.frame());

    let still = handler
        .capture_high_quality(3, Duration::from_millis(50))
        .expect("capture");
    assert_eq!(still.dimensions(), (160, 120));
    // Enhancement binarizes: every pixel ends up black or white.
    assert!(still.pixels().all(|p| p[0] == 0 || p[0] == 255));
}

#[test]
fn properties_reach_the_source() {
    let mut handler = CameraHandler::new();
    handler.start(still_opener).expect("start");

    handler
        .set_properties(CameraProperties {
            width: 80,
            height: 60,
            fps: 30,
        })
        .expect("send properties");

    let info = wait_for(|| handler.info().filter(|info| info.width == 80));
    assert_eq!(info.height, 60);
    wait_for(|| handler.frame().filter(|frame| frame.dimensions() == (80, 60)));
}

#[test]
fn read_errors_end_capture_and_close_source() {
    let closed = Arc::new(AtomicUsize::new(0));
    let source_closed = Arc::clone(&closed);

    let mut handler = CameraHandler::new();
    handler
        .start(move || {
            Ok(Box::new(FlakySource {
                remaining: 3,
                closed: source_closed,
            }) as Box<dyn FrameSource>)
        })
        .expect("start");

    wait_for(|| (!handler.is_active()).then_some(()));
    assert_eq!(closed.load(Ordering::SeqCst), 1);
    // The last frame survives until stop().
    assert!(handler.frame().is_some());
    assert!(handler.set_properties(CameraProperties::default()).is_err());
}

#[test]
fn switching_replaces_the_source() {
    let mut handler = CameraHandler::new();
    handler.start(still_opener).expect("start");
    handler
        .switch(|| {
            Ok(Box::new(FlakySource {
                remaining: usize::MAX,
                closed: Arc::new(AtomicUsize::new(0)),
            }) as Box<dyn FrameSource>)
        })
        .expect("switch");
    assert_eq!(handler.info().map(|info| info.index), Some(3));
}

#[test]
fn missing_still_files_fail_to_start() {
    let mut handler = CameraHandler::new();
    let result = handler.start(|| {
        Ok(Box::new(StillImageSource::from_files(["/nonexistent/a.png"])) as Box<dyn FrameSource>)
    });
    assert!(matches!(result, Err(DocscanError::CameraUnavailable(_))));
    assert!(!handler.is_active());
}

#[test]
fn saved_frames_land_on_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let target = dir.path().join("frame.jpg");

    let mut handler = CameraHandler::new();
    handler.start(still_opener).expect("start");
    wait_for(|| handler.frame());

    let saved = handler.save_frame(Some(&target)).expect("save");
    assert_eq!(saved, target);
    assert_eq!(image::open(&target).expect("decode").width(), 160);
}
