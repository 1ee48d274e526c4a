// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// File-backed frame source. Plays a fixed set of images in a loop at the
// configured frame rate, standing in for a camera when capturing from files
// or in tests.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use docscan_core::error::{DocscanError, Result};
use image::RgbImage;
use image::imageops::{self, FilterType};
use tracing::{debug, info, instrument};

use crate::traits::{CameraProperties, DeviceInfo, FrameSource};

enum Frames {
    Files(Vec<PathBuf>),
    Loaded(Vec<RgbImage>),
}

/// Cycles through still images as if they were camera frames.
pub struct StillImageSource {
    frames: Frames,
    loaded: Vec<RgbImage>,
    cursor: usize,
    /// Output size override set through `set_properties`.
    size: Option<(u32, u32)>,
    fps: u32,
    last_frame: Option<Instant>,
    open: bool,
}

impl StillImageSource {
    /// Frames decoded from these files when the source is opened.
    pub fn from_files(paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self::with_frames(Frames::Files(paths.into_iter().map(Into::into).collect()))
    }

    /// Frames already in memory.
    pub fn from_images(images: Vec<RgbImage>) -> Self {
        Self::with_frames(Frames::Loaded(images))
    }

    fn with_frames(frames: Frames) -> Self {
        Self {
            frames,
            loaded: Vec::new(),
            cursor: 0,
            size: None,
            fps: CameraProperties::default().fps,
            last_frame: None,
            open: false,
        }
    }

    fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.fps.max(1)
    }
}

impl FrameSource for StillImageSource {
    #[instrument(skip(self))]
    fn open(&mut self) -> Result<()> {
        let frames = std::mem::replace(&mut self.frames, Frames::Loaded(Vec::new()));
        self.loaded = match frames {
            Frames::Loaded(images) => images,
            Frames::Files(paths) => paths
                .iter()
                .map(|path| {
                    image::open(path).map(|img| img.to_rgb8()).map_err(|err| {
                        DocscanError::CameraUnavailable(format!(
                            "cannot read frame {}: {}",
                            path.display(),
                            err
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
        };

        if self.loaded.is_empty() {
            return Err(DocscanError::CameraUnavailable(
                "still-image source has no frames".into(),
            ));
        }

        self.open = true;
        info!(frames = self.loaded.len(), "Still-image source opened");
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        if !self.open {
            return Err(DocscanError::CaptureFailed("source is not open".into()));
        }
        if let Some(last) = self.last_frame
            && last.elapsed() < self.frame_interval()
        {
            return Ok(None);
        }

        let frame = &self.loaded[self.cursor % self.loaded.len()];
        self.cursor = self.cursor.wrapping_add(1);
        self.last_frame = Some(Instant::now());

        let frame = match self.size {
            Some((width, height)) if frame.dimensions() != (width, height) => {
                imageops::resize(frame, width, height, FilterType::Triangle)
            }
            _ => frame.clone(),
        };
        Ok(Some(frame))
    }

    fn info(&self) -> DeviceInfo {
        let (width, height) = self
            .size
            .or_else(|| self.loaded.first().map(RgbImage::dimensions))
            .unwrap_or((0, 0));
        DeviceInfo {
            index: 0,
            name: "Still images".into(),
            width,
            height,
            fps: self.fps,
        }
    }

    fn set_properties(&mut self, properties: &CameraProperties) -> Result<()> {
        if properties.width == 0 || properties.height == 0 {
            return Err(DocscanError::Config(format!(
                "invalid capture size {}x{}",
                properties.width, properties.height
            )));
        }
        self.size = Some((properties.width, properties.height));
        self.fps = properties.fps.max(1);
        debug!(?properties, "Still-image source properties updated");
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
        self.loaded.clear();
        debug!("Still-image source closed");
    }
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    fn solid(width: u32, height: u32, value: u8) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([value, value, value]))
    }

    fn unthrottled(images: Vec<RgbImage>) -> StillImageSource {
        let mut source = StillImageSource::from_images(images);
        source.fps = 1_000_000;
        source
    }

    #[test]
    fn frames_cycle_in_order() {
        let mut source = unthrottled(vec![solid(4, 4, 10), solid(4, 4, 20)]);
        source.open().unwrap();

        let mut values = Vec::new();
        while values.len() < 3 {
            if let Some(frame) = source.read_frame().unwrap() {
                values.push(frame.get_pixel(0, 0)[0]);
            }
        }
        assert_eq!(values, vec![10, 20, 10]);
    }

    #[test]
    fn empty_source_is_unavailable() {
        let mut source = StillImageSource::from_images(Vec::new());
        assert!(matches!(
            source.open(),
            Err(DocscanError::CameraUnavailable(_))
        ));
    }

    #[test]
    fn missing_file_is_unavailable() {
        let mut source = StillImageSource::from_files(["/nonexistent/frame.png"]);
        assert!(matches!(
            source.open(),
            Err(DocscanError::CameraUnavailable(_))
        ));
    }

    #[test]
    fn reading_before_open_fails() {
        let mut source = StillImageSource::from_images(vec![solid(2, 2, 0)]);
        assert!(source.read_frame().is_err());
    }

    #[test]
    fn properties_resize_frames() {
        let mut source = unthrottled(vec![solid(8, 6, 50)]);
        source.open().unwrap();
        source
            .set_properties(&CameraProperties {
                width: 4,
                height: 3,
                fps: 1_000_000,
            })
            .unwrap();

        let frame = loop {
            if let Some(frame) = source.read_frame().unwrap() {
                break frame;
            }
        };
        assert_eq!(frame.dimensions(), (4, 3));
        assert_eq!(source.info().width, 4);
    }

    #[test]
    fn frame_rate_throttles_reads() {
        let mut source = StillImageSource::from_images(vec![solid(2, 2, 0)]);
        source.open().unwrap();
        assert!(source.read_frame().unwrap().is_some());
        // 30 fps leaves ~33 ms between frames.
        assert!(source.read_frame().unwrap().is_none());
    }

    #[test]
    fn files_are_loaded_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");
        solid(5, 7, 99).save(&path).unwrap();

        let mut source = StillImageSource::from_files([&path]);
        source.open().unwrap();
        assert_eq!(source.info().width, 5);
        assert_eq!(source.read_frame().unwrap().unwrap().get_pixel(0, 0)[0], 99);
    }
}
