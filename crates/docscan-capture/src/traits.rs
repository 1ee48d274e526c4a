// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Frame source abstraction shared by the webcam backend and the file-based
// still-image source.

use docscan_core::config::CameraConfig;
use docscan_core::error::{DocscanError, Result};
use image::RgbImage;
use serde::Serialize;

/// Anything that can produce camera frames.
///
/// Sources are created and driven on the capture thread, so they do not need
/// to be `Send`; only the closure that builds them does.
pub trait FrameSource {
    /// Start streaming. Called once, before the first `read_frame`.
    fn open(&mut self) -> Result<()>;

    /// Next frame, or `Ok(None)` when none is ready yet.
    fn read_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Description of the device as currently configured.
    fn info(&self) -> DeviceInfo;

    /// Request a new resolution and frame rate. Sources apply what they can.
    fn set_properties(&mut self, properties: &CameraProperties) -> Result<()>;

    /// Stop streaming and release the device.
    fn close(&mut self);
}

/// A camera as reported to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub index: u32,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// Requested capture format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraProperties {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CameraProperties {
    fn default() -> Self {
        Self::from(&CameraConfig::default())
    }
}

impl From<&CameraConfig> for CameraProperties {
    fn from(config: &CameraConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            fps: config.fps,
        }
    }
}

/// Wrap a packed RGB buffer from a camera driver. A buffer whose length does
/// not match `width * height * 3` is a failed capture.
#[cfg_attr(not(feature = "webcam"), allow(dead_code))]
pub(crate) fn rgb_frame(width: u32, height: u32, bytes: Vec<u8>) -> Result<RgbImage> {
    let len = bytes.len();
    RgbImage::from_raw(width, height, bytes).ok_or_else(|| {
        DocscanError::CaptureFailed(format!(
            "decoded frame has {len} bytes, expected {} for {width}x{height} RGB",
            width as usize * height as usize * 3
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_rgb_buffer_becomes_a_frame() {
        let frame = rgb_frame(4, 2, vec![7u8; 4 * 2 * 3]).unwrap();
        assert_eq!(frame.dimensions(), (4, 2));
        assert_eq!(frame.get_pixel(3, 1).0, [7, 7, 7]);
    }

    #[test]
    fn short_buffer_is_a_capture_failure() {
        let err = rgb_frame(640, 480, vec![0u8; 100]).unwrap_err();
        assert!(matches!(err, DocscanError::CaptureFailed(ref msg) if msg.contains("100 bytes")));
    }

    #[test]
    fn default_properties_match_camera_defaults() {
        assert_eq!(
            CameraProperties::default(),
            CameraProperties {
                width: 640,
                height: 480,
                fps: 30
            }
        );
    }
}
