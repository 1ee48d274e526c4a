// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Webcam frame source backed by `nokhwa` (V4L2 / AVFoundation / Media
// Foundation through its native input backends).
//
// Only compiled with the `webcam` feature.

use docscan_core::error::{DocscanError, Result};
use image::RgbImage;
use nokhwa::Camera;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use tracing::{debug, info, instrument, warn};

use crate::traits::{CameraProperties, DeviceInfo, FrameSource, rgb_frame};

/// A local camera, addressed by index.
pub struct WebcamSource {
    index: u32,
    camera: Camera,
}

impl WebcamSource {
    /// Connect to camera `index`, asking for the closest format to `properties`.
    #[instrument(skip(properties))]
    pub fn new(index: u32, properties: &CameraProperties) -> Result<Self> {
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(
                Resolution::new(properties.width, properties.height),
                FrameFormat::MJPEG,
                properties.fps,
            ),
        ));
        let camera = Camera::new(CameraIndex::Index(index), requested).map_err(|err| {
            DocscanError::CameraUnavailable(format!("camera {index}: {err}"))
        })?;
        info!(index, name = %camera.info().human_name(), "Camera connected");
        Ok(Self { index, camera })
    }

    /// Boxed constructor for [`crate::CameraHandler::start`].
    pub fn opener(
        index: u32,
        properties: CameraProperties,
    ) -> impl FnOnce() -> Result<Box<dyn FrameSource>> + Send + 'static {
        move || Ok(Box::new(Self::new(index, &properties)?) as Box<dyn FrameSource>)
    }
}

impl FrameSource for WebcamSource {
    fn open(&mut self) -> Result<()> {
        self.camera.open_stream().map_err(|err| {
            DocscanError::CameraUnavailable(format!("camera {}: {}", self.index, err))
        })?;
        let resolution = self.camera.resolution();
        info!(
            index = self.index,
            width = resolution.width(),
            height = resolution.height(),
            fps = self.camera.frame_rate(),
            "Camera stream opened"
        );
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        let buffer = self
            .camera
            .frame()
            .map_err(|err| DocscanError::CaptureFailed(err.to_string()))?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|err| DocscanError::CaptureFailed(format!("frame decode failed: {err}")))?;
        let (width, height) = (decoded.width(), decoded.height());
        // Rebuilt from raw bytes so nokhwa's `image` version does not leak out.
        rgb_frame(width, height, decoded.into_raw()).map(Some)
    }

    fn info(&self) -> DeviceInfo {
        let resolution = self.camera.resolution();
        DeviceInfo {
            index: self.index,
            name: self.camera.info().human_name(),
            width: resolution.width(),
            height: resolution.height(),
            fps: self.camera.frame_rate(),
        }
    }

    fn set_properties(&mut self, properties: &CameraProperties) -> Result<()> {
        self.camera
            .set_resolution(Resolution::new(properties.width, properties.height))
            .map_err(|err| DocscanError::CaptureFailed(format!("set resolution: {err}")))?;
        self.camera
            .set_frame_rate(properties.fps)
            .map_err(|err| DocscanError::CaptureFailed(format!("set frame rate: {err}")))?;
        debug!(?properties, "Camera properties updated");
        Ok(())
    }

    fn close(&mut self) {
        if let Err(err) = self.camera.stop_stream() {
            warn!(index = self.index, %err, "Failed to stop camera stream");
        }
    }
}

/// Cameras among indices `0..count` that can be opened.
pub(crate) fn probe(count: u32) -> Vec<DeviceInfo> {
    let properties = CameraProperties::default();
    (0..count)
        .filter_map(|index| match WebcamSource::new(index, &properties) {
            Ok(source) => Some(source.info()),
            Err(err) => {
                debug!(index, %err, "No camera at index");
                None
            }
        })
        .collect()
}
