// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Frame capture for docscan: the `FrameSource` abstraction, a file-backed
// source, the optional `nokhwa` webcam source, and the background capture
// handler that feeds live previews and high-quality stills.

pub mod handler;
pub mod still;
pub mod traits;

#[cfg(feature = "webcam")]
pub mod webcam;

pub use handler::{CameraHandler, DEFAULT_CAPTURE_FRAMES, DEFAULT_CAPTURE_INTERVAL};
pub use still::StillImageSource;
pub use traits::{CameraProperties, DeviceInfo, FrameSource};

#[cfg(feature = "webcam")]
pub use webcam::WebcamSource;

/// Camera indices probed by [`list_cameras`].
pub const MAX_PROBED_CAMERAS: u32 = 5;

/// Cameras that can be opened. Always empty without the `webcam` feature.
pub fn list_cameras() -> Vec<DeviceInfo> {
    #[cfg(feature = "webcam")]
    {
        webcam::probe(MAX_PROBED_CAMERAS)
    }
    #[cfg(not(feature = "webcam"))]
    {
        tracing::debug!("Built without webcam support; no cameras to list");
        Vec::new()
    }
}
