// Frame sources: uploaded images and webcam capture

use crate::error::{EmotifyError, Result};
use crate::models::Frame;
use std::fmt::Display;
use tracing::warn;

/// A sequence of frames analysed by one detection session
pub trait FrameSource {
    /// Returns the next frame, `Ok(None)` once the source is exhausted or
    /// the device has gone away.
    ///
    /// An `Err` means this frame could not be read; later calls may succeed.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Maps one camera grab onto the `FrameSource` contract.
///
/// A failed grab means the device stopped delivering frames and ends the
/// burst. A frame that was grabbed but fails to decode is only skipped.
pub fn frame_from_capture<T, E: Display>(
    grabbed: std::result::Result<T, E>,
    decode: impl FnOnce(T) -> Result<Frame>,
) -> Result<Option<Frame>> {
    match grabbed {
        Ok(raw) => decode(raw).map(Some),
        Err(e) => {
            warn!("Failed to capture frame, treating camera as disconnected: {}", e);
            Ok(None)
        }
    }
}

/// Opens a fresh camera stream for each camera-burst session
pub trait CameraProvider: Send + Sync {
    fn open(&self) -> Result<Box<dyn FrameSource>>;
}

/// A single decoded upload
pub struct SingleImage {
    frame: Option<Frame>,
}

impl SingleImage {
    pub fn new(frame: Frame) -> Self {
        Self { frame: Some(frame) }
    }

    /// Decodes PNG, JPEG or WebP bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let rgb = image::load_from_memory(bytes)?.to_rgb8();
        let (width, height) = rgb.dimensions();
        Ok(Self::new(Frame::new(rgb.into_raw(), width, height)))
    }
}

impl FrameSource for SingleImage {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.frame.take())
    }
}

/// Provider used when no camera backend is available
pub struct NoCamera;

impl CameraProvider for NoCamera {
    fn open(&self) -> Result<Box<dyn FrameSource>> {
        Err(EmotifyError::CameraInit(
            "emotify was built without the `camera` feature".to_string(),
        ))
    }
}

#[cfg(feature = "camera")]
pub use self::webcam::{CameraManager, WebcamProvider};

#[cfg(feature = "camera")]
mod webcam {
    use super::{frame_from_capture, CameraProvider, FrameSource};
    use crate::error::{EmotifyError, Result};
    use crate::models::Frame;
    use nokhwa::pixel_format::RgbFormat;
    use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
    use nokhwa::Camera;
    use tracing::{error, info};

    /// Owns an open webcam stream; the stream is stopped on drop
    pub struct CameraManager {
        camera: Camera,
    }

    impl CameraManager {
        /// Opens the camera at `index` and starts streaming
        pub fn open(index: u32) -> Result<Self> {
            // Request 640x480 at 30 FPS for better performance
            let requested_format = RequestedFormat::new::<RgbFormat>(
                RequestedFormatType::Closest(nokhwa::utils::CameraFormat::new(
                    nokhwa::utils::Resolution::new(640, 480),
                    nokhwa::utils::FrameFormat::YUYV,
                    30,
                )),
            );

            let mut camera =
                Camera::new(CameraIndex::Index(index), requested_format).map_err(|e| {
                    error!("Failed to initialize camera {}: {}", index, e);
                    EmotifyError::CameraInit(format!("Could not open camera {index}: {e}"))
                })?;

            camera.open_stream()?;

            let res = camera.resolution();
            info!(
                "Camera opened: {} ({}x{})",
                camera.info().human_name(),
                res.width(),
                res.height()
            );
            Ok(Self { camera })
        }
    }

    impl FrameSource for CameraManager {
        fn next_frame(&mut self) -> Result<Option<Frame>> {
            frame_from_capture(self.camera.frame(), |frame_data| {
                let buffer = frame_data.decode_image::<RgbFormat>().map_err(|e| {
                    EmotifyError::FrameProcessing(format!("Failed to decode frame: {e}"))
                })?;
                let (width, height) = (buffer.width(), buffer.height());
                Ok(Frame::new(buffer.into_raw(), width, height))
            })
        }
    }

    impl Drop for CameraManager {
        fn drop(&mut self) {
            if let Err(e) = self.camera.stop_stream() {
                error!("Error stopping camera stream: {}", e);
            }
        }
    }

    /// Opens the webcam at a fixed index
    pub struct WebcamProvider {
        index: u32,
    }

    impl WebcamProvider {
        pub fn new(index: u32) -> Self {
            Self { index }
        }
    }

    impl CameraProvider for WebcamProvider {
        fn open(&self) -> Result<Box<dyn FrameSource>> {
            Ok(Box::new(CameraManager::open(self.index)?))
        }
    }
}
