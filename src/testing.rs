// Stub collaborators for unit tests

use crate::camera::{frame_from_capture, CameraProvider, FrameSource};
use crate::emotion::{EmotionClassifier, FaceLocalizer, FaceTensor};
use crate::error::{EmotifyError, Result};
use crate::models::{FaceBox, Frame, Label, Prediction};
use image::{GrayImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Encodes a uniformly coloured PNG
pub fn png_bytes(width: u32, height: u32, value: u8) -> Vec<u8> {
    let mut bytes = Vec::new();
    RgbImage::from_pixel(width, height, Rgb([value, value, value]))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// Reports the same boxes for every image
pub struct FixedLocalizer {
    boxes: Vec<FaceBox>,
}

impl FixedLocalizer {
    pub fn new(boxes: Vec<FaceBox>) -> Self {
        Self { boxes }
    }
}

impl FaceLocalizer for FixedLocalizer {
    fn locate(&mut self, _image: &GrayImage) -> Result<Vec<FaceBox>> {
        Ok(self.boxes.clone())
    }
}

pub struct FailingLocalizer;

impl FaceLocalizer for FailingLocalizer {
    fn locate(&mut self, _image: &GrayImage) -> Result<Vec<FaceBox>> {
        Err(EmotifyError::FaceDetection("stub failure".to_string()))
    }
}

/// Answers with the scripted labels in order, wrapping around; `None` fails
pub struct ScriptedClassifier {
    script: Vec<Option<Label>>,
    calls: usize,
}

impl ScriptedClassifier {
    pub fn new(script: Vec<Option<Label>>) -> Self {
        Self { script, calls: 0 }
    }
}

impl EmotionClassifier for ScriptedClassifier {
    fn classify(&mut self, _face: &FaceTensor) -> Result<Prediction> {
        if self.script.is_empty() {
            return Err(EmotifyError::Classification("empty script".to_string()));
        }
        let next = self.script[self.calls % self.script.len()];
        self.calls += 1;
        next.map(|label| Prediction::new(label, 0.9))
            .ok_or_else(|| EmotifyError::Classification("scripted failure".to_string()))
    }
}

/// Camera yielding a fixed number of grey frames, then disconnecting
pub struct FakeCamera {
    frames: usize,
    value: u8,
    fail_every: Option<usize>,
    pub reads: Arc<AtomicUsize>,
    pub released: Arc<AtomicBool>,
}

impl FakeCamera {
    pub fn new(frames: usize, value: u8) -> Self {
        Self {
            frames,
            value,
            fail_every: None,
            reads: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Every `n`th grabbed frame fails to decode
    pub fn failing_every(mut self, n: usize) -> Self {
        self.fail_every = Some(n);
        self
    }
}

impl CameraProvider for FakeCamera {
    fn open(&self) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(FakeStream {
            remaining: self.frames,
            value: self.value,
            fail_every: self.fail_every,
            reads: self.reads.clone(),
            released: self.released.clone(),
        }))
    }
}

struct FakeStream {
    remaining: usize,
    value: u8,
    fail_every: Option<usize>,
    reads: Arc<AtomicUsize>,
    released: Arc<AtomicBool>,
}

impl FrameSource for FakeStream {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let read = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        let grabbed = if self.remaining == 0 {
            Err("device disconnected")
        } else {
            self.remaining -= 1;
            Ok(vec![self.value; 16 * 16 * 3])
        };
        let corrupt = self.fail_every.is_some_and(|n| read % n == 0);
        frame_from_capture(grabbed, |data| {
            if corrupt {
                return Err(EmotifyError::FrameProcessing("stub decode failure".to_string()));
            }
            Ok(Frame::new(data, 16, 16))
        })
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}
