// One end-to-end detection over an upload or a camera burst

use crate::aggregator::{EmotionAggregator, Tally};
use crate::camera::{CameraProvider, FrameSource, SingleImage};
use crate::emotion::{preprocess_face, FaceCrop, InferenceContext};
use crate::error::{EmotifyError, Result};
use crate::models::{Frame, Mood};
use crate::mood;
use image::{imageops, RgbImage};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Upper bound on frames read from the camera per request
pub const DEFAULT_CAMERA_FRAMES: usize = 50;

/// How the frame source behaved during a session
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceStatus {
    /// Every requested frame was read
    Completed,
    /// The source ran out of frames early
    Exhausted,
    /// The source could not be opened or decoded; nothing was analysed
    Unavailable(String),
}

/// Outcome of one detection session
#[derive(Clone, Debug)]
pub struct SessionReport {
    pub tally: Tally,
    pub status: SourceStatus,
    pub frames_read: usize,
    pub faces_found: usize,
    pub faces_classified: usize,
    pub faces_skipped: usize,
}

impl SessionReport {
    pub fn mood(&self) -> Mood {
        mood::resolve(&self.tally)
    }
}

/// Drives localization and classification for one request, owning its tally.
///
/// The shared inference context is locked per frame, never while the frame
/// source is being read.
pub struct DetectionSession<'a> {
    context: &'a Mutex<InferenceContext>,
    aggregator: EmotionAggregator,
    frames_read: usize,
    faces_found: usize,
    faces_classified: usize,
    faces_skipped: usize,
}

impl<'a> DetectionSession<'a> {
    pub fn new(context: &'a Mutex<InferenceContext>) -> Self {
        Self {
            context,
            aggregator: EmotionAggregator::new(),
            frames_read: 0,
            faces_found: 0,
            faces_classified: 0,
            faces_skipped: 0,
        }
    }

    /// Analyses a single uploaded image; undecodable bytes give an empty tally
    pub fn run_image(self, bytes: &[u8]) -> SessionReport {
        match SingleImage::decode(bytes) {
            Ok(mut source) => self.run(&mut source, 1),
            Err(e) => {
                warn!("Could not read uploaded image: {}", e);
                self.finish(SourceStatus::Unavailable(e.to_string()))
            }
        }
    }

    /// Analyses up to `max_frames` webcam frames.
    ///
    /// The camera is released before this returns. A camera that fails to
    /// open gives an empty tally.
    pub fn run_camera(self, provider: &dyn CameraProvider, max_frames: usize) -> SessionReport {
        match provider.open() {
            Ok(mut source) => self.run(source.as_mut(), max_frames),
            Err(e) => {
                warn!("Camera unavailable: {}", e);
                self.finish(SourceStatus::Unavailable(e.to_string()))
            }
        }
    }

    /// Reads at most `max_frames` frames from `source`
    pub fn run(mut self, source: &mut dyn FrameSource, max_frames: usize) -> SessionReport {
        let mut status = SourceStatus::Completed;
        for attempt in 0..max_frames {
            match source.next_frame() {
                Ok(Some(frame)) => {
                    self.frames_read += 1;
                    if let Err(e) = self.process_frame(frame) {
                        warn!("Skipping frame {}: {}", attempt, e);
                    }
                }
                Ok(None) => {
                    debug!("Frame source exhausted after {} frames", attempt);
                    status = SourceStatus::Exhausted;
                    break;
                }
                Err(e) => warn!("Skipping unreadable frame {}: {}", attempt, e),
            }
        }
        self.finish(status)
    }

    fn process_frame(&mut self, frame: Frame) -> Result<()> {
        let rgb = RgbImage::from_raw(frame.width, frame.height, frame.data).ok_or_else(|| {
            EmotifyError::FrameProcessing("frame buffer does not match its dimensions".to_string())
        })?;
        let gray = imageops::grayscale(&rgb);

        let mut context = self.context.lock().map_err(|_| {
            EmotifyError::FaceDetection("inference context is unavailable".to_string())
        })?;
        let faces = context.locate(&gray)?;
        self.faces_found += faces.len();

        for face in faces {
            match preprocess_face(&gray, face) {
                FaceCrop::Ready(tensor) => match context.classify(&tensor) {
                    Ok(prediction) => {
                        debug!("Face at {:?}: {}", face, prediction);
                        self.aggregator.record(prediction.label);
                        self.faces_classified += 1;
                    }
                    Err(e) => {
                        warn!("Skipping face at {:?}: {}", face, e);
                        self.faces_skipped += 1;
                    }
                },
                FaceCrop::Degenerate => {
                    debug!("Skipping degenerate face region {:?}", face);
                    self.faces_skipped += 1;
                }
            }
        }
        Ok(())
    }

    fn finish(self, status: SourceStatus) -> SessionReport {
        let report = SessionReport {
            tally: self.aggregator.into_tally(),
            status,
            frames_read: self.frames_read,
            faces_found: self.faces_found,
            faces_classified: self.faces_classified,
            faces_skipped: self.faces_skipped,
        };
        info!(
            "Session finished: {} frames, {} faces, {} classified, {} skipped ({:?})",
            report.frames_read,
            report.faces_found,
            report.faces_classified,
            report.faces_skipped,
            report.status
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::NoCamera;
    use crate::models::{FaceBox, Label};
    use crate::testing::{
        png_bytes, FailingLocalizer, FakeCamera, FixedLocalizer, ScriptedClassifier,
    };
    use std::sync::atomic::Ordering;

    fn context(boxes: Vec<FaceBox>, labels: Vec<Option<Label>>) -> Mutex<InferenceContext> {
        Mutex::new(InferenceContext::new(
            Box::new(FixedLocalizer::new(boxes)),
            Box::new(ScriptedClassifier::new(labels)),
        ))
    }

    #[test]
    fn every_face_in_an_image_is_counted() {
        let ctx = context(
            vec![FaceBox::new(0, 0, 20, 20), FaceBox::new(30, 30, 20, 20)],
            vec![Some(Label::Happy), Some(Label::Sad)],
        );
        let report = DetectionSession::new(&ctx).run_image(&png_bytes(64, 64, 200));

        assert_eq!(report.status, SourceStatus::Completed);
        assert_eq!(report.frames_read, 1);
        assert_eq!(report.faces_found, 2);
        assert_eq!(report.tally.count(Label::Happy), 1);
        assert_eq!(report.tally.count(Label::Sad), 1);
        assert_eq!(report.tally.total(), 2);
    }

    #[test]
    fn undecodable_upload_resolves_to_calm() {
        let ctx = context(vec![FaceBox::new(0, 0, 20, 20)], vec![Some(Label::Happy)]);
        let report = DetectionSession::new(&ctx).run_image(b"not an image");

        assert!(matches!(report.status, SourceStatus::Unavailable(_)));
        assert!(report.tally.is_empty());
        assert_eq!(report.mood(), Mood::Calm);
    }

    #[test]
    fn image_without_faces_resolves_to_calm() {
        let ctx = context(vec![], vec![Some(Label::Angry)]);
        let report = DetectionSession::new(&ctx).run_image(&png_bytes(32, 32, 90));

        assert_eq!(report.faces_found, 0);
        assert!(report.tally.is_empty());
        assert_eq!(report.mood(), Mood::Calm);
    }

    #[test]
    fn black_face_never_reaches_the_classifier() {
        let ctx = context(vec![FaceBox::new(0, 0, 16, 16)], vec![]);
        let report = DetectionSession::new(&ctx).run_image(&png_bytes(32, 32, 0));

        assert_eq!(report.faces_found, 1);
        assert_eq!(report.faces_skipped, 1);
        assert!(report.tally.is_empty());
    }

    #[test]
    fn failed_classification_skips_only_that_face() {
        let ctx = context(
            vec![
                FaceBox::new(0, 0, 10, 10),
                FaceBox::new(10, 10, 10, 10),
                FaceBox::new(20, 20, 10, 10),
            ],
            vec![Some(Label::Angry), None, Some(Label::Angry)],
        );
        let report = DetectionSession::new(&ctx).run_image(&png_bytes(40, 40, 120));

        assert_eq!(report.faces_classified, 2);
        assert_eq!(report.faces_skipped, 1);
        assert_eq!(report.tally.count(Label::Angry), 2);
        assert_eq!(report.mood(), Mood::Energetic);
    }

    #[test]
    fn localization_failure_skips_the_frame() {
        let ctx = Mutex::new(InferenceContext::new(
            Box::new(FailingLocalizer),
            Box::new(ScriptedClassifier::new(vec![Some(Label::Happy)])),
        ));
        let report = DetectionSession::new(&ctx).run_image(&png_bytes(32, 32, 100));

        assert_eq!(report.frames_read, 1);
        assert!(report.tally.is_empty());
    }

    #[test]
    fn camera_burst_is_capped_and_released() {
        let camera = FakeCamera::new(80, 100);
        let ctx = context(vec![FaceBox::new(0, 0, 8, 8)], vec![Some(Label::Sad)]);
        let report = DetectionSession::new(&ctx).run_camera(&camera, DEFAULT_CAMERA_FRAMES);

        assert_eq!(report.status, SourceStatus::Completed);
        assert_eq!(report.frames_read, DEFAULT_CAMERA_FRAMES);
        assert_eq!(camera.reads.load(Ordering::SeqCst), DEFAULT_CAMERA_FRAMES);
        assert_eq!(report.tally.count(Label::Sad), DEFAULT_CAMERA_FRAMES as u32);
        assert!(camera.released.load(Ordering::SeqCst));
        assert_eq!(report.mood(), Mood::Sad);
    }

    #[test]
    fn camera_running_dry_stops_early() {
        let camera = FakeCamera::new(3, 100);
        let ctx = context(vec![], vec![]);
        let report = DetectionSession::new(&ctx).run_camera(&camera, DEFAULT_CAMERA_FRAMES);

        assert_eq!(report.status, SourceStatus::Exhausted);
        assert_eq!(report.frames_read, 3);
        assert!(camera.released.load(Ordering::SeqCst));
    }

    #[test]
    fn disconnected_camera_is_not_polled_for_the_whole_burst() {
        // Six frames are grabbed (every third fails to decode), then the
        // device goes away
        let camera = FakeCamera::new(6, 100).failing_every(3);
        let ctx = context(vec![FaceBox::new(0, 0, 8, 8)], vec![Some(Label::Angry)]);
        let report = DetectionSession::new(&ctx).run_camera(&camera, DEFAULT_CAMERA_FRAMES);

        assert_eq!(report.status, SourceStatus::Exhausted);
        assert_eq!(camera.reads.load(Ordering::SeqCst), 7);
        assert_eq!(report.frames_read, 4);
        assert_eq!(report.tally.count(Label::Angry), 4);
        assert!(camera.released.load(Ordering::SeqCst));
    }

    /// Records whether the inference context was locked during each read
    struct LockWatchingSource<'a> {
        context: &'a Mutex<InferenceContext>,
        remaining: usize,
        reads_while_locked: usize,
    }

    impl FrameSource for LockWatchingSource<'_> {
        fn next_frame(&mut self) -> Result<Option<Frame>> {
            if self.context.try_lock().is_err() {
                self.reads_while_locked += 1;
            }
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            Ok(Some(Frame::new(vec![120; 16 * 16 * 3], 16, 16)))
        }
    }

    #[test]
    fn frame_reads_happen_outside_the_inference_lock() {
        let ctx = context(vec![FaceBox::new(0, 0, 8, 8)], vec![Some(Label::Happy)]);
        let mut source = LockWatchingSource {
            context: &ctx,
            remaining: 3,
            reads_while_locked: 0,
        };
        let report = DetectionSession::new(&ctx).run(&mut source, 5);

        assert_eq!(source.reads_while_locked, 0);
        assert_eq!(report.tally.count(Label::Happy), 3);
        assert!(ctx.try_lock().is_ok());
    }

    #[test]
    fn unreadable_frames_are_skipped() {
        let camera = FakeCamera::new(10, 100).failing_every(2);
        let ctx = context(vec![FaceBox::new(0, 0, 8, 8)], vec![Some(Label::Happy)]);
        let report = DetectionSession::new(&ctx).run_camera(&camera, 10);

        assert_eq!(report.status, SourceStatus::Completed);
        assert_eq!(report.frames_read, 5);
        assert_eq!(report.tally.count(Label::Happy), 5);
    }

    #[test]
    fn camera_that_fails_to_open_gives_calm() {
        let ctx = context(vec![FaceBox::new(0, 0, 8, 8)], vec![Some(Label::Happy)]);
        let report = DetectionSession::new(&ctx).run_camera(&NoCamera, DEFAULT_CAMERA_FRAMES);

        assert!(matches!(report.status, SourceStatus::Unavailable(_)));
        assert_eq!(report.frames_read, 0);
        assert_eq!(report.mood(), Mood::Calm);
    }
}
