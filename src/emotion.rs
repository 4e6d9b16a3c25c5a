// Face localization, preprocessing and emotion classification

use crate::error::{EmotifyError, Result};
use crate::models::{FaceBox, Label, Prediction};
use image::imageops::{self, FilterType};
use image::GrayImage;
use tracing::warn;

/// Side length of the square face crop the classifier expects
pub const FACE_SIZE: u32 = 48;

/// Finds faces in a grayscale image
pub trait FaceLocalizer: Send {
    fn locate(&mut self, image: &GrayImage) -> Result<Vec<FaceBox>>;
}

/// Classifies the emotion of one normalized face crop
pub trait EmotionClassifier: Send {
    fn classify(&mut self, face: &FaceTensor) -> Result<Prediction>;
}

/// Grayscale face crop resized to `FACE_SIZE` x `FACE_SIZE`, intensities in [0, 1]
#[derive(Clone, Debug, PartialEq)]
pub struct FaceTensor {
    data: Vec<f32>,
}

impl FaceTensor {
    /// Row-major pixel intensities
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Outcome of cropping one detected face
#[derive(Debug, PartialEq)]
pub enum FaceCrop {
    Ready(FaceTensor),
    /// Empty after clamping to the image, or entirely black
    Degenerate,
}

/// Crops a face out of the grayscale image and normalizes it for the classifier
pub fn preprocess_face(gray: &GrayImage, face: FaceBox) -> FaceCrop {
    let (img_w, img_h) = (gray.width() as i64, gray.height() as i64);
    let x0 = (face.x as i64).clamp(0, img_w);
    let y0 = (face.y as i64).clamp(0, img_h);
    let x1 = (face.x as i64 + face.width as i64).clamp(0, img_w);
    let y1 = (face.y as i64 + face.height as i64).clamp(0, img_h);
    if x1 <= x0 || y1 <= y0 {
        return FaceCrop::Degenerate;
    }

    let roi = imageops::crop_imm(
        gray,
        x0 as u32,
        y0 as u32,
        (x1 - x0) as u32,
        (y1 - y0) as u32,
    )
    .to_image();
    let resized = imageops::resize(&roi, FACE_SIZE, FACE_SIZE, FilterType::Triangle);

    if resized.as_raw().iter().all(|&pixel| pixel == 0) {
        return FaceCrop::Degenerate;
    }

    let data = resized
        .as_raw()
        .iter()
        .map(|&pixel| pixel as f32 / 255.0)
        .collect();
    FaceCrop::Ready(FaceTensor { data })
}

/// Picks the most likely label from raw model scores.
///
/// Scores that are not already a probability distribution are passed
/// through a softmax first.
pub fn prediction_from_scores(scores: &[f32]) -> Result<Prediction> {
    if scores.len() != Label::COUNT {
        return Err(EmotifyError::Classification(format!(
            "expected {} scores, model returned {}",
            Label::COUNT,
            scores.len()
        )));
    }

    let sum: f32 = scores.iter().sum();
    let is_distribution = scores.iter().all(|s| (0.0..=1.0).contains(s)) && (sum - 1.0).abs() < 1e-3;
    let probabilities: Vec<f32> = if is_distribution {
        scores.to_vec()
    } else {
        let max_logit = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let exp_sum: f32 = scores.iter().map(|&x| (x - max_logit).exp()).sum();
        scores
            .iter()
            .map(|&x| (x - max_logit).exp() / exp_sum)
            .collect()
    };

    // First index wins on equal probabilities
    let (max_idx, max_prob) = probabilities
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &p)| match best {
            Some((_, bp)) if p <= bp => best,
            _ => Some((i, p)),
        })
        .ok_or_else(|| EmotifyError::Classification("No probabilities in output".to_string()))?;

    let label = Label::from_index(max_idx).ok_or_else(|| {
        warn!("Unknown emotion index: {}", max_idx);
        EmotifyError::Classification(format!("Unknown emotion index: {max_idx}"))
    })?;
    Ok(Prediction::new(label, max_prob))
}

/// Models shared by every detection session.
///
/// Built once at startup and handed to the HTTP layer.
pub struct InferenceContext {
    localizer: Box<dyn FaceLocalizer>,
    classifier: Box<dyn EmotionClassifier>,
}

impl InferenceContext {
    pub fn new(localizer: Box<dyn FaceLocalizer>, classifier: Box<dyn EmotionClassifier>) -> Self {
        Self {
            localizer,
            classifier,
        }
    }

    /// Loads the Haar cascade and the ONNX emotion model
    #[cfg(all(feature = "opencv", feature = "onnx"))]
    pub fn from_model_files(cascade_path: &str, model_path: &str) -> Result<Self> {
        let localizer = HaarCascadeLocalizer::new(cascade_path)?;
        let classifier = OnnxEmotionClassifier::new(model_path)?;
        Ok(Self::new(Box::new(localizer), Box::new(classifier)))
    }

    #[cfg(not(all(feature = "opencv", feature = "onnx")))]
    pub fn from_model_files(_cascade_path: &str, _model_path: &str) -> Result<Self> {
        Err(EmotifyError::ModelLoad(
            "emotify was built without the `opencv` and `onnx` features".to_string(),
        ))
    }

    pub fn locate(&mut self, image: &GrayImage) -> Result<Vec<FaceBox>> {
        self.localizer.locate(image)
    }

    pub fn classify(&mut self, face: &FaceTensor) -> Result<Prediction> {
        self.classifier.classify(face)
    }
}

#[cfg(feature = "opencv")]
pub use self::haar::HaarCascadeLocalizer;

#[cfg(feature = "opencv")]
mod haar {
    use super::FaceLocalizer;
    use crate::error::{EmotifyError, Result};
    use crate::models::FaceBox;
    use image::GrayImage;
    use opencv::core::{Mat, Rect, Size, Vector};
    use opencv::objdetect::CascadeClassifier;
    use opencv::prelude::*;
    use tracing::error;

    /// Face localizer using OpenCV Haar Cascade
    pub struct HaarCascadeLocalizer {
        classifier: CascadeClassifier,
    }

    impl HaarCascadeLocalizer {
        /// Loads the Haar Cascade classifier
        pub fn new(cascade_path: &str) -> Result<Self> {
            let classifier = CascadeClassifier::new(cascade_path).map_err(|e| {
                error!("Failed to load Haar Cascade: {}", e);
                EmotifyError::ModelLoad(format!("Haar Cascade load failed: {e}"))
            })?;

            if classifier.empty()? {
                return Err(EmotifyError::ModelLoad(
                    "Haar Cascade classifier is empty".to_string(),
                ));
            }

            Ok(Self { classifier })
        }
    }

    impl FaceLocalizer for HaarCascadeLocalizer {
        fn locate(&mut self, image: &GrayImage) -> Result<Vec<FaceBox>> {
            let mat = Mat::from_slice(image.as_raw()).map_err(|e| {
                EmotifyError::FaceDetection(format!("Failed to create Mat: {e}"))
            })?;
            let gray = mat.reshape(1, image.height() as i32).map_err(|e| {
                EmotifyError::FaceDetection(format!("Failed to reshape Mat: {e}"))
            })?;

            let mut faces = Vector::<Rect>::new();
            self.classifier
                .detect_multi_scale(
                    &gray,
                    &mut faces,
                    1.3,              // scale factor
                    5,                // min neighbors
                    0,                // flags
                    Size::new(0, 0),  // min size
                    Size::new(0, 0),  // max size (0,0 means no limit)
                )
                .map_err(|e| EmotifyError::FaceDetection(format!("Face detection failed: {e}")))?;

            Ok(faces
                .iter()
                .map(|r| FaceBox::new(r.x, r.y, r.width, r.height))
                .collect())
        }
    }
}

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxEmotionClassifier;

#[cfg(feature = "onnx")]
mod onnx {
    use super::{prediction_from_scores, EmotionClassifier, FaceTensor, FACE_SIZE};
    use crate::error::{EmotifyError, Result};
    use crate::models::Prediction;
    use ort::session::Session;
    use ort::value::Value;
    use tracing::error;

    /// Emotion classifier using ONNX Runtime.
    ///
    /// Expects a Keras-style NHWC input of shape [1, 48, 48, 1] and seven
    /// output scores.
    pub struct OnnxEmotionClassifier {
        session: Session,
    }

    impl OnnxEmotionClassifier {
        /// Loads the ONNX model
        pub fn new(model_path: &str) -> Result<Self> {
            let session = Session::builder()?
                .commit_from_file(model_path)
                .map_err(|e| {
                    error!("Failed to load ONNX model: {}", e);
                    EmotifyError::ModelLoad(format!("ONNX model load failed: {e}"))
                })?;

            Ok(Self { session })
        }
    }

    impl EmotionClassifier for OnnxEmotionClassifier {
        fn classify(&mut self, face: &FaceTensor) -> Result<Prediction> {
            let side = FACE_SIZE as usize;
            let input_array =
                ndarray::Array4::from_shape_vec((1, side, side, 1), face.as_slice().to_vec())
                    .map_err(|e| {
                        EmotifyError::Classification(format!("Failed to create input array: {e}"))
                    })?;

            let input_tensor = Value::from_array(input_array).map_err(|e| {
                EmotifyError::Classification(format!("Failed to create input tensor: {e}"))
            })?;

            let outputs = self
                .session
                .run(ort::inputs![input_tensor])
                .map_err(|e| {
                    error!("ONNX inference failed: {}", e);
                    EmotifyError::Classification(format!("Inference failed: {e}"))
                })?;

            let (_, output_value) = outputs
                .iter()
                .next()
                .ok_or_else(|| EmotifyError::Classification("No output from model".to_string()))?;

            let (_, scores) = output_value.try_extract_tensor::<f32>().map_err(|e| {
                EmotifyError::Classification(format!("Failed to extract output tensor: {e}"))
            })?;

            prediction_from_scores(scores)
        }
    }
}
