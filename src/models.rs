// Core data models for Emotify

use serde::Serialize;

/// Represents a single video frame with RGB data
#[derive(Clone, Debug)]
pub struct Frame {
    /// Raw RGB pixel data (width * height * 3 bytes)
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

impl Frame {
    /// Creates a new Frame with the given parameters
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }
}

/// Emotion labels produced by the classifier, in model output order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {
    Angry,
    Disgust,
    Fear,
    Happy,
    Neutral,
    Sad,
    Surprise,
}

impl Label {
    pub const COUNT: usize = 7;

    pub const ALL: [Label; Label::COUNT] = [
        Label::Angry,
        Label::Disgust,
        Label::Fear,
        Label::Happy,
        Label::Neutral,
        Label::Sad,
        Label::Surprise,
    ];

    /// Maps a classifier output index to a label
    pub fn from_index(index: usize) -> Option<Label> {
        Self::ALL.get(index).copied()
    }

    /// Position of the label in the classifier output
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Angry => "Angry",
            Label::Disgust => "Disgust",
            Label::Fear => "Fear",
            Label::Happy => "Happy",
            Label::Neutral => "Neutral",
            Label::Sad => "Sad",
            Label::Surprise => "Surprise",
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse mood used as the song lookup key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Mood {
    Energetic,
    Calm,
    Happy,
    Sad,
}

impl Mood {
    pub fn as_str(self) -> &'static str {
        match self {
            Mood::Energetic => "Energetic",
            Mood::Calm => "Calm",
            Mood::Happy => "Happy",
            Mood::Sad => "Sad",
        }
    }
}

impl std::fmt::Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bounding box of a detected face, in pixels of the analysed image
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl FaceBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Result of classifying one face: the argmax label and its probability
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Prediction {
    /// The most likely emotion
    pub label: Label,
    /// Probability of that emotion (0.0 to 1.0)
    pub confidence: f32,
}

impl Prediction {
    pub fn new(label: Label, confidence: f32) -> Self {
        Self { label, confidence }
    }

    /// Returns the confidence as a percentage (0-100)
    pub fn confidence_percent(&self) -> u8 {
        (self.confidence * 100.0).round() as u8
    }
}

impl std::fmt::Display for Prediction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}% confidence)", self.label, self.confidence_percent())
    }
}
