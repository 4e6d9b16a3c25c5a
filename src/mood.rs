// Reduces a session tally to a single mood

use crate::aggregator::Tally;
use crate::models::{Label, Mood};

/// Label assumed when no face was classified during the session
pub const DEFAULT_LABEL: Label = Label::Neutral;

/// Most frequent label in the tally.
///
/// Among labels sharing the highest count, the one recorded first wins.
/// An empty tally resolves to [`DEFAULT_LABEL`].
pub fn dominant_label(tally: &Tally) -> Label {
    let mut best: Option<(Label, u32)> = None;
    for (label, count) in tally.iter() {
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((label, count)),
        }
    }
    best.map(|(label, _)| label).unwrap_or(DEFAULT_LABEL)
}

/// Fixed label to mood table
pub fn mood_for(label: Label) -> Mood {
    match label {
        Label::Angry | Label::Surprise => Mood::Energetic,
        Label::Fear | Label::Neutral | Label::Disgust => Mood::Calm,
        Label::Happy => Mood::Happy,
        Label::Sad => Mood::Sad,
    }
}

/// Resolves the mood of a session
pub fn resolve(tally: &Tally) -> Mood {
    mood_for(dominant_label(tally))
}
