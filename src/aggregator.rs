// Per-session emotion tally

use crate::models::Label;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Immutable count of labels recorded during one detection session.
///
/// Labels are remembered in the order they were first recorded, which the
/// mood resolver uses to break ties.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    counts: [u32; Label::COUNT],
    first_seen: Vec<Label>,
}

impl Tally {
    pub fn count(&self, label: Label) -> u32 {
        self.counts[label.index()]
    }

    /// Number of classified faces in the session
    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.first_seen.is_empty()
    }

    /// Labels with a non-zero count, in first-recorded order
    pub fn iter(&self) -> impl Iterator<Item = (Label, u32)> + '_ {
        self.first_seen
            .iter()
            .map(move |&label| (label, self.count(label)))
    }
}

impl Serialize for Tally {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.first_seen.len()))?;
        for (label, count) in self.iter() {
            map.serialize_entry(label.as_str(), &count)?;
        }
        map.end()
    }
}

/// Accumulates per-face predictions into a session tally
#[derive(Debug, Default)]
pub struct EmotionAggregator {
    tally: Tally,
}

impl EmotionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one classified face
    pub fn record(&mut self, label: Label) {
        let slot = &mut self.tally.counts[label.index()];
        if *slot == 0 {
            self.tally.first_seen.push(label);
        }
        *slot += 1;
    }

    /// Returns the current tally
    pub fn snapshot(&self) -> Tally {
        self.tally.clone()
    }

    pub fn into_tally(self) -> Tally {
        self.tally
    }
}
