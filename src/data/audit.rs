use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Quality bucket of a tag key. Exactly one applies to every key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TagClassification {
    ProblemChars,
    TooManyColons,
    Lower,
    LowerColon,
    Correct,
}

impl TagClassification {
    pub fn label(&self) -> &'static str {
        match self {
            TagClassification::ProblemChars => "problemchars",
            TagClassification::TooManyColons => "too_many_colons",
            TagClassification::Lower => "lower",
            TagClassification::LowerColon => "lower_colon",
            TagClassification::Correct => "correct",
        }
    }

    /// Keys that would cause trouble as document field names.
    pub fn is_error(&self) -> bool {
        matches!(self, TagClassification::ProblemChars | TagClassification::TooManyColons)
    }
}

/// One aggregate as it is stored: an `_id` label next to the counts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaggedCounts {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub counts: BTreeMap<String, u64>,
}

impl TaggedCounts {
    pub fn new(id: &str, counts: BTreeMap<String, u64>) -> Self {
        TaggedCounts {
            id: id.to_string(),
            counts,
        }
    }
}

#[cfg(test)]
impl TaggedCounts {
    pub fn get(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }
}

/// Final statistics of a conversion pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Aggregates {
    /// Element name frequencies, `_id` "tags".
    pub tags: TaggedCounts,
    /// Tag key classification counts, `_id` "errors".
    pub errors: TaggedCounts,
    /// Elements per contributor, `_id` "users".
    pub users: TaggedCounts,
}

impl Aggregates {
    /// The snapshots in the order they are written to the metadata file.
    pub fn snapshots(&self) -> [&TaggedCounts; 3] {
        [&self.tags, &self.errors, &self.users]
    }
}
