use std::collections::BTreeMap;

use crate::data::audit::{Aggregates, TagClassification, TaggedCounts};
use crate::data::CONTRIBUTION_ELEMENTS;

pub const TAGS_ID: &str = "tags";
pub const ERRORS_ID: &str = "errors";
pub const USERS_ID: &str = "users";

/// Running statistics of one conversion pass. Each pass gets its own
/// collector; nothing here is shared between passes.
#[derive(Debug, Default)]
pub struct AggregateCollector {
    tags: BTreeMap<String, u64>,
    classifications: BTreeMap<TagClassification, u64>,
    users: BTreeMap<String, u64>,
}

impl AggregateCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tag(&mut self, element_name: &str) {
        *self.tags.entry(element_name.to_string()).or_insert(0) += 1;
    }

    pub fn record_classification(&mut self, classification: TagClassification) {
        *self.classifications.entry(classification).or_insert(0) += 1;
    }

    /// Only nodes, ways and relations are attributed to their user.
    pub fn record_user(&mut self, element_name: &str, user: &str) {
        if !counts_contributions(element_name) {
            return;
        }
        *self.users.entry(user.to_string()).or_insert(0) += 1;
    }

    pub fn finalize(self) -> Aggregates {
        let errors = self.classifications.into_iter()
            .map(|(classification, count)| (classification.label().to_string(), count))
            .collect();
        Aggregates {
            tags: TaggedCounts::new(TAGS_ID, self.tags),
            errors: TaggedCounts::new(ERRORS_ID, errors),
            users: TaggedCounts::new(USERS_ID, self.users),
        }
    }
}

pub fn counts_contributions(element_name: &str) -> bool {
    CONTRIBUTION_ELEMENTS.contains(&element_name)
}
