use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use serde::Deserialize;

use crate::data::osm::RawElement;
use crate::errors::Result;
use crate::etl::aggregate::{counts_contributions, AggregateCollector};
use crate::etl::classify::classify;
use crate::etl::normalize::normalize;
use crate::etl::sink::RecordSink;

/// What to do with a node, way or relation that has no `user` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingUserPolicy {
    /// Abort the conversion.
    #[default]
    Fail,
    /// Leave the element out of the contributor counts and carry on.
    Skip,
}

impl MissingUserPolicy {
    pub fn label(&self) -> &'static str {
        match self {
            MissingUserPolicy::Fail => "fail",
            MissingUserPolicy::Skip => "skip",
        }
    }
}

/// Lets another thread ask a running pass to stop. The pass checks it
/// between elements.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    requested: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.requested.store(true, Ordering::Relaxed);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConversionSummary {
    pub elements_seen: u64,
    pub records_written: u64,
    pub erroneous_tag_keys: u64,
    pub skipped_users: u64,
    pub stopped_early: bool,
}

/// Drives one forward pass over a stream of elements. Records are handed to
/// the sink as soon as they are built; statistics accumulate in the
/// collector, which stays with the caller.
pub struct StreamingConverter<'a> {
    collector: &'a mut AggregateCollector,
    missing_user: MissingUserPolicy,
    stop: Option<StopSignal>,
    max_elements: Option<u64>,
}

impl<'a> StreamingConverter<'a> {
    pub fn new(collector: &'a mut AggregateCollector) -> Self {
        StreamingConverter {
            collector,
            missing_user: MissingUserPolicy::default(),
            stop: None,
            max_elements: None,
        }
    }

    pub fn with_missing_user(mut self, policy: MissingUserPolicy) -> Self {
        self.missing_user = policy;
        self
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn with_max_elements(mut self, max_elements: Option<u64>) -> Self {
        self.max_elements = max_elements;
        self
    }

    fn should_stop(&self, summary: &ConversionSummary) -> bool {
        self.stop.as_ref().is_some_and(StopSignal::is_stop_requested)
            || self.max_elements.is_some_and(|max| summary.elements_seen >= max)
    }

    pub fn run<I, S>(&mut self, elements: I, sink: &mut S) -> Result<ConversionSummary>
    where
        I: IntoIterator<Item = Result<RawElement>>,
        S: RecordSink + ?Sized,
    {
        let mut summary = ConversionSummary::default();
        info!(missing_user = self.missing_user.label(); "Starting conversion pass");

        for element in elements {
            if self.should_stop(&summary) {
                summary.stopped_early = true;
                info!(elements_seen = summary.elements_seen; "Conversion stopped early");
                break;
            }
            self.process_element(&element?, sink, &mut summary)?;
        }

        info!(
            elements_seen = summary.elements_seen,
            records_written = summary.records_written,
            erroneous_tag_keys = summary.erroneous_tag_keys,
            skipped_users = summary.skipped_users;
            "Conversion pass finished"
        );
        Ok(summary)
    }

    fn process_element<S>(&mut self, element: &RawElement, sink: &mut S, summary: &mut ConversionSummary) -> Result<()>
    where
        S: RecordSink + ?Sized,
    {
        summary.elements_seen += 1;

        if element.name == "tag" {
            let key = element.required_attribute("k")?;
            let classification = classify(key);
            self.collector.record_classification(classification);
            if classification.is_error() {
                summary.erroneous_tag_keys += 1;
                debug!(key = key, classification = classification.label(); "Erroneous tag key");
            }
        }

        self.collector.record_tag(&element.name);

        if counts_contributions(&element.name) {
            match (element.attribute("user"), self.missing_user) {
                (Some(user), _) => self.collector.record_user(&element.name, user),
                (None, MissingUserPolicy::Fail) => {
                    return Err(format!(
                        "<{}> element {} has no 'user' attribute",
                        element.name,
                        element.attribute("id").unwrap_or("without id"),
                    ).into());
                },
                (None, MissingUserPolicy::Skip) => {
                    summary.skipped_users += 1;
                    warn!(element = element.name.as_str(), id = element.attribute("id").unwrap_or(""); "Element has no user, not counted");
                },
            }
        }

        if let Some(record) = normalize(element)? {
            sink.accept(record)?;
            summary.records_written += 1;
        }
        Ok(())
    }
}
