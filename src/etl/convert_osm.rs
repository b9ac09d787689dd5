use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::data::audit::Aggregates;
use crate::data::osm::RawElement;
use crate::errors::Result;
use crate::etl::aggregate::AggregateCollector;
use crate::etl::read_osm::open_osm_file;
use crate::etl::sink::JsonLinesSink;
use crate::etl::stream::{ConversionSummary, StopSignal, StreamingConverter};
use crate::etl::Etl;
use crate::UserConfig;

pub const ETL_NAME: &str = "convert_osm";
pub const RECORDS_FILE_NAME: &str = "elements.json";
pub const METADATA_FILE_NAME: &str = "metadata.json";
/// Outputs carry this suffix until a pass has read the whole input.
pub const PARTIAL_SUFFIX: &str = ".partial";

type ElementStream = Box<dyn Iterator<Item = Result<RawElement>>>;

pub fn partial_path(dir: &Path, file_name: &str) -> PathBuf {
    dir.join(format!("{}{}", file_name, PARTIAL_SUFFIX))
}

pub struct ConvertInput {
    elements: ElementStream,
    records: JsonLinesSink<BufWriter<fs::File>>,
    records_path: PathBuf,
}

/// Turns the .osm file into a file of store documents plus the audit
/// statistics gathered on the way.
///
/// Both files are written under `.partial` names and only moved to their
/// final names once the whole input was read, so a failed or stopped pass
/// never looks like a cached result.
pub struct ConvertOsmEtl<'a> {
    config: &'a UserConfig,
    stop: StopSignal,
    summary: Option<ConversionSummary>,
}

impl<'a> ConvertOsmEtl<'a> {
    pub fn new(config: &'a UserConfig) -> Self {
        ConvertOsmEtl {
            config,
            stop: StopSignal::new(),
            summary: None,
        }
    }

    /// Handle for stopping a running pass from another thread, for callers
    /// that embed the stage. The command line driver stops through
    /// `max_elements` only.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Counters of the last pass, if one ran.
    pub fn summary(&self) -> Option<ConversionSummary> {
        self.summary
    }

    fn stopped_early(&self) -> bool {
        self.summary.is_some_and(|summary| summary.stopped_early)
    }
}

impl Etl for ConvertOsmEtl<'_> {
    type Input = ConvertInput;
    type Output = Aggregates;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn output_file_names(&self) -> Vec<&str> {
        vec![RECORDS_FILE_NAME, METADATA_FILE_NAME]
    }

    fn extract(&mut self, dir: &Path) -> Result<Self::Input> {
        let reader = open_osm_file(Path::new(&self.config.data_path))?;
        let elements: ElementStream = if self.config.show_progress {
            Box::new(tqdm::tqdm(reader))
        } else {
            Box::new(reader)
        };
        let records_path = partial_path(dir, RECORDS_FILE_NAME);
        let records_file = fs::File::create(&records_path)?;
        Ok(ConvertInput {
            elements,
            records: JsonLinesSink::new(BufWriter::new(records_file), self.config.pretty),
            records_path,
        })
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        let ConvertInput { elements, mut records, records_path } = input;
        let mut collector = AggregateCollector::new();

        let result = StreamingConverter::new(&mut collector)
            .with_missing_user(self.config.missing_user)
            .with_stop_signal(self.stop.clone())
            .with_max_elements(self.config.max_elements)
            .run(elements, &mut records);
        let result = result.and_then(|summary| records.into_inner().map(|_| summary));

        let summary = match result {
            Ok(summary) => summary,
            Err(err) => {
                if let Err(remove_err) = fs::remove_file(&records_path) {
                    warn!(path = records_path.display().to_string().as_str(), err = remove_err.to_string().as_str(); "Could not remove partial records");
                }
                return Err(err);
            },
        };

        self.summary = Some(summary);
        Ok(collector.finalize())
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        let metadata_path = partial_path(dir, METADATA_FILE_NAME);
        let metadata_file = fs::File::create(&metadata_path)?;
        let mut sink = JsonLinesSink::new(BufWriter::new(metadata_file), self.config.pretty);
        for snapshot in output.snapshots() {
            sink.write_value(snapshot)?;
        }
        sink.into_inner()?;

        if self.stopped_early() {
            info!(etl_name = ETL_NAME, suffix = PARTIAL_SUFFIX; "Stopped before the end of the input, outputs left under partial names");
            return Ok(());
        }
        // Metadata last: the stage only counts as cached once both are in place.
        fs::rename(partial_path(dir, RECORDS_FILE_NAME), dir.join(RECORDS_FILE_NAME))?;
        fs::rename(metadata_path, dir.join(METADATA_FILE_NAME))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader};

    use serde_json::{json, Value};

    use super::*;
    use crate::data::audit::TaggedCounts;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6">
  <node id="1" lat="60.1" lon="24.9" user="alice">
    <tag k="amenity" v="cafe"/>
  </node>
  <way id="2" user="bob">
    <nd ref="1"/>
  </way>
</osm>"#;

    fn config_for(data_path: &Path, dest_path: &Path) -> UserConfig {
        serde_json::from_value(json!({
            "data_path": data_path,
            "dest_path": dest_path,
        })).unwrap()
    }

    fn sample_input(dir: &Path) -> PathBuf {
        let input_path = dir.join("sample.osm");
        fs::write(&input_path, SAMPLE).unwrap();
        input_path
    }

    fn read_lines(path: &Path) -> Vec<Value> {
        BufReader::new(fs::File::open(path).unwrap())
            .lines()
            .map(|line| serde_json::from_str(&line.unwrap()).unwrap())
            .collect()
    }

    #[test]
    fn writes_records_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = sample_input(dir.path());
        let config = config_for(&input_path, dir.path());

        let mut etl = ConvertOsmEtl::new(&config);
        etl.process(dir.path()).unwrap();

        let records = read_lines(&dir.path().join(RECORDS_FILE_NAME));
        assert_eq!(records, vec![
            json!({"type": "node", "pos": [60.1, 24.9], "id": "1",
                   "created": {"user": "alice"}, "amenity": "cafe"}),
            json!({"type": "way", "pos": [], "id": "2",
                   "created": {"user": "bob"}, "node_refs": ["1"]}),
        ]);

        let metadata: Vec<TaggedCounts> = read_lines(&dir.path().join(METADATA_FILE_NAME))
            .into_iter()
            .map(|value| serde_json::from_value(value).unwrap())
            .collect();
        let ids: Vec<_> = metadata.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["tags", "errors", "users"]);
        assert_eq!(metadata[0].get("node"), 1);
        assert_eq!(metadata[0].get("osm"), 1);
        assert_eq!(metadata[1].get("lower"), 1);
        assert_eq!(metadata[2].get("bob"), 1);

        let summary = etl.summary().unwrap();
        assert_eq!(summary.records_written, 2);
        assert!(!summary.stopped_early);
    }

    #[test]
    fn cached_outputs_skip_the_pass() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = sample_input(dir.path());
        let config = config_for(&input_path, dir.path());

        ConvertOsmEtl::new(&config).process(dir.path()).unwrap();
        let mut second = ConvertOsmEtl::new(&config);
        assert!(second.is_cached(dir.path()).unwrap());
        second.process(dir.path()).unwrap();
        assert!(second.summary().is_none());

        second.clean(dir.path()).unwrap();
        assert!(!second.is_cached(dir.path()).unwrap());
        second.clean(dir.path()).unwrap();
    }

    #[test]
    fn missing_input_fails_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(&dir.path().join("nope.osm"), dir.path());
        let err = ConvertOsmEtl::new(&config).process(dir.path()).unwrap_err();
        assert!(err.message.contains("nope.osm"), "{}", err.message);
    }

    #[test]
    fn malformed_input_leaves_no_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("broken.osm");
        fs::write(&input_path, "<osm><node id=\"1\" user=\"a\"></osm>").unwrap();
        let config = config_for(&input_path, dir.path());
        assert!(ConvertOsmEtl::new(&config).process(dir.path()).is_err());
        assert!(!dir.path().join(METADATA_FILE_NAME).exists());
        assert!(!dir.path().join(RECORDS_FILE_NAME).exists());
        assert!(!partial_path(dir.path(), RECORDS_FILE_NAME).exists());
    }

    #[test]
    fn limited_pass_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = sample_input(dir.path());
        let mut limited_config = config_for(&input_path, dir.path());
        limited_config.max_elements = Some(1);

        let mut limited = ConvertOsmEtl::new(&limited_config);
        limited.process(dir.path()).unwrap();
        assert!(limited.summary().unwrap().stopped_early);
        assert!(!limited.is_cached(dir.path()).unwrap());
        assert!(!dir.path().join(RECORDS_FILE_NAME).exists());
        assert!(partial_path(dir.path(), RECORDS_FILE_NAME).exists());
        assert!(partial_path(dir.path(), METADATA_FILE_NAME).exists());

        let config = config_for(&input_path, dir.path());
        let mut full = ConvertOsmEtl::new(&config);
        full.process(dir.path()).unwrap();
        assert_eq!(full.summary().unwrap().records_written, 2);
        assert_eq!(read_lines(&dir.path().join(RECORDS_FILE_NAME)).len(), 2);
        assert!(full.is_cached(dir.path()).unwrap());
    }

    #[test]
    fn requested_stop_keeps_outputs_partial() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = sample_input(dir.path());
        let config = config_for(&input_path, dir.path());

        let mut etl = ConvertOsmEtl::new(&config);
        etl.stop_signal().request_stop();
        etl.process(dir.path()).unwrap();

        let summary = etl.summary().unwrap();
        assert!(summary.stopped_early);
        assert_eq!(summary.elements_seen, 0);
        assert!(!etl.is_cached(dir.path()).unwrap());
        assert!(read_lines(&partial_path(dir.path(), RECORDS_FILE_NAME)).is_empty());
    }
}
