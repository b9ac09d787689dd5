use std::collections::BTreeSet;
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use log::info;
use serde_json::{Map, Value};

use crate::errors::Result;
use crate::etl::convert_osm::RECORDS_FILE_NAME;
use crate::etl::Etl;

pub const ETL_NAME: &str = "key_report";
pub const OUTPUT_FILE_NAME: &str = "keys.txt";

/// Lists every top level key used by any converted record, one per line.
#[derive(Default)]
pub struct KeyReportEtl {
}

impl KeyReportEtl {
    pub fn new() -> KeyReportEtl {
        KeyReportEtl {}
    }
}

impl Etl for KeyReportEtl {
    type Input = BufReader<fs::File>;
    type Output = BTreeSet<String>;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn output_file_names(&self) -> Vec<&str> {
        vec![OUTPUT_FILE_NAME]
    }

    fn extract(&mut self, dir: &Path) -> Result<Self::Input> {
        Ok(BufReader::new(fs::File::open(dir.join(RECORDS_FILE_NAME))?))
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        let mut keys = BTreeSet::new();
        // Works for both compact and indented records.
        for record in serde_json::Deserializer::from_reader(input).into_iter::<Map<String, Value>>() {
            keys.extend(record?.into_iter().map(|(key, _)| key));
        }
        info!(etl_name = ETL_NAME, distinct_keys = keys.len(); "Collected record keys");
        Ok(keys)
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        let mut output_file = BufWriter::new(fs::File::create(dir.join(OUTPUT_FILE_NAME))?);
        for key in &output {
            writeln!(output_file, "{}", key)?;
        }
        output_file.flush()?;
        Ok(())
    }
}
