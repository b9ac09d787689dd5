mod etl;
mod data;
mod errors;

use std::env;
use std::fs::{create_dir_all, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use log::info;
use serde::Deserialize;
use structured_logger::json::new_writer;
use structured_logger::Builder;

use crate::etl::convert_osm::ConvertOsmEtl;
use crate::etl::key_report::KeyReportEtl;
use crate::etl::stream::MissingUserPolicy;
use crate::etl::Etl;
use crate::errors::Result;

const DEFAULT_CONFIG_PATH: &str = "config/default.json";

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Deserialize, Debug)]
pub struct UserConfig {
    /// The .osm export to convert, optionally xz compressed.
    pub data_path: String,
    /// Outputs go into a directory named after the input file under here.
    pub dest_path: String,
    #[serde(default)]
    pub pretty: bool,
    #[serde(default)]
    pub missing_user: MissingUserPolicy,
    #[serde(default)]
    pub max_elements: Option<u64>,
    #[serde(default)]
    pub show_progress: bool,
    #[serde(default)]
    pub rebuild: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn load_user_config(path: &str) -> Result<UserConfig> {
    let file = File::open(path)
        .map_err(|err| format!("Could not open config file {}: {}", path, err))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn create_output_dir(config: &UserConfig) -> Result<PathBuf> {
    let input_fname = Path::new(&config.data_path)
        .file_name()
        .ok_or("Could not get input file name")?;
    let output_dir = Path::new(&config.dest_path).join(input_fname);
    create_dir_all(&output_dir)?;
    Ok(output_dir)
}

fn setup_logging(level: &str) {
    Builder::with_level(level)
        .with_target_writer("*", new_writer(io::stdout()))
        .init();
}

fn main() -> Result<()> {
    let config_path = env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let user_config = load_user_config(&config_path)?;
    setup_logging(&user_config.log_level);

    let output_dir = create_output_dir(&user_config)?;
    info!(output_dir = output_dir.display().to_string().as_str(); "Writing outputs");

    let mut convert = ConvertOsmEtl::new(&user_config);
    let mut key_report = KeyReportEtl::new();
    if user_config.rebuild {
        convert.clean(&output_dir)?;
        key_report.clean(&output_dir)?;
    }

    convert.process(&output_dir)?;
    if let Some(summary) = convert.summary() {
        info!(
            elements_seen = summary.elements_seen,
            records_written = summary.records_written,
            erroneous_tag_keys = summary.erroneous_tag_keys,
            stopped_early = summary.stopped_early;
            "Conversion summary"
        );
    }
    // A stopped pass leaves no records under the final name to report on.
    if convert.summary().is_some_and(|summary| summary.stopped_early) {
        info!(etl_name = key_report.etl_name(); "Skipped, conversion did not finish");
        return Ok(());
    }
    key_report.process(&output_dir)?;

    Ok(())
}
