pub mod aggregate;
pub mod classify;
pub mod convert_osm;
pub mod key_report;
pub mod normalize;
pub mod read_osm;
pub mod sink;
pub mod stream;

use std::{fs, io, path::Path};
use log::{info, error};

use crate::errors::Result;


pub trait Etl {
    type Input;
    type Output;

    fn etl_name(&self) -> &str;

    /// Files this stage writes, relative to the output directory.
    fn output_file_names(&self) -> Vec<&str>;

    fn extract(&mut self, dir: &Path) -> Result<Self::Input>;
    fn transform(&mut self, input: Self::Input) -> Result<Self::Output>;
    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()>;

    fn is_cached(&self, dir: &Path) -> Result<bool> {
        for name in self.output_file_names() {
            if !dir.join(name).try_exists()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn clean(&self, dir: &Path) -> Result<()> {
        for name in self.output_file_names() {
            match fs::remove_file(dir.join(name)) {
                Err(err) if err.kind() != io::ErrorKind::NotFound => return Err(err.into()),
                _ => (),
            }
        }
        Ok(())
    }

    fn process(&mut self, dir: &Path) -> Result<()> {
        info!(etl_name = self.etl_name(); "Starting ETL process");
        if self.is_cached(dir)? {
            info!(etl_name = self.etl_name(); "Using cached value");
        } else {
            info!(etl_name = self.etl_name(); "Extracting");
            let input = match self.extract(dir) {
                Ok(input) => Ok(input),
                Err(err) => {
                    error!(etl_name = self.etl_name(), err = err.message.as_str(); "Extraction failed with error");
                    Err(err)
                },
            }?;

            info!(etl_name = self.etl_name(); "Transforming");
            let output = match self.transform(input) {
                Ok(output) => Ok(output),
                Err(err) => {
                    error!(etl_name = self.etl_name(), err = err.message.as_str(); "Transformation failed with error");
                    Err(err)
                },
            }?;

            info!(etl_name = self.etl_name(); "Loading");
            match self.load(dir, output) {
                Ok(_) => Ok(()),
                Err(err) => {
                    error!(etl_name = self.etl_name(), err = err.message.as_str(); "Loading failed with error");
                    Err(err)
                },
            }?;
        }
        info!(etl_name = self.etl_name(); "Process finished");
        Ok(())
    }
}
