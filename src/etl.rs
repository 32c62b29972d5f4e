pub mod audit_streets;
pub mod census;
pub mod convert;
pub mod normalize;
pub mod parse_osm;
pub mod schema;
pub mod shape;
pub mod sink;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;
use log::{info, error};
use serde::Serialize;

use crate::errors::{Error, Result};


/// One pass over the input producing files in an output directory.
///
/// `process` skips the pass entirely when `is_cached` reports the outputs already exist;
/// call `clean` first to force a re-run.
pub trait Etl {
    type Input;
    type Output;

    fn etl_name(&self) -> &str;

    fn is_cached(&self, dir: &Path) -> Result<bool>;
    fn clean(&self, dir: &Path) -> Result<()>;

    fn extract(&mut self, dir: &Path) -> Result<Self::Input>;
    fn transform(&mut self, input: Self::Input) -> Result<Self::Output>;
    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()>;

    fn process(&mut self, dir: &Path) -> Result<()> {
        let etl_name = self.etl_name().to_string();
        info!(etl_name = etl_name.as_str(); "Starting ETL process");
        if self.is_cached(dir)? {
            info!(etl_name = etl_name.as_str(); "Using cached output");
            return Ok(());
        }

        let started = Instant::now();
        let input = self.extract(dir)
            .map_err(|err| log_failure(&etl_name, "extract", err))?;
        let output = self.transform(input)
            .map_err(|err| log_failure(&etl_name, "transform", err))?;
        self.load(dir, output)
            .map_err(|err| log_failure(&etl_name, "load", err))?;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(etl_name = etl_name.as_str(), elapsed_ms = elapsed_ms; "Process finished");
        Ok(())
    }
}

fn log_failure(etl_name: &str, phase: &str, err: Error) -> Error {
    error!(etl_name = etl_name, phase = phase, err = err.to_string().as_str(); "ETL phase failed");
    err
}

/// Removes `path` if a previous run left it behind.
pub(crate) fn remove_if_exists(path: &Path) -> Result<()> {
    if path.try_exists()? {
        fs::remove_file(path)?;
    }
    Ok(())
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}
