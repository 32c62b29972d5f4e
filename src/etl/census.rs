use std::io::BufRead;
use std::path::{Path, PathBuf};

use log::info;

use crate::config::UserConfig;
use crate::data::audit::ElementCensus;
use crate::errors::Result;
use crate::etl::parse_osm::{count_element_names, open_osm_source};
use crate::etl::{remove_if_exists, write_json, Etl};

pub const ETL_NAME: &str = "census";
pub const OUTPUT_FILE_NAME: &str = "element_census.json";

/// Counts the element names of the configured document, to get a feel for its contents.
pub struct CensusEtl<'a> {
    config: &'a UserConfig,
}

impl CensusEtl<'_> {
    fn output_path(dir: &Path) -> PathBuf {
        dir.join(OUTPUT_FILE_NAME)
    }

    pub fn new(config: &UserConfig) -> CensusEtl {
        CensusEtl {
            config
        }
    }
}

impl Etl for CensusEtl<'_> {
    type Input = Box<dyn BufRead>;
    type Output = ElementCensus;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn is_cached(&self, dir: &Path) -> Result<bool> {
        Ok(Self::output_path(dir).try_exists()?)
    }

    fn clean(&self, dir: &Path) -> Result<()> {
        remove_if_exists(&Self::output_path(dir))
    }

    fn extract(&mut self, _dir: &Path) -> Result<Self::Input> {
        open_osm_source(&self.config.osm_file)
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        count_element_names(input)
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        info!(etl_name = self.etl_name(), element_names = output.0.len(); "Census complete");
        write_json(&Self::output_path(dir), &output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_census_once() {
        let workdir = tempfile::tempdir().unwrap();
        let osm_file = workdir.path().join("tiny.osm");
        std::fs::write(&osm_file, r#"<osm><node id="1"><tag k="a" v="b"/></node><node id="2"/></osm>"#).unwrap();
        let config = UserConfig::for_file(&osm_file);
        let dir = workdir.path();

        let mut etl = CensusEtl::new(&config);
        etl.process(dir).unwrap();
        let census: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join(OUTPUT_FILE_NAME)).unwrap()).unwrap();
        assert_eq!(census, serde_json::json!({"osm": 1, "node": 2, "tag": 1}));

        // A cached result is left untouched.
        std::fs::write(dir.join(OUTPUT_FILE_NAME), "{}").unwrap();
        etl.process(dir).unwrap();
        assert_eq!(std::fs::read_to_string(dir.join(OUTPUT_FILE_NAME)).unwrap(), "{}");
    }
}
