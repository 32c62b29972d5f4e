use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use log::info;
use regex::Regex;

use crate::config::UserConfig;
use crate::data::audit::StreetTypes;
use crate::data::osm::RawElement;
use crate::errors::Result;
use crate::etl::parse_osm::{ElementStream, OSM_ELEMENT_KINDS};
use crate::etl::{remove_if_exists, write_json, Etl};

pub const ETL_NAME: &str = "audit_streets";
pub const OUTPUT_FILE_NAME: &str = "street_types.json";

/// Last word of a street name, keeping one trailing period ("Rd.").
static STREET_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\S+\.?$").expect("Invalid street type regex")
});

pub fn is_street_name(key: &str) -> bool {
    key == "addr:street"
}

/// Files `street_name` under its trailing word.
pub fn audit_street_type(street_types: &mut StreetTypes, street_name: &str) {
    if let Some(street_type) = STREET_TYPE.find(street_name) {
        street_types.add(street_type.as_str(), street_name);
    }
}

/// Tabulates the `addr:street` values of every node and way in `elements`.
///
/// Running it again over the same document only re-adds names already present.
pub fn audit_street_types<I>(elements: I, street_types: &mut StreetTypes) -> Result<()>
where
    I: IntoIterator<Item = Result<RawElement>>,
{
    for element in elements {
        let element = element?;
        if !OSM_ELEMENT_KINDS.contains(&element.name.as_str()) {
            continue;
        }
        for tag in element.tags() {
            if let (Some(key), Some(value)) = (tag.attribute("k"), tag.attribute("v")) {
                if is_street_name(key) {
                    audit_street_type(street_types, value);
                }
            }
        }
    }
    Ok(())
}

pub struct StreetAuditEtl<'a> {
    config: &'a UserConfig,
}

impl StreetAuditEtl<'_> {
    fn output_path(dir: &Path) -> PathBuf {
        dir.join(OUTPUT_FILE_NAME)
    }

    pub fn new(config: &UserConfig) -> StreetAuditEtl {
        StreetAuditEtl {
            config
        }
    }
}

impl Etl for StreetAuditEtl<'_> {
    type Input = ElementStream<Box<dyn BufRead>>;
    type Output = StreetTypes;

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
        ElementStream::from_path(&self.config.osm_file, &OSM_ELEMENT_KINDS)
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        let mut street_types = StreetTypes::new();
        audit_street_types(input, &mut street_types)?;
        Ok(street_types)
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        info!(etl_name = self.etl_name(), street_types = output.len(); "Street types found");
        write_json(&Self::output_path(dir), &output)
    }
}
