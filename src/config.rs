use std::collections::BTreeMap;
use std::fs::{create_dir_all, File};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::{Error, Result};
use crate::etl::normalize::NormalizationRules;

fn default_output_root() -> PathBuf {
    PathBuf::from("output")
}

fn default_validate() -> bool {
    true
}

#[derive(Deserialize, Debug, Clone)]
pub struct UserConfig {
    /// `.osm` document, optionally `.xz` compressed.
    pub osm_file: PathBuf,
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
    #[serde(default = "default_validate")]
    pub validate: bool,
    #[serde(default)]
    pub show_progress: bool,
    /// Replaces the embedded element schema when set.
    #[serde(default)]
    pub schema_file: Option<PathBuf>,
    #[serde(default)]
    pub street_mapping: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub key_aliases: Option<BTreeMap<String, String>>,
}

impl UserConfig {
    pub fn for_file(osm_file: impl Into<PathBuf>) -> UserConfig {
        UserConfig {
            osm_file: osm_file.into(),
            output_root: default_output_root(),
            validate: default_validate(),
            show_progress: false,
            schema_file: None,
            street_mapping: None,
            key_aliases: None,
        }
    }

    pub fn rules(&self) -> NormalizationRules {
        let defaults = NormalizationRules::default();
        NormalizationRules {
            street_mapping: self.street_mapping.clone().unwrap_or(defaults.street_mapping),
            key_aliases: self.key_aliases.clone().unwrap_or(defaults.key_aliases),
        }
    }

    pub fn output_dir(&self) -> Result<PathBuf> {
        let input_fname = self.osm_file
            .file_name()
            .ok_or_else(|| Error::Config(format!("'{}' has no file name", self.osm_file.display())))?;
        Ok(self.output_root.join(input_fname))
    }
}

pub fn load_user_config(path: &Path) -> Result<UserConfig> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(file)?)
}

pub fn create_output_dir(config: &UserConfig) -> Result<PathBuf> {
    let output_dir = config.output_dir()?;
    create_dir_all(&output_dir)?;
    Ok(output_dir)
}
