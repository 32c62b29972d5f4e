use std::fs::File;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Serialize;

use crate::config::UserConfig;
use crate::data::audit::AuditReport;
use crate::data::osm::RawElement;
use crate::data::rows::ShapedElement;
use crate::errors::Result;
use crate::etl::normalize::NormalizationRules;
use crate::etl::parse_osm::{ElementStream, OSM_ELEMENT_KINDS};
use crate::etl::schema::SchemaValidator;
use crate::etl::shape::shape_element;
use crate::etl::sink::{CsvSinks, RowSink};
use crate::etl::{remove_if_exists, write_json, Etl};

pub const ETL_NAME: &str = "convert";
pub const AUDIT_REPORT_FILE_NAME: &str = "audit_report.json";

#[derive(Serialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConversionStats {
    pub nodes: usize,
    pub node_tags: usize,
    pub ways: usize,
    pub way_nodes: usize,
    pub way_tags: usize,
}

#[derive(Serialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub stats: ConversionStats,
    #[serde(flatten)]
    pub report: AuditReport,
}

/// Shapes every element, optionally validates it, and hands its rows to `sink`.
///
/// The first parse, missing-attribute or validation error aborts the run. Rows already
/// handed to the sink are not taken back.
pub fn process_map<I, S>(
    elements: I,
    sink: &mut S,
    rules: &NormalizationRules,
    validator: Option<&SchemaValidator>,
) -> Result<Conversion>
where
    I: IntoIterator<Item = Result<RawElement>>,
    S: RowSink + ?Sized,
{
    let mut conversion = Conversion::default();

    for element in elements {
        let element = element?;
        let Some(shaped) = shape_element(&element, rules, &mut conversion.report)? else {
            continue;
        };
        if let Some(validator) = validator {
            validator.validate(&shaped)?;
        }

        let stats = &mut conversion.stats;
        match &shaped {
            ShapedElement::Node { node, tags } => {
                sink.write_node(node, tags)?;
                stats.nodes += 1;
                stats.node_tags += tags.len();
            },
            ShapedElement::Way { way, way_nodes, tags } => {
                sink.write_way(way, way_nodes, tags)?;
                stats.ways += 1;
                stats.way_nodes += way_nodes.len();
                stats.way_tags += tags.len();
            },
        }
    }

    sink.flush()?;
    Ok(conversion)
}

pub struct ConvertInput {
    elements: ElementStream<Box<dyn BufRead>>,
    sinks: CsvSinks<File>,
    validator: Option<SchemaValidator>,
}

/// Converts the configured document into the five CSV tables plus `audit_report.json`.
pub struct ConvertEtl<'a> {
    config: &'a UserConfig,
    rules: NormalizationRules,
}

impl ConvertEtl<'_> {
    fn output_paths(dir: &Path) -> Vec<PathBuf> {
        let mut paths = CsvSinks::<File>::output_paths(dir);
        paths.push(dir.join(AUDIT_REPORT_FILE_NAME));
        paths
    }

    fn create_validator(&self) -> Result<Option<SchemaValidator>> {
        if !self.config.validate {
            return Ok(None);
        }
        let validator = match &self.config.schema_file {
            Some(path) => SchemaValidator::from_path(path)?,
            None => SchemaValidator::new()?,
        };
        Ok(Some(validator))
    }

    pub fn new(config: &UserConfig) -> ConvertEtl {
        ConvertEtl {
            config,
            rules: config.rules(),
        }
    }
}

impl Etl for ConvertEtl<'_> {
    type Input = ConvertInput;
    type Output = Conversion;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn is_cached(&self, dir: &Path) -> Result<bool> {
        for path in Self::output_paths(dir) {
            if !path.try_exists()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn clean(&self, dir: &Path) -> Result<()> {
        for path in Self::output_paths(dir) {
            remove_if_exists(&path)?;
        }
        Ok(())
    }

    fn extract(&mut self, dir: &Path) -> Result<Self::Input> {
        Ok(ConvertInput {
            elements: ElementStream::from_path(&self.config.osm_file, &OSM_ELEMENT_KINDS)?,
            sinks: CsvSinks::<File>::create(dir)?,
            validator: self.create_validator()?,
        })
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        let ConvertInput { elements, mut sinks, validator } = input;
        let elements: Box<dyn Iterator<Item = Result<RawElement>>> = if self.config.show_progress {
            Box::new(tqdm::tqdm(elements))
        } else {
            Box::new(elements)
        };
        process_map(elements, &mut sinks, &self.rules, validator.as_ref())
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        let stats = &output.stats;
        info!(
            etl_name = self.etl_name(),
            nodes = stats.nodes,
            node_tags = stats.node_tags,
            ways = stats.ways,
            way_nodes = stats.way_nodes,
            way_tags = stats.way_tags,
            bots = output.report.bots.len(),
            malformed_postcodes = output.report.malformed_postcodes.len();
            "Conversion summary"
        );
        for user in &output.report.bots {
            warn!(user = user.as_str(); "Bot-like username");
        }
        for code in &output.report.malformed_postcodes {
            warn!(postcode = code.as_str(); "Unrecognised postal code");
        }
        write_json(&dir.join(AUDIT_REPORT_FILE_NAME), &output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use crate::etl::sink::RowBuffer;

    const DOC: &str = r#"<osm>
  <node id="1" lat="18.52" lon="73.85" user="RoboBot99" uid="1" version="1" changeset="5" timestamp="2017-01-01T00:00:00Z">
    <tag k="addr:postcode" v="999999"/>
    <tag k="amenity" v="cafe"/>
  </node>
  <way id="2" user="Robert" uid="2" version="1" changeset="5" timestamp="2017-01-01T00:00:00Z">
    <nd ref="1"/>
    <nd ref="1"/>
    <tag k="addr:street" v="MG Rd"/>
  </way>
  <relation id="3" user="x" uid="3" version="1" changeset="5" timestamp="2017-01-01T00:00:00Z"/>
</osm>"#;

    fn elements(xml: &str) -> ElementStream<&[u8]> {
        ElementStream::from_reader(xml.as_bytes(), &OSM_ELEMENT_KINDS)
    }

    #[test]
    fn routes_rows_and_collects_diagnostics() {
        let mut buffer = RowBuffer::default();
        let validator = SchemaValidator::new().unwrap();
        let conversion = process_map(elements(DOC), &mut buffer, &NormalizationRules::default(), Some(&validator)).unwrap();

        assert_eq!(buffer.nodes.len(), 1);
        assert_eq!(buffer.node_tags.len(), 2);
        assert_eq!(buffer.node_tags[0].value, "");
        assert_eq!(buffer.ways.len(), 1);
        assert_eq!(buffer.way_nodes.iter().map(|row| row.position).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(buffer.way_tags[0].value, "MG Road");

        assert_eq!(conversion.stats, ConversionStats { nodes: 1, node_tags: 2, ways: 1, way_nodes: 2, way_tags: 1 });
        assert_eq!(conversion.report.bots.iter().collect::<Vec<_>>(), vec!["RoboBot99"]);
        assert!(conversion.report.malformed_postcodes.contains("999999"));
    }

    #[test]
    fn invalid_record_aborts_when_validating() {
        let doc = r#"<osm>
  <node id="1" lat="18.52" lon="73.85" user="a" uid="1" version="1" changeset="5" timestamp="2017-01-01T00:00:00Z"/>
  <node id="x2" lat="18.52" lon="73.85" user="a" uid="1" version="1" changeset="5" timestamp="2017-01-01T00:00:00Z"/>
  <node id="3" lat="18.52" lon="73.85" user="a" uid="1" version="1" changeset="5" timestamp="2017-01-01T00:00:00Z"/>
</osm>"#;
        let mut buffer = RowBuffer::default();
        let validator = SchemaValidator::new().unwrap();
        let result = process_map(elements(doc), &mut buffer, &NormalizationRules::default(), Some(&validator));
        assert!(matches!(result, Err(Error::Validation { ref field, .. }) if field == "id"));
        assert_eq!(buffer.nodes.len(), 1);

        let mut buffer = RowBuffer::default();
        process_map(elements(doc), &mut buffer, &NormalizationRules::default(), None).unwrap();
        assert_eq!(buffer.nodes.len(), 3);
    }

    #[test]
    fn parse_error_aborts_the_run() {
        let mut buffer = RowBuffer::default();
        let result = process_map(elements("<osm><node id=\"1\">"), &mut buffer, &NormalizationRules::default(), None);
        assert!(matches!(result, Err(Error::Parse(_))));
        assert!(buffer.nodes.is_empty());
    }

    #[test]
    fn etl_writes_tables_and_report() {
        let workdir = tempfile::tempdir().unwrap();
        let osm_file = workdir.path().join("pune.osm");
        std::fs::write(&osm_file, DOC).unwrap();
        let mut config = UserConfig::for_file(&osm_file);
        config.output_root = workdir.path().join("output");
        let dir = crate::config::create_output_dir(&config).unwrap();

        let mut etl = ConvertEtl::new(&config);
        assert!(!etl.is_cached(&dir).unwrap());
        etl.process(&dir).unwrap();
        assert!(etl.is_cached(&dir).unwrap());

        let ways_nodes = std::fs::read_to_string(dir.join("ways_nodes.csv")).unwrap();
        assert_eq!(ways_nodes, "id,node_id,position\n2,1,0\n2,1,1\n");
        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join(AUDIT_REPORT_FILE_NAME)).unwrap()).unwrap();
        assert_eq!(report["bots"], serde_json::json!(["RoboBot99"]));
        assert_eq!(report["stats"]["way_nodes"], 2);

        etl.clean(&dir).unwrap();
        assert!(!etl.is_cached(&dir).unwrap());
        assert!(!dir.join("nodes.csv").exists());
    }
}
