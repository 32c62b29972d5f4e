use std::fs;
use std::path::Path;

use jsonschema::error::ValidationErrorKind;
use jsonschema::{JSONSchema, ValidationError};
use serde_json::Value;

use crate::data::rows::ShapedElement;
use crate::errors::{Error, Result};

const DEFAULT_SCHEMA: &str = include_str!("../../schemas/osm_elements.json");

/// Checks the node/way attribute rows (not their tags) against a JSON schema document
/// holding one schema per element kind under the keys `node` and `way`.
pub struct SchemaValidator {
    node: JSONSchema,
    way: JSONSchema,
}

fn compile(document: &Value, kind: &str) -> Result<JSONSchema> {
    let schema = document
        .get(kind)
        .ok_or_else(|| Error::Config(format!("schema has no '{}' entry", kind)))?;
    JSONSchema::compile(schema)
        .map_err(|err| Error::Config(format!("invalid '{}' schema: {}", kind, err)))
}

/// Name of the offending field: the instance path, or the missing property for `required`.
fn field_name(error: &ValidationError) -> String {
    if let ValidationErrorKind::Required { property } = &error.kind {
        return match property {
            Value::String(name) => name.clone(),
            other => other.to_string(),
        };
    }
    let path = error.instance_path.to_string();
    let field = path.trim_start_matches('/');
    if field.is_empty() {
        "<record>".to_string()
    } else {
        field.to_string()
    }
}

impl SchemaValidator {
    pub fn new() -> Result<SchemaValidator> {
        let document: Value = serde_json::from_str(DEFAULT_SCHEMA)?;
        SchemaValidator::from_value(&document)
    }

    pub fn from_path(path: &Path) -> Result<SchemaValidator> {
        let document: Value = serde_json::from_str(&fs::read_to_string(path)?)?;
        SchemaValidator::from_value(&document)
    }

    pub fn from_value(document: &Value) -> Result<SchemaValidator> {
        Ok(SchemaValidator {
            node: compile(document, "node")?,
            way: compile(document, "way")?,
        })
    }

    /// Fails with [`Error::Validation`] describing the first violation found.
    pub fn validate(&self, shaped: &ShapedElement) -> Result<()> {
        let (schema, instance) = match shaped {
            ShapedElement::Node { node, .. } => (&self.node, serde_json::to_value(node)?),
            ShapedElement::Way { way, .. } => (&self.way, serde_json::to_value(way)?),
        };
        let first_error = match schema.validate(&instance) {
            Ok(()) => return Ok(()),
            Err(mut errors) => errors.next(),
        };
        let (field, detail) = match first_error {
            Some(error) => (field_name(&error), error.to_string()),
            None => ("<record>".to_string(), "rejected by schema".to_string()),
        };
        Err(Error::Validation {
            element: shaped.kind().to_string(),
            field,
            detail,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::data::rows::{NodeRow, WayRow};

    fn node_row() -> NodeRow {
        NodeRow {
            id: "1".to_string(),
            lat: "18.5204".to_string(),
            lon: "73.8567".to_string(),
            user: "punekar".to_string(),
            uid: "42".to_string(),
            version: "1".to_string(),
            changeset: "100".to_string(),
            timestamp: "2017-01-01T00:00:00Z".to_string(),
        }
    }

    fn way_row() -> WayRow {
        WayRow {
            id: "10".to_string(),
            user: "punekar".to_string(),
            uid: "42".to_string(),
            version: "2".to_string(),
            changeset: "100".to_string(),
            timestamp: "2017-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn accepts_well_formed_rows() {
        let validator = SchemaValidator::new().unwrap();
        let node = ShapedElement::Node { node: node_row(), tags: Vec::new() };
        let way = ShapedElement::Way { way: way_row(), way_nodes: Vec::new(), tags: Vec::new() };
        assert!(validator.validate(&node).is_ok());
        assert!(validator.validate(&way).is_ok());
    }

    #[test]
    fn reports_offending_field() {
        let validator = SchemaValidator::new().unwrap();
        let mut node = node_row();
        node.lat = "north".to_string();
        let shaped = ShapedElement::Node { node, tags: Vec::new() };
        match validator.validate(&shaped) {
            Err(Error::Validation { element, field, detail }) => {
                assert_eq!(element, "node");
                assert_eq!(field, "lat");
                assert!(detail.contains("north"));
            },
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn reports_missing_property() {
        let document = json!({
            "node": { "type": "object", "required": ["elevation"] },
            "way": { "type": "object" },
        });
        let validator = SchemaValidator::from_value(&document).unwrap();
        let shaped = ShapedElement::Node { node: node_row(), tags: Vec::new() };
        match validator.validate(&shaped) {
            Err(Error::Validation { field, .. }) => assert_eq!(field, "elevation"),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn schema_without_kind_is_a_config_error() {
        let result = SchemaValidator::from_value(&json!({ "node": {} }));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
