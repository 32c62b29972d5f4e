use serde::Serialize;

/// Column order of each output table. Must match the field order of the row structs.
pub const NODE_FIELDS: [&str; 8] = ["id", "lat", "lon", "user", "uid", "version", "changeset", "timestamp"];
pub const NODE_TAGS_FIELDS: [&str; 4] = ["id", "key", "value", "type"];
pub const WAY_FIELDS: [&str; 6] = ["id", "user", "uid", "version", "changeset", "timestamp"];
pub const WAY_TAGS_FIELDS: [&str; 4] = ["id", "key", "value", "type"];
pub const WAY_NODES_FIELDS: [&str; 3] = ["id", "node_id", "position"];

/// Tag type used for keys without a namespace prefix.
pub const REGULAR_TAG_TYPE: &str = "regular";

/// Lat/lon are kept as the exact text found in the document.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct NodeRow {
    pub id: String,
    pub lat: String,
    pub lon: String,
    pub user: String,
    pub uid: String,
    pub version: String,
    pub changeset: String,
    pub timestamp: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct WayRow {
    pub id: String,
    pub user: String,
    pub uid: String,
    pub version: String,
    pub changeset: String,
    pub timestamp: String,
}

/// Shared by node and way tags. `value` is empty when a postcode could not be repaired.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TagRow {
    pub id: String,
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub tag_type: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct WayNodeRow {
    pub id: String,
    pub node_id: String,
    pub position: usize,
}

/// All rows produced from a single element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapedElement {
    Node {
        node: NodeRow,
        tags: Vec<TagRow>,
    },
    Way {
        way: WayRow,
        way_nodes: Vec<WayNodeRow>,
        tags: Vec<TagRow>,
    },
}

impl ShapedElement {
    pub fn kind(&self) -> &'static str {
        match self {
            ShapedElement::Node { .. } => "node",
            ShapedElement::Way { .. } => "way",
        }
    }

    pub fn tags(&self) -> &[TagRow] {
        match self {
            ShapedElement::Node { tags, .. } => tags,
            ShapedElement::Way { tags, .. } => tags,
        }
    }
}
