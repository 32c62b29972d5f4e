use std::collections::BTreeMap;

use crate::errors::{Error, Result};

/// A direct child of a captured element, e.g. `<tag k=".." v=".."/>` or `<nd ref=".."/>`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawChild {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
}

/// One top-level OSM element as read from the document, together with its direct children
/// in document order. Deeper descendants are not kept.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawElement {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<RawChild>,
}

impl RawChild {
    pub fn new(name: &str) -> RawChild {
        RawChild {
            name: name.to_string(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: &str, value: &str) -> RawChild {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.attribute(key)
            .ok_or_else(|| Error::missing_attribute(&self.name, key))
    }
}

impl RawElement {
    pub fn new(name: &str) -> RawElement {
        RawElement {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, key: &str, value: &str) -> RawElement {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_child(mut self, child: RawChild) -> RawElement {
        self.children.push(child);
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.attribute(key)
            .ok_or_else(|| Error::missing_attribute(&self.name, key))
    }

    /// Children named `tag`, in document order.
    pub fn tags(&self) -> impl Iterator<Item = &RawChild> {
        self.children.iter().filter(|child| child.name == "tag")
    }
}
