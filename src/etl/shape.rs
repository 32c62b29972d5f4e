//! Turns one [`RawElement`] into the rows of the five output tables.

use crate::data::audit::AuditReport;
use crate::data::osm::{RawChild, RawElement};
use crate::data::rows::{NodeRow, ShapedElement, TagRow, WayNodeRow, WayRow, REGULAR_TAG_TYPE};
use crate::errors::{Error, Result};
use crate::etl::normalize::{extract_phone, find_bots, update_name, validate_postcode, NormalizationRules};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagOwner {
    Node,
    Way,
}

/// Shapes a node or way. Any other element kind yields `None`.
///
/// Fails with [`Error::MissingAttribute`] when the element, one of its tags, or one of its
/// node references lacks a required attribute.
pub fn shape_element(
    element: &RawElement,
    rules: &NormalizationRules,
    report: &mut AuditReport,
) -> Result<Option<ShapedElement>> {
    match element.name.as_str() {
        "node" => Ok(Some(shape_node(element, rules, report)?)),
        "way" => Ok(Some(shape_way(element, rules, report)?)),
        _ => Ok(None),
    }
}

fn shape_node(element: &RawElement, rules: &NormalizationRules, report: &mut AuditReport) -> Result<ShapedElement> {
    let id = element.require("id")?;
    let version = element.require("version")?;
    let timestamp = element.require("timestamp")?;
    let changeset = element.require("changeset")?;
    let lat = element.require("lat")?;
    let lon = element.require("lon")?;
    let user = element.require("user")?;
    let uid = element.require("uid")?;

    find_bots(user, report);

    let tags = element.tags()
        .map(|tag| shape_tag(id, tag, TagOwner::Node, rules, report))
        .collect::<Result<Vec<_>>>()?;

    Ok(ShapedElement::Node {
        node: NodeRow {
            id: id.to_string(),
            lat: lat.to_string(),
            lon: lon.to_string(),
            user: user.to_string(),
            uid: uid.to_string(),
            version: version.to_string(),
            changeset: changeset.to_string(),
            timestamp: timestamp.to_string(),
        },
        tags,
    })
}

fn shape_way(element: &RawElement, rules: &NormalizationRules, report: &mut AuditReport) -> Result<ShapedElement> {
    let id = element.require("id")?;
    let version = element.require("version")?;
    let timestamp = element.require("timestamp")?;
    let changeset = element.require("changeset")?;
    let user = element.require("user")?;
    let uid = element.require("uid")?;

    find_bots(user, report);

    let mut way_nodes = Vec::new();
    let mut tags = Vec::new();
    let mut position = 0;
    for child in &element.children {
        match child.name.as_str() {
            "nd" => {
                way_nodes.push(WayNodeRow {
                    id: id.to_string(),
                    node_id: child.require("ref")?.to_string(),
                    position,
                });
                position += 1;
            },
            "tag" => tags.push(shape_tag(id, child, TagOwner::Way, rules, report)?),
            _ => (),
        }
    }

    Ok(ShapedElement::Way {
        way: WayRow {
            id: id.to_string(),
            user: user.to_string(),
            uid: uid.to_string(),
            version: version.to_string(),
            changeset: changeset.to_string(),
            timestamp: timestamp.to_string(),
        },
        way_nodes,
        tags,
    })
}

/// `addr:postal_code` becomes type `addr`, key `postcode`; keys without a prefix get type
/// `regular`. Phone numbers under a prefixed key are only cleaned up for ways.
fn shape_tag(
    owner_id: &str,
    tag: &RawChild,
    owner: TagOwner,
    rules: &NormalizationRules,
    report: &mut AuditReport,
) -> Result<TagRow> {
    let raw_key = tag.require("k")?;
    if raw_key.is_empty() {
        return Err(Error::missing_attribute(&tag.name, "k"));
    }
    let raw_value = tag.require("v")?;
    let mut value = update_name(raw_value, &rules.street_mapping);

    let (tag_type, key) = match raw_key.split_once(':') {
        Some((prefix, sub_key)) if !prefix.is_empty() && !sub_key.is_empty() => {
            let mut key = update_name(sub_key, &rules.key_aliases);
            if key.is_empty() {
                key = sub_key.to_string();
            }
            if key == "postcode" {
                value = validate_postcode(&value, report);
            }
            if owner == TagOwner::Way && key == "phone" {
                value = extract_phone(raw_value);
            }
            (prefix.to_string(), key)
        },
        _ => {
            if raw_key == "phone" {
                value = extract_phone(raw_value);
            }
            (REGULAR_TAG_TYPE.to_string(), raw_key.to_string())
        },
    };

    Ok(TagRow {
        id: owner_id.to_string(),
        key,
        value,
        tag_type,
    })
}
