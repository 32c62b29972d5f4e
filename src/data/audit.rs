use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

/// Diagnostics gathered while converting a document.
#[derive(Serialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct AuditReport {
    pub bots: BTreeSet<String>,
    pub malformed_postcodes: BTreeSet<String>,
}

impl AuditReport {
    pub fn new() -> AuditReport {
        Default::default()
    }

    pub fn record_bot(&mut self, username: &str) {
        self.bots.insert(username.to_string());
    }

    pub fn record_malformed_postcode(&mut self, code: &str) {
        self.malformed_postcodes.insert(code.to_string());
    }

    /// Folds the findings of another (e.g. per-worker) report into this one.
    pub fn merge(&mut self, other: AuditReport) {
        self.bots.extend(other.bots);
        self.malformed_postcodes.extend(other.malformed_postcodes);
    }
}

/// Street-name suffix (e.g. "Rd", "Marg") mapped to the distinct street names ending in it.
#[derive(Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct StreetTypes(pub BTreeMap<String, BTreeSet<String>>);

impl StreetTypes {
    pub fn new() -> StreetTypes {
        Default::default()
    }

    pub fn add(&mut self, street_type: &str, street_name: &str) {
        self.0
            .entry(street_type.to_string())
            .or_default()
            .insert(street_name.to_string());
    }

    pub fn get(&self, street_type: &str) -> Option<&BTreeSet<String>> {
        self.0.get(street_type)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// How often each element name occurs anywhere in a document.
#[derive(Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct ElementCensus(pub BTreeMap<String, usize>);

impl ElementCensus {
    pub fn count(&self, name: &str) -> usize {
        self.0.get(name).copied().unwrap_or(0)
    }
}
