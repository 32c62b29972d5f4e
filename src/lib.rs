//! Converts an OpenStreetMap XML export into five flat tables (nodes, node tags, ways,
//! way nodes, way tags) ready for bulk loading, cleaning up street names, postcodes and
//! phone numbers on the way and reporting suspicious data.

pub mod config;
pub mod data;
pub mod errors;
pub mod etl;

pub use crate::config::UserConfig;
pub use crate::data::audit::{AuditReport, ElementCensus, StreetTypes};
pub use crate::data::osm::{RawChild, RawElement};
pub use crate::data::rows::{NodeRow, ShapedElement, TagRow, WayNodeRow, WayRow};
pub use crate::errors::{Error, Result};
pub use crate::etl::Etl;
