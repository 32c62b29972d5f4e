use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use csv::{Writer, WriterBuilder};
use serde::Serialize;

use crate::data::rows::{
    NodeRow, TagRow, WayNodeRow, WayRow, NODE_FIELDS, NODE_TAGS_FIELDS, WAY_FIELDS,
    WAY_NODES_FIELDS, WAY_TAGS_FIELDS,
};
use crate::errors::Result;

pub const NODES_FILE_NAME: &str = "nodes.csv";
pub const NODE_TAGS_FILE_NAME: &str = "nodes_tags.csv";
pub const WAYS_FILE_NAME: &str = "ways.csv";
pub const WAY_NODES_FILE_NAME: &str = "ways_nodes.csv";
pub const WAY_TAGS_FILE_NAME: &str = "ways_tags.csv";

pub const OUTPUT_FILE_NAMES: [&str; 5] = [
    NODES_FILE_NAME,
    NODE_TAGS_FILE_NAME,
    WAYS_FILE_NAME,
    WAY_NODES_FILE_NAME,
    WAY_TAGS_FILE_NAME,
];

/// Destination for shaped rows. Rows of one element arrive together, in document order.
pub trait RowSink {
    fn write_node(&mut self, node: &NodeRow, tags: &[TagRow]) -> Result<()>;
    fn write_way(&mut self, way: &WayRow, way_nodes: &[WayNodeRow], tags: &[TagRow]) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

/// Headers are written up front, so every table has one even when no rows follow.
fn table_writer<W: Write>(destination: W, header: &[&str]) -> Result<Writer<W>> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_writer(destination);
    writer.write_record(header)?;
    Ok(writer)
}

fn write_rows<W: Write, T: Serialize>(writer: &mut Writer<W>, rows: &[T]) -> Result<()> {
    for row in rows {
        writer.serialize(row)?;
    }
    Ok(())
}

/// The five output tables as CSV.
pub struct CsvSinks<W: Write> {
    nodes: Writer<W>,
    node_tags: Writer<W>,
    ways: Writer<W>,
    way_nodes: Writer<W>,
    way_tags: Writer<W>,
}

impl<W: Write> CsvSinks<W> {
    pub fn from_writers(nodes: W, node_tags: W, ways: W, way_nodes: W, way_tags: W) -> Result<CsvSinks<W>> {
        Ok(CsvSinks {
            nodes: table_writer(nodes, &NODE_FIELDS)?,
            node_tags: table_writer(node_tags, &NODE_TAGS_FIELDS)?,
            ways: table_writer(ways, &WAY_FIELDS)?,
            way_nodes: table_writer(way_nodes, &WAY_NODES_FIELDS)?,
            way_tags: table_writer(way_tags, &WAY_TAGS_FIELDS)?,
        })
    }

    pub fn into_inner(mut self) -> Result<[W; 5]> {
        self.flush()?;
        let into_inner = |writer: Writer<W>| writer.into_inner().map_err(|err| err.into_error());
        Ok([
            into_inner(self.nodes)?,
            into_inner(self.node_tags)?,
            into_inner(self.ways)?,
            into_inner(self.way_nodes)?,
            into_inner(self.way_tags)?,
        ])
    }
}

impl CsvSinks<File> {
    pub fn create(dir: &Path) -> Result<CsvSinks<File>> {
        CsvSinks::from_writers(
            File::create(dir.join(NODES_FILE_NAME))?,
            File::create(dir.join(NODE_TAGS_FILE_NAME))?,
            File::create(dir.join(WAYS_FILE_NAME))?,
            File::create(dir.join(WAY_NODES_FILE_NAME))?,
            File::create(dir.join(WAY_TAGS_FILE_NAME))?,
        )
    }

    pub fn output_paths(dir: &Path) -> Vec<PathBuf> {
        OUTPUT_FILE_NAMES.iter().map(|name| dir.join(name)).collect()
    }
}

impl<W: Write> RowSink for CsvSinks<W> {
    fn write_node(&mut self, node: &NodeRow, tags: &[TagRow]) -> Result<()> {
        self.nodes.serialize(node)?;
        write_rows(&mut self.node_tags, tags)
    }

    fn write_way(&mut self, way: &WayRow, way_nodes: &[WayNodeRow], tags: &[TagRow]) -> Result<()> {
        self.ways.serialize(way)?;
        write_rows(&mut self.way_nodes, way_nodes)?;
        write_rows(&mut self.way_tags, tags)
    }

    fn flush(&mut self) -> Result<()> {
        self.nodes.flush()?;
        self.node_tags.flush()?;
        self.ways.flush()?;
        self.way_nodes.flush()?;
        self.way_tags.flush()?;
        Ok(())
    }
}

/// Keeps every row in memory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RowBuffer {
    pub nodes: Vec<NodeRow>,
    pub node_tags: Vec<TagRow>,
    pub ways: Vec<WayRow>,
    pub way_nodes: Vec<WayNodeRow>,
    pub way_tags: Vec<TagRow>,
}

impl RowSink for RowBuffer {
    fn write_node(&mut self, node: &NodeRow, tags: &[TagRow]) -> Result<()> {
        self.nodes.push(node.clone());
        self.node_tags.extend_from_slice(tags);
        Ok(())
    }

    fn write_way(&mut self, way: &WayRow, way_nodes: &[WayNodeRow], tags: &[TagRow]) -> Result<()> {
        self.ways.push(way.clone());
        self.way_nodes.extend_from_slice(way_nodes);
        self.way_tags.extend_from_slice(tags);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
