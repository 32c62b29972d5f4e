pub mod audit;
pub mod osm;
pub mod rows;
