pub mod aggregate;
pub mod dataset;
pub mod estimate;
pub mod fetch;
pub mod geometry;
pub mod output;
pub mod parser;
pub mod stats;
