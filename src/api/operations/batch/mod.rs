//! $batch encoding and decoding

pub mod builder;
pub mod parser;

pub use builder::{BatchRequest, BatchRequestBuilder};
pub use parser::BatchResponseParser;
