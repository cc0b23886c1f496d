//! Operations module for batch execution

pub mod batch;
pub mod operation;

pub use batch::{BatchRequest, BatchRequestBuilder, BatchResponseParser};
pub use operation::{BatchOperation, BatchResult};
