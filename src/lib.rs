pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod model;
pub mod processor;
pub mod rpc;
pub mod storage;
pub mod tracing;
pub mod utils;

pub use error::Error;
pub use error::Result;
