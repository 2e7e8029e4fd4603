//! s3probe - liveness probing and network checks for S3-compatible clusters

pub mod admin;
pub mod cli;
pub mod config;
pub mod core;
pub mod pool;
pub mod probe;

pub use crate::core::Core;
pub use crate::config::Config;
