//! Client pooling
//!
//! This module provides:
//! - [`ClientFingerprint`]: identity of a server/credential pair
//! - [`ClientCache`]: one shared [`AdminClient`](crate::admin::AdminClient)
//!   per fingerprint for the life of the process

pub mod cache;

pub use cache::{CacheError, ClientCache, ClientFingerprint};
