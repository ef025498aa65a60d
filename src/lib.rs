//! cachegate - plain-HTTP gateway to an S3 bucket for build caches and artifacts
//!
//! This library provides the core functionality for the cachegate server.

pub mod api;
pub mod config;
pub mod mapping;
pub mod storage;
