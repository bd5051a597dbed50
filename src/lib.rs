//! Video library indexer: scan a directory tree into folders and media, then
//! enrich each item with technical metadata and a preview thumbnail.

pub mod cache;
pub mod cli;
pub mod config;
pub mod http;
pub mod media;
pub mod store;
