pub mod id;
pub mod library;
pub mod metadata;
pub mod mime;
pub mod scanner;
pub mod thumbnail;
pub mod thumbnail_service;
