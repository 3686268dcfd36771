//! PaperVault Common Library
//!
//! Core of the exam-paper archive, shared by the gateway and tools:
//! - Catalog models and repository (`db`)
//! - Uploaded file storage (`storage`)
//! - Upload pipeline with compensating rollback (`ingest`)
//! - Synonym-aware query compilation (`query`) and search (`retrieval`)
//! - Error types, configuration, authentication, metrics

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod ingest;
pub mod metrics;
pub mod query;
pub mod retrieval;
pub mod storage;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{DbPool, MetadataStore, Repository};
pub use errors::{AppError, Result};
pub use ingest::{IngestReceipt, IngestionCoordinator, UploadRequest};
pub use retrieval::{DecoratedPaper, DownloadLocator, RetrievalService};
pub use storage::{FileStore, FilesystemStore};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
