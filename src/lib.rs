//! Dumpany Core Library
//!
//! This library archives every filed document for a set of UK Companies House
//! companies: it walks each company's filing history, names every filing
//! deterministically, skips what is already on disk, and downloads the rest
//! under one shared request quota.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`entity`] - Company number parsing and normalization
//! - [`registry`] - Registry API client, wire types and filing-history paginator
//! - [`download`] - HTTP transport, rate governor, retry, naming and the sync engine
//! - [`coordinator`] - Runs the engine across all requested companies
//! - [`config`] - Credential and output directory loading

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod coordinator;
pub mod download;
pub mod entity;
pub mod registry;
mod user_agent;

// Re-export commonly used types
pub use config::Config;
pub use coordinator::{ResolvedEntity, RunCoordinator, RunSummary};
pub use download::{
    DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS, DownloadEngine, DownloadError, EngineError,
    EntityOutcome, EntitySummary, FailureType, HttpClient, ProgressEvent, RateGovernor,
    RequestFailure, RetryPolicy, SyncError,
};
pub use entity::{Entity, EntityId, EntityIdError, parse_entity_list};
pub use registry::{DocumentRecord, Endpoints, RecordShape, RegistryClient};
