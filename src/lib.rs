//! Magnet Relay Library
//!
//! This library detects magnet links in pages and arbitrary text,
//! deduplicates them against a time-bounded submission history, and relays
//! new ones to a remote transfer queue with bounded retry.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`magnet`] - Magnet URI extraction, validation, canonicalization
//! - [`policy`] - Domain allow-list policy
//! - [`history`] - Sqlite-backed submission history with retention
//! - [`transport`] - Remote submission transport with bounded retry
//! - [`pipeline`] - The validate/dedup/submit/record orchestration
//! - [`state`] - Per-item state machine and in-flight guard
//! - [`worker`] - Debounced single-consumer event queue
//! - [`db`] - Database connection and schema management
//! - [`settings`] - Persistent configuration
//! - [`logbuf`] - Bounded persistent log buffer
//! - [`notify`] - Outbound user notifications

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod commands;
pub mod db;
pub mod history;
pub mod logbuf;
pub mod magnet;
pub mod notify;
pub mod pipeline;
pub mod policy;
pub mod settings;
pub mod state;
pub mod transport;
pub mod worker;

// Re-export commonly used types
pub use db::{Database, DbError};
pub use history::{History, HistoryError, SubmissionRecord, SubmissionSource};
pub use magnet::{InfoHash, MagnetLink};
pub use pipeline::{BatchOutcome, BatchResult, ItemOutcome, Pipeline};
pub use policy::AllowList;
pub use settings::{Settings, SettingsError};
pub use state::{InflightSet, ItemState, ItemTable};
pub use transport::{
    with_retry, HttpTransport, PageFetcher, SubmitReceipt, Transport, TransportError,
    DEFAULT_MAX_ATTEMPTS,
};
