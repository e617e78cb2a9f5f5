//! Migration engine and schema store for a TestTrack-style feature-flag /
//! A-B-test configuration service.
//!
//! # Architecture
//!
//! - [`validators`] — Grammar checks for names, versions, prefixes
//! - [`weights`] — Per-variant weight parsing, normalization, reweighting
//! - [`resource`] — The six migration variants and their schema projection
//! - [`repository`] — Loads migration files from `testtrack/migrate`
//! - [`migration`] — Migration version string grammar and generation
//! - [`schema`] — The materialized schema document and its merged view
//! - [`manager`] — Lifecycle glue around a single migration
//! - [`runner`] — Outstanding-migration and undo flows
//! - [`schema_loader`] — Bootstraps an existing schema into a fresh remote
//! - [`overrides`] — The per-visitor assignment overrides file
//! - [`remote`] — The upstream HTTP client trait plus a null implementation
//! - [`sync`] — Pulls the remote split registry and overwrites local weights
//! - [`init`] — One-time project setup (`init_project`)
//! - [`config`] — Environment-driven configuration, explicit overrides
//! - [`error`] — The `TestTrackError` taxonomy

pub mod config;
pub mod error;
pub mod init;
pub mod manager;
pub mod migration;
pub mod overrides;
pub mod remote;
pub mod repository;
pub mod resource;
pub mod runner;
pub mod schema;
pub mod schema_loader;
pub mod sync;
pub mod validators;
pub mod weights;

pub use config::TestTrackConfig;
pub use error::{Result, TestTrackError};
pub use init::init_project;
pub use manager::MigrationManager;
pub use overrides::AssignmentOverrides;
pub use remote::{HttpRemoteClient, NullRemoteClient, RemoteClient};
pub use repository::MigrationRepository;
pub use resource::Migration;
pub use runner::Runner;
pub use schema::Schema;
pub use weights::Weights;
