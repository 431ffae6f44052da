//! FTS Common Library
//!
//! This crate provides the shared types, configuration loading utilities,
//! and hardware-link contracts for all FTS workspace crates.
//!
//! # Module Structure
//!
//! - [`config`] - Configuration loading trait and station/test configuration
//! - [`error`] - Station error taxonomy
//! - [`links`] - Hardware link traits consumed by the orchestration facade
//! - [`measure`] - Measurement data model (matrix aggregate, cycle results)
//! - [`safety`] - Safety sensor descriptors and alert types
//! - [`status`] - System status and robot state enums
//!
//! # Usage
//!
//! Add to your `Cargo.toml`:
//! ```toml
//! [dependencies]
//! fts_common = { path = "../fts_common" }
//! ```

pub mod config;
pub mod error;
pub mod links;
pub mod measure;
pub mod safety;
pub mod status;
