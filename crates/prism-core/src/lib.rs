//! # prism-core
//!
//! Core types and utilities for working with the Prism v3 control-plane API.
//!
//! This crate provides the error taxonomy, client configuration, and shared domain
//! enums used by the request/response/task-tracking engine in `prism-api`.
//!
//! ## Modules
//!
//! - [`error`] - Error taxonomy and diagnostic rendering
//! - [`uuid`] - Entity identifiers and uuid validation policy
//! - [`types`] - Entity kinds, references, and task status
//! - [`config`] - Endpoint configuration and credentials
//! - [`client`] - HTTP client tuning and polling policy
//! - [`query`] - List query bodies and name filters

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod query;
pub mod types;
pub mod uuid;

// Re-export commonly used types
pub use error::{Candidate, Error, RequestTrace, Result};
