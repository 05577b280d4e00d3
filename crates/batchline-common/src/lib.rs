//! Batchline Common Library
//!
//! Shared error types and logging setup for the Batchline workspace.
//!
//! # Overview
//!
//! This crate provides functionality used across all Batchline workspace
//! members:
//!
//! - **Error Handling**: The [`BatchError`] taxonomy and result alias
//! - **Logging**: Centralized tracing initialization
//!
//! # Example
//!
//! ```no_run
//! use batchline_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{BatchError, Result};
