//! Batchline CLI Library
//!
//! The concrete person-import job and the application configuration for
//! the `batchline` binary: read people from a delimited file and insert
//! them into a relational table in fixed-size transactional chunks.

pub mod config;
pub mod person;
