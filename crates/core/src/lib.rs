//! Core storage logic for PrintEasy.
//!
//! This crate persists print-job files and has no web or database
//! dependencies. HTTP handling and order records live with the callers.
//!
//! # Modules
//!
//! - `storage` - Key naming, upload strategy, object store client, storage manager

pub mod storage;
