//! Shared configuration for PrintEasy.
//!
//! This crate provides configuration types used across all other crates:
//! - Application configuration loading (files + environment)
//! - Storage settings (remote store, transfer tuning, presign TTLs, local root)

pub mod config;

pub use config::{
    AppConfig, LocalSettings, PresignSettings, RemoteStoreSettings, StorageSettings,
    TransferSettings,
};
