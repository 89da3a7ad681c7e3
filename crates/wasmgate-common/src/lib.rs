//! Common types, errors, and configuration for wasmgate.
//!
//! This crate provides shared functionality used across the wasmgate workspace:
//! - [`HostError`]: the error taxonomy surfaced across the host boundary
//! - Engine and per-instance configuration
//! - [`HostSettings`]: TOML settings file loading

pub mod config;
pub mod error;
pub mod settings;

pub use config::{EngineConfig, InstanceConfig, InstanceLimits};
pub use error::HostError;
pub use settings::HostSettings;
