//! Instance registry and call dispatch for the wasmgate module host.
//!
//! This crate provides the safe Rust side of the host:
//! - [`WasmEngine`]: configured Wasmtime engine
//! - [`CompiledModule`]: validated, compiled core module
//! - [`LiveInstance`]: an instantiated module with its own store
//! - [`Registry`]: owner of live instances, addressed by [`InstanceHandle`]
//! - [`Value`] and [`Signature`]: the values that cross the boundary
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       Registry                          │
//! │  - WasmEngine (shared, thread-safe)                     │
//! │  - Linker (bare, or with WASI preview1)                 │
//! │  - handle -> Mutex<LiveInstance>                        │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │            Store<HostState> + Instance                  │
//! │  (per instance, lives until destroyed)                  │
//! │  - Linear memory, tables, globals                       │
//! │  - Fuel budget and memory limiter                       │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                     dispatch                            │
//! │  resolve export -> check Signature -> invoke            │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod dispatch;
pub mod engine;
pub mod instance;
pub mod module;
pub mod registry;
pub mod store;
pub mod value;

pub use dispatch::export_name;
pub use engine::WasmEngine;
pub use instance::LiveInstance;
pub use module::{CompiledModule, ExportInfo};
pub use registry::{InstanceHandle, Registry};
pub use store::HostState;
pub use value::{Signature, Value, ValueKind};
