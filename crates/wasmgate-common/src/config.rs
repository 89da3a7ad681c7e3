//! Configuration structures for wasmgate.
//!
//! This module defines configuration options for the host layer:
//! - [`EngineConfig`]: engine-wide settings (allocation, fuel, WASI)
//! - [`InstanceLimits`]: resource limits applied to every instance store
//! - [`InstanceConfig`]: the per-instance creation request

use serde::{Deserialize, Serialize};

/// Wasmtime engine configuration.
///
/// These settings are fixed for the lifetime of a registry and apply to
/// every instance it creates.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Enable the pooling allocator.
    ///
    /// Memory is reserved up front for `max_instances` slots, which makes
    /// instantiation cheap at the cost of a large virtual reservation.
    #[serde(default = "defaults::pooling_allocator")]
    pub pooling_allocator: bool,

    /// Maximum concurrent instances in the pool.
    ///
    /// Only effective when `pooling_allocator` is enabled.
    #[serde(default = "defaults::max_instances")]
    pub max_instances: u32,

    /// Memory per pool slot in megabytes.
    ///
    /// Only effective when `pooling_allocator` is enabled.
    #[serde(default = "defaults::instance_memory_mb")]
    pub instance_memory_mb: u32,

    /// Enable fuel metering.
    ///
    /// Required for per-instance fuel limits to take effect.
    #[serde(default = "defaults::consume_fuel")]
    pub consume_fuel: bool,

    /// Provide WASI preview1 imports to instantiated modules.
    ///
    /// When disabled, modules that import anything fail to instantiate.
    #[serde(default)]
    pub wasi: bool,

    /// Maximum guest stack size in kilobytes.
    #[serde(default = "defaults::max_wasm_stack_kb")]
    pub max_wasm_stack_kb: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pooling_allocator: defaults::pooling_allocator(),
            max_instances: defaults::max_instances(),
            instance_memory_mb: defaults::instance_memory_mb(),
            consume_fuel: defaults::consume_fuel(),
            wasi: false,
            max_wasm_stack_kb: defaults::max_wasm_stack_kb(),
        }
    }
}

impl EngineConfig {
    /// Maximum guest stack size in bytes.
    pub fn max_wasm_stack_bytes(&self) -> usize {
        (self.max_wasm_stack_kb as usize) * 1024
    }
}

/// Resource limits applied to each instance store.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InstanceLimits {
    /// Maximum linear memory per instance in megabytes.
    #[serde(default = "defaults::max_memory_mb")]
    pub max_memory_mb: u32,

    /// Fuel given to instances whose configuration does not set one.
    ///
    /// `None` means unlimited.
    #[serde(default)]
    pub default_fuel: Option<u64>,
}

impl Default for InstanceLimits {
    fn default() -> Self {
        Self {
            max_memory_mb: defaults::max_memory_mb(),
            default_fuel: None,
        }
    }
}

impl InstanceLimits {
    /// Maximum linear memory in bytes.
    pub fn max_memory_bytes(&self) -> usize {
        (self.max_memory_mb as usize) * 1024 * 1024
    }
}

/// A request to create one instance.
///
/// Consumed by the registry; the bytes are only needed until compilation
/// finishes.
#[derive(Debug, Clone, Default)]
pub struct InstanceConfig {
    /// Binary WebAssembly module.
    pub wasm: Vec<u8>,

    /// Fuel available to this instance over its whole lifetime.
    ///
    /// Overrides [`InstanceLimits::default_fuel`] when set.
    pub fuel: Option<u64>,
}

impl InstanceConfig {
    /// Create a configuration for the given module bytes.
    pub fn new(wasm: impl Into<Vec<u8>>) -> Self {
        Self {
            wasm: wasm.into(),
            fuel: None,
        }
    }

    /// Set the instance fuel budget.
    #[must_use]
    pub fn with_fuel(mut self, fuel: u64) -> Self {
        self.fuel = Some(fuel);
        self
    }
}

/// Default value functions for serde.
mod defaults {
    pub const fn pooling_allocator() -> bool {
        false
    }

    pub const fn max_instances() -> u32 {
        1000
    }

    pub const fn instance_memory_mb() -> u32 {
        64
    }

    pub const fn consume_fuel() -> bool {
        true
    }

    pub const fn max_wasm_stack_kb() -> u32 {
        512
    }

    pub const fn max_memory_mb() -> u32 {
        128
    }
}
