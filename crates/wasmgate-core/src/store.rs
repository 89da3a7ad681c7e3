//! Per-instance store state.
//!
//! Every live instance owns one [`Store<HostState>`]. The state carries:
//! - an identifier used to correlate log lines
//! - the WASI preview1 context, built on the first WASI import call
//! - the resource limiter enforcing the linear memory cap

use uuid::Uuid;
use wasmtime::{Store, StoreLimits, StoreLimitsBuilder};
use wasmtime_wasi::WasiCtxBuilder;
use wasmtime_wasi::preview1::WasiP1Ctx;

use crate::WasmEngine;
use wasmgate_common::{HostError, InstanceLimits};

/// Data attached to an instance store.
pub struct HostState {
    /// Unique identifier for tracing.
    pub instance_id: Uuid,

    /// WASI preview1 context, absent until a guest first calls a WASI import.
    wasi: Option<WasiP1Ctx>,

    /// Memory and table growth limits.
    limits: StoreLimits,
}

impl HostState {
    /// Create state enforcing the given limits.
    pub fn new(limits: &InstanceLimits) -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            wasi: None,
            limits: StoreLimitsBuilder::new()
                .memory_size(limits.max_memory_bytes())
                .build(),
        }
    }

    /// The WASI context, built on first use.
    ///
    /// The context has no stdio, environment, or preopened directories.
    pub fn wasi_mut(&mut self) -> &mut WasiP1Ctx {
        self.wasi.get_or_insert_with(|| WasiCtxBuilder::new().build_p1())
    }

    /// Whether a WASI context has been built for this store.
    pub fn has_wasi(&self) -> bool {
        self.wasi.is_some()
    }
}

/// Create a store for one instance.
///
/// When the engine meters fuel, the store receives `fuel`, falling back to
/// `limits.default_fuel`, and finally to an effectively unlimited budget.
///
/// # Errors
///
/// Returns an error if fuel cannot be set on the store.
pub fn create_store(
    engine: &WasmEngine,
    limits: &InstanceLimits,
    fuel: Option<u64>,
) -> Result<Store<HostState>, HostError> {
    let mut store = Store::new(engine.inner(), HostState::new(limits));
    store.limiter(|state| &mut state.limits);

    if engine.is_fuel_enabled() {
        let budget = fuel.or(limits.default_fuel).unwrap_or(u64::MAX);
        store
            .set_fuel(budget)
            .map_err(|e| HostError::invalid_config(format!("Failed to set fuel: {e:#}")))?;
    }

    Ok(store)
}

/// Get remaining fuel from a store, or `None` if fuel is not metered.
pub fn get_remaining_fuel(store: &Store<HostState>) -> Option<u64> {
    store.get_fuel().ok()
}
