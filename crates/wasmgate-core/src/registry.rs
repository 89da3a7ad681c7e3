//! Instance registry.
//!
//! The [`Registry`] owns every live instance and hands out [`InstanceHandle`]s
//! in exchange. Handles come from a monotonically increasing counter and are
//! never reused, so a handle that outlived its instance is detected instead
//! of silently naming a different one.
//!
//! Each instance sits behind its own mutex: calls into the same instance
//! serialize, calls into different instances run in parallel.

use std::num::NonZeroU64;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};
use wasmtime::Linker;

use wasmgate_common::{HostError, HostSettings, InstanceConfig, InstanceLimits};

use crate::store::{HostState, create_store};
use crate::value::{Signature, Value};
use crate::{CompiledModule, LiveInstance, WasmEngine};

/// Opaque identifier of a live instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceHandle(NonZeroU64);

impl InstanceHandle {
    /// Rebuild a handle from its raw value; `None` for zero.
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// The raw, never-zero value of this handle.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for InstanceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Owner of all live instances.
///
/// `Registry` is `Send + Sync`; share it behind an `Arc` or a `static`.
pub struct Registry {
    engine: WasmEngine,
    linker: Linker<HostState>,
    limits: InstanceLimits,
    instances: DashMap<u64, Arc<Mutex<LiveInstance>>>,
    next_handle: AtomicU64,
}

impl Registry {
    /// Create a registry with a fresh engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be built or WASI cannot be linked.
    pub fn new(settings: &HostSettings) -> Result<Self, HostError> {
        let engine = WasmEngine::new(&settings.engine)?;

        let mut linker = Linker::new(engine.inner());
        if settings.engine.wasi {
            wasmtime_wasi::preview1::add_to_linker_sync(&mut linker, HostState::wasi_mut)
                .map_err(|e| HostError::invalid_config(format!("Failed to link WASI: {e:#}")))?;
            debug!("WASI preview1 imports linked");
        }

        Ok(Self {
            engine,
            linker,
            limits: settings.limits.clone(),
            instances: DashMap::new(),
            next_handle: AtomicU64::new(1),
        })
    }

    /// Create a registry with default settings.
    pub fn with_defaults() -> Result<Self, HostError> {
        Self::new(&HostSettings::default())
    }

    /// The engine shared by all instances.
    pub fn engine(&self) -> &WasmEngine {
        &self.engine
    }

    /// Compile, link, and instantiate a module.
    ///
    /// The module bytes are not retained after this returns.
    #[instrument(skip_all, fields(bytes_len = config.wasm.len(), fuel = ?config.fuel))]
    pub fn create(&self, config: InstanceConfig) -> Result<InstanceHandle, HostError> {
        let module = CompiledModule::from_bytes(self.engine.inner(), &config.wasm)?;
        self.create_from_module(&module, config.fuel)
    }

    /// Instantiate an already compiled module.
    pub fn create_from_module(
        &self,
        module: &CompiledModule,
        fuel: Option<u64>,
    ) -> Result<InstanceHandle, HostError> {
        let store = create_store(&self.engine, &self.limits, fuel)?;
        let instance = LiveInstance::instantiate(&self.linker, module, store)?;

        let handle = self.issue_handle();
        info!(
            handle = %handle,
            instance_id = %instance.instance_id(),
            "Instance created"
        );
        self.instances
            .insert(handle.get(), Arc::new(Mutex::new(instance)));

        Ok(handle)
    }

    /// Destroy an instance and release its store.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::InvalidHandle`] if the handle is unknown or was
    /// already destroyed.
    #[instrument(skip(self), fields(handle = %handle))]
    pub fn destroy(&self, handle: InstanceHandle) -> Result<(), HostError> {
        let Some((_, instance)) = self.instances.remove(&handle.get()) else {
            warn!("Destroy of unknown instance handle");
            return Err(HostError::InvalidHandle {
                handle: handle.get(),
            });
        };

        // An in-flight call holds its own Arc; the store drops when it ends.
        drop(instance);
        info!("Instance destroyed");
        Ok(())
    }

    /// Run `f` with exclusive access to an instance.
    ///
    /// Blocks while another thread is calling into the same instance.
    pub fn with_instance<R>(
        &self,
        handle: InstanceHandle,
        f: impl FnOnce(&mut LiveInstance) -> R,
    ) -> Result<R, HostError> {
        // Clone the Arc so the map shard is not locked for the whole call.
        let instance = self
            .instances
            .get(&handle.get())
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(HostError::InvalidHandle {
                handle: handle.get(),
            })?;

        let mut guard = instance.lock();
        Ok(f(&mut guard))
    }

    /// Call an exported function on an instance.
    pub fn call(
        &self,
        handle: InstanceHandle,
        interface: Option<&str>,
        name: &str,
        args: &[Value],
    ) -> Result<Vec<Value>, HostError> {
        self.with_instance(handle, |instance| instance.call(interface, name, args))?
    }

    /// Look up the signature of an exported function.
    pub fn signature(
        &self,
        handle: InstanceHandle,
        interface: Option<&str>,
        name: &str,
    ) -> Result<Signature, HostError> {
        self.with_instance(handle, |instance| instance.signature(interface, name))?
    }

    /// Whether `handle` names a live instance.
    pub fn contains(&self, handle: InstanceHandle) -> bool {
        self.instances.contains_key(&handle.get())
    }

    /// Number of live instances.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether no instances are live.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    fn issue_handle(&self) -> InstanceHandle {
        let raw = self.next_handle.fetch_add(1, Ordering::Relaxed);
        // The counter starts at 1 and would take centuries to wrap.
        InstanceHandle(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("engine", &self.engine)
            .field("live_instances", &self.instances.len())
            .finish_non_exhaustive()
    }
}
