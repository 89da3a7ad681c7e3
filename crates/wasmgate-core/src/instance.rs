//! Live WebAssembly instances.
//!
//! A [`LiveInstance`] is a module that has been linked, allocated, and had its
//! start function run. It owns its [`Store`], so linear memory, tables, and
//! globals persist across calls until the instance is dropped.

use std::time::Instant;

use tracing::{debug, info, instrument};
use uuid::Uuid;
use wasmtime::{Instance, Linker, Store, Trap};

use wasmgate_common::HostError;

use crate::CompiledModule;
use crate::dispatch::{self, export_name};
use crate::store::{HostState, get_remaining_fuel};
use crate::value::{Signature, Value};

/// An instantiated module with its own store.
pub struct LiveInstance {
    store: Store<HostState>,
    instance: Instance,
    content_hash: String,
}

impl LiveInstance {
    /// Link and instantiate `module` into `store`, running its start function.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Instantiation`] if an import is unresolved, a limit
    /// is exceeded, or the start function traps.
    #[instrument(skip_all, fields(content_hash = module.content_hash()))]
    pub fn instantiate(
        linker: &Linker<HostState>,
        module: &CompiledModule,
        mut store: Store<HostState>,
    ) -> Result<Self, HostError> {
        let start = Instant::now();

        let instance = linker
            .instantiate(&mut store, module.as_module())
            .map_err(|e| instantiation_error(&e))?;

        info!(
            instance_id = %store.data().instance_id,
            duration_ms = start.elapsed().as_millis(),
            "Module instantiated"
        );

        Ok(Self {
            store,
            instance,
            content_hash: module.content_hash().to_string(),
        })
    }

    /// Identifier used in log lines for this instance.
    pub fn instance_id(&self) -> Uuid {
        self.store.data().instance_id
    }

    /// Hash of the module this instance was created from.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Resolve an export and return its signature without calling it.
    pub fn signature(
        &mut self,
        interface: Option<&str>,
        name: &str,
    ) -> Result<Signature, HostError> {
        let name = export_name(interface, name);
        let (_, signature) = dispatch::resolve(&mut self.store, &self.instance, &name)?;
        Ok(signature)
    }

    /// Call an exported function.
    ///
    /// `args` must match the export's parameter types exactly. The instance
    /// stays usable after any error, including traps.
    #[instrument(skip(self, args), fields(instance_id = %self.instance_id(), args_len = args.len()))]
    pub fn call(
        &mut self,
        interface: Option<&str>,
        name: &str,
        args: &[Value],
    ) -> Result<Vec<Value>, HostError> {
        let name = export_name(interface, name);
        let (func, signature) = dispatch::resolve(&mut self.store, &self.instance, &name)?;

        debug!(export = %name, signature = %signature, "Export resolved");

        dispatch::invoke(&mut self.store, &func, &signature, &name, args)
    }

    /// Fuel left in the store, or `None` if fuel is not metered.
    pub fn fuel_remaining(&self) -> Option<u64> {
        get_remaining_fuel(&self.store)
    }

    /// Copy `len` bytes out of the exported `memory`, starting at `offset`.
    pub fn read_memory(&mut self, offset: usize, len: usize) -> Result<Vec<u8>, HostError> {
        let memory = self.memory()?;
        let data = memory.data(&self.store);
        let range = checked_range(offset, len, data.len())?;
        Ok(data[range].to_vec())
    }

    /// Copy `bytes` into the exported `memory`, starting at `offset`.
    pub fn write_memory(&mut self, offset: usize, bytes: &[u8]) -> Result<(), HostError> {
        let memory = self.memory()?;
        let data = memory.data_mut(&mut self.store);
        let range = checked_range(offset, bytes.len(), data.len())?;
        data[range].copy_from_slice(bytes);
        Ok(())
    }

    fn memory(&mut self) -> Result<wasmtime::Memory, HostError> {
        self.instance
            .get_memory(&mut self.store, "memory")
            .ok_or_else(|| HostError::invalid_argument("instance does not export 'memory'"))
    }
}

impl std::fmt::Debug for LiveInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveInstance")
            .field("instance_id", &self.instance_id())
            .field("content_hash", &self.content_hash)
            .finish_non_exhaustive()
    }
}

fn instantiation_error(error: &wasmtime::Error) -> HostError {
    if dispatch::is_out_of_fuel(error) {
        return HostError::instantiation("fuel exhausted while running the start function");
    }
    if let Some(trap) = error.downcast_ref::<Trap>() {
        debug!("Start function trap details: {error:?}");
        return HostError::instantiation(format!("start function trapped: {trap}"));
    }
    HostError::instantiation(format!("{error:#}"))
}

fn checked_range(
    offset: usize,
    len: usize,
    size: usize,
) -> Result<std::ops::Range<usize>, HostError> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(offset..end),
        _ => Err(HostError::invalid_argument(format!(
            "memory access {offset}+{len} out of bounds (size {size})"
        ))),
    }
}
