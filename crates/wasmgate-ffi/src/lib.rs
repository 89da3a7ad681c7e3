//! C ABI for the wasmgate WebAssembly module host.
//!
//! The boundary exposes five functions:
//!
//! | Function | Failure signal |
//! |---|---|
//! | [`instance_new`] | null handle |
//! | [`instance_free`] | none (unknown handles are logged) |
//! | [`instance_call`] | `false` |
//! | [`error_len`] | - |
//! | [`error_take`] | - |
//!
//! Every failure leaves a message in the calling thread's error slot, which
//! the caller sizes with [`error_len`] and drains with [`error_take`].
//!
//! Engine settings come from the TOML file named by `WASMGATE_CONFIG`, read
//! once on first use. Diagnostics go to stderr, filtered by `WASMGATE_LOG`
//! (silent when unset).
#![allow(unsafe_code)]

use core::ffi::{CStr, c_char, c_void};
use core::ptr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::LazyLock;

use tracing::Dispatch;
use tracing::dispatcher::DefaultGuard;
use tracing::level_filters::LevelFilter;
use tracing::{instrument, warn};
use tracing_subscriber::EnvFilter;

use wasmgate_common::{HostError, HostSettings};
use wasmgate_core::{CompiledModule, InstanceHandle, Registry};

pub mod abi;
pub mod error;
pub mod marshal;

pub use abi::{Config, List};

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "WASMGATE_LOG";

static REGISTRY: LazyLock<Result<Registry, String>> = LazyLock::new(|| {
    HostSettings::from_env()
        .and_then(|settings| Registry::new(&settings))
        .map_err(|e| e.to_string())
});

static DISPATCH: LazyLock<Dispatch> = LazyLock::new(|| {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::OFF.into())
        .with_env_var(LOG_ENV)
        .from_env_lossy();
    let subscriber = tracing_subscriber::fmt()
        .without_time()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .finish();
    Dispatch::new(subscriber)
});

/// The process-wide registry behind the boundary.
pub fn registry() -> Result<&'static Registry, HostError> {
    REGISTRY
        .as_ref()
        .map_err(|reason| HostError::invalid_config(reason.clone()))
}

/// Route this thread's events to the boundary subscriber until dropped.
fn log_scope() -> DefaultGuard {
    tracing::dispatcher::set_default(&DISPATCH)
}

/// Run `f`, turning a panic into an error so it never unwinds into C.
fn guard<T>(f: impl FnOnce() -> Result<T, HostError>) -> Result<T, HostError> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(HostError::internal(format!("panic: {reason}")))
    })
}

fn handle_to_ptr(handle: InstanceHandle) -> Result<*mut c_void, HostError> {
    let addr = usize::try_from(handle.get())
        .map_err(|_| HostError::internal("instance handle does not fit in a pointer"))?;
    Ok(ptr::without_provenance_mut(addr))
}

fn ptr_to_handle(instance_ptr: *mut c_void) -> Result<InstanceHandle, HostError> {
    u64::try_from(instance_ptr.addr())
        .ok()
        .and_then(InstanceHandle::from_raw)
        .ok_or_else(|| HostError::invalid_argument("`instance_ptr` must not be null"))
}

/// # Safety
///
/// A non-null `s` must point at a NUL-terminated string.
unsafe fn c_str<'a>(s: *const c_char, what: &str) -> Result<&'a str, HostError> {
    if s.is_null() {
        return Err(HostError::invalid_argument(format!("`{what}` must not be null")));
    }
    // SAFETY: non-null and NUL-terminated per the caller contract.
    unsafe { CStr::from_ptr(s) }
        .to_str()
        .map_err(|e| HostError::invalid_argument(format!("`{what}` is not valid UTF-8: {e}")))
}

#[instrument(level = "trace", skip_all, fields(wasm_len = config.wasm.len, fuel = config.fuel))]
fn instantiate(config: &Config) -> Result<InstanceHandle, HostError> {
    let registry = registry()?;
    // SAFETY: `instance_new` callers guarantee the byte view is valid.
    let wasm = unsafe { config.wasm.as_slice() }?;
    let module = CompiledModule::from_bytes(registry.engine().inner(), wasm)?;
    registry.create_from_module(&module, config.fuel())
}

#[instrument(level = "debug", skip(args), ret(level = "debug"))]
fn call(
    instance_ptr: *mut c_void,
    instance: *const c_char,
    name: *const c_char,
    args: *const *mut c_void,
) -> Result<(), HostError> {
    let handle = ptr_to_handle(instance_ptr)?;
    let interface = if instance.is_null() {
        None
    } else {
        // SAFETY: non-null C strings are NUL-terminated per `instance_call`.
        Some(unsafe { c_str(instance, "instance") }?)
    };
    // SAFETY: as above.
    let name = unsafe { c_str(name, "name") }?;

    registry()?.with_instance(handle, |inst| {
        let signature = inst.signature(interface, name)?;
        // SAFETY: `instance_call` callers provide one valid slot per param and result.
        let params = unsafe { marshal::read_params(args, &signature) }?;
        // SAFETY: as above.
        unsafe { marshal::check_results(args, &signature) }?;
        let results = inst.call(interface, name, &params)?;
        // SAFETY: as above.
        unsafe { marshal::write_results(args, &signature, &results) }
    })?
}

/// Copy the pending error message into `buf` and clear it.
///
/// Writes at most `len` bytes and returns the number written. The message
/// includes its trailing NUL when `len` is at least [`error_len`]; a shorter
/// buffer receives a truncated prefix. Returns 0 when nothing is pending.
///
/// # Safety
///
/// A non-null `buf` must be valid for writes of `len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn error_take(buf: *mut c_char, len: usize) -> usize {
    // SAFETY: forwarded caller contract.
    unsafe { error::take_raw(buf.cast::<u8>(), len) }
}

/// Size in bytes, including the trailing NUL, of the pending error message.
///
/// Returns 0 when nothing is pending.
#[unsafe(no_mangle)]
pub extern "C" fn error_len() -> usize {
    error::len()
}

/// Compile and instantiate a module.
///
/// Returns an opaque non-null handle, or null on failure with the reason in
/// the error slot. On success the error slot is cleared. The module bytes
/// are copied as needed and may be freed once this returns.
///
/// # Safety
///
/// `config.wasm.ptr` must be valid for reads of `config.wasm.len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn instance_new(config: Config) -> *mut c_void {
    let _log = log_scope();
    match guard(|| instantiate(&config).and_then(handle_to_ptr)) {
        Ok(instance) => {
            error::clear();
            instance
        }
        Err(err) => {
            error::set(&err);
            ptr::null_mut()
        }
    }
}

/// Destroy an instance returned by [`instance_new`].
///
/// Null is ignored. A handle that is unknown or already freed is reported
/// through the error slot and otherwise ignored.
///
/// # Safety
///
/// Must not run concurrently with an [`instance_call`] on the same handle
/// that expects the instance to stay alive.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn instance_free(instance: *mut c_void) {
    if instance.is_null() {
        return;
    }
    let _log = log_scope();
    let result = guard(|| registry()?.destroy(ptr_to_handle(instance)?));
    if let Err(err) = result {
        warn!(error = %err, "instance_free failed");
        error::set(&err);
    }
}

/// Call the export `name`, optionally qualified by the interface `instance`.
///
/// `args` holds one pointer per parameter, followed by one pointer per
/// result. Parameters are read from their pointers; on success the results
/// are written through theirs and `true` is returned. On failure `false` is
/// returned, nothing is written, and the reason is left in the error slot.
///
/// # Safety
///
/// - `name` and a non-null `instance` must be NUL-terminated strings.
/// - `args` must hold as many pointers as the export has parameters and
///   results combined, each valid for the declared type's size.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn instance_call(
    instance_ptr: *mut c_void,
    instance: *const c_char,
    name: *const c_char,
    args: *const *mut c_void,
) -> bool {
    let _log = log_scope();
    match guard(|| call(instance_ptr, instance, name, args)) {
        Ok(()) => true,
        Err(err) => {
            error::set(&err);
            false
        }
    }
}
