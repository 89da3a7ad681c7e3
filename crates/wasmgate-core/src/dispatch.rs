//! Export resolution and invocation.
//!
//! A call goes through three steps, each of which can fail independently:
//! 1. resolve the export name to a function
//! 2. check the arguments against the function's [`Signature`]
//! 3. invoke, mapping traps and fuel exhaustion to [`HostError`]
//!
//! Nothing is rolled back when a call fails part way: memory and globals
//! written before a trap stay written.

use std::borrow::Cow;
use std::time::Instant;

use tracing::{debug, error, warn};
use wasmtime::{Extern, Func, Instance, Store, Trap};

use wasmgate_common::HostError;

use crate::store::HostState;
use crate::value::{Signature, Value};

/// Export name for `name`, qualified by `interface` when one is given.
///
/// Interface exports of core modules are named `interface#name`, so
/// `export_name(Some("wasi:cli/run@0.2.0"), "run")` resolves
/// `wasi:cli/run@0.2.0#run`. An empty interface counts as none.
pub fn export_name<'a>(interface: Option<&str>, name: &'a str) -> Cow<'a, str> {
    match interface {
        Some(interface) if !interface.is_empty() => Cow::Owned(format!("{interface}#{name}")),
        _ => Cow::Borrowed(name),
    }
}

/// Resolve an exported function and its boundary signature.
pub(crate) fn resolve(
    store: &mut Store<HostState>,
    instance: &Instance,
    name: &str,
) -> Result<(Func, Signature), HostError> {
    let func = match instance.get_export(&mut *store, name) {
        Some(Extern::Func(func)) => func,
        Some(other) => {
            return Err(HostError::NotAFunction {
                name: name.to_string(),
                kind: extern_kind(&other),
            });
        }
        None => return Err(HostError::export_not_found(name)),
    };

    let signature = Signature::from_func_type(name, &func.ty(&*store))?;
    Ok((func, signature))
}

/// Invoke `func` with `args`, which must already match `signature`.
pub(crate) fn invoke(
    store: &mut Store<HostState>,
    func: &Func,
    signature: &Signature,
    name: &str,
    args: &[Value],
) -> Result<Vec<Value>, HostError> {
    signature.check_args(name, args)?;

    let params: Vec<_> = args.iter().map(|arg| arg.to_val()).collect();
    let mut results: Vec<_> = signature.results.iter().map(|ty| ty.zero()).collect();

    let start = Instant::now();
    func.call(&mut *store, &params, &mut results)
        .map_err(|e| call_error(name, &e))?;

    debug!(
        export = name,
        duration_us = start.elapsed().as_micros(),
        "Call returned"
    );

    results
        .iter()
        .map(|val| {
            Value::from_val(val).ok_or_else(|| HostError::UnsupportedType {
                name: name.to_string(),
                ty: format!("{val:?}"),
            })
        })
        .collect()
}

/// Map an engine call failure to a host error.
pub(crate) fn call_error(name: &str, error: &wasmtime::Error) -> HostError {
    if is_out_of_fuel(error) {
        warn!(export = name, "Execution terminated: fuel exhausted");
        return HostError::FuelExhausted;
    }

    let (message, code) = extract_trap_info(error);
    error!(export = name, trap_message = %message, "Execution trapped");
    debug!(export = name, "Trap details: {error:?}");
    HostError::trap(message, code)
}

/// Extract human-readable trap information.
///
/// The message comes from the trap itself, so the wasm backtrace attached
/// as context never reaches the caller.
fn extract_trap_info(error: &wasmtime::Error) -> (String, Option<String>) {
    match error.downcast_ref::<Trap>() {
        Some(trap) => (trap.to_string(), Some(format!("{trap:?}"))),
        None => (error.to_string(), None),
    }
}

/// Check if an error is due to fuel exhaustion.
pub(crate) fn is_out_of_fuel(error: &wasmtime::Error) -> bool {
    error
        .downcast_ref::<Trap>()
        .is_some_and(|trap| *trap == Trap::OutOfFuel)
}

fn extern_kind(ext: &Extern) -> &'static str {
    match ext {
        Extern::Func(_) => "func",
        Extern::Global(_) => "global",
        Extern::Table(_) => "table",
        Extern::Memory(_) => "memory",
        Extern::SharedMemory(_) => "shared memory",
        #[allow(unreachable_patterns)]
        _ => "extern",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_name_plain() {
        assert_eq!(export_name(None, "add"), "add");
        assert_eq!(export_name(Some(""), "add"), "add");
    }

    #[test]
    fn test_export_name_qualified() {
        assert_eq!(
            export_name(Some("wasi:cli/run@0.2.0"), "run"),
            "wasi:cli/run@0.2.0#run"
        );
    }

    #[test]
    fn test_call_error_out_of_fuel() {
        let err = wasmtime::Error::new(Trap::OutOfFuel);

        assert!(is_out_of_fuel(&err));
        assert!(matches!(call_error("f", &err), HostError::FuelExhausted));
    }

    #[test]
    fn test_call_error_trap_code() {
        let err = wasmtime::Error::new(Trap::IntegerDivisionByZero);

        let HostError::Trap { code, .. } = call_error("f", &err) else {
            panic!("expected trap");
        };
        assert_eq!(code.as_deref(), Some("IntegerDivisionByZero"));
    }

    #[test]
    fn test_call_error_drops_backtrace_context() {
        let err = wasmtime::Error::new(Trap::StackOverflow)
            .context("error while executing at wasm backtrace:\n    0: 0x3a - <unknown>!r");

        let HostError::Trap { message, code } = call_error("r", &err) else {
            panic!("expected trap");
        };
        assert_eq!(message, Trap::StackOverflow.to_string());
        assert!(!message.contains("backtrace"));
        assert_eq!(code.as_deref(), Some("StackOverflow"));
    }

    #[test]
    fn test_call_error_without_trap() {
        let err = wasmtime::Error::msg("host failure");

        let HostError::Trap { message, code } = call_error("f", &err) else {
            panic!("expected trap");
        };
        assert_eq!(message, "host failure");
        assert!(code.is_none());
    }
}
