//! Argument marshaling for `instance_call`.
//!
//! The caller passes one pointer per parameter followed by one pointer per
//! result. Parameter pointers are read as the native representation of the
//! declared type; result pointers receive the return values once the call
//! succeeds. Pointers need not be aligned.

use core::ffi::c_void;
use core::{ptr, slice};

use wasmgate_common::HostError;
use wasmgate_core::{Signature, Value, ValueKind};

/// Borrow the `P + R` argument slots described by `signature`.
///
/// # Safety
///
/// A non-null `args` must be valid for reads of `signature.slot_count()`
/// pointers.
unsafe fn slots<'a>(
    args: *const *mut c_void,
    signature: &Signature,
) -> Result<&'a [*mut c_void], HostError> {
    let count = signature.slot_count();
    if count == 0 {
        return Ok(&[]);
    }
    if args.is_null() {
        return Err(HostError::invalid_argument(format!(
            "`args` must not be null for signature {signature}"
        )));
    }
    // SAFETY: non-null, and the caller guarantees `count` readable pointers.
    Ok(unsafe { slice::from_raw_parts(args, count) })
}

/// Read the parameters from the leading slots.
///
/// # Safety
///
/// `args` must satisfy [`slots`], and each parameter slot must point at a
/// readable value of the declared type.
pub unsafe fn read_params(
    args: *const *mut c_void,
    signature: &Signature,
) -> Result<Vec<Value>, HostError> {
    // SAFETY: forwarded caller contract.
    let slots = unsafe { slots(args, signature)? };
    signature
        .params
        .iter()
        .zip(slots)
        .enumerate()
        .map(|(i, (&kind, &slot))| {
            if slot.is_null() {
                return Err(HostError::invalid_argument(format!(
                    "parameter {i} ({kind}) pointer is null"
                )));
            }
            // SAFETY: non-null, and the caller guarantees a readable `kind`.
            unsafe { read_value(kind, slot) }
        })
        .collect()
}

/// Check that every result slot is non-null.
///
/// # Safety
///
/// `args` must satisfy [`slots`].
pub unsafe fn check_results(
    args: *const *mut c_void,
    signature: &Signature,
) -> Result<(), HostError> {
    // SAFETY: forwarded caller contract.
    let slots = unsafe { slots(args, signature)? };
    result_slots(slots, signature).map(drop)
}

/// Write `results` into the trailing slots.
///
/// Every result pointer is checked before anything is written.
///
/// # Safety
///
/// `args` must satisfy [`slots`], and each result slot must point at
/// writable storage for a value of the declared type.
pub unsafe fn write_results(
    args: *const *mut c_void,
    signature: &Signature,
    results: &[Value],
) -> Result<(), HostError> {
    // SAFETY: forwarded caller contract.
    let slots = unsafe { slots(args, signature)? };
    let outputs = result_slots(slots, signature)?;

    for (value, &slot) in results.iter().zip(outputs) {
        let bytes = value.to_ne_bytes();
        // SAFETY: non-null, and the caller guarantees room for the value.
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), slot.cast::<u8>(), bytes.len()) };
    }
    Ok(())
}

fn result_slots<'a>(
    slots: &'a [*mut c_void],
    signature: &Signature,
) -> Result<&'a [*mut c_void], HostError> {
    let outputs = &slots[signature.params.len()..];
    match outputs.iter().position(|slot| slot.is_null()) {
        Some(i) => Err(HostError::invalid_argument(format!(
            "result {i} pointer is null"
        ))),
        None => Ok(outputs),
    }
}

/// # Safety
///
/// `slot` must be valid for reads of `kind.size()` bytes.
unsafe fn read_value(kind: ValueKind, slot: *mut c_void) -> Result<Value, HostError> {
    // SAFETY: guaranteed by the caller.
    let bytes = unsafe { slice::from_raw_parts(slot.cast::<u8>().cast_const(), kind.size()) };
    Value::from_ne_bytes(kind, bytes)
}
