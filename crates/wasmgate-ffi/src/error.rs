//! Last-error channel for C callers.
//!
//! Failing boundary calls leave a NUL-terminated message in a slot that the
//! caller drains with `error_len` / `error_take`. The slot is per thread, so
//! a failure on one thread never overwrites another thread's unread message.
//! Within a thread, the newest message replaces any unread one.

use core::slice;
use std::cell::RefCell;
use std::ffi::CString;

use wasmgate_common::HostError;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Record `err` as the pending message, replacing any unread one.
pub fn set(err: &HostError) {
    let message = render(err);
    LAST_ERROR.with_borrow_mut(|slot| *slot = Some(message));
}

/// Drop the pending message, if any.
pub fn clear() {
    LAST_ERROR.with_borrow_mut(|slot| *slot = None);
}

/// Length of the pending message including its NUL, or 0.
pub fn len() -> usize {
    LAST_ERROR.with_borrow(|slot| slot.as_ref().map_or(0, |msg| msg.as_bytes_with_nul().len()))
}

/// Move the pending message into `buf`, truncating to its length.
///
/// Returns the number of bytes written. The message is cleared even when it
/// did not fit.
pub fn take_into(buf: &mut [u8]) -> usize {
    let Some(message) = LAST_ERROR.with_borrow_mut(Option::take) else {
        return 0;
    };
    let bytes = message.as_bytes_with_nul();
    let written = bytes.len().min(buf.len());
    buf[..written].copy_from_slice(&bytes[..written]);
    written
}

/// Raw-pointer form of [`take_into`].
///
/// A null `buf` writes nothing and leaves the message pending.
///
/// # Safety
///
/// A non-null `buf` must be valid for writes of `capacity` bytes.
pub unsafe fn take_raw(buf: *mut u8, capacity: usize) -> usize {
    if buf.is_null() {
        return 0;
    }
    // SAFETY: non-null, and the caller guarantees `capacity` writable bytes.
    let buf = unsafe { slice::from_raw_parts_mut(buf, capacity) };
    take_into(buf)
}

fn render(err: &HostError) -> CString {
    let text = err.to_string().replace('\0', "\\0");
    CString::new(text).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_channel() {
        clear();
        let mut buf = [0u8; 8];

        assert_eq!(len(), 0);
        assert_eq!(take_into(&mut buf), 0);
        assert_eq!(buf, [0; 8]);
    }

    #[test]
    fn test_len_includes_nul() {
        set(&HostError::export_not_found("add"));

        assert_eq!(len(), "Export not found: add".len() + 1);
        clear();
    }

    #[test]
    fn test_take_full() {
        set(&HostError::FuelExhausted);
        let expected = len();
        let mut buf = vec![0u8; 64];

        assert_eq!(take_into(&mut buf), expected);
        assert_eq!(&buf[..expected], b"Fuel exhausted: CPU limit exceeded\0");
        assert_eq!(len(), 0);
        assert_eq!(take_into(&mut buf), 0);
    }

    #[test]
    fn test_take_truncated() {
        set(&HostError::FuelExhausted);
        let mut buf = [0u8; 4];

        assert_eq!(take_into(&mut buf), 4);
        assert_eq!(&buf, b"Fuel");
        assert_eq!(len(), 0);
    }

    #[test]
    fn test_last_write_wins() {
        set(&HostError::FuelExhausted);
        set(&HostError::export_not_found("f"));
        let mut buf = [0u8; 64];

        let written = take_into(&mut buf);
        assert_eq!(&buf[..written], b"Export not found: f\0");
    }

    #[test]
    fn test_take_raw_null_keeps_message() {
        set(&HostError::FuelExhausted);

        assert_eq!(unsafe { take_raw(core::ptr::null_mut(), 16) }, 0);
        assert!(len() > 0);
        clear();
    }

    #[test]
    fn test_interior_nul_escaped() {
        set(&HostError::export_not_found("a\0b"));
        let mut buf = [0u8; 64];

        let written = take_into(&mut buf);
        assert_eq!(&buf[..written], b"Export not found: a\\0b\0");
    }

    #[test]
    fn test_channel_is_per_thread() {
        set(&HostError::FuelExhausted);

        let other = std::thread::spawn(len).join().unwrap();
        assert_eq!(other, 0);
        assert!(len() > 0);
        clear();
    }
}
