//! `#[repr(C)]` types shared with C callers.

use core::slice;

use wasmgate_common::HostError;

/// Borrowed view of `len` elements starting at `ptr`.
///
/// The memory stays owned by the caller and must outlive the call it is
/// passed to. Nothing is retained afterwards.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct List<T> {
    pub ptr: *const T,
    pub len: usize,
}

impl<T> List<T> {
    /// View over a Rust slice, for callers on the Rust side.
    pub fn from_slice(items: &[T]) -> Self {
        Self {
            ptr: items.as_ptr(),
            len: items.len(),
        }
    }

    /// Borrow the elements as a slice.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads of `len` elements for the lifetime `'a`.
    pub unsafe fn as_slice<'a>(&self) -> Result<&'a [T], HostError> {
        if self.ptr.is_null() {
            return Err(HostError::invalid_argument("`wasm.ptr` must not be null"));
        }
        // SAFETY: non-null, and the caller guarantees validity for `len` reads.
        Ok(unsafe { slice::from_raw_parts(self.ptr, self.len) })
    }
}

/// Instance creation parameters.
///
/// The layout is `{ wasm, fuel }`. Headers that declare `Config` as
/// `{ wasm }` alone are not compatible: C callers must also pass `fuel`,
/// and 0 keeps the configured default.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Binary WebAssembly module.
    pub wasm: List<u8>,
    /// Fuel budget for the instance's lifetime; 0 uses the configured default.
    pub fuel: u64,
}

impl Config {
    /// Fuel override, if the caller set one.
    pub fn fuel(&self) -> Option<u64> {
        (self.fuel != 0).then_some(self.fuel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_as_slice() {
        let bytes = [1u8, 2, 3];
        let list = List::from_slice(&bytes);

        assert_eq!(unsafe { list.as_slice() }.unwrap(), &bytes);
    }

    #[test]
    fn test_list_null() {
        let list = List::<u8> {
            ptr: core::ptr::null(),
            len: 0,
        };

        assert!(matches!(
            unsafe { list.as_slice() },
            Err(HostError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_config_layout() {
        assert_eq!(
            core::mem::offset_of!(Config, fuel),
            core::mem::size_of::<List<u8>>()
        );
        assert_eq!(
            core::mem::size_of::<Config>(),
            core::mem::size_of::<List<u8>>() + core::mem::size_of::<u64>()
        );
    }

    #[test]
    fn test_config_fuel() {
        let mut config = Config {
            wasm: List::from_slice(&[]),
            fuel: 0,
        };
        assert_eq!(config.fuel(), None);

        config.fuel = 10;
        assert_eq!(config.fuel(), Some(10));
    }
}
