//! Resource accounting across the C boundary.
//!
//! Kept in its own test binary so no other test shares the process-wide
//! registry while instances are counted.

#![allow(unsafe_code)]

use core::ffi::c_void;
use core::ptr;

use wasmgate_ffi::{
    Config, List, error_len, instance_call, instance_free, instance_new, registry,
};

const WAT: &str = r#"
    (module
        (memory (export "memory") 1)
        (func (export "answer") (result i32) (i32.const 42)))
"#;

#[test]
fn test_create_call_free_cycles_do_not_grow() {
    let wasm = wat::parse_str(WAT).unwrap();
    let registry = registry().unwrap();
    let baseline = registry.len();

    for _ in 0..100 {
        let instance = unsafe {
            instance_new(Config {
                wasm: List::from_slice(&wasm),
                fuel: 0,
            })
        };
        assert!(!instance.is_null());
        assert_eq!(registry.len(), baseline + 1);

        let mut out = 0i32;
        let args: [*mut c_void; 1] = [ptr::from_mut(&mut out).cast()];
        let ok = unsafe { instance_call(instance, ptr::null(), c"answer".as_ptr(), args.as_ptr()) };
        assert!(ok);
        assert_eq!(out, 42);

        unsafe { instance_free(instance) };
        assert_eq!(error_len(), 0);
    }

    assert_eq!(registry.len(), baseline);
}
