//! WebAssembly module compilation.
//!
//! [`CompiledModule`] wraps a Wasmtime [`Module`] together with a content hash
//! used to correlate log lines. Compilation also performs full validation, so
//! a module that compiles here is safe to hand to the linker.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::Path;
use std::time::Instant;

use tracing::{info, instrument};
use wasmtime::{Engine, ExternType, Module};

use wasmgate_common::HostError;

use crate::value::Signature;

/// A compiled, validated core WebAssembly module.
///
/// Cheap to clone; the compiled code is shared.
#[derive(Clone)]
pub struct CompiledModule {
    inner: Module,

    /// Hash of the original bytes.
    content_hash: String,
}

/// One entry of a module's export list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportInfo {
    /// Export name.
    pub name: String,
    /// Extern kind: `func`, `memory`, `table`, or `global`.
    pub kind: &'static str,
    /// Function signature, when the export is a function with boundary types.
    pub signature: Option<Signature>,
}

impl CompiledModule {
    /// Compile a core module from binary WebAssembly bytes.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::InvalidModule`] if the bytes are not a binary
    /// module or fail validation.
    #[instrument(skip(engine, bytes), fields(bytes_len = bytes.len()))]
    pub fn from_bytes(engine: &Engine, bytes: &[u8]) -> Result<Self, HostError> {
        let start = Instant::now();

        Self::validate_wasm_header(bytes)?;

        let module = Module::from_binary(engine, bytes)
            .map_err(|e| HostError::invalid_module(format!("{e:#}")))?;

        let content_hash = compute_hash(bytes);

        info!(
            content_hash = %content_hash,
            duration_ms = start.elapsed().as_millis(),
            "Core module compiled"
        );

        Ok(Self {
            inner: module,
            content_hash,
        })
    }

    /// Compile a core module from WAT (WebAssembly Text Format).
    ///
    /// Used by the CLI and tests.
    #[instrument(skip(engine, wat))]
    pub fn from_wat(engine: &Engine, wat: &str) -> Result<Self, HostError> {
        let start = Instant::now();

        let module = Module::new(engine, wat)
            .map_err(|e| HostError::invalid_module(format!("WAT compilation failed: {e:#}")))?;

        let content_hash = compute_hash(wat.as_bytes());

        info!(
            content_hash = %content_hash,
            duration_ms = start.elapsed().as_millis(),
            "WAT module compiled"
        );

        Ok(Self {
            inner: module,
            content_hash,
        })
    }

    /// Load a module from disk.
    ///
    /// Files ending in `.wat` are compiled as text, anything else as binary.
    #[instrument(skip(engine, path), fields(path = %path.as_ref().display()))]
    pub fn from_file(engine: &Engine, path: impl AsRef<Path>) -> Result<Self, HostError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;

        if path.extension().is_some_and(|ext| ext == "wat") {
            let text = std::str::from_utf8(&bytes)
                .map_err(|e| HostError::invalid_module(format!("WAT is not UTF-8: {e}")))?;
            return Self::from_wat(engine, text);
        }

        Self::from_bytes(engine, &bytes)
    }

    /// Get the content hash of the original bytes.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Get the inner Wasmtime module.
    pub fn as_module(&self) -> &Module {
        &self.inner
    }

    /// Names of the imports this module requires, as `module::name`.
    pub fn imports(&self) -> Vec<String> {
        self.inner
            .imports()
            .map(|import| format!("{}::{}", import.module(), import.name()))
            .collect()
    }

    /// List the module's exports with their kinds and function signatures.
    pub fn exports(&self) -> Vec<ExportInfo> {
        self.inner
            .exports()
            .map(|export| {
                let (kind, signature) = match export.ty() {
                    ExternType::Func(ty) => {
                        ("func", Signature::from_func_type(export.name(), &ty).ok())
                    }
                    ExternType::Memory(_) => ("memory", None),
                    ExternType::Table(_) => ("table", None),
                    ExternType::Global(_) => ("global", None),
                    #[allow(unreachable_patterns)]
                    _ => ("extern", None),
                };
                ExportInfo {
                    name: export.name().to_string(),
                    kind,
                    signature,
                }
            })
            .collect()
    }

    /// Validate WebAssembly header (magic number and size).
    fn validate_wasm_header(bytes: &[u8]) -> Result<(), HostError> {
        if bytes.len() < 8 {
            return Err(HostError::invalid_module("file too small"));
        }

        if &bytes[0..4] != b"\0asm" {
            return Err(HostError::invalid_module("bad magic number"));
        }

        Ok(())
    }
}

impl std::fmt::Debug for CompiledModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledModule")
            .field("content_hash", &self.content_hash)
            .finish_non_exhaustive()
    }
}

/// Compute a hash of the given bytes.
fn compute_hash(bytes: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueKind;

    // Minimal valid Wasm module (empty module)
    const MINIMAL_WASM: &[u8] = &[
        0x00, 0x61, 0x73, 0x6d, // magic: \0asm
        0x01, 0x00, 0x00, 0x00, // version: 1
    ];

    #[test]
    fn test_validate_wasm_header_valid() {
        assert!(CompiledModule::validate_wasm_header(MINIMAL_WASM).is_ok());
    }

    #[test]
    fn test_validate_wasm_header_too_small() {
        let result = CompiledModule::validate_wasm_header(&[0x00, 0x61]);
        assert!(matches!(result, Err(HostError::InvalidModule { .. })));
    }

    #[test]
    fn test_validate_wasm_header_bad_magic() {
        let bad_wasm = &[0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00];
        let result = CompiledModule::validate_wasm_header(bad_wasm);
        assert!(result.is_err());
    }

    #[test]
    fn test_compute_hash() {
        let hash1 = compute_hash(b"hello");
        let hash2 = compute_hash(b"hello");
        let hash3 = compute_hash(b"world");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
        assert_eq!(hash1.len(), 16);
    }

    #[test]
    fn test_module_compilation() {
        let engine = Engine::default();
        let module = CompiledModule::from_bytes(&engine, MINIMAL_WASM).unwrap();

        assert!(!module.content_hash().is_empty());
        assert!(module.exports().is_empty());
        assert!(module.imports().is_empty());
    }

    #[test]
    fn test_text_rejected_as_binary() {
        let engine = Engine::default();
        let result = CompiledModule::from_bytes(&engine, b"(module)");

        assert!(matches!(result, Err(HostError::InvalidModule { .. })));
    }

    #[test]
    fn test_truncated_module_rejected() {
        let engine = Engine::default();
        // Valid header followed by a type section that claims 5 bytes but has 1.
        let bytes = [0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00, 0x01, 0x05, 0x01];
        let result = CompiledModule::from_bytes(&engine, &bytes);

        assert!(matches!(result, Err(HostError::InvalidModule { .. })));
    }

    #[test]
    fn test_from_missing_file() {
        let engine = Engine::default();
        let result = CompiledModule::from_file(&engine, "/nonexistent/module.wasm");

        assert!(matches!(result, Err(HostError::Io(_))));
    }

    #[test]
    fn test_exports_and_imports() {
        let engine = Engine::default();
        let module = CompiledModule::from_wat(
            &engine,
            r#"
            (module
                (import "env" "tick" (func))
                (memory (export "memory") 1)
                (global (export "counter") (mut i32) (i32.const 0))
                (func (export "add") (param i32 i32) (result i32)
                    (i32.add (local.get 0) (local.get 1)))
            )
            "#,
        )
        .unwrap();

        assert_eq!(module.imports(), vec!["env::tick".to_string()]);

        let exports = module.exports();
        assert_eq!(exports.len(), 3);
        let kind_of = |name: &str| exports.iter().find(|e| e.name == name).map(|e| e.kind);
        assert_eq!(kind_of("memory"), Some("memory"));
        assert_eq!(kind_of("counter"), Some("global"));
        assert_eq!(kind_of("add"), Some("func"));

        let add = exports.iter().find(|e| e.name == "add").unwrap();
        assert_eq!(
            add.signature.as_ref().unwrap().params,
            vec![ValueKind::I32, ValueKind::I32]
        );
    }

    #[test]
    fn test_module_debug() {
        let engine = Engine::default();
        let module = CompiledModule::from_bytes(&engine, MINIMAL_WASM).unwrap();

        let debug_str = format!("{module:?}");
        assert!(debug_str.contains("CompiledModule"));
        assert!(debug_str.contains("content_hash"));
    }
}
