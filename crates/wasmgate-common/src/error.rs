//! Error types for wasmgate.
//!
//! [`HostError`] covers every failure the host layer can report, grouped the
//! way callers need to react to them:
//! - configuration: the module bytes or the caller's arguments are unusable
//! - instantiation: the module is valid but cannot be brought to life
//! - dispatch: the requested export cannot be called as asked
//! - execution: the guest trapped or ran out of fuel

use std::io;

use thiserror::Error;

/// Top-level host errors.
#[derive(Error, Debug)]
pub enum HostError {
    /// The bytes are not a valid WebAssembly module.
    #[error("Invalid module: {reason}")]
    InvalidModule {
        /// Description of the decoding or validation failure.
        reason: String,
    },

    /// Invalid configuration was provided.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// A boundary argument (pointer, string, buffer range) was unusable.
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// Description of why the argument was invalid.
        reason: String,
    },

    /// The module compiled but could not be instantiated.
    ///
    /// Covers unresolved imports, resource limits, and traps raised by the
    /// start function.
    #[error("Instantiation failed: {reason}")]
    Instantiation {
        /// Description of the instantiation failure.
        reason: String,
    },

    /// The handle does not name a live instance.
    #[error("Invalid instance handle: {handle:#x}")]
    InvalidHandle {
        /// The raw handle value.
        handle: u64,
    },

    /// No export with the given name exists.
    #[error("Export not found: {name}")]
    ExportNotFound {
        /// The export name that was looked up.
        name: String,
    },

    /// The export exists but is a memory, table, or global.
    #[error("Export '{name}' is not a function (found {kind})")]
    NotAFunction {
        /// The export name.
        name: String,
        /// The kind of extern the name resolved to.
        kind: &'static str,
    },

    /// The arguments do not match the export's signature.
    #[error("Signature mismatch calling '{name}': expected ({expected}), got ({actual})")]
    SignatureMismatch {
        /// The export name.
        name: String,
        /// The declared parameter types.
        expected: String,
        /// The supplied argument types.
        actual: String,
    },

    /// The export uses a value type that cannot cross the boundary.
    #[error("Unsupported value type in '{name}': {ty}")]
    UnsupportedType {
        /// The export name.
        name: String,
        /// The offending type.
        ty: String,
    },

    /// A WebAssembly trap occurred during execution.
    #[error("Wasm trap: {message}")]
    Trap {
        /// Description of the trap.
        message: String,
        /// Trap code if available.
        code: Option<String>,
    },

    /// Execution exhausted the configured fuel limit.
    #[error("Fuel exhausted: CPU limit exceeded")]
    FuelExhausted,

    /// The settings file could not be read or parsed.
    #[error("Invalid settings: {reason}")]
    Settings {
        /// Description of the settings failure.
        reason: String,
    },

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The host itself failed, e.g. a panic caught at the C boundary.
    #[error("Internal error: {reason}")]
    Internal {
        /// Description of the failure.
        reason: String,
    },
}

impl HostError {
    /// Create a new `InvalidModule` error.
    pub fn invalid_module(reason: impl Into<String>) -> Self {
        Self::InvalidModule {
            reason: reason.into(),
        }
    }

    /// Create a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a new `InvalidArgument` error.
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Create a new `Instantiation` error.
    pub fn instantiation(reason: impl Into<String>) -> Self {
        Self::Instantiation {
            reason: reason.into(),
        }
    }

    /// Create a new `ExportNotFound` error.
    pub fn export_not_found(name: impl Into<String>) -> Self {
        Self::ExportNotFound { name: name.into() }
    }

    /// Create a new `Trap` error.
    pub fn trap(message: impl Into<String>, code: Option<String>) -> Self {
        Self::Trap {
            message: message.into(),
            code,
        }
    }

    /// Create a new `Settings` error.
    pub fn settings(reason: impl Into<String>) -> Self {
        Self::Settings {
            reason: reason.into(),
        }
    }

    /// Create a new `Internal` error.
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    /// Returns `true` for errors caused by unusable input rather than the guest.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidModule { .. }
                | Self::InvalidConfig { .. }
                | Self::InvalidArgument { .. }
                | Self::Settings { .. }
        )
    }

    /// Returns `true` if the export could not be called as requested.
    pub fn is_dispatch(&self) -> bool {
        matches!(
            self,
            Self::InvalidHandle { .. }
                | Self::ExportNotFound { .. }
                | Self::NotAFunction { .. }
                | Self::SignatureMismatch { .. }
                | Self::UnsupportedType { .. }
        )
    }

    /// Returns `true` if guest execution was aborted.
    pub fn is_trap(&self) -> bool {
        matches!(self, Self::Trap { .. } | Self::FuelExhausted)
    }
}
