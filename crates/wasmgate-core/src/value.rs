//! Tagged values passed to and returned from exported functions.
//!
//! [`Value`] is the host-side representation of a WebAssembly value that can
//! cross the boundary; [`Signature`] describes an export in the same terms so
//! arguments can be checked before the engine is entered.

use std::fmt;
use std::str::FromStr;

use wasmtime::{FuncType, V128, Val, ValType};

use wasmgate_common::HostError;

/// Type tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// 32-bit integer.
    I32,
    /// 64-bit integer.
    I64,
    /// 32-bit IEEE float.
    F32,
    /// 64-bit IEEE float.
    F64,
    /// 128-bit SIMD vector.
    V128,
}

impl ValueKind {
    /// Map an engine value type, or `None` for reference types.
    pub fn from_val_type(ty: &ValType) -> Option<Self> {
        match ty {
            ValType::I32 => Some(Self::I32),
            ValType::I64 => Some(Self::I64),
            ValType::F32 => Some(Self::F32),
            ValType::F64 => Some(Self::F64),
            ValType::V128 => Some(Self::V128),
            _ => None,
        }
    }

    /// Size in bytes of the native representation.
    pub const fn size(self) -> usize {
        match self {
            Self::I32 | Self::F32 => 4,
            Self::I64 | Self::F64 => 8,
            Self::V128 => 16,
        }
    }

    /// Zero value of this kind, used to pre-size result buffers.
    pub fn zero(self) -> Val {
        match self {
            Self::I32 => Val::I32(0),
            Self::I64 => Val::I64(0),
            Self::F32 => Val::F32(0),
            Self::F64 => Val::F64(0),
            Self::V128 => Val::V128(V128::from(0u128)),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::V128 => "v128",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A WebAssembly value that can cross the host boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// 32-bit integer.
    I32(i32),
    /// 64-bit integer.
    I64(i64),
    /// 32-bit IEEE float.
    F32(f32),
    /// 64-bit IEEE float.
    F64(f64),
    /// 128-bit SIMD vector.
    V128(u128),
}

impl Value {
    /// Type tag of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::I32(_) => ValueKind::I32,
            Self::I64(_) => ValueKind::I64,
            Self::F32(_) => ValueKind::F32,
            Self::F64(_) => ValueKind::F64,
            Self::V128(_) => ValueKind::V128,
        }
    }

    /// Convert into the engine representation.
    pub fn to_val(self) -> Val {
        match self {
            Self::I32(v) => Val::I32(v),
            Self::I64(v) => Val::I64(v),
            Self::F32(v) => Val::F32(v.to_bits()),
            Self::F64(v) => Val::F64(v.to_bits()),
            Self::V128(v) => Val::V128(V128::from(v)),
        }
    }

    /// Convert from the engine representation, or `None` for references.
    pub fn from_val(val: &Val) -> Option<Self> {
        match val {
            Val::I32(v) => Some(Self::I32(*v)),
            Val::I64(v) => Some(Self::I64(*v)),
            Val::F32(bits) => Some(Self::F32(f32::from_bits(*bits))),
            Val::F64(bits) => Some(Self::F64(f64::from_bits(*bits))),
            Val::V128(v) => Some(Self::V128(v.as_u128())),
            _ => None,
        }
    }

    /// Native-endian bytes, as written through the C boundary.
    pub fn to_ne_bytes(self) -> Vec<u8> {
        match self {
            Self::I32(v) => v.to_ne_bytes().to_vec(),
            Self::I64(v) => v.to_ne_bytes().to_vec(),
            Self::F32(v) => v.to_ne_bytes().to_vec(),
            Self::F64(v) => v.to_ne_bytes().to_vec(),
            Self::V128(v) => v.to_ne_bytes().to_vec(),
        }
    }

    /// Decode a value of `kind` from its native bytes.
    ///
    /// `bytes` must hold exactly [`ValueKind::size`] bytes.
    pub fn from_ne_bytes(kind: ValueKind, bytes: &[u8]) -> Result<Self, HostError> {
        let wrong_size = || {
            HostError::invalid_argument(format!(
                "{kind} needs {} bytes, got {}",
                kind.size(),
                bytes.len()
            ))
        };
        Ok(match kind {
            ValueKind::I32 => Self::I32(i32::from_ne_bytes(
                bytes.try_into().map_err(|_| wrong_size())?,
            )),
            ValueKind::I64 => Self::I64(i64::from_ne_bytes(
                bytes.try_into().map_err(|_| wrong_size())?,
            )),
            ValueKind::F32 => Self::F32(f32::from_ne_bytes(
                bytes.try_into().map_err(|_| wrong_size())?,
            )),
            ValueKind::F64 => Self::F64(f64::from_ne_bytes(
                bytes.try_into().map_err(|_| wrong_size())?,
            )),
            ValueKind::V128 => Self::V128(u128::from_ne_bytes(
                bytes.try_into().map_err(|_| wrong_size())?,
            )),
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I32(v) => write!(f, "i32:{v}"),
            Self::I64(v) => write!(f, "i64:{v}"),
            Self::F32(v) => write!(f, "f32:{v}"),
            Self::F64(v) => write!(f, "f64:{v}"),
            Self::V128(v) => write!(f, "v128:{v:#034x}"),
        }
    }
}

/// Parses the `TYPE:VALUE` form, e.g. `i32:-7` or `v128:0xff`.
impl FromStr for Value {
    type Err = HostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ty, raw) = s.split_once(':').ok_or_else(|| {
            HostError::invalid_argument(format!("expected TYPE:VALUE, got '{s}'"))
        })?;
        let bad = |e: &dyn fmt::Display| {
            HostError::invalid_argument(format!("invalid {ty} value '{raw}': {e}"))
        };
        match ty {
            "i32" => raw.parse().map(Self::I32).map_err(|e| bad(&e)),
            "i64" => raw.parse().map(Self::I64).map_err(|e| bad(&e)),
            "f32" => raw.parse().map(Self::F32).map_err(|e| bad(&e)),
            "f64" => raw.parse().map(Self::F64).map_err(|e| bad(&e)),
            "v128" => {
                let parsed = match raw.strip_prefix("0x") {
                    Some(hex) => u128::from_str_radix(hex, 16),
                    None => raw.parse(),
                };
                parsed.map(Self::V128).map_err(|e| bad(&e))
            }
            other => Err(HostError::invalid_argument(format!(
                "unknown value type '{other}'"
            ))),
        }
    }
}

/// Parameter and result types of an exported function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Parameter types in order.
    pub params: Vec<ValueKind>,
    /// Result types in order.
    pub results: Vec<ValueKind>,
}

impl Signature {
    /// Build a signature from an engine function type.
    ///
    /// Fails with [`HostError::UnsupportedType`] if any parameter or result is
    /// a reference type.
    pub fn from_func_type(name: &str, ty: &FuncType) -> Result<Self, HostError> {
        let convert = |ty: ValType| {
            ValueKind::from_val_type(&ty).ok_or_else(|| HostError::UnsupportedType {
                name: name.to_string(),
                ty: ty.to_string(),
            })
        };
        Ok(Self {
            params: ty.params().map(convert).collect::<Result<_, _>>()?,
            results: ty.results().map(convert).collect::<Result<_, _>>()?,
        })
    }

    /// Check that `args` match the parameter list exactly.
    pub fn check_args(&self, name: &str, args: &[Value]) -> Result<(), HostError> {
        let matches = args.len() == self.params.len()
            && args.iter().zip(&self.params).all(|(arg, ty)| arg.kind() == *ty);
        if matches {
            return Ok(());
        }
        Err(HostError::SignatureMismatch {
            name: name.to_string(),
            expected: join_kinds(self.params.iter().copied()),
            actual: join_kinds(args.iter().map(Value::kind)),
        })
    }

    /// Number of pointer slots a caller passes: one per param and result.
    pub fn slot_count(&self) -> usize {
        self.params.len() + self.results.len()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}) -> ({})",
            join_kinds(self.params.iter().copied()),
            join_kinds(self.results.iter().copied())
        )
    }
}

fn join_kinds(kinds: impl Iterator<Item = ValueKind>) -> String {
    kinds.map(ValueKind::as_str).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_signature() -> Signature {
        Signature {
            params: vec![ValueKind::I32, ValueKind::I32],
            results: vec![ValueKind::I32],
        }
    }

    #[test]
    fn test_value_engine_conversion() {
        let values = [
            Value::I32(-3),
            Value::I64(1 << 40),
            Value::F32(1.5),
            Value::F64(-0.25),
            Value::V128(0xdead_beef),
        ];
        for value in values {
            let back = Value::from_val(&value.to_val()).unwrap();
            assert_eq!(back, value);
        }
    }

    #[test]
    fn test_float_bits_preserved() {
        let val = Value::F32(f32::NAN).to_val();
        let Val::F32(bits) = val else {
            panic!("expected f32, got {val:?}");
        };
        assert_eq!(bits, f32::NAN.to_bits());
    }

    #[test]
    fn test_from_ne_bytes_wrong_size() {
        let result = Value::from_ne_bytes(ValueKind::I64, &[0; 4]);
        assert!(matches!(result, Err(HostError::InvalidArgument { .. })));
    }

    #[test]
    fn test_from_ne_bytes() {
        let bytes = 42i32.to_ne_bytes();
        let value = Value::from_ne_bytes(ValueKind::I32, &bytes).unwrap();
        assert_eq!(value, Value::I32(42));
        assert_eq!(value.to_ne_bytes(), bytes);
    }

    #[test]
    fn test_parse_values() {
        assert_eq!("i32:-7".parse::<Value>().unwrap(), Value::I32(-7));
        assert_eq!("i64:9000000000".parse::<Value>().unwrap(), Value::I64(9_000_000_000));
        assert_eq!("f32:2.5".parse::<Value>().unwrap(), Value::F32(2.5));
        assert_eq!("f64:0.125".parse::<Value>().unwrap(), Value::F64(0.125));
        assert_eq!("v128:0xff".parse::<Value>().unwrap(), Value::V128(255));
        assert_eq!("v128:16".parse::<Value>().unwrap(), Value::V128(16));
    }

    #[test]
    fn test_parse_invalid_values() {
        assert!("42".parse::<Value>().is_err());
        assert!("i32:abc".parse::<Value>().is_err());
        assert!("u8:1".parse::<Value>().is_err());
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::I32(5).to_string(), "i32:5");
        assert_eq!(Value::F64(1.5).to_string(), "f64:1.5");
    }

    #[test]
    fn test_check_args_ok() {
        let sig = add_signature();
        assert!(sig.check_args("add", &[Value::I32(1), Value::I32(2)]).is_ok());
    }

    #[test]
    fn test_check_args_arity() {
        let sig = add_signature();
        let err = sig.check_args("add", &[Value::I32(1)]).unwrap_err();

        assert!(matches!(err, HostError::SignatureMismatch { .. }));
        assert!(err.to_string().contains("expected (i32, i32), got (i32)"));
    }

    #[test]
    fn test_check_args_types() {
        let sig = add_signature();
        let err = sig
            .check_args("add", &[Value::I32(1), Value::F64(2.0)])
            .unwrap_err();

        assert!(err.to_string().contains("got (i32, f64)"));
    }

    #[test]
    fn test_signature_display() {
        assert_eq!(add_signature().to_string(), "(i32, i32) -> (i32)");
        assert_eq!(add_signature().slot_count(), 3);
    }

    #[test]
    fn test_signature_from_func_type() {
        let engine = wasmtime::Engine::default();
        let ty = FuncType::new(&engine, [ValType::I64, ValType::F32], [ValType::F64]);
        let sig = Signature::from_func_type("f", &ty).unwrap();

        assert_eq!(sig.params, vec![ValueKind::I64, ValueKind::F32]);
        assert_eq!(sig.results, vec![ValueKind::F64]);
    }
}
