//! Self-describing binary object-graph codec, wire-compatible with the
//! format the dedup payload writer uses (Go's `encoding/gob`). The stream
//! is a sequence of length-prefixed messages: type definitions introduced
//! by a negative type id, then one value message introduced by a positive
//! id. Decoded data lands in the tagged [`Value`] graph rather than
//! anything stringly or dynamically typed.

mod decode;
mod encode;

pub use decode::Decoder;
pub use encode::Encoder;

// Builtin type ids fixed by the wire format.
pub(crate) const BOOL_ID: i64 = 1;
pub(crate) const INT_ID: i64 = 2;
pub(crate) const UINT_ID: i64 = 3;
pub(crate) const FLOAT_ID: i64 = 4;
pub(crate) const BYTES_ID: i64 = 5;
pub(crate) const STRING_ID: i64 = 6;
pub(crate) const COMPLEX_ID: i64 = 7;
pub(crate) const INTERFACE_ID: i64 = 8;
/// Ids below this are reserved for the bootstrap types.
pub(crate) const FIRST_USER_ID: i64 = 65;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum GobError {
    #[error("gob stream ended unexpectedly")]
    Truncated,
    #[error("invalid unsigned integer prefix {0:#04x}")]
    BadUintPrefix(u8),
    #[error("reference to undefined type id {0}")]
    UnknownType(i64),
    #[error("{0} are not supported")]
    Unsupported(&'static str),
    #[error("malformed gob stream: {0}")]
    Malformed(&'static str),
    #[error("cannot encode {0}")]
    Unencodable(&'static str),
    #[error("container elements have mixed types")]
    Heterogeneous,
}

/// A decoded gob value. Maps keep wire order; struct fields appear in the
/// order they were transmitted, absent fields were zero on the writer side.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A nil interface value.
    Nil,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Bytes(Vec<u8>),
    String(String),
    Slice(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Struct {
        name: String,
        fields: Vec<(String, Value)>,
    },
    /// A concrete value transmitted through an interface, tagged with the
    /// registered name of its concrete type.
    Interface {
        concrete: String,
        value: Box<Value>,
    },
}

impl Value {
    /// Looks up a struct field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct { fields, .. } => {
                fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

/// Composite type descriptors carried by type-definition messages.
#[derive(Debug, Clone)]
pub(crate) enum WireType {
    Array {
        elem: i64,
        len: i64,
    },
    Slice {
        elem: i64,
    },
    Struct {
        name: String,
        fields: Vec<(String, i64)>,
    },
    Map {
        key: i64,
        elem: i64,
    },
}
