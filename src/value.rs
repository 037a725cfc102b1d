//! The dynamic value tree bodies are built from and decoded into.
//!
//! Unlike a signature, a `Value` does not know its own exact wire shape in
//! every case (an empty `Array` does not carry its element type) — that is
//! supplied separately by a [`crate::signature::Signature`] at verify,
//! marshal, and unmarshal time.

use crate::signature::Signature;

/// A self-describing value: a signature paired with the value it describes.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub signature: Signature,
    pub value: Box<Value>,
}

impl Variant {
    pub fn new(signature: Signature, value: Value) -> Self {
        Variant {
            signature,
            value: Box::new(value),
        }
    }
}

/// A single value in a D-Bus message body.
///
/// `ByteArray` is kept distinct from `Array` so that `ay` never pays for a
/// `Value` wrapper per byte, matching the wire format's own special case.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Byte(u8),
    Boolean(bool),
    Int16(i16),
    Uint16(u16),
    Int32(i32),
    Uint32(u32),
    Int64(i64),
    Uint64(u64),
    Double(f64),
    /// A file-descriptor slot. Before [`crate::fd::lower`] this holds a raw
    /// fd number; after it, an index into the fd sidecar.
    UnixFd(u32),
    String(String),
    ObjectPath(String),
    Signature(String),
    Variant(Variant),
    Array(Vec<Value>),
    ByteArray(Vec<u8>),
    /// An ordered association list, not a `HashMap`: D-Bus dict ordering is
    /// preserved on the wire and keys are not required to implement `Hash`
    /// (a `d` key is legal D-Bus and `f64` does not implement it).
    Dict(Vec<(Value, Value)>),
    Struct(Vec<Value>),
}

impl Value {
    /// A best-effort single-character label for error messages. Containers
    /// that share a code with another shape (`Array` vs `Dict`, both `a`)
    /// are disambiguated by the caller already holding the signature node.
    pub fn kind_label(&self) -> &'static str {
        match self {
            Value::Byte(_) => "y",
            Value::Boolean(_) => "b",
            Value::Int16(_) => "n",
            Value::Uint16(_) => "q",
            Value::Int32(_) => "i",
            Value::Uint32(_) => "u",
            Value::Int64(_) => "x",
            Value::Uint64(_) => "t",
            Value::Double(_) => "d",
            Value::UnixFd(_) => "h",
            Value::String(_) => "s",
            Value::ObjectPath(_) => "o",
            Value::Signature(_) => "g",
            Value::Variant(_) => "v",
            Value::Array(_) => "a",
            Value::ByteArray(_) => "ay",
            Value::Dict(_) => "a{..}",
            Value::Struct(_) => "(...)",
        }
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::Byte(v)
    }
}
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}
impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Int16(v)
    }
}
impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::Uint16(v)
    }
}
impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}
impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Uint32(v)
    }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}
impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint64(v)
    }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}
