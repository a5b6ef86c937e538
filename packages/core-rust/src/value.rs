//! Typed value model shared by the command protocol and the status channel.
//!
//! Everything that crosses a Registry socket is a [`Value`]: requests and
//! responses are arrays, status events are arrays, TXT-style metadata is a
//! map. The wire form is MessagePack, produced and consumed through `rmpv`
//! so payload shapes stay dynamic (a request's argument list is not known
//! until the opcode is dispatched).

use std::collections::{BTreeMap, BTreeSet};

/// Wildcard data type: compatible with any channel data type.
pub const WILDCARD_DATA_TYPE: &str = "*";

/// MessagePack ext type tag used to mark a set on the wire.
///
/// MessagePack has no native set; we encode one as ext(1) wrapping an
/// encoded array of the members in sorted order, which keeps the encoding
/// deterministic.
const SET_EXT_TYPE: i8 = 1;

/// Errors from encoding or decoding a [`Value`].
#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    #[error("failed to write MessagePack value: {0}")]
    Encode(String),
    #[error("failed to read MessagePack value: {0}")]
    Decode(String),
    #[error("unsupported wire value: {0}")]
    Unsupported(String),
    #[error("{0} bytes left over after decoding a value")]
    TrailingBytes(usize),
}

/// A dynamically typed value carried over Registry sockets.
///
/// Map keys and set members are strings: the Registry's wire surface only
/// ever keys maps by name and only carries name sets, and string keys keep
/// ordering and equality well-defined.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Logical(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Blob(Vec<u8>),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Set(BTreeSet<String>),
}

impl Value {
    /// Encodes this value to its MessagePack wire form.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::Encode`] if the underlying writer fails, which
    /// cannot happen when writing into a `Vec`.
    pub fn encode(&self) -> Result<Vec<u8>, ValueError> {
        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, &self.to_rmpv()?)
            .map_err(|e| ValueError::Encode(e.to_string()))?;
        Ok(buf)
    }

    /// Decodes a single value from `bytes`, requiring the whole buffer to
    /// be consumed.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::Decode`] on malformed MessagePack,
    /// [`ValueError::Unsupported`] on wire kinds the value model does not
    /// admit (nil, non-string map keys, unknown ext types), and
    /// [`ValueError::TrailingBytes`] when the buffer holds more than one
    /// value.
    pub fn decode(bytes: &[u8]) -> Result<Self, ValueError> {
        let mut cursor = bytes;
        let raw = rmpv::decode::read_value(&mut cursor)
            .map_err(|e| ValueError::Decode(e.to_string()))?;
        if !cursor.is_empty() {
            return Err(ValueError::TrailingBytes(cursor.len()));
        }
        Self::from_rmpv(raw)
    }

    fn to_rmpv(&self) -> Result<rmpv::Value, ValueError> {
        Ok(match self {
            Self::Logical(b) => rmpv::Value::Boolean(*b),
            Self::Integer(i) => rmpv::Value::from(*i),
            Self::Double(d) => rmpv::Value::F64(*d),
            Self::String(s) => rmpv::Value::String(s.clone().into()),
            Self::Blob(b) => rmpv::Value::Binary(b.clone()),
            Self::Array(items) => rmpv::Value::Array(
                items
                    .iter()
                    .map(Self::to_rmpv)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Self::Map(entries) => rmpv::Value::Map(
                entries
                    .iter()
                    .map(|(k, v)| Ok((rmpv::Value::String(k.clone().into()), v.to_rmpv()?)))
                    .collect::<Result<Vec<_>, ValueError>>()?,
            ),
            Self::Set(members) => {
                // Members are already sorted by the BTreeSet.
                let inner = rmpv::Value::Array(
                    members
                        .iter()
                        .map(|m| rmpv::Value::String(m.clone().into()))
                        .collect(),
                );
                let mut payload = Vec::new();
                rmpv::encode::write_value(&mut payload, &inner)
                    .map_err(|e| ValueError::Encode(e.to_string()))?;
                rmpv::Value::Ext(SET_EXT_TYPE, payload)
            }
        })
    }

    fn from_rmpv(raw: rmpv::Value) -> Result<Self, ValueError> {
        match raw {
            rmpv::Value::Boolean(b) => Ok(Self::Logical(b)),
            rmpv::Value::Integer(i) => i
                .as_i64()
                .map(Self::Integer)
                .ok_or_else(|| ValueError::Unsupported(format!("integer out of range: {i}"))),
            rmpv::Value::F32(f) => Ok(Self::Double(f64::from(f))),
            rmpv::Value::F64(d) => Ok(Self::Double(d)),
            rmpv::Value::String(s) => s
                .into_str()
                .map(Self::String)
                .ok_or_else(|| ValueError::Unsupported("non-UTF-8 string".to_string())),
            rmpv::Value::Binary(b) => Ok(Self::Blob(b)),
            rmpv::Value::Array(items) => Ok(Self::Array(
                items
                    .into_iter()
                    .map(Self::from_rmpv)
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            rmpv::Value::Map(entries) => {
                let mut map = BTreeMap::new();
                for (key, val) in entries {
                    let rmpv::Value::String(key) = key else {
                        return Err(ValueError::Unsupported(
                            "map key is not a string".to_string(),
                        ));
                    };
                    let Some(key) = key.into_str() else {
                        return Err(ValueError::Unsupported(
                            "map key is not UTF-8".to_string(),
                        ));
                    };
                    map.insert(key, Self::from_rmpv(val)?);
                }
                Ok(Self::Map(map))
            }
            rmpv::Value::Ext(SET_EXT_TYPE, payload) => {
                let mut cursor = payload.as_slice();
                let inner = rmpv::decode::read_value(&mut cursor)
                    .map_err(|e| ValueError::Decode(e.to_string()))?;
                let rmpv::Value::Array(items) = inner else {
                    return Err(ValueError::Unsupported(
                        "set payload is not an array".to_string(),
                    ));
                };
                let mut members = BTreeSet::new();
                for item in items {
                    let rmpv::Value::String(s) = item else {
                        return Err(ValueError::Unsupported(
                            "set member is not a string".to_string(),
                        ));
                    };
                    let Some(s) = s.into_str() else {
                        return Err(ValueError::Unsupported(
                            "set member is not UTF-8".to_string(),
                        ));
                    };
                    members.insert(s);
                }
                Ok(Self::Set(members))
            }
            rmpv::Value::Ext(tag, _) => {
                Err(ValueError::Unsupported(format!("unknown ext type {tag}")))
            }
            rmpv::Value::Nil => Err(ValueError::Unsupported("nil".to_string())),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Returns the string payload, or `None` for any other kind.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer payload, or `None` for any other kind.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the logical payload, or `None` for any other kind.
    #[must_use]
    pub fn as_logical(&self) -> Option<bool> {
        match self {
            Self::Logical(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the array items, or `None` for any other kind.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Short human-readable name of this value's kind, for error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Logical(_) => "logical",
            Self::Integer(_) => "integer",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Blob(_) => "blob",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
            Self::Set(_) => "set",
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Logical(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_roundtrip() {
        for b in [true, false] {
            let val = Value::Logical(b);
            let bytes = val.encode().expect("encode");
            assert_eq!(Value::decode(&bytes).expect("decode"), val);
        }
    }

    #[test]
    fn integer_roundtrip() {
        for i in [0_i64, -1, 1, i64::MIN, i64::MAX, 0xC0A8_010B] {
            let val = Value::Integer(i);
            let bytes = val.encode().expect("encode");
            assert_eq!(Value::decode(&bytes).expect("decode"), val);
        }
    }

    #[test]
    fn double_roundtrip() {
        let val = Value::Double(3.25);
        let bytes = val.encode().expect("encode");
        assert_eq!(Value::decode(&bytes).expect("decode"), val);
    }

    #[test]
    fn string_roundtrip() {
        let val = Value::String("motion/out".to_string());
        let bytes = val.encode().expect("encode");
        assert_eq!(Value::decode(&bytes).expect("decode"), val);
    }

    #[test]
    fn blob_roundtrip() {
        let val = Value::Blob(vec![0, 1, 2, 255]);
        let bytes = val.encode().expect("encode");
        assert_eq!(Value::decode(&bytes).expect("decode"), val);
    }

    #[test]
    fn nested_array_roundtrip() {
        let val = Value::Array(vec![
            Value::String("addN".to_string()),
            Value::Integer(42),
            Value::Logical(true),
            Value::Array(vec![Value::Integer(1), Value::Integer(2)]),
        ]);
        let bytes = val.encode().expect("encode");
        assert_eq!(Value::decode(&bytes).expect("decode"), val);
    }

    #[test]
    fn map_roundtrip() {
        let mut map = BTreeMap::new();
        map.insert("status-addr".to_string(), Value::String("239.17.12.1:9999".to_string()));
        map.insert("port".to_string(), Value::Integer(40_000));
        let val = Value::Map(map);
        let bytes = val.encode().expect("encode");
        assert_eq!(Value::decode(&bytes).expect("decode"), val);
    }

    #[test]
    fn set_roundtrip() {
        let val = Value::Set(["beta", "alpha", "gamma"].iter().map(ToString::to_string).collect());
        let bytes = val.encode().expect("encode");
        assert_eq!(Value::decode(&bytes).expect("decode"), val);
    }

    #[test]
    fn set_encoding_is_deterministic() {
        let a = Value::Set(["x", "a", "m"].iter().map(ToString::to_string).collect());
        let b = Value::Set(["m", "x", "a"].iter().map(ToString::to_string).collect());
        assert_eq!(a.encode().expect("encode"), b.encode().expect("encode"));
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut bytes = Value::Integer(7).encode().expect("encode");
        bytes.push(0xC0);
        let err = Value::decode(&bytes).expect_err("trailing bytes must fail");
        assert!(matches!(err, ValueError::TrailingBytes(1)));
    }

    #[test]
    fn nil_rejected() {
        // 0xC0 is MessagePack nil, which the value model does not admit.
        let err = Value::decode(&[0xC0]).expect_err("nil must fail");
        assert!(matches!(err, ValueError::Unsupported(_)));
    }

    #[test]
    fn truncated_input_rejected() {
        let bytes = Value::String("abcdef".to_string()).encode().expect("encode");
        let err = Value::decode(&bytes[..bytes.len() - 2]).expect_err("truncation must fail");
        assert!(matches!(err, ValueError::Decode(_)));
    }

    #[test]
    fn unknown_ext_rejected() {
        let raw = rmpv::Value::Ext(9, vec![1, 2, 3]);
        let mut bytes = Vec::new();
        rmpv::encode::write_value(&mut bytes, &raw).expect("encode raw ext");
        let err = Value::decode(&bytes).expect_err("unknown ext must fail");
        assert!(matches!(err, ValueError::Unsupported(_)));
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::String("x".to_string()).as_str(), Some("x"));
        assert_eq!(Value::Integer(5).as_i64(), Some(5));
        assert_eq!(Value::Logical(true).as_logical(), Some(true));
        assert!(Value::Integer(5).as_str().is_none());
        assert_eq!(Value::Integer(5).kind(), "integer");
        assert_eq!(Value::Set(BTreeSet::new()).kind(), "set");
    }

    mod properties {
        use proptest::prelude::*;

        use super::*;

        fn scalar() -> impl Strategy<Value = Value> {
            prop_oneof![
                any::<bool>().prop_map(Value::Logical),
                any::<i64>().prop_map(Value::Integer),
                // Finite doubles only: NaN breaks PartialEq-based comparison.
                (-1.0e12..1.0e12_f64).prop_map(Value::Double),
                "[a-z/_.*-]{0,12}".prop_map(Value::String),
                proptest::collection::vec(any::<u8>(), 0..32).prop_map(Value::Blob),
            ]
        }

        fn value_tree() -> impl Strategy<Value = Value> {
            scalar().prop_recursive(3, 24, 6, |inner| {
                prop_oneof![
                    proptest::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                    proptest::collection::btree_map("[a-z]{1,8}", inner, 0..6)
                        .prop_map(Value::Map),
                    proptest::collection::btree_set("[a-z]{1,8}", 0..6).prop_map(Value::Set),
                ]
            })
        }

        proptest! {
            #[test]
            fn encode_decode_roundtrip(val in value_tree()) {
                let bytes = val.encode().unwrap();
                prop_assert_eq!(Value::decode(&bytes).unwrap(), val);
            }
        }
    }
}
