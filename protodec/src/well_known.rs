//! Native types for the `google.protobuf` well-known messages.
//!
//! These types are not owned by any schema a decoder is generated for, so no
//! specialized decoder exists for them. Instead each type describes its own
//! fields through [`WellKnown`] and a single generic loop, [`merge`], decodes
//! all of them. A `google.protobuf` type without a native counterpart here
//! decodes as a [`RawMessage`].

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::cursor::DecodeCursor;
use crate::error::DecodeError;
use crate::message::DecodeMessage;
use crate::wire::WireType;

/// Prefix of every fully-qualified well-known type name.
pub const WELL_KNOWN_PREFIX: &str = "google.protobuf.";

/// Per-field hook used by the shared well-known decode loop.
pub trait WellKnown: Default {
    const NAME: &'static str;

    /// Decodes one occurrence of field `number`.
    ///
    /// Returns `Ok(false)` if `number` is not a field of this type, in which
    /// case the caller skips the value.
    fn merge_field(
        &mut self,
        number: u32,
        wire_type: WireType,
        cur: &mut DecodeCursor<'_>,
    ) -> Result<bool, DecodeError>;

    /// Receives the raw bytes, key included, of a field `merge_field` did
    /// not claim. Dropped by default.
    fn keep_unknown(&mut self, _raw: &[u8]) {}
}

/// The shared decoder for every well-known type.
pub fn merge<T: WellKnown>(msg: &mut T, cur: &mut DecodeCursor<'_>) -> Result<(), DecodeError> {
    while cur.has_remaining() {
        let start = cur.position();
        let (number, wire_type) = cur.read_key()?;
        if !msg.merge_field(number, wire_type, cur)? {
            cur.skip_value(wire_type)?;
            msg.keep_unknown(cur.raw_since(start));
        }
    }
    Ok(())
}

/// Decodes a fresh `T` from the nested message at the cursor.
#[inline]
fn read_nested<T: WellKnown>(cur: &mut DecodeCursor<'_>) -> Result<T, DecodeError> {
    let mut sub = cur.read_nested()?;
    let mut value = T::default();
    merge(&mut value, &mut sub)?;
    Ok(value)
}

#[inline]
fn expect_wire_type(
    actual: WireType,
    expected: WireType,
    field: &'static str,
) -> Result<(), DecodeError> {
    if actual == expected {
        Ok(())
    } else {
        Err(DecodeError::wire_type_mismatch(field, actual.into_val()))
    }
}

macro_rules! impl_decode_message {
    ($($ty:ident),+ $(,)?) => {$(
        impl DecodeMessage for $ty {
            const NAME: &'static str = <$ty as WellKnown>::NAME;

            fn merge_from(&mut self, cur: &mut DecodeCursor<'_>) -> Result<(), DecodeError> {
                merge(self, cur)
            }
        }
    )+};
}

macro_rules! wrapper_type {
    ($($name:ident($inner:ty) = $wire:ident, |$cur:ident| $read:expr;)+) => {$(
        #[doc = concat!("`google.protobuf.", stringify!($name), "`.")]
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct $name {
            pub value: $inner,
        }

        impl WellKnown for $name {
            const NAME: &'static str = concat!("google.protobuf.", stringify!($name));

            fn merge_field(
                &mut self,
                number: u32,
                wire_type: WireType,
                $cur: &mut DecodeCursor<'_>,
            ) -> Result<bool, DecodeError> {
                if number != 1 {
                    return Ok(false);
                }
                expect_wire_type(wire_type, WireType::$wire, "value")?;
                self.value = $read;
                Ok(true)
            }
        }

        impl_decode_message!($name);
    )+};
}

wrapper_type! {
    DoubleValue(f64) = I64, |cur| cur.read_double()?;
    FloatValue(f32) = I32, |cur| cur.read_float()?;
    Int64Value(i64) = Varint, |cur| cur.read_int64()?;
    UInt64Value(u64) = Varint, |cur| cur.read_uint64()?;
    Int32Value(i32) = Varint, |cur| cur.read_int32()?;
    UInt32Value(u32) = Varint, |cur| cur.read_uint32()?;
    BoolValue(bool) = Varint, |cur| cur.read_bool()?;
    StringValue(String) = Len, |cur| String::from(cur.read_string("value")?);
    BytesValue(Vec<u8>) = Len, |cur| cur.read_bytes()?.to_vec();
}

/// `google.protobuf.Timestamp`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: i32,
}

impl WellKnown for Timestamp {
    const NAME: &'static str = "google.protobuf.Timestamp";

    fn merge_field(
        &mut self,
        number: u32,
        wire_type: WireType,
        cur: &mut DecodeCursor<'_>,
    ) -> Result<bool, DecodeError> {
        match number {
            1 => {
                expect_wire_type(wire_type, WireType::Varint, "seconds")?;
                self.seconds = cur.read_int64()?;
            }
            2 => {
                expect_wire_type(wire_type, WireType::Varint, "nanos")?;
                self.nanos = cur.read_int32()?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// `google.protobuf.Duration`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Duration {
    pub seconds: i64,
    pub nanos: i32,
}

impl WellKnown for Duration {
    const NAME: &'static str = "google.protobuf.Duration";

    fn merge_field(
        &mut self,
        number: u32,
        wire_type: WireType,
        cur: &mut DecodeCursor<'_>,
    ) -> Result<bool, DecodeError> {
        match number {
            1 => {
                expect_wire_type(wire_type, WireType::Varint, "seconds")?;
                self.seconds = cur.read_int64()?;
            }
            2 => {
                expect_wire_type(wire_type, WireType::Varint, "nanos")?;
                self.nanos = cur.read_int32()?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// `google.protobuf.Empty`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Empty {}

impl WellKnown for Empty {
    const NAME: &'static str = "google.protobuf.Empty";

    fn merge_field(
        &mut self,
        _number: u32,
        _wire_type: WireType,
        _cur: &mut DecodeCursor<'_>,
    ) -> Result<bool, DecodeError> {
        Ok(false)
    }
}

/// `google.protobuf.Any`. The payload stays encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Any {
    pub type_url: String,
    pub value: Vec<u8>,
}

impl WellKnown for Any {
    const NAME: &'static str = "google.protobuf.Any";

    fn merge_field(
        &mut self,
        number: u32,
        wire_type: WireType,
        cur: &mut DecodeCursor<'_>,
    ) -> Result<bool, DecodeError> {
        match number {
            1 => {
                expect_wire_type(wire_type, WireType::Len, "type_url")?;
                self.type_url = String::from(cur.read_string("type_url")?);
            }
            2 => {
                expect_wire_type(wire_type, WireType::Len, "value")?;
                self.value = cur.read_bytes()?.to_vec();
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// `google.protobuf.FieldMask`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMask {
    pub paths: Vec<String>,
}

impl WellKnown for FieldMask {
    const NAME: &'static str = "google.protobuf.FieldMask";

    fn merge_field(
        &mut self,
        number: u32,
        wire_type: WireType,
        cur: &mut DecodeCursor<'_>,
    ) -> Result<bool, DecodeError> {
        if number != 1 {
            return Ok(false);
        }
        expect_wire_type(wire_type, WireType::Len, "paths")?;
        self.paths.push(String::from(cur.read_string("paths")?));
        Ok(true)
    }
}

/// `google.protobuf.Struct`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Struct {
    pub fields: BTreeMap<String, Value>,
}

impl WellKnown for Struct {
    const NAME: &'static str = "google.protobuf.Struct";

    fn merge_field(
        &mut self,
        number: u32,
        wire_type: WireType,
        cur: &mut DecodeCursor<'_>,
    ) -> Result<bool, DecodeError> {
        if number != 1 {
            return Ok(false);
        }
        expect_wire_type(wire_type, WireType::Len, "fields")?;
        let mut entry = cur.read_nested()?;
        let mut key = String::new();
        let mut value = Value::default();
        while entry.has_remaining() {
            let (number, wire_type) = entry.read_key()?;
            match number {
                1 => {
                    expect_wire_type(wire_type, WireType::Len, "fields.key")?;
                    key = String::from(entry.read_string("fields.key")?);
                }
                2 => {
                    expect_wire_type(wire_type, WireType::Len, "fields.value")?;
                    let mut sub = entry.read_nested()?;
                    merge(&mut value, &mut sub)?;
                }
                _ => {
                    entry.skip_value(wire_type)?;
                }
            }
        }
        self.fields.insert(key, value);
        Ok(true)
    }
}

/// The `kind` oneof of `google.protobuf.Value`.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    /// `google.protobuf.NullValue`, kept as its enum number.
    Null(i32),
    Number(f64),
    String(String),
    Bool(bool),
    Struct(Struct),
    List(ListValue),
}

/// `google.protobuf.Value`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Value {
    pub kind: Option<ValueKind>,
}

impl WellKnown for Value {
    const NAME: &'static str = "google.protobuf.Value";

    fn merge_field(
        &mut self,
        number: u32,
        wire_type: WireType,
        cur: &mut DecodeCursor<'_>,
    ) -> Result<bool, DecodeError> {
        let kind = match number {
            1 => {
                expect_wire_type(wire_type, WireType::Varint, "null_value")?;
                ValueKind::Null(cur.read_int32()?)
            }
            2 => {
                expect_wire_type(wire_type, WireType::I64, "number_value")?;
                ValueKind::Number(cur.read_double()?)
            }
            3 => {
                expect_wire_type(wire_type, WireType::Len, "string_value")?;
                ValueKind::String(String::from(cur.read_string("string_value")?))
            }
            4 => {
                expect_wire_type(wire_type, WireType::Varint, "bool_value")?;
                ValueKind::Bool(cur.read_bool()?)
            }
            5 => {
                expect_wire_type(wire_type, WireType::Len, "struct_value")?;
                ValueKind::Struct(read_nested(cur)?)
            }
            6 => {
                expect_wire_type(wire_type, WireType::Len, "list_value")?;
                ValueKind::List(read_nested(cur)?)
            }
            _ => return Ok(false),
        };
        self.kind = Some(kind);
        Ok(true)
    }
}

/// `google.protobuf.ListValue`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListValue {
    pub values: Vec<Value>,
}

impl WellKnown for ListValue {
    const NAME: &'static str = "google.protobuf.ListValue";

    fn merge_field(
        &mut self,
        number: u32,
        wire_type: WireType,
        cur: &mut DecodeCursor<'_>,
    ) -> Result<bool, DecodeError> {
        if number != 1 {
            return Ok(false);
        }
        expect_wire_type(wire_type, WireType::Len, "values")?;
        self.values.push(read_nested(cur)?);
        Ok(true)
    }
}

/// Any other `google.protobuf` type. Every field is kept as raw bytes, key
/// included, in wire order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMessage {
    pub raw: Vec<u8>,
}

impl WellKnown for RawMessage {
    const NAME: &'static str = "google.protobuf.*";

    fn merge_field(
        &mut self,
        _number: u32,
        _wire_type: WireType,
        _cur: &mut DecodeCursor<'_>,
    ) -> Result<bool, DecodeError> {
        Ok(false)
    }

    fn keep_unknown(&mut self, raw: &[u8]) {
        self.raw.extend_from_slice(raw);
    }
}

impl_decode_message!(
    Timestamp, Duration, Empty, Any, FieldMask, Struct, Value, ListValue, RawMessage,
);

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use super::*;
    use crate::error::DecodeErrorKind;

    #[test]
    fn test_timestamp() {
        let mut buf = Vec::new();
        prost::encoding::int64::encode(1, &1_700_000_000, &mut buf);
        prost::encoding::int32::encode(2, &500, &mut buf);
        // Unknown field 3 is skipped.
        prost::encoding::string::encode(3, &"ignored".into(), &mut buf);

        let ts = Timestamp::decode(&buf).unwrap();
        assert_eq!(
            ts,
            Timestamp {
                seconds: 1_700_000_000,
                nanos: 500
            }
        );
    }

    #[test]
    fn test_wrappers() {
        let mut buf = Vec::new();
        prost::encoding::string::encode(1, &"hello".into(), &mut buf);
        assert_eq!(StringValue::decode(&buf).unwrap().value, "hello");

        let mut buf = Vec::new();
        prost::encoding::double::encode(1, &2.5, &mut buf);
        assert_eq!(DoubleValue::decode(&buf).unwrap().value, 2.5);

        let mut buf = Vec::new();
        prost::encoding::bool::encode(1, &true, &mut buf);
        assert!(BoolValue::decode(&buf).unwrap().value);

        assert_eq!(<Int32Value as WellKnown>::NAME, "google.protobuf.Int32Value");
    }

    #[test]
    fn test_wrong_wire_type() {
        // Field 1 as fixed32 for an Int64Value.
        let buf = [0x0d, 0, 0, 0, 0];
        let err = Int64Value::decode(&buf).unwrap_err();
        assert_eq!(
            err.kind(),
            DecodeErrorKind::WireTypeMismatch {
                field: "value",
                wire_type: 5
            }
        );
    }

    fn len_field(number: u32, payload: Vec<u8>, buf: &mut Vec<u8>) {
        prost::encoding::bytes::encode(number, &payload, buf);
    }

    #[test]
    fn test_any_and_field_mask() {
        let mut buf = Vec::new();
        prost::encoding::string::encode(1, &"type.example/demo.Ping".into(), &mut buf);
        len_field(2, vec![0x08, 0x2a], &mut buf);
        let any = Any::decode(&buf).unwrap();
        assert_eq!(any.type_url, "type.example/demo.Ping");
        assert_eq!(any.value, [0x08, 0x2a]);

        let mut buf = Vec::new();
        prost::encoding::string::encode(1, &"a.b".into(), &mut buf);
        prost::encoding::string::encode(1, &"c".into(), &mut buf);
        assert_eq!(FieldMask::decode(&buf).unwrap().paths, ["a.b", "c"]);
    }

    #[test]
    fn test_struct_value_list() {
        // {"n": 1.5, "xs": ["x", true]}
        let mut number = Vec::new();
        prost::encoding::double::encode(2, &1.5, &mut number);

        let mut text = Vec::new();
        prost::encoding::string::encode(3, &"x".into(), &mut text);
        let mut flag = Vec::new();
        prost::encoding::bool::encode(4, &true, &mut flag);
        let mut list = Vec::new();
        len_field(1, text, &mut list);
        len_field(1, flag, &mut list);
        let mut list_value = Vec::new();
        len_field(6, list, &mut list_value);

        let mut buf = Vec::new();
        for (key, value) in [("n", number), ("xs", list_value)] {
            let mut entry = Vec::new();
            prost::encoding::string::encode(1, &key.into(), &mut entry);
            len_field(2, value, &mut entry);
            len_field(1, entry, &mut buf);
        }

        let decoded = Struct::decode(&buf).unwrap();
        assert_eq!(decoded.fields["n"].kind, Some(ValueKind::Number(1.5)));
        let Some(ValueKind::List(list)) = &decoded.fields["xs"].kind else {
            panic!("expected a list");
        };
        assert_eq!(
            list.values,
            [
                Value {
                    kind: Some(ValueKind::String("x".into()))
                },
                Value {
                    kind: Some(ValueKind::Bool(true))
                },
            ]
        );
    }

    #[test]
    fn test_value_oneof_last_member_wins() {
        let mut buf = Vec::new();
        prost::encoding::string::encode(3, &"first".into(), &mut buf);
        prost::encoding::int32::encode(1, &0, &mut buf);
        assert_eq!(Value::decode(&buf).unwrap().kind, Some(ValueKind::Null(0)));
    }

    #[test]
    fn test_raw_message_keeps_every_field() {
        let buf = [0x0a, 0x01, b'a', 0x10, 0x07, 0x1d, 1, 2, 3, 4];
        assert_eq!(RawMessage::decode(&buf).unwrap().raw, buf);
    }

    #[test]
    fn test_empty_skips_everything() {
        let buf = [0x08, 0x01, 0x12, 0x00];
        assert_eq!(Empty::decode(&buf).unwrap(), Empty {});
    }
}
