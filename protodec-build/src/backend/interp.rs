//! Interpreter back end.
//!
//! Executes [`DecodeLoop`] plans directly against a buffer, producing a
//! [`DynamicMessage`]. It performs exactly the steps the rendered Rust code
//! would, which makes it a reference for testing plans without compiling
//! generated source. Bytes fields are slices of the input [`Bytes`], never
//! copies.

use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use protodec::packed::{bool_element_count, fixed_element_count, varint_element_count};
use protodec::{DecodeCursor, DecodeError, DecodeErrorKind, Extensions, WireType};

use crate::context::is_well_known;
use crate::plan::{Arm, DecodeLoop, ElementCount, EntryField, FieldStep, MapStep, ReadOp, StoreOp};

/// Failure to decode a buffer with the interpreter.
#[derive(Debug, thiserror::Error)]
pub enum InterpretError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("field `{field}` arrived with wire type {wire_type}")]
    WireTypeMismatch { field: String, wire_type: u8 },
    #[error("field `{field}` is not valid UTF-8")]
    InvalidUtf8 { field: String },
    #[error("message `{message}` is missing a required field")]
    RequiredFieldMissing { message: String },
    /// No plan was compiled for the message, e.g. an extern type.
    #[error("no decode plan for message `{0}`")]
    UnknownMessage(String),
}

impl InterpretError {
    /// The primitive decode failure, if this error is one.
    pub fn decode_kind(&self) -> Option<DecodeErrorKind> {
        match self {
            InterpretError::Decode(err) => Some(err.kind()),
            _ => None,
        }
    }

    /// Whether the input ended before a value or span was complete.
    pub fn is_truncation(&self) -> bool {
        match self {
            InterpretError::Decode(err) => err.is_truncation(),
            _ => false,
        }
    }
}

/// Key of a dynamic map entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKey {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    String(String),
}

/// A dynamically typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Bytes),
    Message(DynamicMessage),
    List(Vec<Value>),
    Map(BTreeMap<MapKey, Value>),
}

impl Value {
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<MapKey, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&DynamicMessage> {
        match self {
            Value::Message(message) => Some(message),
            _ => None,
        }
    }

    fn into_key(self) -> Option<MapKey> {
        Some(match self {
            Value::Bool(v) => MapKey::Bool(v),
            Value::I32(v) => MapKey::I32(v),
            Value::I64(v) => MapKey::I64(v),
            Value::U32(v) => MapKey::U32(v),
            Value::U64(v) => MapKey::U64(v),
            Value::String(v) => MapKey::String(v),
            _ => return None,
        })
    }
}

/// Zero value of `read`, used for a map entry without a key or value.
fn default_value(read: &ReadOp) -> Value {
    match read {
        ReadOp::Bool => Value::Bool(false),
        ReadOp::Enum | ReadOp::Int32 | ReadOp::Sint32 | ReadOp::Sfixed32 => Value::I32(0),
        ReadOp::Int64 | ReadOp::Sint64 | ReadOp::Sfixed64 => Value::I64(0),
        ReadOp::Uint32 | ReadOp::Fixed32 => Value::U32(0),
        ReadOp::Uint64 | ReadOp::Fixed64 => Value::U64(0),
        ReadOp::Float => Value::F32(0.0),
        ReadOp::Double => Value::F64(0.0),
        ReadOp::String => Value::String(String::new()),
        ReadOp::Bytes => Value::Bytes(Bytes::new()),
        ReadOp::Message(target) => Value::Message(DynamicMessage::new(&target.type_name)),
    }
}

/// A decoded message whose fields are keyed by field number.
///
/// Fields that never appeared on the wire are absent; callers apply the
/// zero value for implicit-presence fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicMessage {
    name: String,
    fields: BTreeMap<u32, Value>,
    oneofs: BTreeMap<String, u32>,
    pub unknown_fields: Vec<u8>,
    pub extensions: Extensions,
}

impl DynamicMessage {
    pub fn new(name: &str) -> Self {
        DynamicMessage {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Fully-qualified message name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, number: u32) -> Option<&Value> {
        self.fields.get(&number)
    }

    pub fn fields(&self) -> impl Iterator<Item = (u32, &Value)> + '_ {
        self.fields.iter().map(|(number, value)| (*number, value))
    }

    /// Field number of the member the named oneof currently holds.
    pub fn which_oneof(&self, oneof: &str) -> Option<u32> {
        self.oneofs.get(oneof).copied()
    }

    fn take_list(&mut self, number: u32) -> Vec<Value> {
        match self.fields.remove(&number) {
            Some(Value::List(values)) => values,
            _ => Vec::new(),
        }
    }

    fn take_map(&mut self, number: u32) -> BTreeMap<MapKey, Value> {
        match self.fields.remove(&number) {
            Some(Value::Map(map)) => map,
            _ => BTreeMap::new(),
        }
    }

    fn take_message(&mut self, number: u32, type_name: &str) -> DynamicMessage {
        match self.fields.remove(&number) {
            Some(Value::Message(message)) => message,
            _ => DynamicMessage::new(type_name),
        }
    }
}

/// Compiled plans for every message of a schema, plus the well-known types.
/// Other `google.protobuf` names decode with every field kept as unknown.
#[derive(Debug, Clone, Default)]
pub struct DecoderSet {
    plans: HashMap<String, DecodeLoop>,
}

impl DecoderSet {
    pub(crate) fn new(plans: impl IntoIterator<Item = DecodeLoop>) -> Self {
        DecoderSet {
            plans: plans
                .into_iter()
                .map(|plan| (plan.message.clone(), plan))
                .collect(),
        }
    }

    pub fn plan(&self, message: &str) -> Option<&DecodeLoop> {
        self.plans.get(message)
    }

    /// Decodes `buf` as a fresh instance of `message`.
    pub fn decode(&self, message: &str, buf: impl Into<Bytes>) -> Result<DynamicMessage, InterpretError> {
        let mut out = DynamicMessage::new(message);
        self.merge(&mut out, buf)?;
        Ok(out)
    }

    /// Decodes `buf` into `target`, following merge semantics.
    pub fn merge(&self, target: &mut DynamicMessage, buf: impl Into<Bytes>) -> Result<(), InterpretError> {
        let source: Bytes = buf.into();
        let mut cur = DecodeCursor::new(&source);
        let name = target.name.clone();
        self.merge_message(&name, target, &mut cur, &source)
    }

    fn merge_message(
        &self,
        name: &str,
        msg: &mut DynamicMessage,
        cur: &mut DecodeCursor<'_>,
        source: &Bytes,
    ) -> Result<(), InterpretError> {
        let raw;
        let plan = match self.plans.get(name) {
            Some(plan) => plan,
            None if is_well_known(name) => {
                raw = DecodeLoop::raw_fields(name);
                &raw
            }
            None => return Err(InterpretError::UnknownMessage(name.to_string())),
        };
        let mut required = vec![false; plan.required.count];

        while cur.has_remaining() {
            let start = cur.position();
            let (number, wire_type) = cur.read_key()?;
            match plan.arm(number) {
                Some(Arm::Field(step)) => {
                    self.field(step, msg, cur, wire_type, source)?;
                    if let Some(bit) = step.required_bit {
                        required[bit] = true;
                    }
                }
                Some(Arm::Map(step)) => self.map_entry(step, msg, cur, wire_type, source)?,
                None if plan.is_extension(number) => {
                    cur.skip_value(wire_type)?;
                    msg.extensions.append(number, cur.raw_since(start));
                }
                None => {
                    cur.skip_value(wire_type)?;
                    if plan.preserve_unknown {
                        msg.unknown_fields.extend_from_slice(cur.raw_since(start));
                    }
                }
            }
        }

        if required.contains(&false) {
            return Err(InterpretError::RequiredFieldMissing {
                message: plan.message.clone(),
            });
        }
        Ok(())
    }

    fn field(
        &self,
        step: &FieldStep,
        msg: &mut DynamicMessage,
        cur: &mut DecodeCursor<'_>,
        wire_type: WireType,
        source: &Bytes,
    ) -> Result<(), InterpretError> {
        if let Some(packed) = &step.packed {
            if wire_type == WireType::Len {
                let mut block = cur.read_packed()?;
                let span = block.remaining_slice();
                let hint = match packed.count {
                    ElementCount::VarintTerminators => varint_element_count(span),
                    ElementCount::FixedWidth(width) => fixed_element_count(span, width),
                    ElementCount::OnePerByte => bool_element_count(span),
                };
                let mut list = msg.take_list(step.number);
                list.reserve(hint);
                while block.has_remaining() {
                    list.push(self.read_value(&step.read, &step.name, &mut block, source)?);
                }
                msg.fields.insert(step.number, Value::List(list));
                return Ok(());
            }
        }

        if wire_type != step.wire_type {
            return Err(InterpretError::WireTypeMismatch {
                field: step.name.clone(),
                wire_type: wire_type.into_val(),
            });
        }

        match &step.store {
            StoreOp::Assign | StoreOp::SetSome => {
                let value = self.read_value(&step.read, &step.name, cur, source)?;
                msg.fields.insert(step.number, value);
            }
            StoreOp::Push => {
                let value = self.read_value(&step.read, &step.name, cur, source)?;
                let mut list = msg.take_list(step.number);
                list.push(value);
                msg.fields.insert(step.number, Value::List(list));
            }
            StoreOp::MergeMessage { .. } => match &step.read {
                ReadOp::Message(target) => {
                    let mut sub = cur.read_nested()?;
                    let mut existing = msg.take_message(step.number, &target.type_name);
                    self.merge_message(&target.type_name, &mut existing, &mut sub, source)?;
                    msg.fields.insert(step.number, Value::Message(existing));
                }
                read => {
                    let value = self.read_value(read, &step.name, cur, source)?;
                    msg.fields.insert(step.number, value);
                }
            },
            StoreOp::SelectOneof { oneof, .. } => {
                let value = self.read_value(&step.read, &step.name, cur, source)?;
                if let Some(previous) = msg.oneofs.insert(oneof.clone(), step.number) {
                    msg.fields.remove(&previous);
                }
                msg.fields.insert(step.number, value);
            }
        }
        Ok(())
    }

    fn map_entry(
        &self,
        step: &MapStep,
        msg: &mut DynamicMessage,
        cur: &mut DecodeCursor<'_>,
        wire_type: WireType,
        source: &Bytes,
    ) -> Result<(), InterpretError> {
        if wire_type != WireType::Len {
            return Err(InterpretError::WireTypeMismatch {
                field: step.name.clone(),
                wire_type: wire_type.into_val(),
            });
        }

        let key_name = format!("{}.key", step.name);
        let value_name = format!("{}.value", step.name);
        let mut entry = cur.read_nested()?;
        let mut key = default_value(&step.key.read);
        let mut value = default_value(&step.value.read);

        while entry.has_remaining() {
            let (number, wire_type) = entry.read_key()?;
            match number {
                1 => self.entry_field(&step.key, &key_name, &mut key, &mut entry, wire_type, source)?,
                2 => self.entry_field(&step.value, &value_name, &mut value, &mut entry, wire_type, source)?,
                _ => {
                    entry.skip_value(wire_type)?;
                }
            }
        }

        // Keys are resolved to integral, bool or string kinds.
        if let Some(key) = key.into_key() {
            let mut map = msg.take_map(step.number);
            map.insert(key, value);
            msg.fields.insert(step.number, Value::Map(map));
        }
        Ok(())
    }

    fn entry_field(
        &self,
        field: &EntryField,
        name: &str,
        slot: &mut Value,
        entry: &mut DecodeCursor<'_>,
        wire_type: WireType,
        source: &Bytes,
    ) -> Result<(), InterpretError> {
        if wire_type != field.wire_type {
            return Err(InterpretError::WireTypeMismatch {
                field: name.to_string(),
                wire_type: wire_type.into_val(),
            });
        }
        match (&field.read, slot) {
            (ReadOp::Message(target), Value::Message(existing)) => {
                let mut sub = entry.read_nested()?;
                self.merge_message(&target.type_name, existing, &mut sub, source)
            }
            (read, slot) => {
                *slot = self.read_value(read, name, entry, source)?;
                Ok(())
            }
        }
    }

    fn read_value(
        &self,
        read: &ReadOp,
        name: &str,
        cur: &mut DecodeCursor<'_>,
        source: &Bytes,
    ) -> Result<Value, InterpretError> {
        Ok(match read {
            ReadOp::Bool => Value::Bool(cur.read_bool()?),
            ReadOp::Enum | ReadOp::Int32 => Value::I32(cur.read_int32()?),
            ReadOp::Int64 => Value::I64(cur.read_int64()?),
            ReadOp::Uint32 => Value::U32(cur.read_uint32()?),
            ReadOp::Uint64 => Value::U64(cur.read_uint64()?),
            ReadOp::Sint32 => Value::I32(cur.read_zigzag32()?),
            ReadOp::Sint64 => Value::I64(cur.read_zigzag64()?),
            ReadOp::Fixed32 => Value::U32(cur.read_fixed32()?),
            ReadOp::Fixed64 => Value::U64(cur.read_fixed64()?),
            ReadOp::Sfixed32 => Value::I32(cur.read_sfixed32()?),
            ReadOp::Sfixed64 => Value::I64(cur.read_sfixed64()?),
            ReadOp::Float => Value::F32(cur.read_float()?),
            ReadOp::Double => Value::F64(cur.read_double()?),
            ReadOp::String => {
                let bytes = cur.read_bytes()?;
                let text = std::str::from_utf8(bytes).map_err(|_| InterpretError::InvalidUtf8 {
                    field: name.to_string(),
                })?;
                Value::String(text.to_string())
            }
            ReadOp::Bytes => Value::Bytes(source.slice_ref(cur.read_bytes()?)),
            ReadOp::Message(target) => {
                let mut sub = cur.read_nested()?;
                let mut message = DynamicMessage::new(&target.type_name);
                self.merge_message(&target.type_name, &mut message, &mut sub, source)?;
                Value::Message(message)
            }
        })
    }
}
