//! Decode-plan intermediate representation.
//!
//! A [`DecodeLoop`] describes, for one message type, everything its decoder
//! does: which primitive reads each field number, where the value is stored,
//! how packed blocks and map entries are framed, and what happens to
//! extension and unknown fields. Back ends consume plans without looking at
//! the schema again.

use protodec::WireType;

use crate::context::TypeOrigin;
use crate::schema::ExtensionRange;

/// Reference to the message type a nested read decodes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    /// Fully-qualified name.
    pub type_name: String,
    /// Rust path of the type.
    pub rust_path: String,
    pub origin: TypeOrigin,
    /// Fresh instances come from `Pooled::acquire`.
    pub pooled: bool,
}

impl MessageRef {
    /// Whether the shared generic decoder handles this type.
    pub fn is_well_known(&self) -> bool {
        self.origin == TypeOrigin::WellKnown
    }
}

/// The primitive read for one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOp {
    Bool,
    Enum,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Float,
    Double,
    String,
    Bytes,
    Message(MessageRef),
}

/// Where a decoded value goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// Overwrite the field.
    Assign,
    /// Overwrite the field with `Some(value)`.
    SetSome,
    /// Merge into the existing message, creating it on first use.
    MergeMessage { boxed: bool },
    /// Append to the field's sequence.
    Push,
    /// Replace whatever the oneof holds with this member.
    SelectOneof {
        oneof: String,
        variant: String,
        boxed: bool,
    },
}

/// Capacity hint used to pre-size the destination of a packed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementCount {
    /// One element per byte with its high bit clear.
    VarintTerminators,
    /// Block length divided by the element width.
    FixedWidth(usize),
    /// One element per byte.
    OnePerByte,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedPlan {
    pub count: ElementCount,
}

/// Decoding of one occurrence of a declared field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldStep {
    /// Field name as declared, reported in wire-type mismatches.
    pub name: String,
    pub rust_name: String,
    pub number: u32,
    /// Wire type of a single element.
    pub wire_type: WireType,
    pub read: ReadOp,
    pub store: StoreOp,
    /// Set for repeated numeric fields, which also accept a packed block.
    pub packed: Option<PackedPlan>,
    /// Bit in the required-field bitset, for required fields.
    pub required_bit: Option<usize>,
}

/// One of the two fields of a map entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryField {
    pub wire_type: WireType,
    pub read: ReadOp,
}

/// Decoding of one map entry occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapStep {
    pub name: String,
    pub rust_name: String,
    pub number: u32,
    pub key: EntryField,
    pub value: EntryField,
}

/// A dispatch arm of the decode loop, keyed by field number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arm {
    Field(FieldStep),
    Map(MapStep),
}

impl Arm {
    pub fn number(&self) -> u32 {
        match self {
            Arm::Field(step) => step.number,
            Arm::Map(step) => step.number,
        }
    }
}

/// Number of required fields tracked by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequiredLayout {
    pub count: usize,
}

impl RequiredLayout {
    /// Words of the bitset, zero when nothing is required.
    pub fn words(&self) -> usize {
        self.count.div_ceil(64)
    }
}

/// Complete decode procedure of one message type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeLoop {
    /// Fully-qualified message name.
    pub message: String,
    pub rust_name: String,
    /// Arms in field declaration order.
    pub arms: Vec<Arm>,
    pub extension_ranges: Vec<ExtensionRange>,
    pub preserve_unknown: bool,
    pub required: RequiredLayout,
}

impl DecodeLoop {
    /// Plan of a message decoded without declared fields, every field kept
    /// as an unknown field.
    pub fn raw_fields(message: &str) -> Self {
        DecodeLoop {
            message: message.to_string(),
            rust_name: "RawMessage".to_string(),
            arms: Vec::new(),
            extension_ranges: Vec::new(),
            preserve_unknown: true,
            required: RequiredLayout::default(),
        }
    }

    pub fn arm(&self, number: u32) -> Option<&Arm> {
        self.arms.iter().find(|arm| arm.number() == number)
    }

    pub fn is_extension(&self, number: u32) -> bool {
        self.extension_ranges.iter().any(|range| range.contains(number))
    }

    pub fn has_extensions(&self) -> bool {
        !self.extension_ranges.is_empty()
    }
}
