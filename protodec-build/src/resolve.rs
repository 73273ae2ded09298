//! Field-type resolution: maps a field's kind and cardinality to its native
//! storage shape and the wire type it arrives with.

use protodec::WireType;

use crate::schema::{Cardinality, FieldSpec, Kind, MessageSpec, Presence};
use crate::Error;

/// Native storage shape of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// The value itself, zero when unset: `T`.
    Scalar,
    /// A scalar, string or bytes value with explicit presence: `Option<T>`.
    Presence,
    /// An embedded message, absent until first seen: `Option<T>`.
    Nullable,
    /// `Vec<T>`, appended to in wire order.
    List,
    /// `BTreeMap<K, V>`, decoded from entry sub-messages.
    Map {
        key: Box<Resolution>,
        value: Box<Resolution>,
    },
    /// One variant of the named oneof: `Option<Oneof>`.
    OneofMember { oneof: String },
}

/// How one field is stored and framed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Wire type of a single element.
    pub wire_type: WireType,
    pub shape: Shape,
    /// Whether a length-delimited occurrence is a packed block of elements.
    pub packable: bool,
}

/// Wire type carried by a single value of `kind`.
pub fn wire_type_of(kind: &Kind) -> WireType {
    match kind {
        Kind::Bool
        | Kind::Enum
        | Kind::Int32
        | Kind::Int64
        | Kind::Uint32
        | Kind::Uint64
        | Kind::Sint32
        | Kind::Sint64 => WireType::Varint,
        Kind::Fixed64 | Kind::Sfixed64 | Kind::Double => WireType::I64,
        Kind::Fixed32 | Kind::Sfixed32 | Kind::Float => WireType::I32,
        Kind::String | Kind::Bytes | Kind::Message(_) => WireType::Len,
        Kind::Group(_) => WireType::SGroup,
    }
}

/// Whether `kind` may key a map.
pub fn is_valid_map_key(kind: &Kind) -> bool {
    !matches!(
        kind,
        Kind::Float | Kind::Double | Kind::Bytes | Kind::Enum | Kind::Message(_) | Kind::Group(_)
    )
}

/// Resolves the storage shape and wire type of `field` within `message`.
pub fn resolve(message: &MessageSpec, field: &FieldSpec) -> Result<Resolution, Error> {
    if let Kind::Group(_) = field.kind {
        return Err(Error::UnsupportedGroup {
            message: message.name.clone(),
            field: field.name.clone(),
        });
    }

    let shape = match &field.cardinality {
        Cardinality::Repeated => Shape::List,
        Cardinality::Map(entry) => {
            let invalid_entry = |reason| Error::InvalidMapEntry {
                message: message.name.clone(),
                field: field.name.clone(),
                reason,
            };
            if entry.key.number != 1 || entry.value.number != 2 {
                return Err(invalid_entry("key and value must be fields 1 and 2"));
            }
            if entry.key.cardinality != Cardinality::Singular
                || entry.value.cardinality != Cardinality::Singular
            {
                return Err(invalid_entry("key and value must be singular"));
            }
            if !is_valid_map_key(&entry.key.kind) {
                return Err(Error::InvalidMapKey {
                    message: message.name.clone(),
                    field: field.name.clone(),
                    kind: format!("{:?}", entry.key.kind),
                });
            }
            if let Kind::Group(_) = entry.value.kind {
                return Err(Error::UnsupportedGroup {
                    message: message.name.clone(),
                    field: field.name.clone(),
                });
            }
            // Entry fields always read as plain values.
            let entry_field = |side: &FieldSpec| Resolution {
                wire_type: wire_type_of(&side.kind),
                shape: match side.kind {
                    Kind::Message(_) => Shape::Nullable,
                    _ => Shape::Scalar,
                },
                packable: false,
            };
            Shape::Map {
                key: Box::new(entry_field(&entry.key)),
                value: Box::new(entry_field(&entry.value)),
            }
        }
        Cardinality::Oneof(oneof) => Shape::OneofMember {
            oneof: oneof.clone(),
        },
        _ if matches!(field.kind, Kind::Message(_)) => Shape::Nullable,
        Cardinality::Optional => Shape::Presence,
        Cardinality::Required => Shape::Scalar,
        Cardinality::Singular => match message.presence {
            Presence::Explicit => Shape::Presence,
            Presence::Implicit => Shape::Scalar,
        },
    };

    let wire_type = match shape {
        Shape::Map { .. } => WireType::Len,
        _ => wire_type_of(&field.kind),
    };
    let packable = shape == Shape::List && field.kind.is_scalar_numeric();

    Ok(Resolution {
        wire_type,
        shape,
        packable,
    })
}
