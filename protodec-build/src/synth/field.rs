//! Per-field decode-step synthesis.
//!
//! Every step is the product of two independent choices: the primitive read
//! selected by the field's kind, and the store selected by its resolved
//! shape.

use crate::context::{to_pascal_case, to_rust_field_name, GenerationContext};
use crate::plan::{Arm, ElementCount, EntryField, FieldStep, MapStep, MessageRef, PackedPlan, ReadOp, StoreOp};
use crate::resolve::{resolve, wire_type_of, Shape};
use crate::schema::{Cardinality, FieldSpec, Kind, MessageSpec};
use crate::Error;

/// Selects the primitive read for one value of `kind`.
pub fn read_op(
    ctx: &GenerationContext,
    message: &MessageSpec,
    field_name: &str,
    kind: &Kind,
) -> Result<ReadOp, Error> {
    Ok(match kind {
        Kind::Bool => ReadOp::Bool,
        Kind::Enum => ReadOp::Enum,
        Kind::Int32 => ReadOp::Int32,
        Kind::Int64 => ReadOp::Int64,
        Kind::Uint32 => ReadOp::Uint32,
        Kind::Uint64 => ReadOp::Uint64,
        Kind::Sint32 => ReadOp::Sint32,
        Kind::Sint64 => ReadOp::Sint64,
        Kind::Fixed32 => ReadOp::Fixed32,
        Kind::Fixed64 => ReadOp::Fixed64,
        Kind::Sfixed32 => ReadOp::Sfixed32,
        Kind::Sfixed64 => ReadOp::Sfixed64,
        Kind::Float => ReadOp::Float,
        Kind::Double => ReadOp::Double,
        Kind::String => ReadOp::String,
        Kind::Bytes => ReadOp::Bytes,
        Kind::Message(type_name) => ReadOp::Message(message_ref(ctx, message, field_name, type_name)?),
        Kind::Group(_) => {
            return Err(Error::UnsupportedGroup {
                message: message.name.clone(),
                field: field_name.to_string(),
            })
        }
    })
}

fn message_ref(
    ctx: &GenerationContext,
    message: &MessageSpec,
    field_name: &str,
    type_name: &str,
) -> Result<MessageRef, Error> {
    let type_name = type_name.trim_start_matches('.');
    if type_name.is_empty() {
        return Err(Error::MissingMessageType {
            message: message.name.clone(),
            field: field_name.to_string(),
        });
    }
    let info = ctx.lookup(type_name).ok_or_else(|| Error::UnknownMessage {
        field: format!("{}.{}", message.name, field_name),
        type_name: type_name.to_string(),
    })?;
    Ok(MessageRef {
        type_name: type_name.to_string(),
        rust_path: info.rust_path.clone(),
        origin: info.origin,
        pooled: ctx.is_pooled(type_name),
    })
}

/// Capacity hint for a packed block of `kind` elements.
pub fn element_count(kind: &Kind) -> ElementCount {
    match kind {
        Kind::Bool => ElementCount::OnePerByte,
        Kind::Fixed32 | Kind::Sfixed32 | Kind::Float => ElementCount::FixedWidth(4),
        Kind::Fixed64 | Kind::Sfixed64 | Kind::Double => ElementCount::FixedWidth(8),
        _ => ElementCount::VarintTerminators,
    }
}

/// Synthesizes the dispatch arm for one declared field.
pub fn synthesize_field(
    ctx: &GenerationContext,
    message: &MessageSpec,
    field: &FieldSpec,
    required_bit: Option<usize>,
) -> Result<Arm, Error> {
    let resolution = resolve(message, field)?;
    let rust_name = to_rust_field_name(&field.name);
    let boxed = ctx.is_recursive_field(&message.name, &field.name);

    let store = match resolution.shape {
        Shape::Scalar => StoreOp::Assign,
        Shape::Presence => StoreOp::SetSome,
        Shape::Nullable => StoreOp::MergeMessage { boxed },
        Shape::List => StoreOp::Push,
        Shape::OneofMember { oneof } => StoreOp::SelectOneof {
            oneof,
            variant: to_pascal_case(&field.name),
            boxed,
        },
        Shape::Map { key, value } => {
            let Cardinality::Map(entry) = &field.cardinality else {
                return Err(Error::InvalidMapEntry {
                    message: message.name.clone(),
                    field: field.name.clone(),
                    reason: "map shape without an entry",
                });
            };
            let key = EntryField {
                wire_type: key.wire_type,
                read: read_op(ctx, message, &field.name, &entry.key.kind)?,
            };
            let value = EntryField {
                wire_type: value.wire_type,
                read: read_op(ctx, message, &field.name, &entry.value.kind)?,
            };
            return Ok(Arm::Map(MapStep {
                name: field.name.clone(),
                rust_name,
                number: field.number,
                key,
                value,
            }));
        }
    };

    let packed = resolution.packable.then(|| PackedPlan {
        count: element_count(&field.kind),
    });

    Ok(Arm::Field(FieldStep {
        name: field.name.clone(),
        rust_name,
        number: field.number,
        wire_type: wire_type_of(&field.kind),
        read: read_op(ctx, message, &field.name, &field.kind)?,
        store,
        packed,
        required_bit,
    }))
}
