//! Whole-message decode-loop synthesis.

use std::collections::HashSet;

use protodec::wire::{MAXIMUM_FIELD_NUMBER, MINIMUM_FIELD_NUMBER};

use crate::context::{proto_path_to_rust_type, to_rust_field_name, GenerationContext, TypeOrigin};
use crate::plan::{Arm, DecodeLoop, FieldStep, RequiredLayout, StoreOp};
use crate::schema::{Cardinality, MessageSpec};
use crate::Error;

use super::field::synthesize_field;

/// Synthesizes the decode loop of `message`.
///
/// Required fields are assigned bitset positions in declaration order. Field
/// numbers are checked for range and uniqueness before any step is built.
pub fn synthesize_message(
    ctx: &GenerationContext,
    message: &MessageSpec,
) -> Result<DecodeLoop, Error> {
    let mut seen = HashSet::new();
    for field in &message.fields {
        if !(MINIMUM_FIELD_NUMBER..=MAXIMUM_FIELD_NUMBER).contains(&field.number) {
            return Err(Error::InvalidFieldNumber {
                message: message.name.clone(),
                field: field.name.clone(),
                number: field.number,
            });
        }
        if !seen.insert(field.number) {
            return Err(Error::DuplicateFieldNumber {
                message: message.name.clone(),
                number: field.number,
            });
        }
    }

    let mut required_count = 0;
    let arms = message
        .fields
        .iter()
        .map(|field| {
            let required_bit = (field.cardinality == Cardinality::Required).then(|| {
                required_count += 1;
                required_count - 1
            });
            synthesize_field(ctx, message, field, required_bit)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let rust_name = match ctx.lookup(&message.name) {
        Some(info) if info.origin == TypeOrigin::Local => info.rust_path.clone(),
        _ => proto_path_to_rust_type(&message.name, ""),
    };

    let plan = DecodeLoop {
        message: message.name.clone(),
        rust_name,
        arms,
        extension_ranges: message.extension_ranges.clone(),
        preserve_unknown: ctx.preserve_unknown_fields(),
        required: RequiredLayout {
            count: required_count,
        },
    };
    check_rust_field_names(&plan)?;
    Ok(plan)
}

/// Rejects plans whose generated struct would declare a field twice. Oneof
/// members share the single field of their oneof.
fn check_rust_field_names(plan: &DecodeLoop) -> Result<(), Error> {
    let mut oneofs = HashSet::new();
    let declared = plan.arms.iter().filter_map(|arm| match arm {
        Arm::Field(FieldStep {
            store: StoreOp::SelectOneof { oneof, .. },
            ..
        }) => oneofs.insert(oneof.as_str()).then(|| to_rust_field_name(oneof)),
        Arm::Field(step) => Some(step.rust_name.clone()),
        Arm::Map(step) => Some(step.rust_name.clone()),
    });
    let generated = [
        plan.preserve_unknown.then(|| "unknown_fields".to_string()),
        plan.has_extensions().then(|| "extensions".to_string()),
    ];

    let mut names = HashSet::new();
    for name in declared.chain(generated.into_iter().flatten()) {
        if !names.insert(name.clone()) {
            return Err(Error::FieldNameCollision {
                message: plan.message.clone(),
                name,
            });
        }
    }
    Ok(())
}
