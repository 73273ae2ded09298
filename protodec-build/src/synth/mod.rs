//! Synthesis of decode plans from the schema.

mod field;
mod message;

pub use field::{element_count, read_op, synthesize_field};
pub use message::synthesize_message;
