//! Error types for protodec-build.

/// Errors raised while synthesizing decoders. All of them are fatal to the
/// generation pass.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Group-kind fields cannot be decoded.
    #[error("field `{message}.{field}` uses the unsupported group encoding")]
    UnsupportedGroup { message: String, field: String },
    /// A field references a message type that is neither in the schema, a
    /// well-known type, nor an extern path.
    #[error("field `{field}` references unknown message type `{type_name}`")]
    UnknownMessage { field: String, type_name: String },
    #[error("map field `{message}.{field}` has a key of kind {kind}, which cannot be a map key")]
    InvalidMapKey {
        message: String,
        field: String,
        kind: String,
    },
    #[error("map field `{message}.{field}` has a malformed entry: {reason}")]
    InvalidMapEntry {
        message: String,
        field: String,
        reason: &'static str,
    },
    #[error("message field `{message}.{field}` has no type name")]
    MissingMessageType { message: String, field: String },
    #[error("message `{message}` declares field number {number} more than once")]
    DuplicateFieldNumber { message: String, number: u32 },
    #[error("field `{message}.{field}` has out-of-range number {number}")]
    InvalidFieldNumber {
        message: String,
        field: String,
        number: u32,
    },
    /// Two messages flatten to the same Rust type name.
    #[error("messages `{first}` and `{second}` both map to the Rust type `{rust_name}`")]
    TypeNameCollision {
        first: String,
        second: String,
        rust_name: String,
    },
    /// Two fields of one generated struct share a name, including the
    /// `unknown_fields` and `extensions` fields added by the generator.
    #[error("message `{message}` would have more than one Rust field named `{name}`")]
    FieldNameCollision { message: String, name: String },
    /// Rendered code, or a configured path, failed to parse.
    #[error("failed to parse generated code: {0}")]
    SynParse(String),
}

impl From<syn::Error> for Error {
    fn from(e: syn::Error) -> Self {
        Self::SynParse(e.to_string())
    }
}
