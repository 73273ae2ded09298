//! `protodec-build` synthesizes specialized protobuf decoders from a resolved
//! schema.
//!
//! For every message the synthesizer builds a [`DecodeLoop`](plan::DecodeLoop):
//! a decode plan saying which primitive read each field number uses, where
//! the value is stored, and how packed blocks, map entries, extension ranges
//! and unknown fields are handled. Two back ends consume plans. The Rust back
//! end renders a struct and a `protodec::DecodeMessage` implementation per
//! message; the interpreter executes plans directly, which is handy in tests.
//!
//! # Example
//!
//! ```rust,no_run
//! // In build.rs
//! use protodec_build::{FieldSpec, Kind, MessageSpec, Schema};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let schema = Schema::new("demo").message(
//!         MessageSpec::new("demo.Ping")
//!             .field(FieldSpec::new("id", 1, Kind::Int32))
//!             .field(FieldSpec::new("tags", 2, Kind::String).repeated()),
//!     );
//!     let module = protodec_build::generate(&schema)?;
//!     let out_dir = std::env::var("OUT_DIR")?;
//!     std::fs::write(std::path::Path::new(&out_dir).join(module.file_name()), module.source)?;
//!     Ok(())
//! }
//! ```
//!
//! # Automatic Boxing of Recursive Types
//!
//! Messages that reference themselves directly or through other singular
//! message fields are detected, and the fields closing the cycle are stored
//! as `Option<Box<T>>` so the generated types have a known size.
//!
//! # Advanced Usage
//!
//! ```rust,no_run
//! # use protodec_build::{Config, Generator, Schema};
//! # fn main() -> Result<(), protodec_build::Error> {
//! # let schema = Schema::new("demo");
//! let mut config = Config::new();
//! config
//!     .runtime_crate("::my_crate::protodec")
//!     .extern_path(".acme.Money", "::acme_types::Money")
//!     .pool("demo.Frame")
//!     .preserve_unknown_fields(false);
//! let module = Generator::new(config).generate(&schema)?;
//! # let _ = module;
//! # Ok(())
//! # }
//! ```

pub mod backend;
mod config;
mod context;
mod driver;
mod error;
pub mod plan;
mod recursion;
pub mod resolve;
pub mod schema;
pub mod synth;

pub use backend::interp::{DecoderSet, DynamicMessage, InterpretError, MapKey, Value};
pub use config::Config;
pub use context::{GenerationContext, TypeInfo, TypeOrigin};
pub use driver::{GeneratedModule, Generator};
pub use error::Error;
pub use schema::{Cardinality, ExtensionRange, FieldSpec, Kind, MessageSpec, Presence, Schema};

/// Generate Rust source for `schema` with default settings.
pub fn generate(schema: &Schema) -> Result<GeneratedModule, Error> {
    Generator::default().generate(schema)
}

/// Compile `schema` for the interpreter with default settings.
pub fn compile_plans(schema: &Schema) -> Result<DecoderSet, Error> {
    Generator::default().compile_plans(schema)
}
