//! Emission driver: schema in, decoders out.

use crate::backend::interp::DecoderSet;
use crate::backend::rust::{format_tokens, render_module};
use crate::config::Config;
use crate::context::{is_well_known, to_snake_case, GenerationContext};
use crate::plan::DecodeLoop;
use crate::schema::{well_known_messages, MessageSpec, Schema};
use crate::synth::synthesize_message;
use crate::Error;

/// Rust source generated for one schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedModule {
    /// Module name derived from the schema package, e.g. `demo_v1`.
    pub name: String,
    /// Formatted source text.
    pub source: String,
}

impl GeneratedModule {
    /// File name conventionally used when writing the module to disk.
    pub fn file_name(&self) -> String {
        format!("{}.rs", self.name)
    }
}

/// Drives synthesis and emission for whole schemas.
#[derive(Debug, Clone, Default)]
pub struct Generator {
    config: Config,
}

impl Generator {
    pub fn new(config: Config) -> Self {
        Generator { config }
    }

    /// Synthesizes a decode plan for every message of `schema`, in
    /// declaration order.
    pub fn plans(&self, schema: &Schema) -> Result<Vec<DecodeLoop>, Error> {
        let ctx = GenerationContext::new(&self.config, schema)?;
        specialized(schema)
            .map(|message| synthesize_message(&ctx, message))
            .collect()
    }

    /// Renders Rust source for every message of `schema`.
    pub fn generate(&self, schema: &Schema) -> Result<GeneratedModule, Error> {
        let ctx = GenerationContext::new(&self.config, schema)?;
        let plans = specialized(schema)
            .map(|message| synthesize_message(&ctx, message))
            .collect::<Result<Vec<_>, _>>()?;
        let tokens = render_module(&ctx, &plans)?;
        let source = format_tokens(tokens, self.config.skip_format)?;

        Ok(GeneratedModule {
            name: module_name(&schema.package),
            source,
        })
    }

    /// Compiles `schema` for the interpreter back end. The well-known types
    /// are always included.
    pub fn compile_plans(&self, schema: &Schema) -> Result<DecoderSet, Error> {
        let mut plans = self.plans(schema)?;

        let well_known = Schema {
            package: "google.protobuf".to_string(),
            messages: well_known_messages(),
        };
        let ctx = GenerationContext::new(&self.config, &well_known)?;
        for message in &well_known.messages {
            plans.push(synthesize_message(&ctx, message)?);
        }

        Ok(DecoderSet::new(plans))
    }
}

/// Messages that get a specialized decoder: all but `google.protobuf` ones.
fn specialized(schema: &Schema) -> impl Iterator<Item = &MessageSpec> + '_ {
    schema.messages.iter().filter(|m| !is_well_known(&m.name))
}

fn module_name(package: &str) -> String {
    if package.is_empty() {
        return "_".to_string();
    }
    package
        .split('.')
        .map(to_snake_case)
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, Kind, MessageSpec};

    fn schema() -> Schema {
        Schema::new("demo.v1").message(
            MessageSpec::new("demo.v1.Ping")
                .field(FieldSpec::new("id", 1, Kind::Int32))
                .field(FieldSpec::new("labels", 2, Kind::String).repeated()),
        )
    }

    #[test]
    fn test_generate_names_module_after_package() {
        let module = Generator::default().generate(&schema()).unwrap();
        assert_eq!(module.name, "demo_v1");
        assert_eq!(module.file_name(), "demo_v1.rs");
        assert!(module.source.contains("pub struct Ping"));
        syn::parse_file(&module.source).unwrap();
    }

    #[test]
    fn test_compile_plans_includes_well_known() {
        let set = Generator::default().compile_plans(&schema()).unwrap();
        assert!(set.plan("demo.v1.Ping").is_some());
        assert!(set.plan("google.protobuf.Timestamp").is_some());
        assert!(set.plan("google.protobuf.Empty").is_some());
    }

    #[test]
    fn test_generator_error_is_fatal() {
        let schema = Schema::new("demo").message(
            MessageSpec::new("demo.G").field(FieldSpec::new("g", 1, Kind::Group("demo.G.Body".into()))),
        );
        let generator = Generator::default();
        assert!(matches!(generator.generate(&schema), Err(Error::UnsupportedGroup { .. })));
        assert!(matches!(generator.compile_plans(&schema), Err(Error::UnsupportedGroup { .. })));
    }

    #[test]
    fn test_schema_owned_well_known_name_is_not_specialized() {
        let schema = Schema::new("demo").message(
            MessageSpec::new("demo.Holder")
                .field(FieldSpec::new("own", 1, Kind::Message("google.protobuf.Local".into())))
                .field(FieldSpec::new("mask", 2, Kind::Message("google.protobuf.FieldMask".into()))),
        )
        .message(MessageSpec::new("google.protobuf.Local").field(FieldSpec::new("x", 1, Kind::Int32)));

        let plans = Generator::default().plans(&schema).unwrap();
        assert_eq!(plans.len(), 1);
        let module = Generator::default().generate(&schema).unwrap();
        assert!(!module.source.contains("pub struct Local"));
        assert!(module.source.contains("::protodec::well_known::RawMessage"));
        assert!(module.source.contains("::protodec::well_known::FieldMask"));
    }

    #[test]
    fn test_module_name() {
        assert_eq!(module_name(""), "_");
        assert_eq!(module_name("acme.billingV2"), "acme_billing_v2");
    }
}
