use std::path::Path;

use protodec_build::{Config, FieldSpec, Generator, Kind, MessageSpec, Schema};

fn message(name: &str) -> Kind {
    Kind::Message(name.to_string())
}

fn schema() -> Schema {
    const SCALARS: &[(&str, Kind)] = &[
        ("f_double", Kind::Double),
        ("f_float", Kind::Float),
        ("f_int32", Kind::Int32),
        ("f_int64", Kind::Int64),
        ("f_uint32", Kind::Uint32),
        ("f_uint64", Kind::Uint64),
        ("f_sint32", Kind::Sint32),
        ("f_sint64", Kind::Sint64),
        ("f_fixed32", Kind::Fixed32),
        ("f_fixed64", Kind::Fixed64),
        ("f_sfixed32", Kind::Sfixed32),
        ("f_sfixed64", Kind::Sfixed64),
        ("f_bool", Kind::Bool),
        ("f_string", Kind::String),
        ("f_bytes", Kind::Bytes),
        ("f_enum", Kind::Enum),
    ];
    let scalars = SCALARS
        .iter()
        .zip(1..)
        .fold(
            MessageSpec::new("conformance.Scalars").implicit_presence(),
            |message, ((name, kind), number)| message.field(FieldSpec::new(*name, number, kind.clone())),
        );

    let repeated = MessageSpec::new("conformance.Repeated")
        .implicit_presence()
        .field(FieldSpec::new("r_int32", 1, Kind::Int32).repeated())
        .field(FieldSpec::new("r_sint64", 2, Kind::Sint64).repeated())
        .field(FieldSpec::new("r_fixed64", 3, Kind::Fixed64).repeated())
        .field(FieldSpec::new("r_double", 4, Kind::Double).repeated())
        .field(FieldSpec::new("r_bool", 5, Kind::Bool).repeated())
        .field(FieldSpec::new("r_string", 6, Kind::String).repeated())
        .field(FieldSpec::new("r_bytes", 7, Kind::Bytes).repeated())
        .field(FieldSpec::new("r_enum", 8, Kind::Enum).repeated());

    let inner = MessageSpec::new("conformance.Inner")
        .implicit_presence()
        .field(FieldSpec::new("value", 1, Kind::Int32))
        .field(FieldSpec::new("label", 2, Kind::String));

    let nested = MessageSpec::new("conformance.Nested")
        .implicit_presence()
        .field(FieldSpec::new("child", 1, message("conformance.Inner")))
        .field(FieldSpec::new("children", 2, message("conformance.Inner")).repeated())
        .field(FieldSpec::map("by_name", 3, Kind::String, message("conformance.Inner")))
        .field(FieldSpec::map("labels", 4, Kind::Int32, Kind::String))
        .field(FieldSpec::new("inner_choice", 5, message("conformance.Inner")).oneof("pick"))
        .field(FieldSpec::new("text_choice", 6, Kind::String).oneof("pick"))
        .field(FieldSpec::new("at", 7, message(".google.protobuf.Timestamp")))
        .field(FieldSpec::new("count", 8, message(".google.protobuf.Int32Value")))
        .field(FieldSpec::new("nothing", 9, message(".google.protobuf.Empty")));

    let node = MessageSpec::new("conformance.Node")
        .implicit_presence()
        .field(FieldSpec::new("value", 1, Kind::Int32))
        .field(FieldSpec::new("left", 2, message("conformance.Node")))
        .field(FieldSpec::new("right", 3, message("conformance.Node")));

    let legacy = MessageSpec::new("conformance.Legacy")
        .field(FieldSpec::new("id", 1, Kind::Int32).required())
        .field(FieldSpec::new("name", 2, Kind::String).required())
        .field(FieldSpec::new("score", 3, Kind::Sint32).optional())
        .field(FieldSpec::new("tags", 4, Kind::String).repeated())
        .field(FieldSpec::new("blob", 5, Kind::Bytes).optional())
        .extension_range(100, 200);

    let meta = MessageSpec::new("conformance.Meta")
        .implicit_presence()
        .field(FieldSpec::new("any", 1, message(".google.protobuf.Any")))
        .field(FieldSpec::new("mask", 2, message(".google.protobuf.FieldMask")))
        .field(FieldSpec::new("attrs", 3, message(".google.protobuf.Struct")))
        .field(FieldSpec::new("source", 4, message(".google.protobuf.SourceContext")));

    Schema::new("conformance")
        .message(scalars)
        .message(repeated)
        .message(inner)
        .message(nested)
        .message(node)
        .message(legacy)
        .message(meta)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=build.rs");

    let mut config = Config::new();
    config.pool("conformance.Inner");
    let module = Generator::new(config).generate(&schema())?;

    let out_dir = std::env::var("OUT_DIR")?;
    std::fs::write(Path::new(&out_dir).join(module.file_name()), module.source)?;
    Ok(())
}
