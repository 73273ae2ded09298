//! Per-schema generation context: type registry, recursion analysis and the
//! runtime paths emitted code refers to.

use std::collections::{HashMap, HashSet};

use protodec::well_known::WELL_KNOWN_PREFIX;

use crate::config::Config;
use crate::recursion::{find_recursive_fields, RecursiveField};
use crate::schema::{well_known_messages, Schema};
use crate::Error;

/// Where a message type referenced by a field comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeOrigin {
    /// Defined by the schema being compiled; gets a specialized decoder.
    Local,
    /// A `google.protobuf` type decoded by the shared generic decoder.
    WellKnown,
    /// Declared through `Config::extern_path`.
    Extern,
}

/// Information about a type in the registry.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    /// Rust path of the type, relative to the generated module for local types.
    pub rust_path: String,
    pub origin: TypeOrigin,
}

/// Context for one compilation of a [`Schema`].
///
/// The runtime crate path and the error type path are fields of the context,
/// so schemas compiled together never share naming state.
pub struct GenerationContext<'a> {
    pub config: &'a Config,
    /// Path of the runtime crate, e.g. `::protodec`.
    pub runtime: syn::Path,
    /// Path of the runtime error type, e.g. `::protodec::DecodeError`.
    pub error_type: syn::Path,
    /// Map from fully-qualified message name -> type info.
    pub type_registry: HashMap<String, TypeInfo>,
    /// Fields that need to be boxed due to recursive type cycles.
    pub recursive_fields: HashSet<RecursiveField>,
    /// Resolution of `google.protobuf` names without a native type.
    raw_well_known: TypeInfo,
}

impl<'a> GenerationContext<'a> {
    pub fn new(config: &'a Config, schema: &Schema) -> Result<Self, Error> {
        let runtime: syn::Path = syn::parse_str(&config.runtime_crate)?;
        let error_type: syn::Path = syn::parse_str(&format!("{}::DecodeError", config.runtime_crate))?;

        let mut type_registry = HashMap::new();

        for message in well_known_messages() {
            let rust_path = format!(
                "{}::well_known::{}",
                config.runtime_crate,
                message.short_name()
            );
            type_registry.insert(
                message.name.clone(),
                TypeInfo {
                    rust_path,
                    origin: TypeOrigin::WellKnown,
                },
            );
        }

        // Names under the well-known prefix never resolve to a schema or
        // extern type.
        let mut rust_names: HashMap<String, &str> = HashMap::new();
        for message in schema.messages.iter().filter(|m| !is_well_known(&m.name)) {
            let rust_path = proto_path_to_rust_type(&message.name, &schema.package);
            if let Some(first) = rust_names.insert(rust_path.clone(), &message.name) {
                return Err(Error::TypeNameCollision {
                    first: first.to_string(),
                    second: message.name.clone(),
                    rust_name: rust_path,
                });
            }
            type_registry.insert(
                message.name.clone(),
                TypeInfo {
                    rust_path,
                    origin: TypeOrigin::Local,
                },
            );
        }

        for (proto_path, rust_path) in config.extern_paths.iter().filter(|(p, _)| !is_well_known(p)) {
            type_registry.insert(
                proto_path.clone(),
                TypeInfo {
                    rust_path: rust_path.clone(),
                    origin: TypeOrigin::Extern,
                },
            );
        }

        Ok(Self {
            config,
            runtime,
            error_type,
            type_registry,
            recursive_fields: find_recursive_fields(schema),
            raw_well_known: TypeInfo {
                rust_path: format!("{}::well_known::RawMessage", config.runtime_crate),
                origin: TypeOrigin::WellKnown,
            },
        })
    }

    /// Check if a field needs to be boxed due to recursive type cycles.
    pub fn is_recursive_field(&self, message_fqn: &str, field_name: &str) -> bool {
        self.recursive_fields.contains(&RecursiveField {
            message_fqn: message_fqn.to_string(),
            field_name: field_name.to_string(),
        })
    }

    /// Type info for `message_fqn`. Any `google.protobuf` name resolves,
    /// falling back to the runtime's `RawMessage`.
    pub fn lookup(&self, message_fqn: &str) -> Option<&TypeInfo> {
        self.type_registry
            .get(message_fqn)
            .or_else(|| is_well_known(message_fqn).then_some(&self.raw_well_known))
    }

    pub fn is_pooled(&self, message_fqn: &str) -> bool {
        self.config.pooled.contains(message_fqn)
    }

    pub fn preserve_unknown_fields(&self) -> bool {
        self.config.preserve_unknown_fields
    }
}

/// Whether `message_fqn` is decoded by the shared well-known decoder.
pub fn is_well_known(message_fqn: &str) -> bool {
    message_fqn.starts_with(WELL_KNOWN_PREFIX)
}

/// Convert a fully-qualified message name to its flattened Rust type name.
///
/// Examples:
/// - `"demo.Outer"` in package `"demo"` -> `"Outer"`
/// - `"demo.Outer.Inner"` in package `"demo"` -> `"OuterInner"`
pub fn proto_path_to_rust_type(proto_path: &str, package: &str) -> String {
    let relative = if package.is_empty() {
        proto_path
    } else {
        proto_path
            .strip_prefix(package)
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(proto_path)
    };

    let flattened: String = relative.split('.').map(to_pascal_case).collect();
    to_rust_type_name(&flattened)
}

/// Keywords that must be written as raw identifiers.
const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "dyn", "else", "enum", "extern",
    "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub",
    "ref", "return", "static", "struct", "trait", "true", "type", "unsafe", "use", "where",
    "while", "abstract", "become", "box", "do", "final", "gen", "macro", "override", "priv",
    "try", "typeof", "unsized", "virtual", "yield",
];

/// Path keywords cannot be raw identifiers at all.
const PATH_KEYWORDS: &[&str] = &["crate", "self", "Self", "super"];

fn escape_identifier(name: String) -> String {
    if RUST_KEYWORDS.contains(&name.as_str()) {
        format!("r#{name}")
    } else if PATH_KEYWORDS.contains(&name.as_str()) {
        format!("{name}_")
    } else {
        name
    }
}

/// Escapes a type name that collides with a keyword.
pub fn to_rust_type_name(name: &str) -> String {
    escape_identifier(name.to_string())
}

/// Snake-cased field identifier.
pub fn to_rust_field_name(name: &str) -> String {
    escape_identifier(to_snake_case(name))
}

/// Name of the module holding a message's oneof enums.
pub fn to_rust_module_name(rust_type_name: &str) -> String {
    to_rust_field_name(rust_type_name.trim_start_matches("r#").trim_end_matches('_'))
}

/// Splits camel-case words with underscores and lowercases them.
///
/// Acronyms stay together: `"HTTPServer"` becomes `"http_server"`.
pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_uppercase() {
            out.push(c);
            continue;
        }
        let word_start = i > 0 && {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|c| c.is_lowercase());
            prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower)
        };
        if word_start {
            out.push('_');
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// Joins underscore-separated words, capitalizing each.
pub fn to_pascal_case(s: &str) -> String {
    s.split('_')
        .filter(|word| !word.is_empty())
        .flat_map(|word| {
            let mut chars = word.chars();
            chars
                .next()
                .into_iter()
                .flat_map(char::to_uppercase)
                .chain(chars)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, Kind, MessageSpec};

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("myField"), "my_field");
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(to_snake_case("getHTTPResponse"), "get_http_response");
        assert_eq!(to_snake_case("my_field"), "my_field");
        assert_eq!(to_snake_case("ID"), "id");
        assert_eq!(to_snake_case("OuterInner"), "outer_inner");
    }

    #[test]
    fn test_to_pascal_case() {
        assert_eq!(to_pascal_case("foo"), "Foo");
        assert_eq!(to_pascal_case("foo_bar_baz"), "FooBarBaz");
        assert_eq!(to_pascal_case("Inner"), "Inner");
        assert_eq!(to_pascal_case(""), "");
    }

    #[test]
    fn test_to_rust_field_name_keywords() {
        assert_eq!(to_rust_field_name("type"), "r#type");
        assert_eq!(to_rust_field_name("match"), "r#match");
        assert_eq!(to_rust_field_name("name"), "name");
        assert_eq!(to_rust_field_name("self"), "self_");
        assert_eq!(to_rust_module_name("Self_"), "self_");
        assert_eq!(to_rust_module_name("Outer"), "outer");
    }

    #[test]
    fn test_proto_path_to_rust_type() {
        assert_eq!(proto_path_to_rust_type("demo.Outer", "demo"), "Outer");
        assert_eq!(proto_path_to_rust_type("demo.Outer.Inner", "demo"), "OuterInner");
        assert_eq!(proto_path_to_rust_type("com.example.Msg", "com.example"), "Msg");
        assert_eq!(proto_path_to_rust_type("Msg.Nested", ""), "MsgNested");
    }

    #[test]
    fn test_registry_origins() {
        let mut config = Config::new();
        config.extern_path("shared.Header", "crate::Header");
        let schema = Schema::new("demo").message(
            MessageSpec::new("demo.Node")
                .field(FieldSpec::new("next", 1, Kind::Message("demo.Node".into()))),
        );
        let ctx = GenerationContext::new(&config, &schema).unwrap();

        assert_eq!(ctx.lookup("demo.Node").unwrap().origin, TypeOrigin::Local);
        assert_eq!(ctx.lookup("shared.Header").unwrap().origin, TypeOrigin::Extern);
        let timestamp = ctx.lookup("google.protobuf.Timestamp").unwrap();
        assert_eq!(timestamp.origin, TypeOrigin::WellKnown);
        assert_eq!(timestamp.rust_path, "::protodec::well_known::Timestamp");
        assert!(ctx.is_recursive_field("demo.Node", "next"));
    }

    #[test]
    fn test_well_known_prefix_wins() {
        let mut config = Config::new();
        config.extern_path("google.protobuf.Any", "crate::Any");
        let schema = Schema::new("google.protobuf").message(MessageSpec::new("google.protobuf.Mine"));
        let ctx = GenerationContext::new(&config, &schema).unwrap();

        let any = ctx.lookup("google.protobuf.Any").unwrap();
        assert_eq!(any.origin, TypeOrigin::WellKnown);
        assert_eq!(any.rust_path, "::protodec::well_known::Any");
        for name in ["google.protobuf.Mine", "google.protobuf.SourceContext"] {
            let info = ctx.lookup(name).unwrap();
            assert_eq!(info.origin, TypeOrigin::WellKnown);
            assert_eq!(info.rust_path, "::protodec::well_known::RawMessage");
        }
        assert!(ctx.lookup("google.protobufx.Any").is_none());
    }

    #[test]
    fn test_flattened_name_collision() {
        let schema = Schema::new("demo")
            .message(MessageSpec::new("demo.Outer.Inner"))
            .message(MessageSpec::new("demo.OuterInner"));
        let err = GenerationContext::new(&Config::new(), &schema).err().unwrap();
        assert!(matches!(
            err,
            Error::TypeNameCollision { ref rust_name, .. } if rust_name == "OuterInner"
        ));
    }

    #[test]
    fn test_bad_runtime_path() {
        let mut config = Config::new();
        config.runtime_crate("not a path");
        assert!(matches!(
            GenerationContext::new(&config, &Schema::default()),
            Err(Error::SynParse(_))
        ));
    }
}
