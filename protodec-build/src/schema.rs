//! Resolved schema model consumed by the synthesizer.
//!
//! A [`Schema`] is an immutable tree of [`MessageSpec`]s, each an ordered list
//! of [`FieldSpec`]s. Type references are fully-qualified names without a
//! leading dot, e.g. `"demo.Outer.Inner"`.


/// Wire kind of a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Kind {
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
    /// Embedded message, by fully-qualified name.
    Message(String),
    /// Legacy group, by fully-qualified name. Never decodable.
    Group(String),
}

impl Kind {
    /// Whether values of this kind may be encoded as a packed block.
    pub fn is_scalar_numeric(&self) -> bool {
        !matches!(
            self,
            Kind::String | Kind::Bytes | Kind::Message(_) | Kind::Group(_)
        )
    }
}

/// The two synthetic fields of a map entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEntry {
    pub key: FieldSpec,
    pub value: FieldSpec,
}

/// How many occurrences a field holds and how its presence is tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cardinality {
    /// Singular field. Presence follows the enclosing message's [`Presence`].
    Singular,
    /// Singular field declared with explicit presence regardless of the
    /// message default.
    Optional,
    Required,
    Repeated,
    Map(Box<MapEntry>),
    /// Member of the named oneof.
    Oneof(String),
}

/// Default presence discipline of a message's singular fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Presence {
    /// proto2-style: every singular field tracks whether it was set.
    #[default]
    Explicit,
    /// proto3-style: singular scalars hold their zero value when unset.
    Implicit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub number: u32,
    pub kind: Kind,
    pub cardinality: Cardinality,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, number: u32, kind: Kind) -> Self {
        FieldSpec {
            name: name.into(),
            number,
            kind,
            cardinality: Cardinality::Singular,
        }
    }

    pub fn optional(mut self) -> Self {
        self.cardinality = Cardinality::Optional;
        self
    }

    pub fn required(mut self) -> Self {
        self.cardinality = Cardinality::Required;
        self
    }

    pub fn repeated(mut self) -> Self {
        self.cardinality = Cardinality::Repeated;
        self
    }

    pub fn oneof(mut self, oneof: impl Into<String>) -> Self {
        self.cardinality = Cardinality::Oneof(oneof.into());
        self
    }

    /// A map field; the entry's key is field 1 and its value field 2.
    pub fn map(name: impl Into<String>, number: u32, key: Kind, value: Kind) -> Self {
        let entry = MapEntry {
            key: FieldSpec::new("key", 1, key),
            value: FieldSpec::new("value", 2, value),
        };
        FieldSpec {
            name: name.into(),
            number,
            kind: Kind::Message(String::new()),
            cardinality: Cardinality::Map(Box::new(entry)),
        }
    }

    pub fn oneof_name(&self) -> Option<&str> {
        match &self.cardinality {
            Cardinality::Oneof(name) => Some(name),
            _ => None,
        }
    }
}

/// Half-open `[start, end)` range of extension field numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionRange {
    pub start: u32,
    pub end: u32,
}

impl ExtensionRange {
    pub fn contains(&self, number: u32) -> bool {
        (self.start..self.end).contains(&number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSpec {
    /// Fully-qualified name, e.g. `"demo.Outer.Inner"`.
    pub name: String,
    pub presence: Presence,
    pub fields: Vec<FieldSpec>,
    pub extension_ranges: Vec<ExtensionRange>,
}

impl MessageSpec {
    pub fn new(name: impl Into<String>) -> Self {
        MessageSpec {
            name: name.into(),
            presence: Presence::Explicit,
            fields: Vec::new(),
            extension_ranges: Vec::new(),
        }
    }

    /// Marks the message as using implicit presence for singular fields.
    pub fn implicit_presence(mut self) -> Self {
        self.presence = Presence::Implicit;
        self
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn extension_range(mut self, start: u32, end: u32) -> Self {
        self.extension_ranges.push(ExtensionRange { start, end });
        self
    }

    /// Tag numbers of the required fields, in declaration order. A field's
    /// position in this list is its bit in the required-field bitset.
    pub fn required_numbers(&self) -> Vec<u32> {
        self.fields
            .iter()
            .filter(|f| f.cardinality == Cardinality::Required)
            .map(|f| f.number)
            .collect()
    }

    /// Names of the oneofs declared by this message, in order of first use.
    pub fn oneofs(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in self.fields.iter().filter_map(FieldSpec::oneof_name) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    pub fn oneof_members<'a>(&'a self, oneof: &'a str) -> impl Iterator<Item = &'a FieldSpec> + 'a {
        self.fields
            .iter()
            .filter(move |f| f.oneof_name() == Some(oneof))
    }

    /// Last segment of the fully-qualified name.
    pub fn short_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

/// A resolved set of message types sharing one package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    pub package: String,
    pub messages: Vec<MessageSpec>,
}

impl Schema {
    pub fn new(package: impl Into<String>) -> Self {
        Schema {
            package: package.into(),
            messages: Vec::new(),
        }
    }

    pub fn message(mut self, message: MessageSpec) -> Self {
        self.messages.push(message);
        self
    }

    pub fn get(&self, name: &str) -> Option<&MessageSpec> {
        self.messages.iter().find(|m| m.name == name)
    }
}

/// Schemas of the `google.protobuf` types decoded by the shared generic
/// decoder.
pub fn well_known_messages() -> Vec<MessageSpec> {
    const WRAPPERS: &[(&str, Kind)] = &[
        ("DoubleValue", Kind::Double),
        ("FloatValue", Kind::Float),
        ("Int64Value", Kind::Int64),
        ("UInt64Value", Kind::Uint64),
        ("Int32Value", Kind::Int32),
        ("UInt32Value", Kind::Uint32),
        ("BoolValue", Kind::Bool),
        ("StringValue", Kind::String),
        ("BytesValue", Kind::Bytes),
    ];

    let mut messages: Vec<MessageSpec> = WRAPPERS
        .iter()
        .map(|(name, kind)| {
            MessageSpec::new(format!("google.protobuf.{name}"))
                .implicit_presence()
                .field(FieldSpec::new("value", 1, kind.clone()))
        })
        .collect();

    for name in ["Timestamp", "Duration"] {
        messages.push(
            MessageSpec::new(format!("google.protobuf.{name}"))
                .implicit_presence()
                .field(FieldSpec::new("seconds", 1, Kind::Int64))
                .field(FieldSpec::new("nanos", 2, Kind::Int32)),
        );
    }
    messages.push(MessageSpec::new("google.protobuf.Empty").implicit_presence());

    let value = || Kind::Message("google.protobuf.Value".to_string());
    messages.extend([
        MessageSpec::new("google.protobuf.Any")
            .implicit_presence()
            .field(FieldSpec::new("type_url", 1, Kind::String))
            .field(FieldSpec::new("value", 2, Kind::Bytes)),
        MessageSpec::new("google.protobuf.FieldMask")
            .implicit_presence()
            .field(FieldSpec::new("paths", 1, Kind::String).repeated()),
        MessageSpec::new("google.protobuf.Struct")
            .implicit_presence()
            .field(FieldSpec::map("fields", 1, Kind::String, value())),
        MessageSpec::new("google.protobuf.Value")
            .implicit_presence()
            .field(FieldSpec::new("null_value", 1, Kind::Enum).oneof("kind"))
            .field(FieldSpec::new("number_value", 2, Kind::Double).oneof("kind"))
            .field(FieldSpec::new("string_value", 3, Kind::String).oneof("kind"))
            .field(FieldSpec::new("bool_value", 4, Kind::Bool).oneof("kind"))
            .field(
                FieldSpec::new("struct_value", 5, Kind::Message("google.protobuf.Struct".to_string()))
                    .oneof("kind"),
            )
            .field(
                FieldSpec::new("list_value", 6, Kind::Message("google.protobuf.ListValue".to_string()))
                    .oneof("kind"),
            ),
        MessageSpec::new("google.protobuf.ListValue")
            .implicit_presence()
            .field(FieldSpec::new("values", 1, value()).repeated()),
    ]);
    messages
}
