//! Recursive type detection for automatic boxing.
//!
//! Messages may reference themselves directly or through a chain of other
//! messages:
//! ```protobuf
//! message A {
//!   optional B b = 1;
//! }
//! message B {
//!   optional A a = 1;
//! }
//! ```
//!
//! A Rust struct holding such a field inline would have infinite size, so
//! every field that closes a cycle is stored behind a `Box`. Repeated and map
//! fields already live on the heap and never take part in a cycle.

use std::collections::{HashMap, HashSet};

use crate::schema::{Cardinality, Kind, Schema};

/// A field that needs to be boxed to break a recursive cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecursiveField {
    /// Fully-qualified name of the containing message.
    pub message_fqn: String,
    pub field_name: String,
}

/// Returns every field that closes a cycle of inline message references.
pub fn find_recursive_fields(schema: &Schema) -> HashSet<RecursiveField> {
    let mut result = HashSet::new();

    // message_fqn -> [(field_name, referenced_message_fqn)]
    let mut graph: HashMap<&str, Vec<(&str, &str)>> = HashMap::new();
    for message in &schema.messages {
        let edges = message
            .fields
            .iter()
            .filter(|f| {
                !matches!(
                    f.cardinality,
                    Cardinality::Repeated | Cardinality::Map(_)
                )
            })
            .filter_map(|f| match &f.kind {
                Kind::Message(target) => Some((f.name.as_str(), target.trim_start_matches('.'))),
                _ => None,
            })
            .collect();
        graph.insert(message.name.as_str(), edges);
    }

    for start in graph.keys().copied() {
        let mut in_path = HashSet::new();
        in_path.insert(start);
        dfs_find_cycles(&graph, start, start, &mut in_path, &mut result);
    }

    result
}

/// DFS to find cycles. `in_path` tracks nodes in the current DFS path.
fn dfs_find_cycles<'a>(
    graph: &HashMap<&'a str, Vec<(&'a str, &'a str)>>,
    current: &'a str,
    target: &'a str,
    in_path: &mut HashSet<&'a str>,
    result: &mut HashSet<RecursiveField>,
) {
    let Some(edges) = graph.get(current) else {
        return;
    };

    for &(field_name, referenced) in edges {
        if referenced == target {
            result.insert(RecursiveField {
                message_fqn: current.to_string(),
                field_name: field_name.to_string(),
            });
            continue;
        }

        if in_path.contains(referenced) {
            continue;
        }

        in_path.insert(referenced);
        dfs_find_cycles(graph, referenced, target, in_path, result);
        in_path.remove(referenced);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, MessageSpec};

    fn msg_field(name: &str, target: &str) -> FieldSpec {
        FieldSpec::new(name, 1, Kind::Message(target.to_string()))
    }

    fn recursive(message: &str, field: &str) -> RecursiveField {
        RecursiveField {
            message_fqn: message.to_string(),
            field_name: field.to_string(),
        }
    }

    #[test]
    fn test_direct_recursion() {
        let schema = Schema::new("test")
            .message(MessageSpec::new("test.Node").field(msg_field("child", "test.Node")));

        let fields = find_recursive_fields(&schema);
        assert!(fields.contains(&recursive("test.Node", "child")));
    }

    #[test]
    fn test_indirect_recursion() {
        let schema = Schema::new("test")
            .message(MessageSpec::new("test.A").field(msg_field("b", "test.B")))
            .message(MessageSpec::new("test.B").field(msg_field("a", "test.A")));

        let fields = find_recursive_fields(&schema);
        assert!(
            fields.contains(&recursive("test.A", "b")) || fields.contains(&recursive("test.B", "a")),
            "at least one field in the cycle should be boxed"
        );
    }

    #[test]
    fn test_repeated_breaks_cycle() {
        let schema = Schema::new("test").message(
            MessageSpec::new("test.Tree").field(msg_field("children", "test.Tree").repeated()),
        );
        assert!(find_recursive_fields(&schema).is_empty());
    }

    #[test]
    fn test_no_recursion() {
        let schema = Schema::new("test")
            .message(MessageSpec::new("test.A").field(msg_field("b", "test.B")))
            .message(MessageSpec::new("test.B").field(FieldSpec::new("x", 1, Kind::Int32)));
        assert!(find_recursive_fields(&schema).is_empty());
    }
}
