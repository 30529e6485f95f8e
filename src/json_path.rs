//! Value lookup inside exchanged JSON documents
//!
//! Paths address the last response by default, or the last request when
//! prefixed with `request.`. Both period form (`body.items.0.id`) and
//! pointer form (`/body/items/0/id`) are accepted, and `*` fans out over
//! every element of an array. Lookups can therefore return several values,
//! keyed by the pointer path that produced each one.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{error, warn};

use crate::context::{ContentProvider, Context};

/// Resolve a JSON path against the current exchange documents.
///
/// Returns `None` when the origin document does not exist yet, which is
/// distinct from `Some` of an empty map where traversal dropped every
/// branch.
pub fn resolve_values(ctx: &Context, json_path: &str) -> Option<IndexMap<String, String>> {
    let from_request = json_path.starts_with("request.");
    let document = if from_request {
        ctx.request_document()
    } else {
        ctx.response_document()
    };

    let Some(root) = document else {
        warn!(
            "No {} document available for JSON path: {json_path}",
            if from_request { "request" } else { "response" }
        );
        return None;
    };

    Some(values_from_document(root, json_path))
}

/// Walk a document along `json_path`, fanning out at wildcards. Branches
/// that point at nothing are dropped with a logged error.
fn values_from_document(root: &Value, json_path: &str) -> IndexMap<String, String> {
    let pointer = normalize_path(json_path);

    let mut frontier: IndexMap<String, &Value> = IndexMap::from([(String::new(), root)]);
    for segment in pointer.split('/').filter(|s| !s.is_empty()) {
        let mut next: IndexMap<String, &Value> = IndexMap::new();

        for (node_path, node) in &frontier {
            let branches: Vec<String> = match (segment, node) {
                ("*", Value::Array(items)) => (0..items.len()).map(|i| i.to_string()).collect(),
                _ => vec![segment.to_string()],
            };

            for branch in branches {
                match lookup(node, &branch) {
                    Some(child) => {
                        next.insert(format!("{node_path}/{branch}"), child);
                    }
                    None => error!(
                        "Null value found when resolving pointer path \"{node_path}/{branch}\", provided by JSON path \"{json_path}\""
                    ),
                }
            }
        }

        frontier = next;
    }

    frontier
        .into_iter()
        .map(|(path, node)| {
            let key = if path.starts_with('/') {
                path
            } else {
                format!("/{path}")
            };
            (key, node_text(node))
        })
        .collect()
}

/// Strip the origin prefix and bring the path into pointer form. Period
/// conversion only applies when the path carries no `/` of its own.
fn normalize_path(json_path: &str) -> String {
    let path = json_path.strip_prefix("request.").unwrap_or(json_path);
    let path = path.strip_prefix("response.").unwrap_or(path);

    let path = if path.contains('/') {
        path.to_string()
    } else {
        path.replace('.', "/")
    };

    if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    }
}

/// Child of `node` addressed by one pointer segment. Numeric segments
/// index arrays and nothing else, names select object members and nothing
/// else.
fn lookup<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    if is_numeric(segment) {
        match node {
            Value::Array(items) => {
                let index: i64 = segment.parse().ok()?;
                usize::try_from(index).ok().and_then(|i| items.get(i))
            }
            _ => None,
        }
    } else {
        match node {
            Value::Object(members) => members.get(segment),
            _ => None,
        }
    }
}

fn is_numeric(segment: &str) -> bool {
    let digits = segment.strip_prefix('-').unwrap_or(segment);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Scalar text of a leaf node. Containers render as empty text, so paths
/// that stop early compare like missing values.
pub fn node_text(node: &Value) -> String {
    match node {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => String::new(),
    }
}

/// Content provider exposing exchange documents under the `json` prefix
pub struct JsonPathProvider;

impl ContentProvider for JsonPathProvider {
    fn prefix(&self) -> &str {
        "json"
    }

    fn content(&self, ctx: &Context, key: &str) -> IndexMap<String, String> {
        resolve_values(ctx, key).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn pairs(map: &IndexMap<String, String>) -> Vec<(&str, &str)> {
        map.iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    #[test]
    fn test_member_lookup() {
        let doc = json!({"name": "Ada"});
        let values = values_from_document(&doc, "name");
        assert_eq!(pairs(&values), vec![("/name", "Ada")]);
    }

    #[test]
    fn test_period_path_traverses_nesting() {
        let doc = json!({"body": {"item": {"value": "1"}}});
        let values = values_from_document(&doc, "body.item.value");
        assert_eq!(pairs(&values), vec![("/body/item/value", "1")]);
    }

    #[test]
    fn test_pointer_form_skips_period_conversion() {
        let doc = json!({"body": {"dotted.name": "x"}});
        let values = values_from_document(&doc, "/body/dotted.name");
        assert_eq!(pairs(&values), vec![("/body/dotted.name", "x")]);
    }

    #[test]
    fn test_origin_prefix_is_stripped() {
        let doc = json!({"name": "Ada"});
        assert_eq!(
            values_from_document(&doc, "response.name"),
            values_from_document(&doc, "name")
        );
        assert_eq!(
            values_from_document(&doc, "request.name"),
            values_from_document(&doc, "name")
        );
    }

    #[test]
    fn test_wildcard_fans_out_in_order() {
        let doc = json!({"items": [{"id": "a"}, {"id": "b"}, {"id": "c"}]});
        let values = values_from_document(&doc, "items.*.id");
        assert_eq!(
            pairs(&values),
            vec![
                ("/items/0/id", "a"),
                ("/items/1/id", "b"),
                ("/items/2/id", "c"),
            ]
        );
    }

    #[test]
    fn test_wildcard_on_object_is_literal_member() {
        let doc = json!({"*": "star"});
        let values = values_from_document(&doc, "*");
        assert_eq!(pairs(&values), vec![("/*", "star")]);
    }

    #[test]
    fn test_missing_branch_is_dropped_others_survive() {
        let doc = json!({"items": [{"id": "a"}, {"other": "b"}]});
        let values = values_from_document(&doc, "items.*.id");
        assert_eq!(pairs(&values), vec![("/items/0/id", "a")]);
    }

    #[test]
    fn test_array_index_lookup() {
        let doc = json!({"items": ["a", "b"]});
        let values = values_from_document(&doc, "items.1");
        assert_eq!(pairs(&values), vec![("/items/1", "b")]);
    }

    #[test]
    fn test_numeric_segment_never_matches_object_member() {
        let doc = json!({"0": "zero"});
        assert!(values_from_document(&doc, "0").is_empty());
    }

    #[test]
    fn test_out_of_bounds_index_is_dropped() {
        let doc = json!({"items": ["a"]});
        assert!(values_from_document(&doc, "items.5").is_empty());
        assert!(values_from_document(&doc, "items.-1").is_empty());
    }

    #[test]
    fn test_node_text_renders_scalars() {
        assert_eq!(node_text(&json!(null)), "null");
        assert_eq!(node_text(&json!(true)), "true");
        assert_eq!(node_text(&json!(42)), "42");
        assert_eq!(node_text(&json!(4.5)), "4.5");
        assert_eq!(node_text(&json!("text")), "text");
        assert_eq!(node_text(&json!([1, 2])), "");
        assert_eq!(node_text(&json!({"a": 1})), "");
    }
}
