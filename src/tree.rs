//! Typed walks over nested result trees.
//!
//! Result metadata arrives as arbitrary JSON; these walks match on the
//! mapping / sequence / leaf variants instead of probing types at runtime.
use serde_json::Value;

/// A dataset reference found while walking a parameter tree.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRef {
    /// `/`-joined keys and indices from the walk root, e.g. `/input/values/0`.
    pub path: String,
    pub id: Value,
}

impl DatasetRef {
    /// Top-level parameter name: the first path segment.
    pub fn parameter(&self) -> Option<&str> {
        self.path.split('/').nth(1).filter(|name| !name.is_empty())
    }
}

/// Collect every mapping node carrying an `id` key, depth first.
///
/// Descent never stops at a match: a matched node's children are walked too.
pub fn find_ids(root: &Value) -> Vec<DatasetRef> {
    let mut found = Vec::new();
    walk_ids("", root, &mut found);
    found
}

fn walk_ids(path: &str, node: &Value, found: &mut Vec<DatasetRef>) {
    match node {
        Value::Object(map) => {
            if let Some(id) = map.get("id") {
                found.push(DatasetRef {
                    path: path.to_string(),
                    id: id.clone(),
                });
            }
            for (key, child) in map {
                walk_ids(&format!("{path}/{key}"), child, found);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                walk_ids(&format!("{path}/{index}"), child, found);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
    }
}

/// Collect mapping nodes whose `tool_id` contains `needle`.
///
/// Unlike [`find_ids`], a matched node is not searched further.
pub fn find_tool<'a>(root: &'a Value, needle: &str) -> Vec<&'a Value> {
    let mut found = Vec::new();
    walk_tools(root, needle, &mut found);
    found
}

fn walk_tools<'a>(node: &'a Value, needle: &str, found: &mut Vec<&'a Value>) {
    match node {
        Value::Object(map) => {
            let matches = map
                .get("tool_id")
                .and_then(Value::as_str)
                .is_some_and(|tool_id| tool_id.contains(needle));
            if matches {
                found.push(node);
                return;
            }
            for child in map.values() {
                walk_tools(child, needle, found);
            }
        }
        Value::Array(items) => {
            for child in items {
                walk_tools(child, needle, found);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
    }
}

/// Normalize a dataset id leaf to a lookup key; only strings and numbers qualify.
pub fn id_key(id: &Value) -> Option<String> {
    match id {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn find_ids_descends_past_matches() {
        let tree = json!({"a": {"id": 1, "b": {"id": 2}}});
        let found = find_ids(&tree);
        assert_eq!(
            found,
            vec![
                DatasetRef {
                    path: "/a".to_string(),
                    id: json!(1)
                },
                DatasetRef {
                    path: "/a/b".to_string(),
                    id: json!(2)
                },
            ]
        );
        assert_eq!(found[1].parameter(), Some("a"));
    }

    #[test]
    fn find_ids_indexes_sequences() {
        let tree = json!({"input": {"values": [{"id": "f1", "src": "hda"}, {"id": "f2"}]}});
        let paths: Vec<String> = find_ids(&tree).into_iter().map(|r| r.path).collect();
        assert_eq!(paths, ["/input/values/0", "/input/values/1"]);
    }

    #[test]
    fn root_level_ids_have_no_parameter() {
        let found = find_ids(&json!({"id": "x"}));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].parameter(), None);
    }

    #[test]
    fn find_tool_stops_at_matches() {
        let tree = json!({
            "1": {"tool_id": "toolshed/repos/imgteam/unzip/unzip/6.0", "inner": {"tool_id": "unzip/unzip"}},
            "2": [{"tool_id": "toolshed/repos/imgteam/filter/filter/1.0"}, {"nested": {"tool_id": "x/unzip/unzip"}}],
        });
        let found = find_tool(&tree, "unzip/unzip");
        assert_eq!(found.len(), 2);
        assert!(found
            .iter()
            .all(|node| node["tool_id"].as_str().is_some_and(|id| id.contains("unzip"))));
    }

    #[test]
    fn id_key_accepts_strings_and_numbers() {
        assert_eq!(id_key(&json!("abc")), Some("abc".to_string()));
        assert_eq!(id_key(&json!(42)), Some("42".to_string()));
        assert_eq!(id_key(&json!(null)), None);
        assert_eq!(id_key(&json!({"id": 1})), None);
    }
}
