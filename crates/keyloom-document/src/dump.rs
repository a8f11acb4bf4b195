//! Full re-serialization of a tree.

use crate::error::DocumentResult;
use crate::model::Tree;
use crate::ParserOptions;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use std::cmp::Ordering;

/// Caller-supplied key ordering used when sorting on dump.
pub type KeyComparator = dyn Fn(&str, &str) -> Ordering + Send + Sync;

/// Pretty-print `tree` with the configured indentation and a trailing newline.
///
/// With `sort`, every object level is ordered by `comparator`, or
/// lexicographically when none is given. Otherwise insertion order is kept.
pub(crate) fn dump_tree(
    tree: &Tree,
    sort: bool,
    comparator: Option<&KeyComparator>,
    options: &ParserOptions,
) -> DocumentResult<String> {
    let indent = options.indentation(1);
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(indent.as_bytes()));
    if sort {
        sorted_map(tree, comparator).serialize(&mut serializer)?;
    } else {
        tree.serialize(&mut serializer)?;
    }
    let mut text = String::from_utf8_lossy(&buf).into_owned();
    text.push('\n');
    Ok(text)
}

fn sorted_map(map: &Tree, comparator: Option<&KeyComparator>) -> Tree {
    let mut entries: Vec<_> = map.iter().collect();
    match comparator {
        Some(compare) => entries.sort_by(|a, b| compare(a.0, b.0)),
        None => entries.sort_by(|a, b| a.0.cmp(b.0)),
    }
    entries
        .into_iter()
        .map(|(key, value)| (key.clone(), sorted_value(value, comparator)))
        .collect()
}

fn sorted_value(value: &Value, comparator: Option<&KeyComparator>) -> Value {
    match value {
        Value::Object(map) => Value::Object(sorted_map(map, comparator)),
        Value::Array(items) => Value::Array(items.iter().map(|v| sorted_value(v, comparator)).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: Value) -> Tree {
        match value {
            Value::Object(map) => map,
            _ => panic!("test tree must be an object"),
        }
    }

    #[test]
    fn test_dump_keeps_insertion_order() {
        let t = tree(json!({"b": 1, "a": {"d": true, "c": null}}));
        let text = dump_tree(&t, false, None, &ParserOptions::default()).unwrap();
        assert_eq!(
            text,
            "{\n  \"b\": 1,\n  \"a\": {\n    \"d\": true,\n    \"c\": null\n  }\n}\n"
        );
    }

    #[test]
    fn test_dump_sorted_recursively() {
        let t = tree(json!({"b": 1, "a": {"d": true, "c": [{"z": 1, "y": 2}]}}));
        let text = dump_tree(&t, true, None, &ParserOptions::default()).unwrap();
        let a = text.find("\"a\"").unwrap();
        let b = text.find("\"b\"").unwrap();
        assert!(a < b);
        assert!(text.find("\"c\"").unwrap() < text.find("\"d\"").unwrap());
        assert!(text.find("\"y\"").unwrap() < text.find("\"z\"").unwrap());
    }

    #[test]
    fn test_dump_custom_comparator() {
        let t = tree(json!({"a": 1, "b": 2, "c": 3}));
        let reverse: &KeyComparator = &|x: &str, y: &str| y.cmp(x);
        let text = dump_tree(&t, true, Some(reverse), &ParserOptions::default()).unwrap();
        assert_eq!(text, "{\n  \"c\": 3,\n  \"b\": 2,\n  \"a\": 1\n}\n");
    }

    #[test]
    fn test_dump_empty_and_tabs() {
        assert_eq!(
            dump_tree(&Tree::new(), false, None, &ParserOptions::default()).unwrap(),
            "{}\n"
        );
        let options = ParserOptions { indent: 4, tab: true };
        let text = dump_tree(&tree(json!({"a": 1})), false, None, &options).unwrap();
        assert_eq!(text, "{\n\t\"a\": 1\n}\n");
    }
}
