//! In-place text edits for JSON-family documents.
//!
//! Each write is spliced into the text at the span the scanner reports, so
//! comments, spacing and unrelated keys stay byte-identical.

use crate::error::{DocumentError, DocumentResult};
use crate::model::{PendingWrite, Scalar, ARRAY_INDEX, CONTAINER_TARGET, SCALAR_PARENT};
use crate::syntax::{Dialect, Member, Node, NodeKind, Scanner};
use crate::ParserOptions;

const EOL: &str = "\n";

/// Apply every write in order. Either all writes apply or an error is
/// returned and no text is produced.
pub(crate) fn apply_all(
    text: &str,
    writes: &[PendingWrite],
    dialect: Dialect,
    options: &ParserOptions,
) -> DocumentResult<String> {
    let mut working = text.to_string();
    for write in writes {
        working = apply_write(&working, write, dialect, options)?;
    }
    Ok(working)
}

fn apply_write(
    text: &str,
    write: &PendingWrite,
    dialect: Dialect,
    options: &ParserOptions,
) -> DocumentResult<String> {
    let Some(root) = Scanner::new(text, dialect).parse_document()? else {
        return Ok(fresh_document(text, write, options));
    };
    if !matches!(root.kind, NodeKind::Object(_)) {
        return Err(DocumentError::parse("document root must be an object", root.start));
    }

    let conflict = |reason: &str| DocumentError::path_conflict(write.keypath.to_string(), reason);
    let segments = write.keypath.segments();
    let mut node = &root;
    for (depth, segment) in segments.iter().enumerate() {
        node = match &node.kind {
            NodeKind::Object(members) => match members.iter().rev().find(|m| &m.key == segment) {
                Some(member) => &member.value,
                None => {
                    return Ok(insert_member(
                        text,
                        node,
                        members,
                        &segments[depth..],
                        &write.value,
                        options,
                    ))
                }
            },
            NodeKind::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index))
                .ok_or_else(|| conflict(ARRAY_INDEX))?,
            _ => return Err(conflict(SCALAR_PARENT)),
        };
    }

    if node.is_container() {
        return Err(conflict(CONTAINER_TARGET));
    }
    Ok(replace_leaf(text, node, &write.value))
}

/// Replace a leaf value. String-to-string writes only touch the characters
/// between the quotes.
fn replace_leaf(text: &str, node: &Node, value: &Scalar) -> String {
    match (&node.kind, value) {
        (NodeKind::String(_), Scalar::String(_)) => {
            let quoted = value.to_json();
            let inner = &quoted[1..quoted.len() - 1];
            splice(text, node.start + 1, node.end - 1, inner)
        }
        _ => splice(text, node.start, node.end, &value.to_json()),
    }
}

/// Insert the first missing segment into `object`, nesting the rest.
///
/// The new member copies the indentation of the last member when that member
/// starts its own line, and is otherwise indented one step past the line
/// holding the object's opening brace.
fn insert_member(
    text: &str,
    object: &Node,
    members: &[Member],
    missing: &[String],
    value: &Scalar,
    options: &ParserOptions,
) -> String {
    let outer = line_indent(text, object.start);
    let indent = members
        .last()
        .and_then(|last| member_indent(text, last))
        .map_or_else(|| format!("{outer}{}", options.indentation(1)), str::to_string);
    let entry = render_member(missing, value, &indent, options);

    if let Some(last) = members.last() {
        return match last.comma {
            Some(comma) => {
                let at = trailing_line_comment(text, comma + 1).unwrap_or(comma + 1);
                splice(text, at, at, &format!("{EOL}{indent}{entry},"))
            }
            None => match trailing_line_comment(text, last.value.end) {
                Some(at) => {
                    let out = splice(text, at, at, &format!("{EOL}{indent}{entry}"));
                    splice(&out, last.value.end, last.value.end, ",")
                }
                None => splice(
                    text,
                    last.value.end,
                    last.value.end,
                    &format!(",{EOL}{indent}{entry}"),
                ),
            },
        };
    }

    let open = object.start + 1;
    let close = object.end - 1;
    if text[open..close].trim().is_empty() {
        splice(text, open, close, &format!("{EOL}{indent}{entry}{EOL}{outer}"))
    } else {
        // Only comments inside; keep them after the new member.
        splice(text, open, open, &format!("{EOL}{indent}{entry}"))
    }
}

fn render_member(segments: &[String], value: &Scalar, indent: &str, options: &ParserOptions) -> String {
    let key = Scalar::from(segments[0].as_str()).to_json();
    if segments.len() == 1 {
        return format!("{key}: {}", value.to_json());
    }
    let inner = format!("{indent}{}", options.indentation(1));
    let nested = render_member(&segments[1..], value, &inner, options);
    format!("{key}: {{{EOL}{inner}{nested}{EOL}{indent}}}")
}

/// Leading whitespace of the line containing `offset`.
fn line_indent(text: &str, offset: usize) -> &str {
    let line_start = text[..offset].rfind('\n').map_or(0, |i| i + 1);
    let line = &text[line_start..offset];
    &line[..line.len() - line.trim_start_matches([' ', '\t']).len()]
}

/// Indentation of `member` when its key is the first token on its line.
fn member_indent<'a>(text: &'a str, member: &Member) -> Option<&'a str> {
    let line_start = text[..member.value.start].rfind('\n').map_or(0, |i| i + 1);
    let line = &text[line_start..member.value.start];
    let body = line.trim_start_matches([' ', '\t']);
    let key = Scalar::from(member.key.as_str()).to_json();
    body.starts_with(&key).then(|| &line[..line.len() - body.len()])
}

/// End of a `//` comment following `from` on the same line.
fn trailing_line_comment(text: &str, from: usize) -> Option<usize> {
    let rest = &text[from..];
    let gap = rest.len() - rest.trim_start_matches([' ', '\t']).len();
    let comment = rest[gap..].strip_prefix("//")?;
    let len = comment.find('\n').unwrap_or(comment.len());
    let len = comment[..len].strip_suffix('\r').map_or(len, str::len);
    Some(from + gap + 2 + len)
}

/// Build a document for text that holds no value yet, keeping any comments.
fn fresh_document(text: &str, write: &PendingWrite, options: &ParserOptions) -> String {
    let indent = options.indentation(1);
    let entry = render_member(write.keypath.segments(), &write.value, &indent, options);
    let preamble = text.trim_end();
    let separator = if preamble.is_empty() { "" } else { EOL };
    format!("{preamble}{separator}{{{EOL}{indent}{entry}{EOL}}}{EOL}")
}

fn splice(text: &str, start: usize, end: usize, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len() + replacement.len());
    out.push_str(&text[..start]);
    out.push_str(replacement);
    out.push_str(&text[end..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{KeyPath, KeyStyle};
    use crate::syntax::{leaf_locations, parse_tree};
    use serde_json::{json, Value};

    fn write(path: &str, value: impl Into<Scalar>) -> PendingWrite {
        PendingWrite::new(KeyPath::parse(path, KeyStyle::Nested).unwrap(), value)
    }

    fn apply(text: &str, writes: Vec<PendingWrite>) -> DocumentResult<String> {
        apply_all(text, &writes, Dialect::TOLERANT, &ParserOptions::default())
    }

    #[test]
    fn test_replace_number_in_place() {
        let text = r#"{"a":{"b":1}}"#;
        let out = apply(text, vec![write("a.b", 2)]).unwrap();
        assert_eq!(out, r#"{"a":{"b":2}}"#);
    }

    #[test]
    fn test_replace_string_touches_only_its_span() {
        let text = "{\n  // keep me\n  \"greeting\": \"hello\", /* and me */\n  \"other\": 1\n}\n";
        let location = leaf_locations(text, Dialect::TOLERANT)
            .unwrap()
            .into_iter()
            .find(|l| l.key == "greeting")
            .unwrap();

        let out = apply(text, vec![write("greeting", "bonjour \"toi\"")]).unwrap();

        assert_eq!(&out[..location.start], &text[..location.start]);
        let tail = text.len() - location.end;
        assert_eq!(&out[out.len() - tail..], &text[location.end..]);
        assert_eq!(parse_tree(&out, Dialect::TOLERANT).unwrap()["greeting"], json!("bonjour \"toi\""));
    }

    #[test]
    fn test_change_type_replaces_whole_token() {
        let text = r#"{"a": "1"}"#;
        let out = apply(text, vec![write("a", 1)]).unwrap();
        assert_eq!(out, r#"{"a": 1}"#);
    }

    #[test]
    fn test_insert_after_last_member() {
        let text = "{\n  \"a\": 1\n}\n";
        let out = apply(text, vec![write("b", "x")]).unwrap();
        assert_eq!(out, "{\n  \"a\": 1,\n  \"b\": \"x\"\n}\n");
    }

    #[test]
    fn test_insert_after_trailing_line_comment() {
        let text = "{\n  \"a\": 1 // first\n}\n";
        let out = apply(text, vec![write("b", 2)]).unwrap();
        assert_eq!(out, "{\n  \"a\": 1, // first\n  \"b\": 2\n}\n");

        let text = "{\n  \"a\": 1, // first\n}\n";
        let out = apply(text, vec![write("b", 2)]).unwrap();
        assert_eq!(out, "{\n  \"a\": 1, // first\n  \"b\": 2,\n}\n");
    }

    #[test]
    fn test_insert_follows_document_indentation() {
        let text = "{\n    \"list\": [\n        {\n            \"a\": 1\n        }\n    ]\n}\n";
        let out = apply(text, vec![write("list.0.b", 2)]).unwrap();
        assert_eq!(
            out,
            "{\n    \"list\": [\n        {\n            \"a\": 1,\n            \"b\": 2\n        }\n    ]\n}\n"
        );

        let text = "{\n  \"list\": [{\"a\": 1}]\n}\n";
        let out = apply(text, vec![write("list.0.b.c", 2)]).unwrap();
        assert_eq!(
            out,
            "{\n  \"list\": [{\"a\": 1,\n    \"b\": {\n      \"c\": 2\n    }}]\n}\n"
        );
    }

    #[test]
    fn test_insert_keeps_trailing_comma_style() {
        let text = "{\n  \"a\": 1,\n}\n";
        let out = apply(text, vec![write("b", 2)]).unwrap();
        assert_eq!(out, "{\n  \"a\": 1,\n  \"b\": 2,\n}\n");
    }

    #[test]
    fn test_insert_nested_missing_segments() {
        let text = "{\n  \"a\": {\n    \"x\": 1\n  }\n}\n";
        let out = apply(text, vec![write("a.b.c", true)]).unwrap();
        assert_eq!(
            out,
            "{\n  \"a\": {\n    \"x\": 1,\n    \"b\": {\n      \"c\": true\n    }\n  }\n}\n"
        );
    }

    #[test]
    fn test_insert_into_empty_object() {
        let out = apply("{}\n", vec![write("a", 1)]).unwrap();
        assert_eq!(out, "{\n  \"a\": 1\n}\n");

        let out = apply("{\"n\": {}}", vec![write("n.k", "v")]).unwrap();
        let tree = parse_tree(&out, Dialect::TOLERANT).unwrap();
        assert_eq!(Value::Object(tree), json!({"n": {"k": "v"}}));
    }

    #[test]
    fn test_insert_into_object_with_only_comments() {
        let text = "{ // nothing yet\n}";
        let out = apply(text, vec![write("a", 1)]).unwrap();
        assert!(out.contains("// nothing yet"));
        assert_eq!(parse_tree(&out, Dialect::TOLERANT).unwrap()["a"], json!(1));
    }

    #[test]
    fn test_blank_document_gets_created() {
        let out = apply("", vec![write("a.b", 1), write("c", "d")]).unwrap();
        assert_eq!(out, "{\n  \"a\": {\n    \"b\": 1\n  },\n  \"c\": \"d\"\n}\n");
    }

    #[test]
    fn test_tab_indentation() {
        let options = ParserOptions { indent: 2, tab: true };
        let out = apply_all("{\n\t\"a\": 1\n}", &[write("b", 2)], Dialect::TOLERANT, &options).unwrap();
        assert_eq!(out, "{\n\t\"a\": 1,\n\t\"b\": 2\n}");
    }

    #[test]
    fn test_scalar_parent_is_conflict() {
        let err = apply(r#"{"a": "leaf"}"#, vec![write("a.b", 1)]).unwrap_err();
        assert!(matches!(err, DocumentError::PathConflict { .. }));
    }

    #[test]
    fn test_container_target_is_conflict() {
        let err = apply(r#"{"a": {"b": 1}}"#, vec![write("a", 1)]).unwrap_err();
        assert!(matches!(err, DocumentError::PathConflict { .. }));
    }

    #[test]
    fn test_array_elements() {
        let text = r#"{"list": ["x", "y"]}"#;
        let out = apply(text, vec![write("list.1", "z")]).unwrap();
        assert_eq!(out, r#"{"list": ["x", "z"]}"#);
        assert!(apply(text, vec![write("list.2", "w")]).is_err());
    }

    #[test]
    fn test_batch_rejected_as_a_whole() {
        let text = r#"{"a": "leaf", "b": 1}"#;
        let result = apply(text, vec![write("b", 2), write("a.x", 3)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_key_edits_last_occurrence() {
        let text = r#"{"a": 1, "a": 2}"#;
        let out = apply(text, vec![write("a", 3)]).unwrap();
        assert_eq!(out, r#"{"a": 1, "a": 3}"#);
    }
}
