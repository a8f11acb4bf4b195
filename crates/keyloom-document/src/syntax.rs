//! Span-tracking scanner for the JSON family.
//!
//! The scanner produces a lightweight syntax tree where every node remembers
//! its byte range in the source text. That is what lets the parsers report
//! exact key locations and splice edits into the original text instead of
//! re-serializing it.

use crate::error::{DocumentError, DocumentResult};
use crate::model::{KeyLocation, Tree};
use serde_json::{Map, Number, Value};
use std::collections::HashMap;

const MAX_DEPTH: usize = 512;
const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Syntax extensions accepted on top of strict JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    /// `//` line and `/* */` block comments.
    pub comments: bool,
    /// A single `,` before a closing bracket.
    pub trailing_commas: bool,
}

impl Dialect {
    /// Comments and trailing commas allowed.
    pub const TOLERANT: Dialect = Dialect {
        comments: true,
        trailing_commas: true,
    };
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub kind: NodeKind,
    /// Offset of the first byte of the value.
    pub start: usize,
    /// Offset one past the last byte of the value.
    pub end: usize,
}

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    Object(Vec<Member>),
    Array(Vec<Node>),
    String(String),
    Number(Number),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone)]
pub(crate) struct Member {
    pub key: String,
    pub value: Node,
    /// Offset of the comma following this member, if any.
    pub comma: Option<usize>,
}

impl Node {
    pub fn is_container(&self) -> bool {
        matches!(self.kind, NodeKind::Object(_) | NodeKind::Array(_))
    }

    /// Span reported for a leaf: string content without quotes, otherwise the
    /// whole token.
    pub fn leaf_span(&self) -> (usize, usize, bool) {
        match self.kind {
            NodeKind::String(_) => (self.start + 1, self.end - 1, true),
            _ => (self.start, self.end, false),
        }
    }

    pub fn to_value(&self) -> Value {
        match &self.kind {
            NodeKind::Object(members) => {
                let mut map = Map::new();
                for member in members {
                    map.insert(member.key.clone(), member.value.to_value());
                }
                Value::Object(map)
            }
            NodeKind::Array(items) => Value::Array(items.iter().map(Node::to_value).collect()),
            NodeKind::String(s) => Value::String(s.clone()),
            NodeKind::Number(n) => Value::Number(n.clone()),
            NodeKind::Bool(b) => Value::Bool(*b),
            NodeKind::Null => Value::Null,
        }
    }
}

enum Step {
    /// A comma at the given offset, more entries follow.
    More(usize),
    /// The container closed, possibly after a trailing comma.
    Done(Option<usize>),
}

pub(crate) struct Scanner<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
    dialect: Dialect,
}

impl<'a> Scanner<'a> {
    pub fn new(text: &'a str, dialect: Dialect) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
            depth: 0,
            dialect,
        }
    }

    /// Parse the whole text. Returns `None` when it holds only trivia.
    pub fn parse_document(mut self) -> DocumentResult<Option<Node>> {
        self.skip_bom();
        self.skip_trivia()?;
        if self.at_end() {
            return Ok(None);
        }
        let node = self.parse_value()?;
        self.skip_trivia()?;
        if !self.at_end() {
            return Err(self.error("unexpected content after document"));
        }
        Ok(Some(node))
    }

    /// Walk straight to the value at `segments`, skipping over siblings.
    ///
    /// Returns the node only when it is a leaf. With duplicate keys the last
    /// occurrence wins.
    pub fn seek(mut self, segments: &[String]) -> DocumentResult<Option<Node>> {
        self.skip_bom();
        self.skip_trivia()?;
        for segment in segments {
            let found = match self.peek() {
                Some(b'{') => self.seek_member(segment)?,
                Some(b'[') => self.seek_element(segment)?,
                _ => None,
            };
            match found {
                Some(pos) => self.pos = pos,
                None => return Ok(None),
            }
        }
        match self.peek() {
            None | Some(b'{') | Some(b'[') => Ok(None),
            Some(_) => self.parse_value().map(Some),
        }
    }

    fn seek_member(&mut self, segment: &str) -> DocumentResult<Option<usize>> {
        self.pos += 1;
        self.skip_trivia()?;
        if self.eat(b'}') {
            return Ok(None);
        }
        let mut found = None;
        loop {
            let key = self.property_name()?;
            if key == segment {
                found = Some(self.pos);
            }
            self.skip_value()?;
            self.skip_trivia()?;
            if let Step::Done(_) = self.step(b'}')? {
                return Ok(found);
            }
        }
    }

    fn seek_element(&mut self, segment: &str) -> DocumentResult<Option<usize>> {
        let Ok(index) = segment.parse::<usize>() else {
            return Ok(None);
        };
        self.pos += 1;
        self.skip_trivia()?;
        if self.eat(b']') {
            return Ok(None);
        }
        let mut current = 0;
        loop {
            self.skip_trivia()?;
            if current == index {
                return Ok(Some(self.pos));
            }
            self.skip_value()?;
            self.skip_trivia()?;
            if let Step::Done(_) = self.step(b']')? {
                return Ok(None);
            }
            current += 1;
        }
    }

    fn parse_value(&mut self) -> DocumentResult<Node> {
        let start = self.pos;
        let kind = match self.peek() {
            Some(b'{') => return self.parse_object(),
            Some(b'[') => return self.parse_array(),
            Some(b'"') => NodeKind::String(self.parse_string()?),
            Some(b'-' | b'0'..=b'9') => NodeKind::Number(self.parse_number()?),
            Some(b't') => self.literal("true", NodeKind::Bool(true))?,
            Some(b'f') => self.literal("false", NodeKind::Bool(false))?,
            Some(b'n') => self.literal("null", NodeKind::Null)?,
            Some(_) => return Err(self.error("unexpected character")),
            None => return Err(self.error("unexpected end of input")),
        };
        Ok(Node {
            kind,
            start,
            end: self.pos,
        })
    }

    fn parse_object(&mut self) -> DocumentResult<Node> {
        let start = self.pos;
        self.enter()?;
        self.pos += 1;
        self.skip_trivia()?;
        let mut members = Vec::new();
        if !self.eat(b'}') {
            loop {
                let key = self.property_name()?;
                let value = self.parse_value()?;
                self.skip_trivia()?;
                match self.step(b'}')? {
                    Step::More(comma) => members.push(Member {
                        key,
                        value,
                        comma: Some(comma),
                    }),
                    Step::Done(comma) => {
                        members.push(Member { key, value, comma });
                        break;
                    }
                }
            }
        }
        self.depth -= 1;
        Ok(Node {
            kind: NodeKind::Object(members),
            start,
            end: self.pos,
        })
    }

    fn parse_array(&mut self) -> DocumentResult<Node> {
        let start = self.pos;
        self.enter()?;
        self.pos += 1;
        self.skip_trivia()?;
        let mut items = Vec::new();
        if !self.eat(b']') {
            loop {
                self.skip_trivia()?;
                items.push(self.parse_value()?);
                self.skip_trivia()?;
                if let Step::Done(_) = self.step(b']')? {
                    break;
                }
            }
        }
        self.depth -= 1;
        Ok(Node {
            kind: NodeKind::Array(items),
            start,
            end: self.pos,
        })
    }

    /// `"key"` followed by `:`, leaving the cursor on the value.
    fn property_name(&mut self) -> DocumentResult<String> {
        self.skip_trivia()?;
        if self.peek() != Some(b'"') {
            return Err(self.error("expected property name"));
        }
        let key = self.parse_string()?;
        self.skip_trivia()?;
        if !self.eat(b':') {
            return Err(self.error("expected ':'"));
        }
        self.skip_trivia()?;
        Ok(key)
    }

    /// Consume the separator after a container entry.
    fn step(&mut self, close: u8) -> DocumentResult<Step> {
        if self.eat(close) {
            return Ok(Step::Done(None));
        }
        let comma = self.pos;
        if !self.eat(b',') {
            return Err(self.error(format!("expected ',' or '{}'", close as char)));
        }
        self.skip_trivia()?;
        if self.peek() == Some(close) {
            if !self.dialect.trailing_commas {
                return Err(DocumentError::parse("trailing comma", comma));
            }
            self.pos += 1;
            return Ok(Step::Done(Some(comma)));
        }
        Ok(Step::More(comma))
    }

    fn skip_value(&mut self) -> DocumentResult<()> {
        match self.peek() {
            Some(b'{') => {
                self.enter()?;
                self.pos += 1;
                self.skip_trivia()?;
                if !self.eat(b'}') {
                    loop {
                        self.property_name()?;
                        self.skip_value()?;
                        self.skip_trivia()?;
                        if let Step::Done(_) = self.step(b'}')? {
                            break;
                        }
                    }
                }
                self.depth -= 1;
                Ok(())
            }
            Some(b'[') => {
                self.enter()?;
                self.pos += 1;
                self.skip_trivia()?;
                if !self.eat(b']') {
                    loop {
                        self.skip_trivia()?;
                        self.skip_value()?;
                        self.skip_trivia()?;
                        if let Step::Done(_) = self.step(b']')? {
                            break;
                        }
                    }
                }
                self.depth -= 1;
                Ok(())
            }
            Some(b'"') => self.skip_string(),
            _ => self.parse_value().map(|_| ()),
        }
    }

    fn parse_string(&mut self) -> DocumentResult<String> {
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();
        loop {
            let chunk = self.pos;
            while let Some(b) = self.peek() {
                if b == b'"' || b == b'\\' || b < 0x20 {
                    break;
                }
                self.pos += 1;
            }
            out.push_str(&self.text[chunk..self.pos]);
            match self.peek() {
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(b'\\') => {
                    self.pos += 1;
                    self.parse_escape(&mut out)?;
                }
                Some(_) => return Err(self.error("control character in string")),
                None => return Err(DocumentError::parse("unterminated string", start)),
            }
        }
    }

    fn parse_escape(&mut self, out: &mut String) -> DocumentResult<()> {
        let escape_start = self.pos - 1;
        let Some(b) = self.peek() else {
            return Err(DocumentError::parse("unterminated escape", escape_start));
        };
        self.pos += 1;
        match b {
            b'"' => out.push('"'),
            b'\\' => out.push('\\'),
            b'/' => out.push('/'),
            b'b' => out.push('\u{8}'),
            b'f' => out.push('\u{c}'),
            b'n' => out.push('\n'),
            b'r' => out.push('\r'),
            b't' => out.push('\t'),
            b'u' => {
                let high = self.hex4()?;
                let decoded = if (0xD800..0xDC00).contains(&high) && self.bytes[self.pos..].starts_with(b"\\u") {
                    self.pos += 2;
                    let low = self.hex4()?;
                    if !(0xDC00..0xE000).contains(&low) {
                        return Err(DocumentError::parse("invalid surrogate pair", escape_start));
                    }
                    char::from_u32(0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00))
                } else {
                    char::from_u32(high)
                };
                out.push(decoded.unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            _ => return Err(DocumentError::parse("invalid escape", escape_start)),
        }
        Ok(())
    }

    fn hex4(&mut self) -> DocumentResult<u32> {
        let digits = self
            .text
            .get(self.pos..self.pos + 4)
            .filter(|d| d.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or_else(|| self.error("invalid unicode escape"))?;
        let value = u32::from_str_radix(digits, 16).map_err(|_| self.error("invalid unicode escape"))?;
        self.pos += 4;
        Ok(value)
    }

    fn skip_string(&mut self) -> DocumentResult<()> {
        let start = self.pos;
        self.pos += 1;
        while let Some(b) = self.peek() {
            match b {
                b'"' => {
                    self.pos += 1;
                    return Ok(());
                }
                b'\\' => self.pos += 2,
                _ => self.pos += 1,
            }
        }
        Err(DocumentError::parse("unterminated string", start))
    }

    fn parse_number(&mut self) -> DocumentResult<Number> {
        let start = self.pos;
        while let Some(b'-' | b'+' | b'.' | b'e' | b'E' | b'0'..=b'9') = self.peek() {
            self.pos += 1;
        }
        serde_json::from_str::<Number>(&self.text[start..self.pos])
            .map_err(|_| DocumentError::parse("invalid number", start))
    }

    fn literal(&mut self, word: &str, kind: NodeKind) -> DocumentResult<NodeKind> {
        if self.bytes[self.pos..].starts_with(word.as_bytes()) {
            self.pos += word.len();
            Ok(kind)
        } else {
            Err(self.error("unexpected character"))
        }
    }

    fn skip_bom(&mut self) {
        if self.bytes.starts_with(BOM) {
            self.pos = BOM.len();
        }
    }

    /// Skip whitespace and, when the dialect allows them, comments.
    fn skip_trivia(&mut self) -> DocumentResult<()> {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\n' | b'\r') => self.pos += 1,
                Some(b'/') if self.dialect.comments => match self.bytes.get(self.pos + 1) {
                    Some(b'/') => {
                        while let Some(b) = self.peek() {
                            if b == b'\n' {
                                break;
                            }
                            self.pos += 1;
                        }
                    }
                    Some(b'*') => {
                        let start = self.pos;
                        self.pos += 2;
                        loop {
                            if self.at_end() {
                                return Err(DocumentError::parse("unterminated comment", start));
                            }
                            if self.bytes[self.pos..].starts_with(b"*/") {
                                self.pos += 2;
                                break;
                            }
                            self.pos += 1;
                        }
                    }
                    _ => return Ok(()),
                },
                _ => return Ok(()),
            }
        }
    }

    fn enter(&mut self) -> DocumentResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        Ok(())
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn error(&self, message: impl Into<String>) -> DocumentError {
        DocumentError::parse(message, self.pos)
    }
}

/// Parse `text` into a tree with the span-tracking scanner.
///
/// Blank or comment-only text is an empty tree.
pub(crate) fn parse_tree(text: &str, dialect: Dialect) -> DocumentResult<Tree> {
    let Some(root) = Scanner::new(text, dialect).parse_document()? else {
        return Ok(Tree::new());
    };
    match root.to_value() {
        Value::Object(map) => Ok(map),
        _ => Err(DocumentError::parse("document root must be an object", root.start)),
    }
}

/// Source map of every leaf, in document order.
pub(crate) fn leaf_locations(text: &str, dialect: Dialect) -> DocumentResult<Vec<KeyLocation>> {
    let mut out = Vec::new();
    if let Some(root) = Scanner::new(text, dialect).parse_document()? {
        collect_leaves(&root, &mut Vec::new(), &mut out);
    }
    Ok(out)
}

fn collect_leaves(node: &Node, path: &mut Vec<String>, out: &mut Vec<KeyLocation>) {
    match &node.kind {
        NodeKind::Object(members) => {
            let last: HashMap<&str, usize> = members
                .iter()
                .enumerate()
                .map(|(i, m)| (m.key.as_str(), i))
                .collect();
            for (i, member) in members.iter().enumerate() {
                if last.get(member.key.as_str()) != Some(&i) {
                    continue;
                }
                path.push(member.key.clone());
                collect_leaves(&member.value, path, out);
                path.pop();
            }
        }
        NodeKind::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                path.push(i.to_string());
                collect_leaves(item, path, out);
                path.pop();
            }
        }
        _ if path.is_empty() => {}
        _ => {
            let (start, end, quoted) = node.leaf_span();
            out.push(KeyLocation {
                key: path.join("."),
                start,
                end,
                quoted,
            });
        }
    }
}

/// Locate one leaf without building the full source map.
pub(crate) fn seek_leaf(
    text: &str,
    segments: &[String],
    dialect: Dialect,
) -> DocumentResult<Option<KeyLocation>> {
    Ok(Scanner::new(text, dialect).seek(segments)?.map(|node| {
        let (start, end, quoted) = node.leaf_span();
        KeyLocation {
            key: segments.join("."),
            start,
            end,
            quoted,
        }
    }))
}
