//! JSON parser.

use crate::dump::{dump_tree, KeyComparator};
use crate::edit::apply_all;
use crate::error::DocumentResult;
use crate::model::{KeyLocation, KeyPath, PendingWrite, Tree};
use crate::syntax::{leaf_locations, parse_tree, seek_leaf, Dialect};
use crate::{ParserOptions, StructuredParser};
use tracing::debug;

/// Behaviour shared by the JSON-family parsers.
#[derive(Debug, Clone)]
pub(crate) struct JsonFamily {
    pub options: ParserOptions,
    pub dialect: Dialect,
    /// Try a strict JSON parse before scanning with `dialect`.
    pub strict_first: bool,
}

impl JsonFamily {
    pub fn parse(&self, text: &str) -> DocumentResult<Tree> {
        if self.strict_first {
            match serde_json::from_str::<Tree>(text) {
                Ok(tree) => return Ok(tree),
                Err(e) => debug!(error = %e, "Not strict JSON, scanning with extensions"),
            }
        }
        parse_tree(text, self.dialect)
    }

    pub fn dump(
        &self,
        tree: &Tree,
        sort: bool,
        comparator: Option<&KeyComparator>,
    ) -> DocumentResult<String> {
        dump_tree(tree, sort, comparator, &self.options)
    }

    pub fn parse_ast(&self, text: &str) -> DocumentResult<Vec<KeyLocation>> {
        leaf_locations(text, self.dialect)
    }

    pub fn locate(&self, text: &str, keypath: &KeyPath) -> DocumentResult<Option<KeyLocation>> {
        seek_leaf(text, keypath.segments(), self.dialect)
    }

    pub fn apply_edits(&self, text: &str, writes: &[PendingWrite]) -> DocumentResult<String> {
        apply_all(text, writes, self.dialect, &self.options)
    }
}

/// Parser for `.json` files.
///
/// Text is parsed as strict JSON first. When that fails it is scanned again
/// with comments and trailing commas allowed, which are common in
/// hand-edited locale files, and a scan error is what gets reported.
#[derive(Debug, Clone)]
pub struct JsonParser {
    inner: JsonFamily,
}

impl JsonParser {
    pub fn new(options: ParserOptions) -> Self {
        Self {
            inner: JsonFamily {
                options,
                dialect: Dialect::TOLERANT,
                strict_first: true,
            },
        }
    }
}

impl Default for JsonParser {
    fn default() -> Self {
        Self::new(ParserOptions::default())
    }
}

impl StructuredParser for JsonParser {
    fn id(&self) -> &str {
        "json"
    }

    fn extensions(&self) -> &[&'static str] {
        &["json"]
    }

    fn parse(&self, text: &str) -> DocumentResult<Tree> {
        self.inner.parse(text)
    }

    fn dump(
        &self,
        tree: &Tree,
        sort: bool,
        comparator: Option<&KeyComparator>,
    ) -> DocumentResult<String> {
        self.inner.dump(tree, sort, comparator)
    }

    fn parse_ast(&self, text: &str) -> DocumentResult<Vec<KeyLocation>> {
        self.inner.parse_ast(text)
    }

    fn locate(&self, text: &str, keypath: &KeyPath) -> DocumentResult<Option<KeyLocation>> {
        self.inner.locate(text, keypath)
    }

    fn supports_incremental_edit(&self) -> bool {
        true
    }

    fn apply_edits(&self, text: &str, writes: &[PendingWrite]) -> DocumentResult<String> {
        self.inner.apply_edits(text, writes)
    }
}
