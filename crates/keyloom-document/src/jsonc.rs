//! JSON with comments.

use crate::dump::KeyComparator;
use crate::error::DocumentResult;
use crate::json::JsonFamily;
use crate::model::{KeyLocation, KeyPath, PendingWrite, Tree};
use crate::syntax::Dialect;
use crate::{ParserOptions, StructuredParser};

/// Parser for `.jsonc` files.
#[derive(Debug, Clone)]
pub struct JsoncParser {
    inner: JsonFamily,
}

impl JsoncParser {
    pub fn new(options: ParserOptions) -> Self {
        Self {
            inner: JsonFamily {
                options,
                dialect: Dialect::TOLERANT,
                strict_first: false,
            },
        }
    }
}

impl Default for JsoncParser {
    fn default() -> Self {
        Self::new(ParserOptions::default())
    }
}

impl StructuredParser for JsoncParser {
    fn id(&self) -> &str {
        "jsonc"
    }

    fn extensions(&self) -> &[&'static str] {
        &["jsonc"]
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
