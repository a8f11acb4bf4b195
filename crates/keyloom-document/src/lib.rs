//! Key-path addressed structured documents for keyloom.
//!
//! This crate turns JSON-family text into an ordered [`Tree`], maps every leaf
//! to its byte span in the source, and applies batches of key-path writes back
//! into the text without disturbing unrelated formatting.
//!
//! Formats plug in through the [`StructuredParser`] trait and are selected by
//! file extension through a [`ParserRegistry`].

pub mod dump;
mod edit;
pub mod error;
pub mod json;
pub mod jsonc;
pub mod model;
pub mod registry;
pub mod syntax;

pub use dump::KeyComparator;
pub use error::{DocumentError, DocumentResult};
pub use json::JsonParser;
pub use jsonc::JsoncParser;
pub use model::{
    get_path, merge_writes, set_path, KeyLocation, KeyPath, KeyStyle, PendingWrite, Scalar, Tree,
};
pub use registry::ParserRegistry;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Indentation used when a parser has to produce new text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserOptions {
    /// Spaces per level when `tab` is false.
    pub indent: usize,
    /// Indent with one tab per level.
    pub tab: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            indent: 2,
            tab: false,
        }
    }
}

impl ParserOptions {
    /// Whitespace for `level` levels of nesting.
    pub fn indentation(&self, level: usize) -> String {
        if self.tab {
            "\t".repeat(level)
        } else {
            " ".repeat(self.indent * level)
        }
    }
}

/// A format that converts between text and [`Tree`].
///
/// `parse` and `dump` are required. Source maps and incremental edits are
/// optional capabilities; callers check [`supports_incremental_edit`] before
/// relying on [`apply_edits`].
///
/// [`supports_incremental_edit`]: StructuredParser::supports_incremental_edit
/// [`apply_edits`]: StructuredParser::apply_edits
pub trait StructuredParser: Send + Sync {
    /// Stable identifier, e.g. `json`.
    fn id(&self) -> &str;

    /// File extensions handled, lowercase and without the leading dot.
    fn extensions(&self) -> &[&'static str];

    fn supports(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.').to_lowercase();
        self.extensions().iter().any(|e| *e == ext)
    }

    /// Parse text. Blank text yields an empty tree.
    fn parse(&self, text: &str) -> DocumentResult<Tree>;

    /// Serialize a tree, ending with a newline.
    fn dump(
        &self,
        tree: &Tree,
        sort: bool,
        comparator: Option<&KeyComparator>,
    ) -> DocumentResult<String>;

    /// Span of every leaf value, in document order.
    fn parse_ast(&self, _text: &str) -> DocumentResult<Vec<KeyLocation>> {
        Err(DocumentError::unsupported(self.id(), "source maps"))
    }

    /// Span of the leaf at `keypath`, if present.
    fn locate(&self, text: &str, keypath: &KeyPath) -> DocumentResult<Option<KeyLocation>> {
        let key = keypath.to_string();
        Ok(self.parse_ast(text)?.into_iter().find(|l| l.key == key))
    }

    /// Parse `keypath` with `style` and locate it.
    fn navigate_to_key(
        &self,
        text: &str,
        keypath: &str,
        style: KeyStyle,
    ) -> DocumentResult<Option<KeyLocation>> {
        let path = KeyPath::parse(keypath, style)?;
        let mut location = self.locate(text, &path)?;
        if let Some(location) = location.as_mut() {
            location.key = keypath.to_string();
        }
        Ok(location)
    }

    fn supports_incremental_edit(&self) -> bool {
        false
    }

    /// Apply a batch of writes to `text`, preserving untouched bytes.
    ///
    /// The batch is all-or-nothing: on error no text is returned.
    fn apply_edits(&self, _text: &str, _writes: &[PendingWrite]) -> DocumentResult<String> {
        Err(DocumentError::unsupported(self.id(), "incremental edits"))
    }
}

/// A shared parser handle.
pub type BoxedParser = Arc<dyn StructuredParser>;
