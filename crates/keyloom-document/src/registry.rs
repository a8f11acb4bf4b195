//! Parser registry.

use crate::{BoxedParser, JsonParser, JsoncParser, ParserOptions};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Parsers keyed by id, selected by file extension.
pub struct ParserRegistry {
    parsers: HashMap<String, BoxedParser>,
}

impl ParserRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Create a registry with the JSON-family parsers.
    pub fn with_builtins(options: ParserOptions) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(JsonParser::new(options.clone())));
        registry.register(Arc::new(JsoncParser::new(options)));
        registry
    }

    /// Register a parser, replacing any parser with the same id.
    pub fn register(&mut self, parser: BoxedParser) {
        self.parsers.insert(parser.id().to_string(), parser);
    }

    /// Get a parser by id.
    pub fn get(&self, id: &str) -> Option<&BoxedParser> {
        self.parsers.get(id)
    }

    /// Find the parser handling `ext` (case-insensitive, leading dot optional).
    pub fn for_extension(&self, ext: &str) -> Option<&BoxedParser> {
        self.parsers.values().find(|parser| parser.supports(ext))
    }

    /// Find the parser for a file by its extension.
    pub fn for_path(&self, path: &Path) -> Option<&BoxedParser> {
        let ext = path.extension()?.to_str()?;
        self.for_extension(ext)
    }

    /// List all parser ids, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.parsers.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_builtins(ParserOptions::default())
    }
}
