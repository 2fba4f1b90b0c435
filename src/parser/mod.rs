//! Streaming parse pipeline: tokenizer events feeding the tree builder.
//!
//! [`DomParser`] is the front door. Push chunks with
//! [`DomParser::parse`]; the document is returned once the final chunk
//! completes. [`DomParser::parse_full`] covers the one-shot case.

mod builder;
pub mod events;
pub mod tokenizer;

pub use builder::TreeBuilder;
pub use events::Event;
pub use tokenizer::Tokenizer;

use crate::dom::Document;
use crate::error::Result;

/// Content handed back by an entity reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntity {
    /// Base URI for relative references inside the entity, if known.
    pub base: Option<String>,
    /// The entity's replacement text, parsed inline.
    pub data: String,
}

/// Caller-supplied resolver for external general entities:
/// `(base, system_id, public_id) -> ResolvedEntity`.
pub type EntityReader =
    Box<dyn FnMut(Option<&str>, &str, Option<&str>) -> Result<ResolvedEntity>>;

/// Parser configuration.
pub struct ParserOptions {
    /// Expand declared internal entities into character data. When false
    /// their references survive as verbatim entity-reference nodes.
    pub expand_internal_entities: bool,
    /// Base URI of the document being parsed.
    pub base: Option<String>,
    /// Track base URIs and stamp `xml:base` on elements created inside
    /// resolved external entities.
    pub xml_base: bool,
    /// Resolver for external general entities. Without one, external
    /// references surface as skipped entities.
    pub entity_reader: Option<EntityReader>,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            expand_internal_entities: true,
            base: None,
            xml_base: false,
            entity_reader: None,
        }
    }
}

/// Push parser producing a [`Document`].
pub struct DomParser {
    builder: TreeBuilder,
}

impl Default for DomParser {
    fn default() -> Self {
        DomParser::new()
    }
}

impl DomParser {
    pub fn new() -> Self {
        DomParser::with_options(ParserOptions::default())
    }

    pub fn with_options(options: ParserOptions) -> Self {
        DomParser {
            builder: TreeBuilder::new(options),
        }
    }

    /// Feed the next chunk. Returns the finished document when `is_final`
    /// is true and the input was well formed, `None` for non-final chunks.
    ///
    /// After a final chunk or a [`destroy`](Self::destroy), further calls
    /// fail with `InvalidState`.
    pub fn parse(&mut self, chunk: &str, is_final: bool) -> Result<Option<Document>> {
        self.builder.parse(chunk, is_final)
    }

    /// Tear the parser down. Idempotent.
    pub fn destroy(&mut self) {
        self.builder.destroy();
    }

    /// Parse a complete document in one call with default options.
    pub fn parse_full(text: &str) -> Result<Document> {
        Self::parse_full_with(text, ParserOptions::default())
    }

    /// Parse a complete document in one call.
    pub fn parse_full_with(text: &str, options: ParserOptions) -> Result<Document> {
        let mut parser = DomParser::with_options(options);
        let result = parser.parse(text, true);
        parser.destroy();
        match result? {
            Some(doc) => Ok(doc),
            None => Err(crate::error::Error::StreamContract(
                "final parse produced no document".into(),
            )),
        }
    }
}
