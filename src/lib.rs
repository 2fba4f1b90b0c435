//! Streaming XML DOM builder with a small XPath-like query engine.
//!
//! Feed chunks to a [`DomParser`] and get back a [`Document`]: a flat
//! arena of nodes covering elements, attributes, namespaces, character
//! data, CDATA, comments, processing instructions, and the DTD internal
//! subset. The tree serializes back to markup text, and
//! [`Document::query`] runs compiled query patterns over it.
//!
//! ```
//! use dompath::DomParser;
//!
//! let doc = DomParser::parse_full("<foo><bar loo=\"nod\">No Never</bar></foo>")?;
//! let hits = doc.query("/foo/bar/@loo/text()")?;
//! assert_eq!(hits[0].as_str(), Some("nod"));
//! # Ok::<(), dompath::Error>(())
//! ```

pub mod dom;
pub mod error;
pub mod parser;
pub mod xpath;

pub use dom::{Document, NodeId, NodeKind, QName, SerializeOptions, DOCUMENT_NODE};
pub use error::{Error, Result};
pub use parser::{DomParser, ParserOptions, ResolvedEntity};
pub use xpath::{Value, XPath};
