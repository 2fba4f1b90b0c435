//! In-memory document tree.
//!
//! Nodes live in a flat arena owned by [`Document`]; every cross-node link
//! is a [`NodeId`] index, so the tree carries parent back-references
//! without ownership cycles. [`serialize`] reconstructs markup text from
//! the tree.

mod document;
mod node;
pub mod serialize;

pub use document::{Document, DOCUMENT_NODE};
pub use node::{
    AttributeDecl, ContentKind, ContentModel, EntityDecl, NodeData, NodeId, NodeKind,
    NotationDecl, QName, Quantifier,
};
pub use serialize::SerializeOptions;

/// Namespace URI bound to the reserved `xml` prefix.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Namespace URI bound to the reserved `xmlns` prefix.
pub const XMLNS_NS: &str = "http://www.w3.org/2000/xmlns/";

/// Escape character data for markup output.
///
/// `<` and `&` are always escaped; `"` only inside attribute values.
/// Single quotes and `>` pass through, matching the reconstruction format.
pub(crate) fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '&' => out.push_str("&amp;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
