//! The event vocabulary emitted by the streaming tokenizer and consumed by
//! the tree builder.

use crate::dom::{AttributeDecl, ContentModel, EntityDecl, NotationDecl, QName};

/// One tokenizer event.
///
/// Events arrive in document order. Namespace declarations for an element
/// precede its `StartElement`; the matching end declarations follow its
/// `EndElement`, innermost first.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// An element opened. Attribute names are fully resolved triples;
    /// `xmlns` declarations are not in this list.
    StartElement {
        name: QName,
        attributes: Vec<(QName, String)>,
    },
    /// An element closed (explicitly or via `/>`).
    EndElement { name: QName },
    /// A namespace declaration came into scope. Empty prefix is the
    /// default namespace.
    StartNamespaceDecl { prefix: String, uri: String },
    /// A namespace declaration went out of scope.
    EndNamespaceDecl { prefix: String },
    /// Character data. May arrive in multiple consecutive events.
    CharacterData { text: String },
    /// A comment body (delimiters stripped).
    Comment { text: String },
    /// `<![CDATA[` seen; character data until `EndCdata` belongs to it.
    StartCdata,
    EndCdata,
    /// The XML declaration. `standalone` is `None` when absent.
    XmlDecl {
        version: String,
        encoding: Option<String>,
        standalone: Option<bool>,
    },
    /// A processing instruction.
    ProcessingInstruction { target: String, data: String },
    /// DOCTYPE header seen; declaration events until `EndDoctype` belong
    /// to the internal subset.
    StartDoctype {
        name: String,
        system_id: Option<String>,
        public_id: Option<String>,
        has_internal_subset: bool,
    },
    EndDoctype,
    /// An ENTITY declaration from the internal subset.
    EntityDecl(EntityDecl),
    /// A NOTATION declaration.
    NotationDecl(NotationDecl),
    /// An ELEMENT declaration with its content model.
    ElementDecl { name: String, model: ContentModel },
    /// One attribute definition from an ATTLIST declaration. A declaration
    /// with several definitions produces one event per definition, all
    /// carrying the same element name.
    AttlistDecl {
        element_name: String,
        decl: AttributeDecl,
    },
    /// Verbatim text for constructs deliberately left unexpanded
    /// (entity references when expansion is disabled).
    Verbatim { text: String },
    /// An entity reference that was neither expanded nor resolved.
    SkippedEntity { name: String, is_parameter: bool },
    /// Resolved external entity content follows; `base` is its base URI.
    StartBase { base: String },
    /// The external entity content bracketed by the matching `StartBase`
    /// ended.
    EndBase { base: String },
}
