//! Node model: the tagged variant set for every construct that can appear
//! in a parsed document, stored in the document's arena.

/// Compact node identifier (index into the owning document's arena).
pub type NodeId = u32;

/// A qualified name: local part plus optional namespace URI and prefix.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QName {
    /// Local part of the name.
    pub local: String,
    /// Namespace URI, if the name is in a namespace.
    pub ns: Option<String>,
    /// Declared prefix, if the source used one.
    pub prefix: Option<String>,
}

impl QName {
    /// A name with no namespace and no prefix.
    pub fn local(local: impl Into<String>) -> Self {
        QName {
            local: local.into(),
            ns: None,
            prefix: None,
        }
    }

    /// Full triple constructor.
    pub fn new(local: impl Into<String>, ns: Option<String>, prefix: Option<String>) -> Self {
        QName {
            local: local.into(),
            ns,
            prefix,
        }
    }

    /// The name as written in markup: `prefix:local` or bare `local`.
    pub fn qualified(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{}:{}", p, self.local),
            None => self.local.clone(),
        }
    }
}

/// Entity declaration payload (`<!ENTITY ...>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDecl {
    pub name: String,
    /// True for parameter entities (`<!ENTITY % name ...>`).
    pub is_parameter: bool,
    /// Replacement text for internal entities.
    pub value: Option<String>,
    /// Base URI in effect at the declaration, when base tracking is on.
    pub base: Option<String>,
    pub system_id: Option<String>,
    pub public_id: Option<String>,
    /// Notation name for unparsed entities (NDATA).
    pub notation_name: Option<String>,
}

/// Notation declaration payload (`<!NOTATION ...>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotationDecl {
    pub name: String,
    pub base: Option<String>,
    pub system_id: Option<String>,
    pub public_id: Option<String>,
}

/// One attribute definition inside an ATTLIST declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDecl {
    pub name: String,
    /// Attribute type text: `CDATA`, `ID`, `(yes|no)`, `NOTATION(a|b)`.
    pub att_type: String,
    /// Default value, if the definition carries one.
    pub default: Option<String>,
    /// True for #REQUIRED, and for #FIXED when a default is present.
    pub required: bool,
}

/// Content model kind for ELEMENT declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Empty,
    Any,
    Mixed,
    Name,
    Choice,
    Seq,
}

/// Repetition quantifier on a content model particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    None,
    Optional,
    Star,
    Plus,
}

impl Quantifier {
    /// The suffix character as written in a DTD, empty for `None`.
    #[inline]
    pub fn suffix(&self) -> &'static str {
        match self {
            Quantifier::None => "",
            Quantifier::Optional => "?",
            Quantifier::Star => "*",
            Quantifier::Plus => "+",
        }
    }
}

/// Recursive content model of an ELEMENT declaration.
///
/// Used only for reconstruction, never for validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentModel {
    pub kind: ContentKind,
    pub quant: Quantifier,
    /// Element name for `Name` particles.
    pub name: Option<String>,
    /// Sub-particles for `Mixed`, `Choice`, and `Seq`.
    pub children: Vec<ContentModel>,
}

impl ContentModel {
    /// Leaf particle: a bare element name with a quantifier.
    pub fn name(name: impl Into<String>, quant: Quantifier) -> Self {
        ContentModel {
            kind: ContentKind::Name,
            quant,
            name: Some(name.into()),
            children: Vec::new(),
        }
    }

    /// Particle with no name and no children (EMPTY / ANY / bare #PCDATA).
    pub fn simple(kind: ContentKind) -> Self {
        ContentModel {
            kind,
            quant: Quantifier::None,
            name: None,
            children: Vec::new(),
        }
    }

    /// Group particle (mixed, choice, or sequence).
    pub fn group(kind: ContentKind, quant: Quantifier, children: Vec<ContentModel>) -> Self {
        ContentModel {
            kind,
            quant,
            name: None,
            children,
        }
    }
}

/// The tagged variant carried by every arena node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Document root; always arena index 0.
    Document,
    /// Element with qualified name, attribute nodes, and namespace
    /// declaration nodes. Attributes and namespaces are arena nodes too,
    /// but live in these side lists, not in the main child sequence.
    Element {
        name: QName,
        attrs: Vec<NodeId>,
        ns_decls: Vec<NodeId>,
    },
    /// Attribute leaf: qualified name plus string value.
    Attribute { name: QName, value: String },
    /// Namespace declaration scoped to its element. An empty prefix is the
    /// default namespace.
    Namespace { prefix: String, uri: String },
    /// Raw unescaped character data. Escaping happens at serialization,
    /// unless the parent is a CDATA section.
    Text { text: String },
    /// Text-like node serialized verbatim, used to preserve `&name;` when
    /// entity expansion is suppressed.
    EntityRef { text: String },
    /// Comment.
    Comment { text: String },
    /// CDATA section; its character data lives in Text children.
    CdataSection,
    /// XML declaration. `standalone` is `None` when absent from the source.
    XmlDeclaration {
        version: String,
        encoding: Option<String>,
        standalone: Option<bool>,
    },
    /// Processing instruction.
    ProcessingInstruction { target: String, data: String },
    /// DOCTYPE declaration; internal-subset declarations are its children.
    DoctypeDecl {
        name: String,
        system_id: Option<String>,
        public_id: Option<String>,
        has_internal_subset: bool,
    },
    /// Entity declaration leaf.
    EntityDecl(EntityDecl),
    /// Notation declaration leaf.
    NotationDecl(NotationDecl),
    /// Element declaration with its recursive content model.
    ElementDecl { name: String, model: ContentModel },
    /// ATTLIST container; groups consecutive AttributeDecl children for one
    /// element name.
    AttlistDecl { element_name: String },
    /// One attribute definition inside an AttlistDecl.
    AttributeDecl(AttributeDecl),
}

/// An arena node: variant payload plus tree linkage.
///
/// The parent reference is navigation-only; ownership flows strictly from
/// the document's arena.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    /// Ordered child sequence; insertion order is document order.
    pub children: Vec<NodeId>,
}

impl NodeData {
    pub fn new(kind: NodeKind) -> Self {
        NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        }
    }

    /// The document node that seeds a fresh arena.
    pub fn document() -> Self {
        NodeData::new(NodeKind::Document)
    }

    #[inline]
    pub fn is_element(&self) -> bool {
        matches!(self.kind, NodeKind::Element { .. })
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self.kind, NodeKind::Text { .. })
    }

    #[inline]
    pub fn is_comment(&self) -> bool {
        matches!(self.kind, NodeKind::Comment { .. })
    }

    #[inline]
    pub fn is_attribute(&self) -> bool {
        matches!(self.kind, NodeKind::Attribute { .. })
    }

    /// Whether this variant may own a child sequence.
    #[inline]
    pub fn is_container(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Document
                | NodeKind::Element { .. }
                | NodeKind::CdataSection
                | NodeKind::DoctypeDecl { .. }
                | NodeKind::AttlistDecl { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_name() {
        let plain = QName::local("foo");
        assert_eq!(plain.qualified(), "foo");

        let prefixed = QName::new("bar", Some("urn:b".into()), Some("b".into()));
        assert_eq!(prefixed.qualified(), "b:bar");
    }

    #[test]
    fn test_container_variants() {
        assert!(NodeData::document().is_container());
        assert!(NodeData::new(NodeKind::CdataSection).is_container());
        assert!(!NodeData::new(NodeKind::Text { text: "x".into() }).is_container());
        assert!(!NodeData::new(NodeKind::Attribute {
            name: QName::local("a"),
            value: "v".into()
        })
        .is_container());
    }

    #[test]
    fn test_quantifier_suffix() {
        assert_eq!(Quantifier::None.suffix(), "");
        assert_eq!(Quantifier::Optional.suffix(), "?");
        assert_eq!(Quantifier::Star.suffix(), "*");
        assert_eq!(Quantifier::Plus.suffix(), "+");
    }
}
