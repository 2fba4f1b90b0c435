//! Event-to-tree builder.
//!
//! Consumes the tokenizer's event batches and grows a [`Document`] behind
//! a cursor. The cursor always points at the node receiving content:
//! the document node between top-level constructs, the open element inside
//! content, the CDATA section or DOCTYPE node while one is open.

use crate::dom::{Document, NodeId, NodeKind, QName, DOCUMENT_NODE, XML_NS};
use crate::error::{Error, Result};
use crate::parser::events::Event;
use crate::parser::tokenizer::Tokenizer;
use crate::parser::ParserOptions;

pub struct TreeBuilder {
    tokenizer: Tokenizer,
    doc: Document,
    /// The document was handed out or the parse failed; the builder is
    /// spent.
    spent: bool,
    cursor: NodeId,
    /// Namespace declarations waiting for the element that scopes them.
    pending_ns: Vec<(String, String)>,
    /// Open ATTLIST node for continuation: (element name, arena node).
    last_attlist: Option<(String, NodeId)>,
    /// Bases of external entities currently being inserted, each paired
    /// with the cursor the entity content is inserted under. Elements
    /// opened while the cursor is that node get an `xml:base` stamp.
    base_stack: Vec<(String, NodeId)>,
    /// First error raised while applying events; surfaced by `parse` in
    /// preference to a document.
    last_error: Option<Error>,
    xml_base: bool,
    has_reader: bool,
    destroyed: bool,
}

impl TreeBuilder {
    pub fn new(options: ParserOptions) -> Self {
        let xml_base = options.xml_base;
        let has_reader = options.entity_reader.is_some();
        TreeBuilder {
            tokenizer: Tokenizer::new(options),
            doc: Document::new(),
            spent: false,
            cursor: DOCUMENT_NODE,
            pending_ns: Vec::new(),
            last_attlist: None,
            base_stack: Vec::new(),
            last_error: None,
            xml_base,
            has_reader,
            destroyed: false,
        }
    }

    /// Feed a chunk through the tokenizer and apply its events.
    ///
    /// Returns the document on a successful final chunk. A deferred error
    /// recorded while applying events takes priority over any result.
    pub fn parse(&mut self, chunk: &str, is_final: bool) -> Result<Option<Document>> {
        if self.destroyed || self.spent {
            return Err(Error::InvalidState);
        }
        let events = match self.tokenizer.parse(chunk, is_final) {
            Ok(ev) => ev,
            Err(e) => {
                self.spent = true;
                return Err(e);
            }
        };
        for event in events {
            if self.last_error.is_some() {
                break;
            }
            if let Err(e) = self.apply(event) {
                self.last_error = Some(e);
            }
        }
        if let Some(e) = self.last_error.take() {
            self.spent = true;
            return Err(e);
        }
        if is_final {
            self.spent = true;
            if self.cursor != DOCUMENT_NODE {
                return Err(Error::StreamContract(
                    "input ended with an open construct".into(),
                ));
            }
            return Ok(Some(std::mem::take(&mut self.doc)));
        }
        Ok(None)
    }

    /// Tear down. Idempotent; later `parse` calls fail with
    /// `InvalidState`.
    pub fn destroy(&mut self) {
        self.destroyed = true;
        self.spent = true;
        self.tokenizer.destroy();
    }

    fn apply(&mut self, event: Event) -> Result<()> {
        // Any event other than an ATTLIST definition ends the open
        // ATTLIST continuation.
        if !matches!(event, Event::AttlistDecl { .. }) {
            self.last_attlist = None;
        }
        match event {
            Event::StartElement { name, attributes } => {
                let pending_ns = std::mem::take(&mut self.pending_ns);
                let base = match self.base_stack.last() {
                    Some((uri, scope)) if *scope == self.cursor => Some(uri.clone()),
                    _ => None,
                };
                let cursor = self.cursor;
                let doc = &mut self.doc;
                let el = doc.push(NodeKind::Element {
                    name,
                    attrs: Vec::new(),
                    ns_decls: Vec::new(),
                });
                for (prefix, uri) in pending_ns {
                    doc.add_namespace(el, &prefix, &uri);
                }
                for (qname, value) in attributes {
                    doc.set_attribute(el, qname, &value);
                }
                if self.xml_base {
                    if let Some(base) = base {
                        if self.doc.attribute(el, "base", Some(XML_NS)).is_none() {
                            self.doc.set_attribute(
                                el,
                                QName::new("base", Some(XML_NS.to_string()), Some("xml".into())),
                                &base,
                            );
                        }
                    }
                }
                self.doc.append(cursor, el);
                self.cursor = el;
            }
            Event::EndElement { name } => {
                let cursor = self.cursor;
                let matches = self
                    .doc
                    .element_name(cursor)
                    .map(|n| n.local == name.local && n.ns == name.ns)
                    .unwrap_or(false);
                if !matches {
                    return Err(Error::StreamContract(format!(
                        "end of element {} does not match the open node",
                        name.qualified()
                    )));
                }
                self.cursor = self.pop_cursor()?;
            }
            Event::StartNamespaceDecl { prefix, uri } => {
                self.pending_ns.push((prefix, uri));
            }
            Event::EndNamespaceDecl { .. } => {}
            Event::CharacterData { text } => {
                let cursor = self.cursor;
                self.doc.append_text(cursor, &text);
            }
            Event::Comment { text } => {
                let cursor = self.cursor;
                self.doc.append_kind(cursor, NodeKind::Comment { text });
            }
            Event::StartCdata => {
                let cursor = self.cursor;
                self.cursor = self.doc.append_kind(cursor, NodeKind::CdataSection);
            }
            Event::EndCdata => {
                let ok = matches!(
                    self.doc.node(self.cursor).kind,
                    NodeKind::CdataSection
                );
                if !ok {
                    return Err(Error::StreamContract(
                        "CDATA end without an open CDATA section".into(),
                    ));
                }
                self.cursor = self.pop_cursor()?;
            }
            Event::XmlDecl {
                version,
                encoding,
                standalone,
            } => {
                // Text declarations inside resolved entities are dropped.
                if self.cursor == DOCUMENT_NODE {
                    self.doc.append_kind(
                        DOCUMENT_NODE,
                        NodeKind::XmlDeclaration {
                            version,
                            encoding,
                            standalone,
                        },
                    );
                }
            }
            Event::ProcessingInstruction { target, data } => {
                let cursor = self.cursor;
                self.doc
                    .append_kind(cursor, NodeKind::ProcessingInstruction { target, data });
            }
            Event::StartDoctype {
                name,
                system_id,
                public_id,
                has_internal_subset,
            } => {
                // With an entity reader configured the system id has been
                // consumed by resolution and is not reproduced.
                let system_id = if self.has_reader { None } else { system_id };
                let cursor = self.cursor;
                self.cursor = self.doc.append_kind(
                    cursor,
                    NodeKind::DoctypeDecl {
                        name,
                        system_id,
                        public_id,
                        has_internal_subset,
                    },
                );
            }
            Event::EndDoctype => {
                let ok = matches!(
                    self.doc.node(self.cursor).kind,
                    NodeKind::DoctypeDecl { .. }
                );
                if !ok {
                    return Err(Error::StreamContract(
                        "DOCTYPE end without an open DOCTYPE".into(),
                    ));
                }
                self.cursor = self.pop_cursor()?;
            }
            Event::EntityDecl(decl) => {
                let cursor = self.cursor;
                self.doc.append_kind(cursor, NodeKind::EntityDecl(decl));
            }
            Event::NotationDecl(decl) => {
                let cursor = self.cursor;
                self.doc
                    .append_kind(cursor, NodeKind::NotationDecl(decl));
            }
            Event::ElementDecl { name, model } => {
                let cursor = self.cursor;
                self.doc
                    .append_kind(cursor, NodeKind::ElementDecl { name, model });
            }
            Event::AttlistDecl { element_name, decl } => {
                let list = match &self.last_attlist {
                    Some((name, node)) if *name == element_name => *node,
                    _ => {
                        let cursor = self.cursor;
                        let node = self.doc.append_kind(
                            cursor,
                            NodeKind::AttlistDecl {
                                element_name: element_name.clone(),
                            },
                        );
                        self.last_attlist = Some((element_name, node));
                        node
                    }
                };
                self.doc
                    .append_kind(list, NodeKind::AttributeDecl(decl));
            }
            Event::Verbatim { text } => {
                let cursor = self.cursor;
                self.doc.append_kind(cursor, NodeKind::EntityRef { text });
            }
            Event::SkippedEntity { name, is_parameter } => {
                let text = if is_parameter {
                    format!("%{};", name)
                } else {
                    format!("&{};", name)
                };
                let cursor = self.cursor;
                self.doc.append_kind(cursor, NodeKind::EntityRef { text });
            }
            Event::StartBase { base } => {
                let cursor = self.cursor;
                self.base_stack.push((base, cursor));
            }
            Event::EndBase { base } => {
                match self.base_stack.pop() {
                    Some((expected, _)) if expected == base => {}
                    Some((expected, _)) => {
                        return Err(Error::BaseMismatch {
                            expected,
                            actual: base,
                        });
                    }
                    None => {
                        return Err(Error::BaseMismatch {
                            expected: String::new(),
                            actual: base,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn pop_cursor(&mut self) -> Result<NodeId> {
        self.doc.parent(self.cursor).ok_or_else(|| {
            Error::StreamContract("cursor has no parent to return to".into())
        })
    }
}
