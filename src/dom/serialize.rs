//! Markup reconstruction.
//!
//! Walks a subtree and rebuilds its textual form: escaped character data,
//! verbatim CDATA and entity references, indented DTD internal subsets,
//! and the HTML void-element mode.

use crate::dom::node::{AttributeDecl, ContentKind, ContentModel, NodeId, NodeKind};
use crate::dom::{escape, Document};
use crate::error::{Error, Result};

/// Element names that never take a closing tag in HTML mode.
const HTML_VOID: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Serialization options.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerializeOptions {
    /// Strip embedded newlines (and their trailing indentation) from text.
    pub compressed: bool,
}

/// Reconstruct the markup text of `id` and its subtree.
pub fn serialize(doc: &Document, id: NodeId, options: &SerializeOptions) -> Result<String> {
    let mut out = String::new();
    write_node(doc, id, options, &mut out)?;
    Ok(out)
}

fn write_children(
    doc: &Document,
    id: NodeId,
    options: &SerializeOptions,
    out: &mut String,
) -> Result<()> {
    for &c in doc.children(id) {
        write_node(doc, c, options, out)?;
    }
    Ok(())
}

fn write_node(doc: &Document, id: NodeId, options: &SerializeOptions, out: &mut String) -> Result<()> {
    match &doc.node(id).kind {
        NodeKind::Document => write_children(doc, id, options, out),
        NodeKind::Element { name, attrs, ns_decls } => {
            let qualified = name.qualified();
            out.push('<');
            out.push_str(&qualified);
            for &n in ns_decls {
                if let NodeKind::Namespace { prefix, uri } = &doc.node(n).kind {
                    if prefix.is_empty() {
                        out.push_str(&format!(" xmlns=\"{}\"", escape(uri, true)));
                    } else {
                        out.push_str(&format!(" xmlns:{}=\"{}\"", prefix, escape(uri, true)));
                    }
                }
            }
            for &a in attrs {
                if let NodeKind::Attribute { name, value } = &doc.node(a).kind {
                    if doc.is_html() && value.is_empty() {
                        out.push(' ');
                        out.push_str(&name.qualified());
                    } else {
                        out.push_str(&format!(
                            " {}=\"{}\"",
                            name.qualified(),
                            escape(value, true)
                        ));
                    }
                }
            }
            if doc.is_html() && HTML_VOID.contains(&qualified.as_str()) {
                if !doc.children(id).is_empty() {
                    return Err(Error::Structural(format!(
                        "HTML void element <{}> has children",
                        qualified
                    )));
                }
                out.push('>');
            } else if doc.children(id).is_empty() && !doc.is_html() {
                out.push_str("/>");
            } else {
                out.push('>');
                write_children(doc, id, options, out)?;
                out.push_str(&format!("</{}>", qualified));
            }
            Ok(())
        }
        NodeKind::Attribute { name, value } => {
            out.push_str(&format!("{}=\"{}\"", name.qualified(), escape(value, true)));
            Ok(())
        }
        NodeKind::Namespace { prefix, uri } => {
            if prefix.is_empty() {
                out.push_str(&format!("xmlns=\"{}\"", escape(uri, true)));
            } else {
                out.push_str(&format!("xmlns:{}=\"{}\"", prefix, escape(uri, true)));
            }
            Ok(())
        }
        NodeKind::Text { text } => {
            let in_cdata = doc
                .parent(id)
                .map(|p| matches!(doc.node(p).kind, NodeKind::CdataSection))
                .unwrap_or(false);
            let text = if options.compressed {
                compress(text)
            } else {
                text.clone()
            };
            if in_cdata {
                out.push_str(&text);
            } else {
                out.push_str(&escape(&text, false));
            }
            Ok(())
        }
        NodeKind::EntityRef { text } => {
            out.push_str(text);
            Ok(())
        }
        NodeKind::Comment { text } => {
            out.push_str(&format!("<!--{}-->", text));
            Ok(())
        }
        NodeKind::CdataSection => {
            out.push_str("<![CDATA[");
            write_children(doc, id, options, out)?;
            out.push_str("]]>");
            Ok(())
        }
        NodeKind::XmlDeclaration {
            version,
            encoding,
            standalone,
        } => {
            out.push_str(&format!("<?xml version=\"{}\"", version));
            if let Some(enc) = encoding {
                if !enc.is_empty() {
                    out.push_str(&format!(" encoding=\"{}\"", enc));
                }
            }
            // Only an explicit standalone="no" survives reconstruction.
            if *standalone == Some(false) {
                out.push_str(" standalone=\"no\"");
            }
            out.push_str("?>\n");
            Ok(())
        }
        NodeKind::ProcessingInstruction { target, data } => {
            if data.is_empty() {
                out.push_str(&format!("<?{}?>\n", target));
            } else {
                out.push_str(&format!("<?{} {}?>\n", target, data));
            }
            Ok(())
        }
        NodeKind::DoctypeDecl {
            name,
            system_id,
            public_id,
            ..
        } => {
            out.push_str(&format!("<!DOCTYPE {}", name));
            match (public_id, system_id) {
                (Some(p), Some(s)) => out.push_str(&format!(" PUBLIC \"{}\" \"{}\"", p, s)),
                (Some(p), None) => out.push_str(&format!(" PUBLIC \"{}\"", p)),
                (None, Some(s)) => out.push_str(&format!(" SYSTEM \"{}\"", s)),
                (None, None) => {}
            }
            if !doc.children(id).is_empty() {
                out.push_str(" [");
                write_children(doc, id, options, out)?;
                out.push_str("\n]");
            }
            out.push_str(">\n");
            Ok(())
        }
        NodeKind::EntityDecl(e) => {
            out.push_str("\n  <!ENTITY ");
            if e.is_parameter {
                out.push_str("% ");
            }
            out.push_str(&e.name);
            if let Some(v) = &e.value {
                out.push_str(&format!(" \"{}\"", v));
            } else {
                match (&e.public_id, &e.system_id) {
                    (Some(p), Some(s)) => out.push_str(&format!(" PUBLIC \"{}\" \"{}\"", p, s)),
                    (Some(p), None) => out.push_str(&format!(" PUBLIC \"{}\"", p)),
                    (None, Some(s)) => out.push_str(&format!(" SYSTEM \"{}\"", s)),
                    (None, None) => {}
                }
                if let Some(n) = &e.notation_name {
                    out.push_str(&format!(" NDATA {}", n));
                }
            }
            out.push('>');
            Ok(())
        }
        NodeKind::NotationDecl(n) => {
            out.push_str(&format!("\n  <!NOTATION {}", n.name));
            match (&n.public_id, &n.system_id) {
                (Some(p), Some(s)) => out.push_str(&format!(" PUBLIC \"{}\" \"{}\"", p, s)),
                (Some(p), None) => out.push_str(&format!(" PUBLIC \"{}\"", p)),
                (None, Some(s)) => out.push_str(&format!(" SYSTEM \"{}\"", s)),
                (None, None) => {}
            }
            out.push('>');
            Ok(())
        }
        NodeKind::ElementDecl { name, model } => {
            out.push_str(&format!("\n  <!ELEMENT {} {}>", name, model_text(model)));
            Ok(())
        }
        NodeKind::AttlistDecl { element_name } => {
            out.push_str(&format!("\n  <!ATTLIST {}", element_name));
            let children = doc.children(id);
            if children.len() == 1 {
                if let NodeKind::AttributeDecl(d) = &doc.node(children[0]).kind {
                    out.push(' ');
                    out.push_str(&attribute_decl_text(d));
                }
            } else {
                for &c in children {
                    if let NodeKind::AttributeDecl(d) = &doc.node(c).kind {
                        out.push_str("\n    ");
                        out.push_str(&attribute_decl_text(d));
                    }
                }
            }
            out.push('>');
            Ok(())
        }
        NodeKind::AttributeDecl(d) => {
            out.push_str(&attribute_decl_text(d));
            Ok(())
        }
    }
}

fn attribute_decl_text(d: &AttributeDecl) -> String {
    let mut out = format!("{} {}", d.name, d.att_type);
    match &d.default {
        Some(v) => {
            if d.required {
                out.push_str(" #FIXED");
            }
            out.push_str(&format!(" \"{}\"", v));
        }
        None => {
            if d.required {
                out.push_str(" #REQUIRED");
            } else {
                out.push_str(" #IMPLIED");
            }
        }
    }
    out
}

/// Render a content model in declaration syntax.
fn model_text(m: &ContentModel) -> String {
    match m.kind {
        ContentKind::Empty => "EMPTY".to_string(),
        ContentKind::Any => "ANY".to_string(),
        ContentKind::Name => {
            format!("{}{}", m.name.as_deref().unwrap_or(""), m.quant.suffix())
        }
        ContentKind::Mixed => {
            if m.children.is_empty() {
                "(#PCDATA)".to_string()
            } else {
                let names: Vec<String> = m.children.iter().map(model_text).collect();
                format!("(#PCDATA|{}){}", names.join("|"), m.quant.suffix())
            }
        }
        ContentKind::Choice | ContentKind::Seq => {
            let sep = if m.kind == ContentKind::Choice { "|" } else { "," };
            let parts: Vec<String> = m.children.iter().map(model_text).collect();
            format!("({}){}", parts.join(sep), m.quant.suffix())
        }
    }
}

/// Drop embedded newlines together with the indentation that follows them.
fn compress(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\n' || c == '\r' {
            while matches!(chars.peek(), Some(' ') | Some('\t')) {
                chars.next();
            }
        } else {
            out.push(c);
        }
    }
    out
}
