//! Chunked streaming XML tokenizer.
//!
//! Input arrives in arbitrarily split chunks through
//! [`Tokenizer::parse`]; an incomplete trailing construct is buffered
//! until the next chunk completes it. Each call returns the batch of
//! events the chunk produced.
//!
//! The tokenizer owns namespace resolution (names become QName triples
//! against the in-scope declaration stack), the DTD internal subset
//! (entity, notation, element, and attlist declarations, with recursive
//! content models), ATTLIST default application, entity expansion, and
//! external entity resolution through the caller's reader.

use std::collections::HashMap;
use std::mem;

use memchr::memchr2;

use crate::dom::{
    AttributeDecl, ContentKind, ContentModel, EntityDecl, NotationDecl, QName, Quantifier,
    XML_NS,
};
use crate::error::{Error, Result};
use crate::parser::events::Event;
use crate::parser::{EntityReader, ParserOptions};

/// Upper bound on nested entity expansion, against reference cycles.
const MAX_ENTITY_DEPTH: usize = 16;

/// A declared general entity.
enum GeneralEntity {
    Internal(String),
    External {
        system_id: String,
        public_id: Option<String>,
        /// NDATA entities are unparsed and never resolved.
        notation: Option<String>,
    },
}

/// Streaming tokenizer state.
pub struct Tokenizer {
    expand_internal: bool,
    reader: Option<EntityReader>,
    document_base: Option<String>,
    /// Bases of external entities currently being tokenized, innermost
    /// last.
    base_stack: Vec<String>,

    /// Unconsumed input.
    buf: String,
    /// Bytes consumed from the overall stream; error offsets build on it.
    consumed: usize,
    /// A carriage return ended the previous chunk; swallow one following
    /// line feed.
    pending_cr: bool,
    /// No construct consumed yet in the current source (document or
    /// spliced entity); an XML declaration is only legal here.
    source_start: bool,
    splice_depth: usize,

    events: Vec<Event>,
    /// One namespace frame per open element, in document order.
    ns_frames: Vec<Vec<(String, String)>>,
    /// Open elements: raw tag name plus resolved name.
    open: Vec<(String, QName)>,
    seen_root: bool,
    in_doctype: bool,

    entities: HashMap<String, GeneralEntity>,
    /// ATTLIST defaults: raw element name to (raw attribute name, value).
    defaults: HashMap<String, Vec<(String, String)>>,

    destroyed: bool,
    failed: bool,
}

/// Outcome of one consumption step.
enum Step {
    /// Consumed this many bytes of the buffer.
    Consumed(usize),
    /// The buffered construct is incomplete; wait for more input.
    NeedMore,
}

impl Tokenizer {
    pub fn new(options: ParserOptions) -> Self {
        Tokenizer {
            expand_internal: options.expand_internal_entities,
            reader: options.entity_reader,
            document_base: options.base,
            base_stack: Vec::new(),
            buf: String::new(),
            consumed: 0,
            pending_cr: false,
            source_start: true,
            splice_depth: 0,
            events: Vec::new(),
            ns_frames: Vec::new(),
            open: Vec::new(),
            seen_root: false,
            in_doctype: false,
            entities: HashMap::new(),
            defaults: HashMap::new(),
            destroyed: false,
            failed: false,
        }
    }

    /// Feed the next chunk and collect the events it completes.
    pub fn parse(&mut self, chunk: &str, is_final: bool) -> Result<Vec<Event>> {
        if self.destroyed {
            return Err(Error::InvalidState);
        }
        if self.failed {
            return Err(Error::StreamContract("parse after fatal error".into()));
        }
        self.feed(chunk);
        if let Err(e) = self.run(is_final) {
            self.failed = true;
            return Err(e);
        }
        if is_final {
            if let Err(e) = self.check_complete() {
                self.failed = true;
                return Err(e);
            }
        }
        Ok(mem::take(&mut self.events))
    }

    /// Tear down. Further `parse` calls fail with `InvalidState`.
    pub fn destroy(&mut self) {
        self.destroyed = true;
        self.buf.clear();
        self.events.clear();
    }

    /// Append a chunk, normalizing CR and CRLF to LF across the chunk
    /// boundary.
    fn feed(&mut self, chunk: &str) {
        self.buf.reserve(chunk.len());
        for c in chunk.chars() {
            if c == '\r' {
                self.buf.push('\n');
                self.pending_cr = true;
            } else {
                if !(self.pending_cr && c == '\n') {
                    self.buf.push(c);
                }
                self.pending_cr = false;
            }
        }
    }

    fn run(&mut self, is_final: bool) -> Result<()> {
        while !self.buf.is_empty() {
            match self.step()? {
                Step::Consumed(n) => {
                    self.buf.drain(..n);
                    self.consumed += n;
                    self.source_start = false;
                }
                Step::NeedMore => {
                    if is_final {
                        return Err(Error::parse(
                            "unexpected end of input",
                            self.consumed + self.buf.len(),
                        ));
                    }
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    fn check_complete(&self) -> Result<()> {
        if self.in_doctype {
            return Err(Error::parse("unterminated DOCTYPE", self.consumed));
        }
        if let Some((raw, _)) = self.open.last() {
            return Err(Error::parse(
                format!("unclosed element <{}>", raw),
                self.consumed,
            ));
        }
        if !self.seen_root {
            return Err(Error::parse("no root element", self.consumed));
        }
        Ok(())
    }

    fn err(&self, message: impl Into<String>) -> Error {
        Error::parse(message, self.consumed)
    }

    fn current_base(&self) -> Option<String> {
        self.base_stack
            .last()
            .cloned()
            .or_else(|| self.document_base.clone())
    }

    fn step(&mut self) -> Result<Step> {
        if self.in_doctype {
            return self.step_subset();
        }
        if self.buf.as_bytes()[0] == b'<' {
            self.step_markup()
        } else {
            self.step_text()
        }
    }

    // ---- character data ----------------------------------------------

    fn step_text(&mut self) -> Result<Step> {
        let bytes = self.buf.as_bytes();
        let stop = memchr2(b'<', b'&', bytes);
        let end = stop.unwrap_or(bytes.len());
        if end > 0 {
            let text = self.buf[..end].to_string();
            self.emit_text(&text)?;
            return Ok(Step::Consumed(end));
        }
        // A reference at position 0 (`<` at 0 is handled by the caller).
        self.step_reference()
    }

    fn emit_text(&mut self, text: &str) -> Result<()> {
        if self.open.is_empty() && self.splice_depth == 0 {
            // Prolog/epilog whitespace is dropped.
            if text.chars().all(|c| c.is_whitespace()) {
                return Ok(());
            }
            return Err(self.err("character data outside root element"));
        }
        self.events.push(Event::CharacterData {
            text: text.to_string(),
        });
        Ok(())
    }

    fn step_reference(&mut self) -> Result<Step> {
        let semi = match self.buf.find(';') {
            Some(i) => i,
            None => return Ok(Step::NeedMore),
        };
        let name = self.buf[1..semi].to_string();
        if self.open.is_empty() && self.splice_depth == 0 {
            return Err(self.err("entity reference outside root element"));
        }
        let total = semi + 1;
        if let Some(rest) = name.strip_prefix('#') {
            let c = self.decode_char_ref(rest)?;
            self.events.push(Event::CharacterData { text: c.to_string() });
            return Ok(Step::Consumed(total));
        }
        if let Some(text) = predefined_entity(&name) {
            self.events.push(Event::CharacterData { text: text.to_string() });
            return Ok(Step::Consumed(total));
        }
        enum Found {
            Internal(String),
            Unparsed,
            External(String, Option<String>),
        }
        let found = match self.entities.get(&name) {
            Some(GeneralEntity::Internal(value)) => Found::Internal(value.clone()),
            Some(GeneralEntity::External { notation: Some(_), .. }) => Found::Unparsed,
            Some(GeneralEntity::External {
                system_id,
                public_id,
                ..
            }) => Found::External(system_id.clone(), public_id.clone()),
            None => return Err(self.err(format!("undefined entity &{};", name))),
        };
        match found {
            Found::Internal(value) => {
                if self.expand_internal {
                    let expanded = self.expand_entity_text(&value, 1)?;
                    self.events.push(Event::CharacterData { text: expanded });
                } else {
                    self.events.push(Event::Verbatim {
                        text: format!("&{};", name),
                    });
                }
            }
            // Unparsed (NDATA) entities are never resolved.
            Found::Unparsed => {
                self.events.push(Event::SkippedEntity {
                    name,
                    is_parameter: false,
                });
            }
            Found::External(system_id, public_id) => {
                self.resolve_external(&name, &system_id, public_id.as_deref())?;
            }
        }
        Ok(Step::Consumed(total))
    }

    fn decode_char_ref(&self, body: &str) -> Result<char> {
        let code = if let Some(hex) = body.strip_prefix('x').or_else(|| body.strip_prefix('X')) {
            u32::from_str_radix(hex, 16).ok()
        } else {
            body.parse::<u32>().ok()
        };
        code.and_then(char::from_u32)
            .ok_or_else(|| self.err(format!("bad character reference &#{};", body)))
    }

    /// Expand character references, predefined entities, and declared
    /// internal entities inside replacement or attribute text.
    fn expand_entity_text(&self, text: &str, depth: usize) -> Result<String> {
        if depth > MAX_ENTITY_DEPTH {
            return Err(self.err("entity expansion too deep"));
        }
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(amp) = rest.find('&') {
            out.push_str(&rest[..amp]);
            let after = &rest[amp + 1..];
            let semi = after
                .find(';')
                .ok_or_else(|| self.err("unterminated entity reference"))?;
            let name = &after[..semi];
            if let Some(body) = name.strip_prefix('#') {
                out.push(self.decode_char_ref(body)?);
            } else if let Some(t) = predefined_entity(name) {
                out.push_str(t);
            } else {
                match self.entities.get(name) {
                    Some(GeneralEntity::Internal(value)) => {
                        out.push_str(&self.expand_entity_text(value, depth + 1)?);
                    }
                    Some(GeneralEntity::External { .. }) => {
                        return Err(
                            self.err(format!("external entity &{}; in attribute or entity value", name))
                        );
                    }
                    None => return Err(self.err(format!("undefined entity &{};", name))),
                }
            }
            rest = &after[semi + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    // ---- external entity resolution ----------------------------------

    fn resolve_external(
        &mut self,
        name: &str,
        system_id: &str,
        public_id: Option<&str>,
    ) -> Result<()> {
        if self.splice_depth >= MAX_ENTITY_DEPTH {
            return Err(self.err(format!("external entity &{}; nests too deeply", name)));
        }
        let base = self.current_base();
        let resolved = match self.reader.as_mut() {
            Some(read) => read(base.as_deref(), system_id, public_id)?,
            None => {
                // No reader configured: surface the reference as skipped.
                self.events.push(Event::SkippedEntity {
                    name: name.to_string(),
                    is_parameter: false,
                });
                return Ok(());
            }
        };
        let entity_base = resolved
            .base
            .clone()
            .unwrap_or_else(|| system_id.to_string());
        self.events.push(Event::StartBase {
            base: entity_base.clone(),
        });
        self.base_stack.push(entity_base.clone());
        let result = self.run_spliced(resolved.data);
        self.base_stack.pop();
        self.events.push(Event::EndBase { base: entity_base });
        result
    }

    /// Tokenize resolved entity content inline, then restore the main
    /// buffer.
    fn run_spliced(&mut self, data: String) -> Result<()> {
        let saved_buf = mem::replace(&mut self.buf, data);
        let saved_start = self.source_start;
        self.source_start = true;
        self.splice_depth += 1;
        let result = (|| {
            while !self.buf.is_empty() {
                match self.step()? {
                    Step::Consumed(n) => {
                        self.buf.drain(..n);
                        self.source_start = false;
                    }
                    Step::NeedMore => {
                        return Err(self.err("unexpected end of external entity"));
                    }
                }
            }
            Ok(())
        })();
        self.splice_depth -= 1;
        self.source_start = saved_start;
        self.buf = saved_buf;
        result
    }

    // ---- markup ------------------------------------------------------

    fn step_markup(&mut self) -> Result<Step> {
        let bytes = self.buf.as_bytes();
        if bytes.len() < 2 {
            return Ok(Step::NeedMore);
        }
        match bytes[1] {
            b'/' => self.step_end_tag(),
            b'!' => self.step_bang(),
            b'?' => self.step_pi(),
            _ => self.step_start_tag(),
        }
    }

    fn step_end_tag(&mut self) -> Result<Step> {
        let gt = match self.buf.find('>') {
            Some(i) => i,
            None => return Ok(Step::NeedMore),
        };
        let name = self.buf[2..gt].trim().to_string();
        let (raw, qname) = match self.open.last() {
            Some(top) => top.clone(),
            None => return Err(self.err(format!("unexpected closing tag </{}>", name))),
        };
        if raw != name {
            return Err(self.err(format!("mismatched tag: expected </{}>, got </{}>", raw, name)));
        }
        self.open.pop();
        let frame = self.ns_frames.pop().unwrap_or_default();
        self.events.push(Event::EndElement { name: qname });
        for (prefix, _) in frame.into_iter().rev() {
            self.events.push(Event::EndNamespaceDecl { prefix });
        }
        Ok(Step::Consumed(gt + 1))
    }

    fn step_bang(&mut self) -> Result<Step> {
        if self.buf.starts_with("<!--") {
            let end = match self.buf.find("-->") {
                Some(i) => i,
                None => return Ok(Step::NeedMore),
            };
            let text = self.buf[4..end].to_string();
            self.events.push(Event::Comment { text });
            return Ok(Step::Consumed(end + 3));
        }
        if self.buf.starts_with("<![CDATA[") {
            if self.open.is_empty() && self.splice_depth == 0 {
                return Err(self.err("CDATA section outside root element"));
            }
            let end = match self.buf.find("]]>") {
                Some(i) => i,
                None => return Ok(Step::NeedMore),
            };
            let text = self.buf[9..end].to_string();
            self.events.push(Event::StartCdata);
            self.events.push(Event::CharacterData { text });
            self.events.push(Event::EndCdata);
            return Ok(Step::Consumed(end + 3));
        }
        if self.buf.starts_with("<!DOCTYPE") {
            return self.step_doctype();
        }
        // A prefix of a longer marker: wait for more input.
        for marker in ["<!--", "<![CDATA[", "<!DOCTYPE"] {
            if self.buf.len() < marker.len() && marker.starts_with(self.buf.as_str()) {
                return Ok(Step::NeedMore);
            }
        }
        Err(self.err("unrecognized markup declaration"))
    }

    fn step_doctype(&mut self) -> Result<Step> {
        // Scan for either the subset opener or the closing angle bracket,
        // honoring quoted identifiers.
        let bytes = self.buf.as_bytes();
        let mut quote: Option<u8> = None;
        let mut stop = None;
        for (i, &b) in bytes.iter().enumerate().skip(9) {
            match quote {
                Some(q) => {
                    if b == q {
                        quote = None;
                    }
                }
                None => match b {
                    b'"' | b'\'' => quote = Some(b),
                    b'[' | b'>' => {
                        stop = Some((i, b));
                        break;
                    }
                    _ => {}
                },
            }
        }
        let (at, which) = match stop {
            Some(s) => s,
            None => return Ok(Step::NeedMore),
        };
        let header = self.buf[9..at].to_string();
        let (name, public_id, system_id) = self.parse_doctype_header(&header)?;
        let has_internal_subset = which == b'[';
        self.events.push(Event::StartDoctype {
            name,
            system_id,
            public_id,
            has_internal_subset,
        });
        if has_internal_subset {
            self.in_doctype = true;
        } else {
            self.events.push(Event::EndDoctype);
        }
        Ok(Step::Consumed(at + 1))
    }

    fn parse_doctype_header(
        &self,
        header: &str,
    ) -> Result<(String, Option<String>, Option<String>)> {
        let mut cur = Cursor::new(header);
        cur.skip_ws();
        let name = cur.read_name();
        if name.is_empty() {
            return Err(self.err("DOCTYPE without a name"));
        }
        cur.skip_ws();
        let mut public_id = None;
        let mut system_id = None;
        match cur.read_name().as_str() {
            "PUBLIC" => {
                cur.skip_ws();
                public_id = Some(cur.read_quoted().ok_or_else(|| self.err("bad PUBLIC id"))?);
                cur.skip_ws();
                system_id = cur.read_quoted();
            }
            "SYSTEM" => {
                cur.skip_ws();
                system_id = Some(cur.read_quoted().ok_or_else(|| self.err("bad SYSTEM id"))?);
            }
            "" => {}
            other => return Err(self.err(format!("unexpected {:?} in DOCTYPE", other))),
        }
        Ok((name, public_id, system_id))
    }

    fn step_pi(&mut self) -> Result<Step> {
        let end = match self.buf.find("?>") {
            Some(i) => i,
            None => return Ok(Step::NeedMore),
        };
        let body = self.buf[2..end].to_string();
        let (target, data) = match body.find(|c: char| c.is_whitespace()) {
            Some(i) => (body[..i].to_string(), body[i + 1..].trim_start().to_string()),
            None => (body.clone(), String::new()),
        };
        if target == "xml" {
            if !self.source_start {
                return Err(self.err("XML declaration not at start of input"));
            }
            let decl = self.parse_xml_decl(&data)?;
            self.events.push(decl);
        } else {
            self.events.push(Event::ProcessingInstruction { target, data });
        }
        Ok(Step::Consumed(end + 2))
    }

    fn parse_xml_decl(&self, data: &str) -> Result<Event> {
        let mut version = None;
        let mut encoding = None;
        let mut standalone = None;
        let mut cur = Cursor::new(data);
        loop {
            cur.skip_ws();
            let key = cur.read_name();
            if key.is_empty() {
                break;
            }
            cur.skip_ws();
            if !cur.eat('=') {
                return Err(self.err("malformed XML declaration"));
            }
            cur.skip_ws();
            let value = cur
                .read_quoted()
                .ok_or_else(|| self.err("malformed XML declaration"))?;
            match key.as_str() {
                "version" => version = Some(value),
                "encoding" => encoding = Some(value),
                "standalone" => standalone = Some(value == "yes"),
                other => {
                    return Err(self.err(format!("unexpected {:?} in XML declaration", other)))
                }
            }
        }
        Ok(Event::XmlDecl {
            version: version.ok_or_else(|| self.err("XML declaration without version"))?,
            encoding,
            standalone,
        })
    }

    // ---- start tags --------------------------------------------------

    fn step_start_tag(&mut self) -> Result<Step> {
        let gt = match scan_to_gt(self.buf.as_bytes(), 1) {
            Some(i) => i,
            None => return Ok(Step::NeedMore),
        };
        if self.seen_root && self.open.is_empty() && self.splice_depth == 0 {
            return Err(self.err("content after root element"));
        }
        let mut body = &self.buf[1..gt];
        let self_closing = body.ends_with('/');
        if self_closing {
            body = &body[..body.len() - 1];
        }
        let body = body.to_string();
        let (raw_name, mut raw_attrs) = self.parse_tag_body(&body)?;

        // ATTLIST defaults for attributes the tag does not carry.
        if let Some(defaults) = self.defaults.get(&raw_name) {
            for (dname, dval) in defaults.clone() {
                if !raw_attrs.iter().any(|(n, _)| *n == dname) {
                    raw_attrs.push((dname, dval));
                }
            }
        }

        // Split off namespace declarations into this element's frame.
        let mut frame: Vec<(String, String)> = Vec::new();
        let mut plain: Vec<(String, String)> = Vec::new();
        for (name, value) in raw_attrs {
            if name == "xmlns" {
                frame.push((String::new(), value));
            } else if let Some(p) = name.strip_prefix("xmlns:") {
                frame.push((p.to_string(), value));
            } else {
                plain.push((name, value));
            }
        }
        self.ns_frames.push(frame.clone());
        for (prefix, uri) in &frame {
            self.events.push(Event::StartNamespaceDecl {
                prefix: prefix.clone(),
                uri: uri.clone(),
            });
        }

        let name = self.resolve_name(&raw_name, true)?;
        let mut attributes = Vec::with_capacity(plain.len());
        for (raw, value) in plain {
            attributes.push((self.resolve_name(&raw, false)?, value));
        }

        self.seen_root = true;
        self.events.push(Event::StartElement {
            name: name.clone(),
            attributes,
        });
        if self_closing {
            self.events.push(Event::EndElement { name });
            let frame = self.ns_frames.pop().unwrap_or_default();
            for (prefix, _) in frame.into_iter().rev() {
                self.events.push(Event::EndNamespaceDecl { prefix });
            }
        } else {
            self.open.push((raw_name, name));
        }
        Ok(Step::Consumed(gt + 1))
    }

    fn parse_tag_body(&self, body: &str) -> Result<(String, Vec<(String, String)>)> {
        let mut cur = Cursor::new(body);
        let name = cur.read_name();
        if name.is_empty() {
            return Err(self.err("element tag without a name"));
        }
        let mut attrs: Vec<(String, String)> = Vec::new();
        loop {
            cur.skip_ws();
            let attr = cur.read_name();
            if attr.is_empty() {
                if !cur.at_end() {
                    return Err(self.err(format!("malformed tag <{}>", name)));
                }
                break;
            }
            cur.skip_ws();
            if !cur.eat('=') {
                return Err(self.err(format!("attribute {} without a value", attr)));
            }
            cur.skip_ws();
            let raw = cur
                .read_quoted()
                .ok_or_else(|| self.err(format!("unquoted value for attribute {}", attr)))?;
            if attrs.iter().any(|(n, _)| *n == attr) {
                return Err(self.err(format!("duplicate attribute {}", attr)));
            }
            // Attribute-value normalization, then reference expansion.
            let normalized: String = raw
                .chars()
                .map(|c| if c == '\n' || c == '\t' { ' ' } else { c })
                .collect();
            let value = self.expand_entity_text(&normalized, 1)?;
            attrs.push((attr, value));
        }
        Ok((name, attrs))
    }

    /// Resolve a raw name into a (local, namespace, prefix) triple against
    /// the in-scope declarations. Unprefixed attributes take no namespace.
    fn resolve_name(&self, raw: &str, is_element: bool) -> Result<QName> {
        match raw.split_once(':') {
            Some((prefix, local)) => {
                let uri = self
                    .lookup_prefix(prefix)
                    .ok_or_else(|| self.err(format!("unbound namespace prefix {}", prefix)))?;
                Ok(QName::new(local, Some(uri), Some(prefix.to_string())))
            }
            None => {
                if is_element {
                    Ok(QName::new(raw, self.lookup_prefix(""), None))
                } else {
                    Ok(QName::local(raw))
                }
            }
        }
    }

    fn lookup_prefix(&self, prefix: &str) -> Option<String> {
        if prefix == "xml" {
            return Some(XML_NS.to_string());
        }
        for frame in self.ns_frames.iter().rev() {
            for (p, uri) in frame.iter().rev() {
                if p == prefix {
                    if uri.is_empty() {
                        // An empty URI un-declares the prefix.
                        return None;
                    }
                    return Some(uri.clone());
                }
            }
        }
        None
    }

    // ---- DOCTYPE internal subset -------------------------------------

    fn step_subset(&mut self) -> Result<Step> {
        let bytes = self.buf.as_bytes();
        if bytes[0].is_ascii_whitespace() {
            let n = bytes
                .iter()
                .take_while(|b| b.is_ascii_whitespace())
                .count();
            return Ok(Step::Consumed(n));
        }
        if bytes[0] == b']' {
            // Expect optional whitespace then the closing bracket.
            for (i, &b) in bytes.iter().enumerate().skip(1) {
                if b == b'>' {
                    self.in_doctype = false;
                    self.events.push(Event::EndDoctype);
                    return Ok(Step::Consumed(i + 1));
                }
                if !b.is_ascii_whitespace() {
                    return Err(self.err("junk after internal subset"));
                }
            }
            return Ok(Step::NeedMore);
        }
        if bytes[0] == b'%' {
            let semi = match self.buf.find(';') {
                Some(i) => i,
                None => return Ok(Step::NeedMore),
            };
            let name = self.buf[1..semi].to_string();
            self.events.push(Event::SkippedEntity {
                name,
                is_parameter: true,
            });
            return Ok(Step::Consumed(semi + 1));
        }
        if self.buf.starts_with("<!--") {
            let end = match self.buf.find("-->") {
                Some(i) => i,
                None => return Ok(Step::NeedMore),
            };
            let text = self.buf[4..end].to_string();
            self.events.push(Event::Comment { text });
            return Ok(Step::Consumed(end + 3));
        }
        if self.buf.starts_with("<?") {
            return self.step_pi();
        }
        for (marker, handler) in [
            ("<!ENTITY", Tokenizer::handle_entity_decl as fn(&mut Tokenizer, &str) -> Result<()>),
            ("<!NOTATION", Tokenizer::handle_notation_decl),
            ("<!ELEMENT", Tokenizer::handle_element_decl),
            ("<!ATTLIST", Tokenizer::handle_attlist_decl),
        ] {
            if self.buf.starts_with(marker) {
                let gt = match scan_to_gt(self.buf.as_bytes(), marker.len()) {
                    Some(i) => i,
                    None => return Ok(Step::NeedMore),
                };
                let body = self.buf[marker.len()..gt].to_string();
                handler(self, &body)?;
                return Ok(Step::Consumed(gt + 1));
            }
        }
        // Maybe a prefix of one of the markers.
        for marker in ["<!ENTITY", "<!NOTATION", "<!ELEMENT", "<!ATTLIST", "<!--", "<?"] {
            if self.buf.len() < marker.len() && marker.as_bytes().starts_with(self.buf.as_bytes())
            {
                return Ok(Step::NeedMore);
            }
        }
        Err(self.err("unrecognized declaration in internal subset"))
    }

    fn handle_entity_decl(&mut self, body: &str) -> Result<()> {
        let mut cur = Cursor::new(body);
        cur.skip_ws();
        let is_parameter = cur.eat('%');
        if is_parameter {
            cur.skip_ws();
        }
        let name = cur.read_name();
        if name.is_empty() {
            return Err(self.err("ENTITY declaration without a name"));
        }
        cur.skip_ws();
        let mut value = None;
        let mut system_id = None;
        let mut public_id = None;
        let mut notation_name = None;
        if let Some(v) = cur.read_quoted() {
            value = Some(v);
        } else {
            match cur.read_name().as_str() {
                "SYSTEM" => {
                    cur.skip_ws();
                    system_id =
                        Some(cur.read_quoted().ok_or_else(|| self.err("bad SYSTEM id"))?);
                }
                "PUBLIC" => {
                    cur.skip_ws();
                    public_id =
                        Some(cur.read_quoted().ok_or_else(|| self.err("bad PUBLIC id"))?);
                    cur.skip_ws();
                    system_id = cur.read_quoted();
                }
                other => {
                    return Err(self.err(format!("unexpected {:?} in ENTITY declaration", other)))
                }
            }
            cur.skip_ws();
            if cur.read_name() == "NDATA" {
                cur.skip_ws();
                let n = cur.read_name();
                if n.is_empty() {
                    return Err(self.err("NDATA without a notation name"));
                }
                notation_name = Some(n);
            }
        }
        if !is_parameter {
            // First declaration wins.
            self.entities.entry(name.clone()).or_insert_with(|| {
                if let Some(v) = &value {
                    GeneralEntity::Internal(v.clone())
                } else {
                    GeneralEntity::External {
                        system_id: system_id.clone().unwrap_or_default(),
                        public_id: public_id.clone(),
                        notation: notation_name.clone(),
                    }
                }
            });
        }
        self.events.push(Event::EntityDecl(EntityDecl {
            name,
            is_parameter,
            value,
            base: self.current_base(),
            system_id,
            public_id,
            notation_name,
        }));
        Ok(())
    }

    fn handle_notation_decl(&mut self, body: &str) -> Result<()> {
        let mut cur = Cursor::new(body);
        cur.skip_ws();
        let name = cur.read_name();
        if name.is_empty() {
            return Err(self.err("NOTATION declaration without a name"));
        }
        cur.skip_ws();
        let mut public_id = None;
        let mut system_id = None;
        match cur.read_name().as_str() {
            "PUBLIC" => {
                cur.skip_ws();
                public_id = Some(cur.read_quoted().ok_or_else(|| self.err("bad PUBLIC id"))?);
                cur.skip_ws();
                system_id = cur.read_quoted();
            }
            "SYSTEM" => {
                cur.skip_ws();
                system_id = Some(cur.read_quoted().ok_or_else(|| self.err("bad SYSTEM id"))?);
            }
            other => {
                return Err(self.err(format!("unexpected {:?} in NOTATION declaration", other)))
            }
        }
        self.events.push(Event::NotationDecl(NotationDecl {
            name,
            base: self.current_base(),
            system_id,
            public_id,
        }));
        Ok(())
    }

    fn handle_element_decl(&mut self, body: &str) -> Result<()> {
        let mut cur = Cursor::new(body);
        cur.skip_ws();
        let name = cur.read_name();
        if name.is_empty() {
            return Err(self.err("ELEMENT declaration without a name"));
        }
        cur.skip_ws();
        let model = self.parse_content_model(&mut cur)?;
        self.events.push(Event::ElementDecl { name, model });
        Ok(())
    }

    fn parse_content_model(&self, cur: &mut Cursor) -> Result<ContentModel> {
        cur.skip_ws();
        if cur.eat_str("EMPTY") {
            return Ok(ContentModel::simple(ContentKind::Empty));
        }
        if cur.eat_str("ANY") {
            return Ok(ContentModel::simple(ContentKind::Any));
        }
        if !cur.eat('(') {
            return Err(self.err("bad content model"));
        }
        cur.skip_ws();
        if cur.eat_str("#PCDATA") {
            let mut names = Vec::new();
            loop {
                cur.skip_ws();
                if cur.eat(')') {
                    break;
                }
                if !cur.eat('|') {
                    return Err(self.err("bad mixed content model"));
                }
                cur.skip_ws();
                let n = cur.read_name();
                if n.is_empty() {
                    return Err(self.err("bad mixed content model"));
                }
                names.push(ContentModel::name(n, Quantifier::None));
            }
            let quant = self.read_quantifier(cur);
            return Ok(ContentModel {
                kind: ContentKind::Mixed,
                quant,
                name: None,
                children: names,
            });
        }
        // Children group: particles separated uniformly by `|` or `,`.
        let mut children = Vec::new();
        let mut kind = ContentKind::Seq;
        loop {
            cur.skip_ws();
            let particle = if cur.peek() == Some('(') {
                self.parse_content_model(cur)?
            } else {
                let n = cur.read_name();
                if n.is_empty() {
                    return Err(self.err("bad content model particle"));
                }
                ContentModel::name(n, self.read_quantifier(cur))
            };
            children.push(particle);
            cur.skip_ws();
            if cur.eat(')') {
                break;
            }
            if cur.eat('|') {
                kind = ContentKind::Choice;
            } else if cur.eat(',') {
                kind = ContentKind::Seq;
            } else {
                return Err(self.err("bad content model separator"));
            }
        }
        let quant = self.read_quantifier(cur);
        Ok(ContentModel::group(kind, quant, children))
    }

    fn read_quantifier(&self, cur: &mut Cursor) -> Quantifier {
        if cur.eat('?') {
            Quantifier::Optional
        } else if cur.eat('*') {
            Quantifier::Star
        } else if cur.eat('+') {
            Quantifier::Plus
        } else {
            Quantifier::None
        }
    }

    fn handle_attlist_decl(&mut self, body: &str) -> Result<()> {
        let mut cur = Cursor::new(body);
        cur.skip_ws();
        let element_name = cur.read_name();
        if element_name.is_empty() {
            return Err(self.err("ATTLIST declaration without an element name"));
        }
        loop {
            cur.skip_ws();
            if cur.at_end() {
                break;
            }
            let name = cur.read_name();
            if name.is_empty() {
                return Err(self.err("bad ATTLIST attribute name"));
            }
            cur.skip_ws();
            let att_type = self.parse_att_type(&mut cur)?;
            cur.skip_ws();
            let mut default = None;
            let mut required = false;
            if cur.eat('#') {
                match cur.read_name().as_str() {
                    "REQUIRED" => required = true,
                    "IMPLIED" => {}
                    "FIXED" => {
                        required = true;
                        cur.skip_ws();
                        default = Some(
                            cur.read_quoted()
                                .ok_or_else(|| self.err("#FIXED without a value"))?,
                        );
                    }
                    other => {
                        return Err(self.err(format!("unexpected #{} in ATTLIST", other)))
                    }
                }
            } else {
                default = Some(
                    cur.read_quoted()
                        .ok_or_else(|| self.err("bad ATTLIST default value"))?,
                );
            }
            if let Some(v) = &default {
                self.defaults
                    .entry(element_name.clone())
                    .or_default()
                    .push((name.clone(), v.clone()));
            }
            self.events.push(Event::AttlistDecl {
                element_name: element_name.clone(),
                decl: AttributeDecl {
                    name,
                    att_type,
                    default,
                    required,
                },
            });
        }
        Ok(())
    }

    fn parse_att_type(&self, cur: &mut Cursor) -> Result<String> {
        if cur.peek() == Some('(') {
            return self.read_enumeration(cur);
        }
        let word = cur.read_name();
        if word.is_empty() {
            return Err(self.err("bad ATTLIST attribute type"));
        }
        if word == "NOTATION" {
            cur.skip_ws();
            let group = self.read_enumeration(cur)?;
            return Ok(format!("NOTATION {}", group));
        }
        Ok(word)
    }

    /// Read `(a|b|c)`, normalized to no interior whitespace.
    fn read_enumeration(&self, cur: &mut Cursor) -> Result<String> {
        if !cur.eat('(') {
            return Err(self.err("bad enumeration in ATTLIST"));
        }
        let mut names = Vec::new();
        loop {
            cur.skip_ws();
            let n = cur.read_name();
            if n.is_empty() {
                return Err(self.err("bad enumeration in ATTLIST"));
            }
            names.push(n);
            cur.skip_ws();
            if cur.eat(')') {
                break;
            }
            if !cur.eat('|') {
                return Err(self.err("bad enumeration in ATTLIST"));
            }
        }
        Ok(format!("({})", names.join("|")))
    }
}

/// Find the `>` that closes a tag or declaration, honoring quoted values.
fn scan_to_gt(bytes: &[u8], from: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, &b) in bytes.iter().enumerate().skip(from) {
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'>' => return Some(i),
                _ => {}
            },
        }
    }
    None
}

fn predefined_entity(name: &str) -> Option<&'static str> {
    match name {
        "amp" => Some("&"),
        "lt" => Some("<"),
        "gt" => Some(">"),
        "apos" => Some("'"),
        "quot" => Some("\""),
        _ => None,
    }
}

/// Tiny character cursor for declaration bodies.
struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Cursor { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn eat_str(&mut self, s: &str) -> bool {
        if self.rest().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    /// Read a run of name characters (possibly empty).
    fn read_name(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':') {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        self.text[start..self.pos].to_string()
    }

    /// Read a quoted literal, or `None` when the cursor is not at a quote.
    fn read_quoted(&mut self) -> Option<String> {
        let q = self.peek()?;
        if q != '"' && q != '\'' {
            return None;
        }
        self.pos += 1;
        let rest = self.rest();
        let end = rest.find(q)?;
        let value = rest[..end].to_string();
        self.pos += end + 1;
        Some(value)
    }
}
