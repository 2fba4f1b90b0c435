//! Parse-then-serialize coverage: documents come back out as the text
//! that went in, DTD internal subsets included.

use dompath::{DomParser, Error, NodeKind, ParserOptions, ResolvedEntity, DOCUMENT_NODE};
use pretty_assertions::assert_eq;

#[test]
fn test_attributes() {
    let doc = DomParser::parse_full("<f a=\"b\" g:h=\"i\" xmlns:g=\"urn:g\"/>").unwrap();
    let root = doc.root().unwrap();
    assert_eq!(doc.attribute(root, "a", None), Some("b"));
    assert_eq!(doc.attribute(root, "h", Some("urn:g")), Some("i"));
    assert_eq!(doc.attribute(root, "moo", None), None);
}

#[test]
fn test_namespace_decls() {
    let doc = DomParser::parse_full("<f xmlns=\"urn:f\" xmlns:g=\"urn:g\"/>").unwrap();
    let root = doc.root().unwrap();
    let decls: Vec<(String, String)> = doc
        .ns_decls(root)
        .iter()
        .map(|&id| match &doc.node(id).kind {
            NodeKind::Namespace { prefix, uri } => (prefix.clone(), uri.clone()),
            other => panic!("not a namespace node: {:?}", other),
        })
        .collect();
    assert_eq!(
        decls,
        vec![
            ("".to_string(), "urn:f".to_string()),
            ("g".to_string(), "urn:g".to_string())
        ]
    );
}

#[test]
fn test_character_data() {
    let doc = DomParser::parse_full("<f>goo</f>").unwrap();
    let root = doc.root().unwrap();
    assert_eq!(doc.children(root).len(), 1);
    assert!(doc.node(doc.children(root)[0]).is_text());
    assert_eq!(doc.text_of(root), "goo");
}

#[test]
fn test_comment() {
    let doc = DomParser::parse_full("<f><!--goo&--></f>").unwrap();
    let root = doc.root().unwrap();
    assert_eq!(doc.children(root).len(), 1);
    match &doc.node(doc.children(root)[0]).kind {
        NodeKind::Comment { text } => assert_eq!(text, "goo&"),
        other => panic!("not a comment: {:?}", other),
    }
}

#[test]
fn test_cdata() {
    let doc = DomParser::parse_full("<f><![CDATA[goo&]]></f>").unwrap();
    let root = doc.root().unwrap();
    assert_eq!(doc.children(root).len(), 1);
    let cdata = doc.children(root)[0];
    assert!(matches!(doc.node(cdata).kind, NodeKind::CdataSection));
    assert_eq!(doc.text_of(cdata), "goo&");
    assert_eq!(doc.node_xml(root).unwrap(), "<f><![CDATA[goo&]]></f>");
}

#[test]
fn test_xml_decl() {
    let doc = DomParser::parse_full("<?xml version=\"1.0\" standalone=\"no\" ?><f/>").unwrap();
    let children = doc.children(DOCUMENT_NODE);
    assert_eq!(children.len(), 2);
    match &doc.node(children[0]).kind {
        NodeKind::XmlDeclaration {
            version,
            encoding,
            standalone,
        } => {
            assert_eq!(version, "1.0");
            assert_eq!(encoding, &None);
            assert_eq!(standalone, &Some(false));
        }
        other => panic!("not an xml declaration: {:?}", other),
    }
}

#[test]
fn test_processing_instruction() {
    let doc =
        DomParser::parse_full("<?xml-stylesheet href=\"mystyle.css\" type=\"text/css\"?><f/>")
            .unwrap();
    let children = doc.children(DOCUMENT_NODE);
    assert_eq!(children.len(), 2);
    match &doc.node(children[0]).kind {
        NodeKind::ProcessingInstruction { target, data } => {
            assert_eq!(target, "xml-stylesheet");
            assert_eq!(data, "href=\"mystyle.css\" type=\"text/css\"");
        }
        other => panic!("not a processing instruction: {:?}", other),
    }
}

#[test]
fn test_dtd_round_trip() {
    let txt = r#"<?xml version="1.0"?>
<!DOCTYPE foo [
  <!ENTITY js "EcmaScript">
  <!ENTITY short "">
  <!ENTITY logo SYSTEM "images/logo.gif" NDATA gif>
  <!ENTITY % lists "ul | ol">
  <!NOTATION jpeg PUBLIC "JPG 1.0">
  <!ELEMENT foo (bar+)>
  <!ELEMENT bar (#PCDATA)>
  <!ELEMENT empty EMPTY>
  <!ELEMENT any ANY>
  <!ELEMENT parent (empty)>
  <!ELEMENT fruit (apple+|orange?)>
  <!ELEMENT fruits (apple,orange)>
  <!ATTLIST fruit fruitID ID #REQUIRED>
  <!ATTLIST foo
    publisher CDATA #IMPLIED
    reseller CDATA #FIXED "MyStore"
    ISBN ID #REQUIRED
    inPrint (yes|no) "yes">
  <!NOTATION vrml PUBLIC "VRML 1.0">
  <!ATTLIST apple lang NOTATION (vrml) #REQUIRED>
]>
<foo/>"#;
    let doc = DomParser::parse_full(txt).unwrap();
    // Declared attribute defaults land on the reconstructed element.
    let expected = txt.replace("<foo/>", "<foo reseller=\"MyStore\" inPrint=\"yes\"/>");
    assert_eq!(doc.xml().unwrap(), expected);
}

#[test]
fn test_namespaces_round_trip() {
    let txt = r#"<?xml version="1.0" encoding="utf-8" standalone="no"?>
<?xml-stylesheet href="mystyle.css" type="text/css"?>
<foo xmlns="urn:foo" xmlns:b="urn:bar" b:boo="bo">
  <bar a="&quot;'">&amp;&lt;>'</bar>
  <b:bar><![CDATA[&<>'"]]></b:bar>
  <!--&<>'"-->
</foo>"#;
    let doc = DomParser::parse_full(txt).unwrap();
    assert_eq!(doc.xml().unwrap(), txt);

    let root = doc.root().unwrap();
    let bar = doc.element(root, "bar", None).unwrap();
    let name = doc.element_name(bar).unwrap();
    assert_eq!(name.local, "bar");
    assert_eq!(name.ns.as_deref(), Some("urn:foo"));
    assert_eq!(doc.attribute(bar, "moo", None), None);
    assert!(doc.element(root, "bar", Some("urn:bar")).is_some());
    assert!(doc.element(root, "barb", Some("urn:bar")).is_none());

    assert_eq!(doc.element_children(root).len(), 2);
    assert_eq!(doc.elements(root, Some("bar"), Some("urn:foo")).len(), 1);
    assert_eq!(doc.elements(root, Some("bar"), Some("urn:bar")).len(), 1);
}

#[test]
fn test_entity_expansion_toggle() {
    let txt = "<!DOCTYPE f [\n  <!ENTITY js \"EcmaScript\">\n]>\n<f>&js;</f>";

    let doc = DomParser::parse_full(txt).unwrap();
    assert_eq!(doc.text_of(doc.root().unwrap()), "EcmaScript");

    let options = ParserOptions {
        expand_internal_entities: false,
        ..ParserOptions::default()
    };
    let doc = DomParser::parse_full_with(txt, options).unwrap();
    let root = doc.root().unwrap();
    assert!(matches!(
        doc.node(doc.children(root)[0]).kind,
        NodeKind::EntityRef { .. }
    ));
    assert_eq!(doc.node_xml(root).unwrap(), "<f>&js;</f>");
}

#[test]
fn test_external_entity_reader() {
    let txt = "<!DOCTYPE book [\n  <!ENTITY chap1 SYSTEM \"chap1.xml\">\n]>\n<book>&chap1;</book>";
    let options = ParserOptions {
        entity_reader: Some(Box::new(|_base, system_id, _public_id| {
            assert_eq!(system_id, "chap1.xml");
            Ok(ResolvedEntity {
                base: None,
                data: "<p>one</p>".to_string(),
            })
        })),
        ..ParserOptions::default()
    };
    let doc = DomParser::parse_full_with(txt, options).unwrap();
    let root = doc.root().unwrap();
    assert!(doc.element(root, "p", None).is_some());
    assert_eq!(doc.text_of(root), "one");
}

#[test]
fn test_unresolved_external_entity_is_skipped() {
    let txt = "<!DOCTYPE book [\n  <!ENTITY chap1 SYSTEM \"chap1.xml\">\n]>\n<book>&chap1;</book>";
    let doc = DomParser::parse_full(txt).unwrap();
    let root = doc.root().unwrap();
    match &doc.node(doc.children(root)[0]).kind {
        NodeKind::EntityRef { text } => assert_eq!(text, "&chap1;"),
        other => panic!("not an entity reference: {:?}", other),
    }
}

#[test]
fn test_chunked_parse_matches_whole() {
    let txt = "<?xml version=\"1.0\"?>\n<foo a=\"b\"><bar>one &amp; two</bar><!--c--></foo>";
    let whole = DomParser::parse_full(txt).unwrap();

    for split in [1, 10, 25, 40, txt.len() - 1] {
        let mut p = DomParser::new();
        assert!(p.parse(&txt[..split], false).unwrap().is_none());
        let doc = p.parse(&txt[split..], true).unwrap().unwrap();
        assert_eq!(doc.xml().unwrap(), whole.xml().unwrap());
    }
}

#[test]
fn test_partial_yields_no_document() {
    let mut p = DomParser::new();
    assert!(p.parse("<foo", false).unwrap().is_none());
}

#[test]
fn test_parser_is_single_use() {
    let mut p = DomParser::new();
    p.parse("<f/>", true).unwrap();
    assert!(matches!(p.parse("<g/>", true), Err(Error::InvalidState)));

    let mut p = DomParser::new();
    p.destroy();
    p.destroy();
    assert!(matches!(p.parse("<f/>", true), Err(Error::InvalidState)));
}
