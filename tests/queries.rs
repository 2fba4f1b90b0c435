//! Query engine coverage over a fixed sample document.

use dompath::{DomParser, Document, Error, Value, XPath, DOCUMENT_NODE};

const SAMPLE: &str = "<foo>
  <bar loo='nod'>No Never</bar>
  <bar loo='bod' load='heavy'><doo first='yes'/></bar>
  <too toad='sprocket' xmlns:c='urn:c' c:too='oot'/>
  <bar/>
  <dar>
    <doo>Done</doo>
    <dod>Dope</dod>
  </dar>
  <dar>
    <doo>Nope</doo>
  </dar>
  <dar>
    <dod>Doze</dod>
  </dar>
  <bar loo=\"skip\">baz</bar>
  <deep><yes><no>huh</no></yes></deep>
  <daz/>
</foo>";

fn sample() -> Document {
    DomParser::parse_full(SAMPLE).unwrap()
}

fn xml_of(doc: &Document, value: &Value) -> String {
    doc.node_xml(value.node().unwrap()).unwrap()
}

fn strings(values: &[Value]) -> Vec<&str> {
    values.iter().map(|v| v.as_str().unwrap()).collect()
}

#[test]
fn test_positional_index() {
    let doc = sample();
    let hits = doc.query("/foo/bar[2]").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(
        xml_of(&doc, &hits[0]),
        "<bar loo=\"bod\" load=\"heavy\"><doo first=\"yes\"/></bar>"
    );
}

#[test]
fn test_first_and_missing() {
    let doc = sample();
    let first = doc.query_first("/foo/bar").unwrap().unwrap();
    assert_eq!(xml_of(&doc, &first), "<bar loo=\"nod\">No Never</bar>");
    assert_eq!(doc.query_first("/foo/bort").unwrap(), None);
    assert_eq!(doc.query_first("/boo").unwrap(), None);
}

#[test]
fn test_attribute_text() {
    let doc = sample();
    assert_eq!(
        doc.query_first("too/@toad/text()").unwrap(),
        Some(Value::Str("sprocket".into()))
    );
    assert_eq!(
        strings(&doc.query("/foo/bar/@loo/text()").unwrap()),
        ["nod", "bod", "skip"]
    );
}

#[test]
fn test_name_step_after_attribute() {
    let doc = sample();
    // A name test on an attribute matches only the attribute itself.
    assert_eq!(doc.query_first("/foo/bar/@loo/lo").unwrap(), None);
    assert!(matches!(
        doc.query_first("/foo/bar/@loo/@lo"),
        Err(Error::AxisUsage(_))
    ));
}

#[test]
fn test_context_node_query() {
    let doc = sample();
    let dar = doc.element(doc.root().unwrap(), "dar", None).unwrap();
    let hits = doc.query_from("doo", dar).unwrap();
    assert_eq!(xml_of(&doc, &hits[0]), "<doo>Done</doo>");
}

#[test]
fn test_bare_root() {
    let doc = sample();
    assert_eq!(
        doc.query_first("/").unwrap(),
        Some(Value::Node(DOCUMENT_NODE))
    );
}

#[test]
fn test_comparison_predicates() {
    let doc = sample();
    assert_eq!(
        doc.query_first("/foo/bar[@loo=\"skip\"]/text()").unwrap(),
        Some(Value::Str("baz".into()))
    );
    let hit = doc
        .query_first("/foo/bar[text()=\"No Never\"]")
        .unwrap()
        .unwrap();
    assert_eq!(xml_of(&doc, &hit), "<bar loo=\"nod\">No Never</bar>");
    assert_eq!(
        strings(&doc.query("/foo/dar[doo=\"Done\"]/dod/text()").unwrap()),
        ["Dope"]
    );
}

#[test]
fn test_existence_predicate() {
    let doc = sample();
    assert_eq!(
        strings(&doc.query("/foo/dar[doo]/doo/text()").unwrap()),
        ["Done", "Nope"]
    );
}

#[test]
fn test_wildcards() {
    let doc = sample();
    assert_eq!(
        strings(&doc.query("*/doo/text()").unwrap()),
        ["", "Done", "Nope"]
    );
    assert_eq!(
        strings(&doc.query("too/@*/text()").unwrap()),
        ["sprocket", "oot"]
    );
}

#[test]
fn test_descendant_axes() {
    let doc = sample();
    assert_eq!(doc.query("//bar").unwrap().len(), 4);
    assert_eq!(
        doc.query_first("//bar/@*/load/text()").unwrap(),
        Some(Value::Str("heavy".into()))
    );
    let root = doc.root().unwrap();
    assert_eq!(doc.query_from("./dar", root).unwrap().len(), 3);
    assert_eq!(doc.query_from("deep//no", root).unwrap().len(), 1);
    assert_eq!(doc.query_from("deep//*", root).unwrap().len(), 2);
}

#[test]
fn test_comment_node_test() {
    let doc = DomParser::parse_full(
        "<foo><bar><!--b1-->x</bar><!--top--><bar><!--b2--></bar></foo>",
    )
    .unwrap();
    let hits = doc.query("bar/comment()").unwrap();
    let texts: Vec<String> = hits
        .iter()
        .map(|v| doc.text_of(v.node().unwrap()))
        .collect();
    assert_eq!(texts, ["b1", "b2"]);

    // List context: every comment in the tree, nothing else.
    let all = doc.query("//comment()").unwrap();
    let texts: Vec<String> = all
        .iter()
        .map(|v| doc.text_of(v.node().unwrap()))
        .collect();
    assert_eq!(texts, ["b1", "top", "b2"]);
}

#[test]
fn test_count_function() {
    let doc = sample();
    assert_eq!(
        doc.query("count(bar)").unwrap(),
        vec![Value::Num(4.0)]
    );
}

#[test]
fn test_unimplemented_surface() {
    let doc = sample();
    assert!(matches!(
        doc.query("position()"),
        Err(Error::UnimplementedFunction(_))
    ));
    assert!(matches!(
        doc.query("/foo/bar[@loo > \"a\"]"),
        Err(Error::UnimplementedOperator(_))
    ));
}

#[test]
fn test_syntax_error() {
    let err = XPath::new("/$").unwrap_err();
    match err {
        Error::QuerySyntax { start, end, found, .. } => {
            assert_eq!((start, end), (1, 2));
            assert_eq!(found, "$");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(sample().query("/$").is_err());
}
