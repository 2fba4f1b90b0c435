//! Operator-chain evaluation.
//!
//! A context list is a `Vec<Value>`; evaluating an operator replaces the
//! list with the concatenation of applying the operator to every entry in
//! order. The `Many` shape is the list-valued context produced by the
//! descendant axes; every operator branches on the shape it receives.

use crate::dom::{Document, NodeId, NodeKind};
use crate::error::{Error, Result};
use crate::xpath::functions;
use crate::xpath::ir::{CompareOp, OpIr, SlashKind};

/// One entry in a query context or result list.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A single node.
    Node(NodeId),
    /// A list-shaped context (descendant axes produce these).
    Many(Vec<NodeId>),
    Str(String),
    Num(f64),
    Bool(bool),
}

impl Value {
    /// The node inside a `Node` value.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Value::Node(id) => Some(*id),
            _ => None,
        }
    }

    /// The string inside a `Str` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Borrowing evaluator over one document.
pub struct Evaluator<'a> {
    doc: &'a Document,
}

impl<'a> Evaluator<'a> {
    pub fn new(doc: &'a Document) -> Self {
        Evaluator { doc }
    }

    /// Apply one operator across a context list.
    pub fn evaluate(&self, op: &OpIr, context: &[Value]) -> Result<Vec<Value>> {
        let mut out = Vec::new();
        for (index, value) in context.iter().enumerate() {
            out.extend(self.apply(op, index, value)?);
        }
        Ok(out)
    }

    fn apply(&self, op: &OpIr, index: usize, value: &Value) -> Result<Vec<Value>> {
        match op {
            OpIr::Root(rest) => {
                let doc_node = match value {
                    Value::Node(id) => self.owning_document(*id),
                    Value::Many(list) => {
                        list.first().and_then(|&id| self.owning_document(id))
                    }
                    _ => None,
                };
                let doc_node = match doc_node {
                    Some(d) => d,
                    // Fragment with no owning document.
                    None => return Ok(Vec::new()),
                };
                match rest {
                    Some(inner) => self.evaluate(inner, &[Value::Node(doc_node)]),
                    None => Ok(vec![Value::Node(doc_node)]),
                }
            }
            OpIr::All(expr) => {
                let list = match value {
                    Value::Node(id) if self.doc.node(*id).is_container() => {
                        let mut list = vec![*id];
                        list.extend(self.doc.descendants(*id));
                        list
                    }
                    Value::Many(members) => {
                        let mut list = Vec::new();
                        for &m in members {
                            list.push(m);
                            list.extend(self.doc.descendants(m));
                        }
                        list
                    }
                    _ => {
                        return Err(Error::AxisUsage(
                            "// requires a container context".into(),
                        ))
                    }
                };
                self.evaluate(expr, &[Value::Many(list)])
            }
            OpIr::Relative(first, steps) => {
                let mut context = self.apply(first, index, value)?;
                for (kind, step) in steps {
                    context = match kind {
                        SlashKind::Single => self.evaluate(step, &context)?,
                        SlashKind::Double => {
                            let mut out = Vec::new();
                            for v in &context {
                                let base = match v {
                                    Value::Node(id)
                                        if self.doc.node(*id).is_container() =>
                                    {
                                        *id
                                    }
                                    _ => {
                                        return Err(Error::AxisUsage(
                                            "// requires a container context".into(),
                                        ))
                                    }
                                };
                                let descendants = self.doc.element_descendants(base);
                                out.extend(
                                    self.evaluate(step, &[Value::Many(descendants)])?,
                                );
                            }
                            out
                        }
                    };
                }
                Ok(context)
            }
            OpIr::NameTest(name) => Ok(self.name_test(value, name)),
            OpIr::Wildcard => Ok(self.wildcard(value)),
            OpIr::Attrib(expr) => self.attrib(expr, value),
            OpIr::TextTest => match value {
                Value::Str(s) => Ok(vec![Value::Str(s.clone())]),
                Value::Node(id) => Ok(vec![Value::Str(self.doc.text_of(*id))]),
                Value::Many(_) => {
                    Err(Error::AxisUsage("text() on a list context".into()))
                }
                other => Ok(vec![Value::Str(self.value_text(other))]),
            },
            OpIr::CommentTest => Ok(self.comment_test(value)),
            OpIr::Dot => Ok(vec![value.clone()]),
            OpIr::Parent => match value {
                Value::Node(id) => {
                    Ok(self.doc.parent(*id).map(Value::Node).into_iter().collect())
                }
                Value::Many(list) => Ok(list
                    .iter()
                    .filter_map(|&id| self.doc.parent(id).map(Value::Node))
                    .collect()),
                _ => Err(Error::AxisUsage("parent of a scalar context".into())),
            },
            OpIr::Filter(expr, predicates) => {
                let mut candidates = self.apply(expr, index, value)?;
                for predicate in predicates {
                    let mut kept = Vec::new();
                    for (i, candidate) in candidates.iter().enumerate() {
                        if self.keeps(predicate, i, candidate)? {
                            kept.push(candidate.clone());
                        }
                    }
                    candidates = kept;
                }
                Ok(candidates)
            }
            OpIr::Number(n) => Ok(vec![Value::Num(*n)]),
            OpIr::Literal(s) => Ok(vec![Value::Str(s.clone())]),
            OpIr::Compare(op, left, right) => {
                let verdict = match op {
                    CompareOp::Eq | CompareOp::Ne => {
                        let l = self.expr_value(left, index, value)?;
                        let r = self.expr_value(right, index, value)?;
                        match (l, r) {
                            (Some(l), Some(r)) => {
                                let equal = l == r;
                                (*op == CompareOp::Eq) == equal
                            }
                            // A missing side never matches.
                            _ => false,
                        }
                    }
                    other => {
                        return Err(Error::UnimplementedOperator(format!(
                            "comparison {}",
                            other.symbol()
                        )))
                    }
                };
                if verdict {
                    Ok(vec![Value::Bool(true)])
                } else {
                    Ok(Vec::new())
                }
            }
            OpIr::Comma(exprs) => {
                let mut out = Vec::new();
                for expr in exprs {
                    out.extend(self.apply(expr, index, value)?);
                }
                Ok(out)
            }
            OpIr::Call(name, args) => functions::call(self, name, args, index, value),
            OpIr::Unimplemented(what) => {
                Err(Error::UnimplementedOperator(what.clone()))
            }
        }
    }

    /// Whether a predicate keeps a candidate at 1-based position `i + 1`.
    fn keeps(&self, predicate: &OpIr, i: usize, candidate: &Value) -> Result<bool> {
        if let OpIr::Number(n) = predicate {
            return Ok((i + 1) as f64 == *n);
        }
        Ok(!self.apply(predicate, i, candidate)?.is_empty())
    }

    fn name_test(&self, value: &Value, name: &str) -> Vec<Value> {
        match value {
            Value::Many(list) => list
                .iter()
                .copied()
                .filter(|&id| self.element_local(id) == Some(name))
                .map(Value::Node)
                .collect(),
            Value::Node(id) => match &self.doc.node(*id).kind {
                NodeKind::Document => self
                    .doc
                    .root()
                    .filter(|&r| self.element_local(r) == Some(name))
                    .map(Value::Node)
                    .into_iter()
                    .collect(),
                NodeKind::Element { .. } => self
                    .doc
                    .elements(*id, Some(name), None)
                    .into_iter()
                    .map(Value::Node)
                    .collect(),
                NodeKind::Attribute { name: qname, .. } => {
                    if qname.local == name {
                        vec![Value::Node(*id)]
                    } else {
                        Vec::new()
                    }
                }
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    fn wildcard(&self, value: &Value) -> Vec<Value> {
        match value {
            Value::Many(list) => list
                .iter()
                .copied()
                .filter(|&id| self.doc.node(id).is_element())
                .map(Value::Node)
                .collect(),
            Value::Node(id) => match &self.doc.node(*id).kind {
                NodeKind::Document => {
                    self.doc.root().map(Value::Node).into_iter().collect()
                }
                NodeKind::Element { .. } => self
                    .doc
                    .element_children(*id)
                    .into_iter()
                    .map(Value::Node)
                    .collect(),
                NodeKind::Attribute { .. } => vec![Value::Node(*id)],
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    fn attrib(&self, expr: &OpIr, value: &Value) -> Result<Vec<Value>> {
        match value {
            Value::Node(id) if self.doc.node(*id).is_element() => {
                let attrs: Vec<Value> = self
                    .doc
                    .attributes(*id)
                    .iter()
                    .copied()
                    .map(Value::Node)
                    .collect();
                self.evaluate(expr, &attrs)
            }
            Value::Many(list) => {
                let mut out = Vec::new();
                for &member in list {
                    if self.doc.node(member).is_element() {
                        out.extend(self.attrib(expr, &Value::Node(member))?);
                    }
                }
                Ok(out)
            }
            _ => Err(Error::AxisUsage(
                "attribute axis requires an element context".into(),
            )),
        }
    }

    fn comment_test(&self, value: &Value) -> Vec<Value> {
        match value {
            Value::Many(list) => list
                .iter()
                .copied()
                .filter(|&id| self.doc.node(id).is_comment())
                .map(Value::Node)
                .collect(),
            Value::Node(id) => {
                let node = self.doc.node(*id);
                if node.is_comment() {
                    vec![Value::Node(*id)]
                } else if node.is_container() {
                    self.doc
                        .children(*id)
                        .iter()
                        .copied()
                        .filter(|&c| self.doc.node(c).is_comment())
                        .map(Value::Node)
                        .collect()
                } else {
                    Vec::new()
                }
            }
            _ => Vec::new(),
        }
    }

    /// Resolve a sub-expression to a comparison scalar: the `text()` of
    /// its first result when it has one, otherwise the raw first value.
    fn expr_value(&self, expr: &OpIr, index: usize, value: &Value) -> Result<Option<String>> {
        let results = self.apply(expr, index, value)?;
        Ok(results.first().map(|v| self.value_text(v)))
    }

    fn value_text(&self, value: &Value) -> String {
        match value {
            Value::Node(id) => self.doc.text_of(*id),
            Value::Many(list) => list
                .first()
                .map(|&id| self.doc.text_of(id))
                .unwrap_or_default(),
            Value::Str(s) => s.clone(),
            Value::Num(n) => format_number(*n),
            Value::Bool(b) => b.to_string(),
        }
    }

    fn element_local(&self, id: NodeId) -> Option<&str> {
        self.doc.element_name(id).map(|n| n.local.as_str())
    }

    fn owning_document(&self, mut id: NodeId) -> Option<NodeId> {
        loop {
            if matches!(self.doc.node(id).kind, NodeKind::Document) {
                return Some(id);
            }
            id = self.doc.parent(id)?;
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::DomParser;
    use crate::xpath::parser::compile;

    fn sample() -> Document {
        DomParser::parse_full(
            "<foo><bar loo=\"nod\">No Never</bar><bar loo=\"bod\" load=\"heavy\"><doo/></bar><bar/><deep><yes><no>huh</no></yes></deep></foo>",
        )
        .unwrap()
    }

    fn run(doc: &Document, pattern: &str) -> Vec<Value> {
        let op = compile(pattern).unwrap();
        let ctx = doc.root().map(Value::Node).unwrap();
        Evaluator::new(doc).evaluate(&op, &[ctx]).unwrap()
    }

    #[test]
    fn test_positional_predicate() {
        let doc = sample();
        let out = run(&doc, "/foo/bar[2]");
        assert_eq!(out.len(), 1);
        let id = out[0].node().unwrap();
        assert_eq!(doc.attribute(id, "loo", None), Some("bod"));
    }

    #[test]
    fn test_leading_double_slash_counts_all_depths() {
        let doc = sample();
        assert_eq!(run(&doc, "//bar").len(), 3);
        assert_eq!(run(&doc, "//no").len(), 1);
    }

    #[test]
    fn test_mid_path_double_slash_is_elements_only() {
        let doc = sample();
        // deep//* sees descendant elements of deep, self excluded.
        assert_eq!(run(&doc, "deep//*").len(), 2);
        assert_eq!(run(&doc, "deep//no").len(), 1);
    }

    #[test]
    fn test_attribute_text_chain() {
        let doc = sample();
        let out = run(&doc, "/foo/bar/@loo/text()");
        let strings: Vec<&str> = out.iter().filter_map(|v| v.as_str()).collect();
        assert_eq!(strings, vec!["nod", "bod"]);
    }

    #[test]
    fn test_attrib_on_attribute_is_axis_error() {
        let doc = sample();
        let op = compile("/foo/bar/@loo/@lo").unwrap();
        let ctx = doc.root().map(Value::Node).unwrap();
        assert!(matches!(
            Evaluator::new(&doc).evaluate(&op, &[ctx]),
            Err(Error::AxisUsage(_))
        ));
    }

    #[test]
    fn test_existential_and_comparison_predicates() {
        let doc = sample();
        assert_eq!(run(&doc, "bar[@loo]").len(), 2);
        let out = run(&doc, "bar[@loo=\"nod\"]/text()");
        assert_eq!(out[0].as_str(), Some("No Never"));
        assert_eq!(run(&doc, "bar[text()=\"No Never\"]").len(), 1);
    }

    #[test]
    fn test_relational_comparison_unimplemented() {
        let doc = sample();
        let op = compile("bar[@loo>1]").unwrap();
        let ctx = doc.root().map(Value::Node).unwrap();
        assert!(matches!(
            Evaluator::new(&doc).evaluate(&op, &[ctx]),
            Err(Error::UnimplementedOperator(_))
        ));
    }

    #[test]
    fn test_parent_and_dot() {
        let doc = sample();
        let out = run(&doc, "deep/..");
        assert_eq!(out[0].node(), doc.root());
        let out = run(&doc, ".");
        assert_eq!(out[0].node(), doc.root());
    }

    #[test]
    fn test_root_from_nested_context() {
        let doc = sample();
        let no = run(&doc, "deep//no")[0].node().unwrap();
        let op = compile("/foo/bar").unwrap();
        let out = Evaluator::new(&doc)
            .evaluate(&op, &[Value::Node(no)])
            .unwrap();
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_comma_union_preserves_order() {
        let doc = sample();
        let out = run(&doc, "deep, bar");
        assert_eq!(out.len(), 4);
        assert!(matches!(out[0], Value::Node(_)));
    }
}
