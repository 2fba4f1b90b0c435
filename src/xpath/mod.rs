//! Pattern compilation and query execution.
//!
//! [`XPath::new`] compiles a pattern once (through a small thread-local
//! LRU cache keyed by the pattern text); [`XPath::execute`] runs it
//! against a document from a context node.

mod eval;
mod functions;
mod ir;
mod lexer;
pub(crate) mod parser;

pub use eval::{Evaluator, Value};
pub use ir::{CompareOp, OpIr, SlashKind};

use std::cell::RefCell;
use std::num::NonZeroUsize;
use std::rc::Rc;

use lru::LruCache;

use crate::dom::{Document, NodeId};
use crate::error::Result;

const COMPILE_CACHE_CAPACITY: usize = 64;

thread_local! {
    static COMPILE_CACHE: RefCell<LruCache<String, Rc<OpIr>>> = RefCell::new(LruCache::new(
        NonZeroUsize::new(COMPILE_CACHE_CAPACITY).expect("nonzero cache capacity"),
    ));
}

/// A compiled query pattern.
#[derive(Debug, Clone)]
pub struct XPath {
    pattern: String,
    op: Rc<OpIr>,
}

impl XPath {
    /// Compile a pattern, reusing a cached compilation when available.
    pub fn new(pattern: &str) -> Result<XPath> {
        let cached = COMPILE_CACHE.with(|cache| cache.borrow_mut().get(pattern).cloned());
        let op = match cached {
            Some(op) => op,
            None => {
                let op = Rc::new(parser::compile(pattern)?);
                COMPILE_CACHE.with(|cache| {
                    cache.borrow_mut().put(pattern.to_string(), Rc::clone(&op));
                });
                op
            }
        };
        Ok(XPath {
            pattern: pattern.to_string(),
            op,
        })
    }

    /// The source pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Run the query from `context`, returning the ordered result list.
    pub fn execute(&self, doc: &Document, context: NodeId) -> Result<Vec<Value>> {
        Evaluator::new(doc).evaluate(&self.op, &[Value::Node(context)])
    }

    /// Run the query and keep only the first result.
    pub fn first(&self, doc: &Document, context: NodeId) -> Result<Option<Value>> {
        Ok(self.execute(doc, context)?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::DomParser;

    #[test]
    fn test_compile_cache_reuses_ir() {
        let a = XPath::new("/cache/hit").unwrap();
        let b = XPath::new("/cache/hit").unwrap();
        assert!(Rc::ptr_eq(&a.op, &b.op));
    }

    #[test]
    fn test_execute_and_first() {
        let doc = DomParser::parse_full("<f><b/><b/></f>").unwrap();
        let q = XPath::new("/f/b").unwrap();
        assert_eq!(q.execute(&doc, doc.root().unwrap()).unwrap().len(), 2);
        assert!(q.first(&doc, doc.root().unwrap()).unwrap().is_some());
    }

    #[test]
    fn test_bad_pattern_not_cached() {
        assert!(XPath::new("/$").is_err());
        assert!(XPath::new("/$").is_err());
    }
}
