//! Built-in query function table.

use crate::error::{Error, Result};
use crate::xpath::eval::{Evaluator, Value};
use crate::xpath::ir::OpIr;

/// Dispatch a function call by name.
///
/// Only `count` is implemented; every other name fails with
/// `UnimplementedFunction`.
pub(crate) fn call(
    eval: &Evaluator,
    name: &str,
    args: &[OpIr],
    index: usize,
    value: &Value,
) -> Result<Vec<Value>> {
    match name {
        "count" => count(eval, args, index, value),
        _ => Err(Error::UnimplementedFunction(name.to_string())),
    }
}

fn count(eval: &Evaluator, args: &[OpIr], _index: usize, value: &Value) -> Result<Vec<Value>> {
    let arg = match args {
        [arg] => arg,
        _ => {
            return Err(Error::AxisUsage(format!(
                "count takes one argument, got {}",
                args.len()
            )))
        }
    };
    let results = eval.evaluate(arg, &[value.clone()])?;
    Ok(vec![Value::Num(results.len() as f64)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::DomParser;
    use crate::xpath::parser::compile;

    #[test]
    fn test_count() {
        let doc = DomParser::parse_full("<f><b/><b/><c/></f>").unwrap();
        let op = compile("count(b)").unwrap();
        let ctx = Value::Node(doc.root().unwrap());
        let out = Evaluator::new(&doc).evaluate(&op, &[ctx]).unwrap();
        assert_eq!(out, vec![Value::Num(2.0)]);
    }

    #[test]
    fn test_unknown_function() {
        let doc = DomParser::parse_full("<f/>").unwrap();
        let op = compile("position()").unwrap();
        let ctx = Value::Node(doc.root().unwrap());
        assert!(matches!(
            Evaluator::new(&doc).evaluate(&op, &[ctx]),
            Err(Error::UnimplementedFunction(_))
        ));
    }
}
