//! Compiled operator IR.
//!
//! A pattern compiles into one closed [`OpIr`] tree; evaluation dispatches
//! on the variant, never on strings.

/// How a step was joined to the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlashKind {
    /// `/` — evaluate against the current context.
    Single,
    /// `//` — evaluate against all element descendants of the context.
    Double,
}

/// Comparison operator in a predicate.
///
/// Only `=` and `!=` evaluate; the relational forms parse but fail at
/// evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// One compiled operator.
#[derive(Debug, Clone, PartialEq)]
pub enum OpIr {
    /// Leading `/`: anchor at the owning document, then evaluate the
    /// optional relative chain.
    Root(Option<Box<OpIr>>),
    /// Leading `//`: evaluate the expression against the context node
    /// itself plus every descendant node of any kind.
    All(Box<OpIr>),
    /// A path: first step plus the steps joined to it.
    Relative(Box<OpIr>, Vec<(SlashKind, OpIr)>),
    /// Element test by local name.
    NameTest(String),
    /// `*`.
    Wildcard,
    /// `@expr`: evaluate expr against the context element's attributes.
    Attrib(Box<OpIr>),
    /// `text()`.
    TextTest,
    /// `comment()`.
    CommentTest,
    /// `.` — identity.
    Dot,
    /// `..`.
    Parent,
    /// Base expression with `[...]` predicates.
    Filter(Box<OpIr>, Vec<OpIr>),
    /// Numeric literal; positional when used directly as a predicate.
    Number(f64),
    /// String literal.
    Literal(String),
    /// Comparison of two sub-expressions resolved to scalars.
    Compare(CompareOp, Box<OpIr>, Box<OpIr>),
    /// `expr, expr, ...` — order-preserving union.
    Comma(Vec<OpIr>),
    /// Function call by name.
    Call(String, Vec<OpIr>),
    /// Accepted by the grammar, rejected at evaluation.
    Unimplemented(String),
}
