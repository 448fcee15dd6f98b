//! The abstract syntax tree for XPath 1.0 expressions.

/// A parsed expression, ready for repeated evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(String),
    Number(f64),
    Path(LocationPath),
    Var(String),
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Negate(Box<Expr>),
}

impl Expr {
    pub fn binary(lhs: Expr, op: BinaryOp, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Logical
    Or,
    And,
    // Equality
    Eq,
    NotEq,
    // Relational
    Lt,
    LtEq,
    Gt,
    GtEq,
    // Additive
    Add,
    Sub,
    // Multiplicative
    Mul,
    Div,
    Mod,
    // Set
    Union,
}

/// A location path, optionally rooted at another expression (`$var/item`) or
/// at the document root (`/item`).
#[derive(Debug, Clone, PartialEq)]
pub struct LocationPath {
    pub start: Option<Box<Expr>>,
    pub absolute: bool,
    pub steps: Vec<Step>,
}

/// One step of a location path: an axis, a node test, and predicates.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

impl Step {
    /// The step `//` desugars to: `descendant-or-self::node()`.
    pub fn any_descendant() -> Step {
        Step {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::Kind(KindTest::Node),
            predicates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Attribute,
    Parent,
    SelfAxis,
    Ancestor,
    Descendant,
    DescendantOrSelf,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// A name test such as `item` or `xsl:template`.
    Name(String),
    /// The `*` wildcard.
    Wildcard,
    /// A kind test such as `text()` or `node()`.
    Kind(KindTest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindTest {
    Text,
    Comment,
    ProcessingInstruction,
    Node,
}
