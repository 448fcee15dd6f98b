//! An XPath 1.0 expression parser and evaluator over a pluggable tree.
//!
//! The evaluator is written against the [`node::XPathNode`] trait, so any
//! read-only tree that can answer the navigation questions can be queried.

pub mod ast;
pub mod axes;
pub mod engine;
pub mod error;
pub mod functions;
pub mod node;
pub mod operators;
pub mod parser;

pub use ast::{Axis, BinaryOp, Expr, KindTest, LocationPath, NodeTest, Step};
pub use engine::{XPathContext, XPathValue, evaluate};
pub use error::XPathError;
pub use node::{ExpandedName, NodeKind, XPathNode};
pub use parser::parse_expression;

// The mock tree is re-exported so downstream crates can test engine code
// without carrying their own fixture.
pub use node::tests as mock;
