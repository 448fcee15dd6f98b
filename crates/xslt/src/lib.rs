//! An XSLT 1.0 apply engine: template dispatch, the built-in rules, and the
//! instruction set, producing an in-memory result document serialized through
//! the XML, HTML or text output methods.

pub mod ast;
pub mod compiler;
pub mod error;
pub mod executor;
pub mod output;
pub mod pattern;
pub mod source;
pub mod tree;

mod executor_handlers;

pub use ast::Stylesheet;
pub use compiler::compile;
pub use error::XsltError;
pub use executor::apply_stylesheet;
pub use output::{OutputMethod, serialize};
pub use source::{SourceNode, XmlDocument};
pub use tree::ResultDocument;
