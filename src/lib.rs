// --- Module Structure ---
// `larix-xpath1`: XPath 1.0 parsing and evaluation over a pluggable tree.
// `larix-xslt`:   stylesheet compilation, the pattern engine, the apply
//                 engine, and the result-tree serializer.
//
// This crate re-exports both and offers the one-call string-to-string
// transformation most callers want.

pub use larix_xpath1 as xpath1;
pub use larix_xslt as xslt;

pub use larix_xslt::{
    ResultDocument, Stylesheet, XmlDocument, XsltError, apply_stylesheet, compile, serialize,
};

/// Compiles `stylesheet`, applies it to `document`, and serializes the result
/// according to the stylesheet's output method.
pub fn transform(stylesheet: &str, document: &str) -> Result<String, XsltError> {
    let compiled = compile(stylesheet)?;
    let source = XmlDocument::parse(document)?;
    let result = apply_stylesheet(&compiled, &source)?;
    serialize(&result)
}
