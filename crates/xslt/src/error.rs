use thiserror::Error;

/// Errors that abort a whole compilation or transformation.
///
/// Instruction-local problems (a missing attribute, a failing expression, a
/// misplaced attribute instruction) never surface here: the instruction is
/// reported through the `log` facade and becomes a no-op.
#[derive(Error, Debug)]
pub enum XsltError {
    #[error("XML parsing error: {0}")]
    XmlParse(#[from] roxmltree::Error),

    #[error("XPath error: {0}")]
    XPath(#[from] larix_xpath1::XPathError),

    #[error("stylesheet compilation error: {0}")]
    Compile(String),

    #[error("pattern error in '{0}': {1}")]
    Pattern(String, String),

    #[error("unknown output method '{0}'")]
    UnknownOutputMethod(String),

    #[error("serialization error: {0}")]
    Serialize(String),
}
