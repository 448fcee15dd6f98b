use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum XPathError {
    #[error("syntax error in '{0}': {1}")]
    Syntax(String, String),

    #[error("unknown XPath function '{0}'")]
    UnknownFunction(String),

    #[error("function '{function}' error: {message}")]
    Function { function: String, message: String },

    #[error("type error: {0}")]
    Type(String),

    #[error("reference to undeclared variable ${0}")]
    UnknownVariable(String),
}

impl XPathError {
    pub(crate) fn function(function: &str, message: impl Into<String>) -> Self {
        XPathError::Function {
            function: function.to_string(),
            message: message.into(),
        }
    }
}
