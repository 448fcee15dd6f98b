//! The compiled form of a stylesheet: template rules, named templates, and
//! the instruction bodies the executor instantiates.

use crate::output::OutputSpec;
use crate::pattern::Pattern;
use larix_xpath1::{Expr, XPathNode};
use std::collections::HashMap;

pub const XSLT_NS: &str = "http://www.w3.org/1999/XSL/Transform";

/// One part of an attribute value template: literal text or an embedded
/// `{expression}`.
#[derive(Debug, Clone, PartialEq)]
pub enum AvtPart {
    Literal(String),
    Expr(Expr),
}

/// An attribute value template, instantiated to a string at execution time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Avt {
    pub parts: Vec<AvtPart>,
}

impl Avt {
    pub fn literal(text: &str) -> Avt {
        Avt {
            parts: vec![AvtPart::Literal(text.to_string())],
        }
    }
}

/// A sort key of `xsl:sort`. `data-type` and `order` are themselves AVTs;
/// absent attributes take the defaults ("text", "ascending").
#[derive(Debug, Clone)]
pub struct SortKey {
    pub select: Option<Expr>,
    pub data_type: Option<Avt>,
    pub order: Option<Avt>,
}

/// A `with-param` child of `call-template`: the value comes from `select` or,
/// failing that, from instantiating the body as a string.
#[derive(Debug, Clone)]
pub struct WithParam {
    pub name: String,
    pub select: Option<Expr>,
    pub body: Vec<Instruction>,
}

/// A namespace declaration carried by a literal result element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    pub prefix: Option<String>,
    pub uri: String,
}

/// An attribute of a literal result element, with its AVT value.
#[derive(Debug, Clone)]
pub struct LiteralAttr {
    pub name: String,
    pub namespace: Option<String>,
    pub value: Avt,
}

/// One instruction of a compiled template body.
///
/// Required attributes that were missing or unparsable at compile time are
/// `None` here; the compiler has already reported them and the executor
/// treats the instruction as a no-op.
#[derive(Debug, Clone)]
pub enum Instruction {
    /// Literal text from the stylesheet, copied verbatim.
    Text(String),
    /// A non-XSLT element, shallow-copied into the result tree.
    LiteralElement {
        name: String,
        namespace: Option<String>,
        preferred_prefix: Option<String>,
        ns_decls: Vec<NamespaceDecl>,
        attributes: Vec<LiteralAttr>,
        body: Vec<Instruction>,
    },
    ApplyTemplates {
        select: Option<Expr>,
        sort_keys: Vec<SortKey>,
    },
    CallTemplate {
        name: Option<String>,
        params: Vec<WithParam>,
    },
    ValueOf {
        select: Option<Expr>,
        disable_escaping: bool,
    },
    If {
        test: Option<Expr>,
        body: Vec<Instruction>,
    },
    ForEach {
        select: Option<Expr>,
        sort_keys: Vec<SortKey>,
        body: Vec<Instruction>,
    },
    Variable {
        name: String,
        select: Option<Expr>,
        body: Vec<Instruction>,
    },
    Param {
        name: String,
        select: Option<Expr>,
        body: Vec<Instruction>,
    },
    Attribute {
        name: Option<Avt>,
        namespace: Option<Avt>,
        body: Vec<Instruction>,
    },
    Comment {
        body: Vec<Instruction>,
    },
    ProcessingInstruction {
        name: Option<Avt>,
        body: Vec<Instruction>,
    },
    /// Recognised but not implemented; reported at execution time and the
    /// body is skipped.
    Element {
        name: Option<Avt>,
    },
}

/// A pattern-matched template rule.
#[derive(Debug, Clone)]
pub struct TemplateRule {
    pub pattern: Pattern,
    pub priority: f64,
    pub mode: Option<String>,
    pub body: Vec<Instruction>,
}

/// A top-level `xsl:variable` or `xsl:param` declaration.
#[derive(Debug, Clone)]
pub struct VariableDecl {
    pub name: String,
    pub select: Option<Expr>,
    pub body: Vec<Instruction>,
}

/// Verdict of the `strip-space`/`preserve-space` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceHandling {
    Strip,
    Preserve,
}

/// A compiled stylesheet, ready to be applied to any number of documents.
#[derive(Debug, Default)]
pub struct Stylesheet {
    /// Pattern-matched rules in declaration order.
    pub rules: Vec<TemplateRule>,
    /// Named templates keyed by (local name, namespace URI).
    pub named: HashMap<(String, Option<String>), Vec<Instruction>>,
    /// Top-level variable declarations, in declaration order.
    pub globals: Vec<VariableDecl>,
    /// Whitespace verdicts keyed by element local name, with a `*` wildcard.
    pub strip_space: HashMap<String, SpaceHandling>,
    pub output: OutputSpec,
}

impl Stylesheet {
    /// Finds the rule for `node`: among matching rules the highest priority
    /// wins, and the later declaration wins ties. Rules carrying a mode are
    /// not consulted (modes are compiled but not dispatched on).
    pub fn rule_for<'a, N: XPathNode<'a>>(&self, node: N, root: N) -> Option<&TemplateRule> {
        let mut best: Option<&TemplateRule> = None;
        for rule in &self.rules {
            if rule.mode.is_none()
                && rule.pattern.matches(node, root)
                && best.is_none_or(|b| rule.priority >= b.priority)
            {
                best = Some(rule);
            }
        }
        best
    }

    /// The verdict for a blank text child of an element named `parent_local`.
    pub fn space_handling(&self, parent_local: &str) -> SpaceHandling {
        self.strip_space
            .get(parent_local)
            .or_else(|| self.strip_space.get("*"))
            .copied()
            .unwrap_or(SpaceHandling::Preserve)
    }
}
