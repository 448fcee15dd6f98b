//! Parsing and matching of XSLT `match` patterns.

use crate::error::XsltError;
use larix_xpath1::ast::{KindTest, NodeTest};
use larix_xpath1::node::{NodeKind, XPathNode};
use larix_xpath1::parser as xpath_parser;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::tag,
    combinator::map,
    multi::{separated_list0, separated_list1},
    sequence::preceded,
};
use std::fmt;

/// The axes a match pattern can step along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatternAxis {
    Child,
    Attribute,
}

/// One location step of a pattern (`item`, `@id`, `text()`, `*`).
#[derive(Debug, Clone, PartialEq, Eq)]
struct PatternStep {
    axis: PatternAxis,
    test: NodeTest,
}

/// One alternative of a pattern: a relative or absolute path.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PathPattern {
    absolute: bool,
    steps: Vec<PatternStep>,
}

/// A compiled match pattern; alternatives are the `|` branches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    alternatives: Vec<PathPattern>,
    source: String,
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl Pattern {
    pub fn matches<'a, N: XPathNode<'a>>(&self, node: N, root: N) -> bool {
        self.alternatives
            .iter()
            .any(|path| path.matches(node, root))
    }

    /// The XSLT 1.0 default priority: a plain name test is 0, wildcard and
    /// kind tests are -0.5, and anything with structure is 0.5. A union takes
    /// the highest of its branches.
    pub fn default_priority(&self) -> f64 {
        self.alternatives
            .iter()
            .map(PathPattern::default_priority)
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

impl PathPattern {
    /// Matches right-to-left: the last step must match the node itself, each
    /// earlier step an ancestor in turn, and an absolute pattern must finally
    /// land on the root.
    fn matches<'a, N: XPathNode<'a>>(&self, node: N, root: N) -> bool {
        if self.absolute && self.steps.is_empty() {
            return node == root;
        }

        let mut cursor = Some(node);
        for step in self.steps.iter().rev() {
            match cursor {
                Some(current) if step.matches(current) => cursor = current.parent(),
                _ => return false,
            }
        }

        !self.absolute || cursor == Some(root)
    }

    fn default_priority(&self) -> f64 {
        if self.absolute || self.steps.len() > 1 {
            return 0.5;
        }
        match self.steps.first().map(|s| &s.test) {
            Some(NodeTest::Name(_)) => 0.0,
            _ => -0.5,
        }
    }
}

impl PatternStep {
    fn matches<'a, N: XPathNode<'a>>(&self, node: N) -> bool {
        let kind = node.kind();
        match self.axis {
            PatternAxis::Attribute => {
                if kind != NodeKind::Attribute {
                    return false;
                }
            }
            PatternAxis::Child => {
                // Child steps can name elements, text and the root; attribute
                // nodes only match through the attribute axis.
                if kind == NodeKind::Attribute {
                    return false;
                }
            }
        }

        match &self.test {
            NodeTest::Wildcard => match self.axis {
                PatternAxis::Child => kind == NodeKind::Element,
                PatternAxis::Attribute => true,
            },
            NodeTest::Name(name) => {
                let local = name.rsplit(':').next().unwrap_or(name);
                matches!(kind, NodeKind::Element | NodeKind::Attribute)
                    && node.name().is_some_and(|q| q.local == local)
            }
            NodeTest::Kind(kind_test) => match kind_test {
                KindTest::Text => kind == NodeKind::Text,
                KindTest::Comment => kind == NodeKind::Comment,
                KindTest::ProcessingInstruction => kind == NodeKind::ProcessingInstruction,
                KindTest::Node => true,
            },
        }
    }
}

// --- Parser ---

pub fn parse(text: &str) -> Result<Pattern, XsltError> {
    match alternatives(text.trim()) {
        Ok(("", parsed)) => Ok(Pattern {
            alternatives: parsed,
            source: text.to_string(),
        }),
        Ok((rest, _)) => Err(XsltError::Pattern(
            text.to_string(),
            format!("unconsumed trailing input: '{rest}'"),
        )),
        Err(e) => Err(XsltError::Pattern(text.to_string(), e.to_string())),
    }
}

fn alternatives(input: &str) -> IResult<&str, Vec<PathPattern>> {
    separated_list1(tag("|"), path).parse(input)
}

fn path(input: &str) -> IResult<&str, PathPattern> {
    let (rest, lead) = nom::combinator::opt(tag("/")).parse(input)?;
    let absolute = lead.is_some();
    let (rest, steps) = if absolute {
        // `/` alone is a valid pattern (the root), so steps are optional.
        separated_list0(tag("/"), step).parse(rest)?
    } else {
        separated_list1(tag("/"), step).parse(rest)?
    };
    Ok((rest, PathPattern { absolute, steps }))
}

fn step(input: &str) -> IResult<&str, PatternStep> {
    alt((
        map(preceded(tag("@"), xpath_parser::node_test), |test| {
            PatternStep {
                axis: PatternAxis::Attribute,
                test,
            }
        }),
        map(xpath_parser::node_test, |test| PatternStep {
            axis: PatternAxis::Child,
            test,
        }),
    ))
    .parse(input)
}
