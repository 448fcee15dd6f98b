//! Evaluation of a parsed XPath expression against a generic [`XPathNode`] tree.

use crate::ast::{Axis, BinaryOp, Expr, KindTest, LocationPath, NodeTest, Step};
use crate::error::XPathError;
use crate::node::{NodeKind, XPathNode};
use crate::{axes, functions, operators};
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;

/// The result of evaluating an expression: the four XPath 1.0 value types.
#[derive(Debug, Clone)]
pub enum XPathValue<N> {
    NodeSet(Vec<N>),
    String(String),
    Number(f64),
    Boolean(bool),
}

impl<'a, N: XPathNode<'a>> XPathValue<N> {
    /// Boolean coercion: a node-set is true when non-empty, a string when
    /// non-empty, a number when neither zero nor NaN.
    pub fn boolean_value(&self) -> bool {
        match self {
            XPathValue::NodeSet(nodes) => !nodes.is_empty(),
            XPathValue::String(s) => !s.is_empty(),
            XPathValue::Number(n) => *n != 0.0 && !n.is_nan(),
            XPathValue::Boolean(b) => *b,
        }
    }

    /// Number coercion; anything unparseable becomes NaN.
    pub fn number_value(&self) -> f64 {
        match self {
            XPathValue::Number(n) => *n,
            XPathValue::String(s) => s.trim().parse().unwrap_or(f64::NAN),
            XPathValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            XPathValue::NodeSet(nodes) => {
                let first = nodes.iter().min().map(|n| n.string_value()).unwrap_or_default();
                first.trim().parse().unwrap_or(f64::NAN)
            }
        }
    }

    /// String coercion. A node-set contributes the string value of its node
    /// that is first in document order, regardless of the axis order it was
    /// collected in; `Ord` on nodes is document order.
    pub fn string_value(&self) -> String {
        match self {
            XPathValue::NodeSet(nodes) => {
                nodes.iter().min().map(|n| n.string_value()).unwrap_or_default()
            }
            XPathValue::String(s) => s.clone(),
            XPathValue::Number(n) => format_number(*n),
            XPathValue::Boolean(b) => b.to_string(),
        }
    }
}

/// Numbers print without a trailing `.0` for integral values, per the XPath
/// string() rules.
fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Everything an evaluation needs: the context node, the document root, the
/// 1-based proximity position and context size, and the visible variables.
pub struct XPathContext<'a, 'c, N: XPathNode<'a>> {
    pub node: N,
    pub root: N,
    pub position: usize,
    pub size: usize,
    pub variables: &'c HashMap<String, XPathValue<N>>,
    _doc: PhantomData<&'a ()>,
}

impl<'a, 'c, N: XPathNode<'a>> XPathContext<'a, 'c, N> {
    pub fn new(
        node: N,
        root: N,
        position: usize,
        size: usize,
        variables: &'c HashMap<String, XPathValue<N>>,
    ) -> Self {
        Self {
            node,
            root,
            position,
            size,
            variables,
            _doc: PhantomData,
        }
    }

    /// The same evaluation environment focused on another node.
    pub fn reframed(&self, node: N, position: usize, size: usize) -> Self {
        Self::new(node, self.root, position, size, self.variables)
    }
}

/// Evaluates a compiled expression to a concrete value.
pub fn evaluate<'a, N>(
    expr: &Expr,
    ctx: &XPathContext<'a, '_, N>,
) -> Result<XPathValue<N>, XPathError>
where
    N: XPathNode<'a> + 'a,
{
    match expr {
        Expr::Literal(s) => Ok(XPathValue::String(s.clone())),
        Expr::Number(n) => Ok(XPathValue::Number(*n)),
        Expr::Var(name) => ctx
            .variables
            .get(name)
            .cloned()
            .ok_or_else(|| XPathError::UnknownVariable(name.clone())),
        Expr::Path(path) => Ok(XPathValue::NodeSet(eval_path(path, ctx)?)),
        Expr::Call { name, args } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(evaluate(arg, ctx)?);
            }
            functions::call(name, values, ctx)
        }
        Expr::Binary {
            op: BinaryOp::Or,
            lhs,
            rhs,
        } => {
            if evaluate(lhs, ctx)?.boolean_value() {
                return Ok(XPathValue::Boolean(true));
            }
            Ok(XPathValue::Boolean(evaluate(rhs, ctx)?.boolean_value()))
        }
        Expr::Binary {
            op: BinaryOp::And,
            lhs,
            rhs,
        } => {
            if !evaluate(lhs, ctx)?.boolean_value() {
                return Ok(XPathValue::Boolean(false));
            }
            Ok(XPathValue::Boolean(evaluate(rhs, ctx)?.boolean_value()))
        }
        Expr::Binary { op, lhs, rhs } => {
            let left = evaluate(lhs, ctx)?;
            let right = evaluate(rhs, ctx)?;
            operators::apply(*op, left, right)
        }
        Expr::Negate(inner) => Ok(XPathValue::Number(-evaluate(inner, ctx)?.number_value())),
    }
}

fn eval_path<'a, N>(
    path: &LocationPath,
    ctx: &XPathContext<'a, '_, N>,
) -> Result<Vec<N>, XPathError>
where
    N: XPathNode<'a> + 'a,
{
    let mut current = if let Some(start) = &path.start {
        match evaluate(start, ctx)? {
            XPathValue::NodeSet(nodes) => nodes,
            other => {
                return Err(XPathError::Type(format!(
                    "a path can only continue from a node-set, got {other:?}"
                )));
            }
        }
    } else if path.absolute {
        vec![ctx.root]
    } else {
        vec![ctx.node]
    };

    for step in &path.steps {
        current = eval_step(step, &current, ctx)?;
    }
    Ok(current)
}

/// One step: gather the axis, filter by the node test, then run predicates.
fn eval_step<'a, N>(
    step: &Step,
    context_nodes: &[N],
    ctx: &XPathContext<'a, '_, N>,
) -> Result<Vec<N>, XPathError>
where
    N: XPathNode<'a> + 'a,
{
    let mut seen = HashSet::new();
    let mut gathered = Vec::new();
    for &node in context_nodes {
        axes::collect(step.axis, node, &mut seen, &mut gathered);
    }

    gathered.retain(|node| test_node(*node, &step.test, step.axis));

    let mut filtered = gathered;
    for predicate in &step.predicates {
        let size = filtered.len();
        let mut kept = Vec::with_capacity(size);
        for (i, node) in filtered.iter().enumerate() {
            let frame = ctx.reframed(*node, i + 1, size);
            let outcome = evaluate(predicate, &frame)?;
            let keep = match outcome {
                // A bare number is a positional test: `item[2]`.
                XPathValue::Number(n) => n as usize == i + 1,
                other => other.boolean_value(),
            };
            if keep {
                kept.push(*node);
            }
        }
        filtered = kept;
    }
    Ok(filtered)
}

fn test_node<'a, N: XPathNode<'a>>(node: N, test: &NodeTest, axis: Axis) -> bool {
    match test {
        NodeTest::Wildcard => match axis {
            Axis::Attribute => node.kind() == NodeKind::Attribute,
            _ => node.kind() == NodeKind::Element,
        },
        NodeTest::Name(tested) => {
            let local = tested.rsplit(':').next().unwrap_or(tested);
            node.name().is_some_and(|q| q.local == local)
                && match axis {
                    Axis::Attribute => node.kind() == NodeKind::Attribute,
                    _ => node.kind() == NodeKind::Element,
                }
        }
        NodeTest::Kind(kind) => match kind {
            KindTest::Text => node.kind() == NodeKind::Text,
            KindTest::Comment => node.kind() == NodeKind::Comment,
            KindTest::ProcessingInstruction => node.kind() == NodeKind::ProcessingInstruction,
            KindTest::Node => true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::tests::{MockNode, MockTree, sample_tree};
    use crate::parser::parse_expression;

    fn root_ctx<'a, 'c>(
        tree: &'a MockTree<'a>,
        vars: &'c HashMap<String, XPathValue<MockNode<'a>>>,
    ) -> XPathContext<'a, 'c, MockNode<'a>> {
        XPathContext::new(tree.node(0), tree.node(0), 1, 1, vars)
    }

    fn select<'a>(
        expr: &str,
        ctx: &XPathContext<'a, '_, MockNode<'a>>,
    ) -> Vec<usize> {
        let parsed = parse_expression(expr).unwrap();
        match evaluate(&parsed, ctx).unwrap() {
            XPathValue::NodeSet(nodes) => nodes.iter().map(|n| n.id).collect(),
            other => panic!("expected a node-set from '{expr}', got {other:?}"),
        }
    }

    #[test]
    fn relative_and_absolute_paths() {
        let tree = sample_tree();
        let vars = HashMap::new();
        let ctx = root_ctx(&tree, &vars);
        assert_eq!(select("doc/item", &ctx), vec![2, 5]);
        assert_eq!(select("/doc/item", &ctx), vec![2, 5]);
        assert_eq!(select("/", &ctx), vec![0]);
    }

    #[test]
    fn descendant_shorthand() {
        let tree = sample_tree();
        let vars = HashMap::new();
        let ctx = root_ctx(&tree, &vars);
        let mut texts = select("//text()", &ctx);
        texts.sort_unstable();
        assert_eq!(texts, vec![4, 7]);
    }

    #[test]
    fn attribute_predicate_filters() {
        let tree = sample_tree();
        let vars = HashMap::new();
        let ctx = root_ctx(&tree, &vars);
        assert_eq!(select("doc/item[@key = 'a']", &ctx), vec![5]);
        assert_eq!(select("doc/item[@key != 'a']", &ctx), vec![2]);
    }

    #[test]
    fn positional_predicates() {
        let tree = sample_tree();
        let vars = HashMap::new();
        let ctx = root_ctx(&tree, &vars);
        assert_eq!(select("doc/item[1]", &ctx), vec![2]);
        assert_eq!(select("doc/item[position() = 2]", &ctx), vec![5]);
        assert_eq!(select("doc/item[last()]", &ctx), vec![5]);
    }

    #[test]
    fn self_step_returns_the_context_node() {
        let tree = sample_tree();
        let vars = HashMap::new();
        let mut ctx = root_ctx(&tree, &vars);
        ctx.node = tree.node(5);
        assert_eq!(select(".", &ctx), vec![5]);
        assert_eq!(select("..", &ctx), vec![1]);
    }

    #[test]
    fn variables_resolve_and_extend_into_paths() {
        let tree = sample_tree();
        let mut vars = HashMap::new();
        vars.insert(
            "items".to_string(),
            XPathValue::NodeSet(vec![tree.node(2), tree.node(5)]),
        );
        vars.insert("greeting".to_string(), XPathValue::String("hi".to_string()));
        let ctx = root_ctx(&tree, &vars);

        let mut texts = select("$items/text()", &ctx);
        texts.sort_unstable();
        assert_eq!(texts, vec![4, 7]);

        let parsed = parse_expression("$greeting").unwrap();
        assert_eq!(evaluate(&parsed, &ctx).unwrap().string_value(), "hi");
    }

    #[test]
    fn undeclared_variable_is_an_error() {
        let tree = sample_tree();
        let vars = HashMap::new();
        let ctx = root_ctx(&tree, &vars);
        let parsed = parse_expression("$missing").unwrap();
        assert!(matches!(
            evaluate(&parsed, &ctx),
            Err(XPathError::UnknownVariable(_))
        ));
    }

    #[test]
    fn arithmetic_and_comparison_pipeline() {
        let tree = sample_tree();
        let vars = HashMap::new();
        let ctx = root_ctx(&tree, &vars);
        let parsed = parse_expression("count(doc/item) > 1 and count(doc/item) < 3").unwrap();
        assert!(evaluate(&parsed, &ctx).unwrap().boolean_value());
        let parsed = parse_expression("count(//item) * 10 - 5").unwrap();
        assert_eq!(evaluate(&parsed, &ctx).unwrap().number_value(), 15.0);
    }

    #[test]
    fn union_keeps_document_order() {
        let tree = sample_tree();
        let vars = HashMap::new();
        let ctx = root_ctx(&tree, &vars);
        assert_eq!(select("doc/empty | doc/item", &ctx), vec![2, 5, 9]);
    }

    #[test]
    fn string_value_of_first_node() {
        let tree = sample_tree();
        let vars = HashMap::new();
        let ctx = root_ctx(&tree, &vars);
        let parsed = parse_expression("doc/item").unwrap();
        assert_eq!(evaluate(&parsed, &ctx).unwrap().string_value(), "beta");
    }

    #[test]
    fn node_set_coercions_use_document_order_not_axis_order() {
        // ancestor:: collects nearest-first; string() must still read the
        // document-order-first node (<doc>, whose text is "betaalpha").
        let tree = sample_tree();
        let vars = HashMap::new();
        let mut ctx = root_ctx(&tree, &vars);
        ctx.node = tree.node(4);
        let parsed = parse_expression("ancestor::*").unwrap();
        assert_eq!(
            evaluate(&parsed, &ctx).unwrap().string_value(),
            "betaalpha"
        );
    }

    #[test]
    fn integral_numbers_print_without_fraction() {
        let v: XPathValue<MockNode<'_>> = XPathValue::Number(3.0);
        assert_eq!(v.string_value(), "3");
        let v: XPathValue<MockNode<'_>> = XPathValue::Number(2.5);
        assert_eq!(v.string_value(), "2.5");
    }
}
