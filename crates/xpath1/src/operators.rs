//! Binary operator evaluation with the XPath 1.0 comparison rules.

use crate::ast::BinaryOp;
use crate::engine::XPathValue;
use crate::error::XPathError;
use crate::node::XPathNode;
use std::collections::HashSet;

pub fn apply<'a, N: XPathNode<'a> + 'a>(
    op: BinaryOp,
    lhs: XPathValue<N>,
    rhs: XPathValue<N>,
) -> Result<XPathValue<N>, XPathError> {
    match op {
        BinaryOp::Eq => Ok(XPathValue::Boolean(equals(&lhs, &rhs))),
        BinaryOp::NotEq => Ok(XPathValue::Boolean(not_equals(&lhs, &rhs))),
        BinaryOp::Lt => relational(&lhs, &rhs, |a, b| a < b),
        BinaryOp::LtEq => relational(&lhs, &rhs, |a, b| a <= b),
        BinaryOp::Gt => relational(&lhs, &rhs, |a, b| a > b),
        BinaryOp::GtEq => relational(&lhs, &rhs, |a, b| a >= b),
        BinaryOp::Add => arithmetic(&lhs, &rhs, |a, b| a + b),
        BinaryOp::Sub => arithmetic(&lhs, &rhs, |a, b| a - b),
        BinaryOp::Mul => arithmetic(&lhs, &rhs, |a, b| a * b),
        BinaryOp::Div => arithmetic(&lhs, &rhs, |a, b| a / b),
        BinaryOp::Mod => arithmetic(&lhs, &rhs, |a, b| a % b),
        BinaryOp::Union => union(lhs, rhs),
        // `and`/`or` are short-circuited by the engine before reaching here.
        BinaryOp::And => Ok(XPathValue::Boolean(
            lhs.boolean_value() && rhs.boolean_value(),
        )),
        BinaryOp::Or => Ok(XPathValue::Boolean(
            lhs.boolean_value() || rhs.boolean_value(),
        )),
    }
}

/// `=` over node-sets is existential: any pair of values that compare equal
/// makes the whole comparison true.
fn equals<'a, N: XPathNode<'a>>(lhs: &XPathValue<N>, rhs: &XPathValue<N>) -> bool {
    use XPathValue::*;
    match (lhs, rhs) {
        (NodeSet(a), NodeSet(b)) => {
            let values: HashSet<std::string::String> = a.iter().map(|n| n.string_value()).collect();
            b.iter().any(|n| values.contains(&n.string_value()))
        }
        (NodeSet(nodes), Boolean(flag)) | (Boolean(flag), NodeSet(nodes)) => {
            !nodes.is_empty() == *flag
        }
        (NodeSet(nodes), Number(num)) | (Number(num), NodeSet(nodes)) => nodes
            .iter()
            .any(|n| str_to_number(&n.string_value()) == *num),
        (NodeSet(nodes), String(s)) | (String(s), NodeSet(nodes)) => {
            nodes.iter().any(|n| n.string_value() == *s)
        }
        (Boolean(_), _) | (_, Boolean(_)) => lhs.boolean_value() == rhs.boolean_value(),
        (Number(_), _) | (_, Number(_)) => lhs.number_value() == rhs.number_value(),
        (String(a), String(b)) => a == b,
    }
}

fn not_equals<'a, N: XPathNode<'a>>(lhs: &XPathValue<N>, rhs: &XPathValue<N>) -> bool {
    use XPathValue::*;
    match (lhs, rhs) {
        (NodeSet(a), NodeSet(b)) => {
            if a.is_empty() || b.is_empty() {
                return false;
            }
            let values: HashSet<std::string::String> = a.iter().map(|n| n.string_value()).collect();
            // Any pair of differing values; trivially true once either side
            // holds two distinct values.
            values.len() > 1 || b.iter().any(|n| !values.contains(&n.string_value()))
        }
        (NodeSet(nodes), Boolean(flag)) | (Boolean(flag), NodeSet(nodes)) => {
            !nodes.is_empty() != *flag
        }
        (NodeSet(nodes), Number(num)) | (Number(num), NodeSet(nodes)) => nodes
            .iter()
            .any(|n| str_to_number(&n.string_value()) != *num),
        (NodeSet(nodes), String(s)) | (String(s), NodeSet(nodes)) => {
            nodes.iter().any(|n| n.string_value() != *s)
        }
        _ => !equals(lhs, rhs),
    }
}

/// Relational operators compare numbers; node-sets contribute each member's
/// numeric value existentially.
fn relational<'a, N: XPathNode<'a>>(
    lhs: &XPathValue<N>,
    rhs: &XPathValue<N>,
    cmp: fn(f64, f64) -> bool,
) -> Result<XPathValue<N>, XPathError> {
    use XPathValue::*;
    let result = match (lhs, rhs) {
        (NodeSet(a), NodeSet(b)) => a.iter().any(|na| {
            let va = str_to_number(&na.string_value());
            b.iter().any(|nb| cmp(va, str_to_number(&nb.string_value())))
        }),
        (NodeSet(nodes), other) => nodes
            .iter()
            .any(|n| cmp(str_to_number(&n.string_value()), other.number_value())),
        (other, NodeSet(nodes)) => nodes
            .iter()
            .any(|n| cmp(other.number_value(), str_to_number(&n.string_value()))),
        _ => cmp(lhs.number_value(), rhs.number_value()),
    };
    Ok(XPathValue::Boolean(result))
}

fn arithmetic<'a, N: XPathNode<'a>>(
    lhs: &XPathValue<N>,
    rhs: &XPathValue<N>,
    op: fn(f64, f64) -> f64,
) -> Result<XPathValue<N>, XPathError> {
    Ok(XPathValue::Number(op(
        lhs.number_value(),
        rhs.number_value(),
    )))
}

fn union<'a, N: XPathNode<'a>>(
    lhs: XPathValue<N>,
    rhs: XPathValue<N>,
) -> Result<XPathValue<N>, XPathError> {
    match (lhs, rhs) {
        (XPathValue::NodeSet(mut a), XPathValue::NodeSet(b)) => {
            let mut seen: HashSet<N> = a.iter().copied().collect();
            for node in b {
                if seen.insert(node) {
                    a.push(node);
                }
            }
            a.sort_unstable();
            Ok(XPathValue::NodeSet(a))
        }
        _ => Err(XPathError::Type(
            "operands of '|' must be node-sets".to_string(),
        )),
    }
}

fn str_to_number(s: &str) -> f64 {
    s.trim().parse().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::tests::{MockNode, sample_tree};

    fn bool_of(v: Result<XPathValue<MockNode<'_>>, XPathError>) -> bool {
        match v.unwrap() {
            XPathValue::Boolean(b) => b,
            other => panic!("expected a boolean, got {other:?}"),
        }
    }

    #[test]
    fn node_set_equality_is_existential() {
        let tree = sample_tree();
        let items = vec![tree.node(2), tree.node(5)]; // "beta", "alpha"
        assert!(bool_of(apply(
            BinaryOp::Eq,
            XPathValue::NodeSet(items.clone()),
            XPathValue::String("alpha".to_string()),
        )));
        assert!(!bool_of(apply(
            BinaryOp::Eq,
            XPathValue::NodeSet(items.clone()),
            XPathValue::String("gamma".to_string()),
        )));
        // Both `=` and `!=` hold when the set carries differing values.
        assert!(bool_of(apply(
            BinaryOp::NotEq,
            XPathValue::NodeSet(items),
            XPathValue::String("alpha".to_string()),
        )));
    }

    #[test]
    fn empty_node_set_compares_false() {
        let empty: XPathValue<MockNode<'_>> = XPathValue::NodeSet(vec![]);
        assert!(!bool_of(apply(
            BinaryOp::Eq,
            empty.clone(),
            XPathValue::String(String::new()),
        )));
        assert!(!bool_of(apply(
            BinaryOp::NotEq,
            empty,
            XPathValue::String(String::new()),
        )));
    }

    #[test]
    fn arithmetic_coerces_to_numbers() {
        let sum: XPathValue<MockNode<'_>> = apply(
            BinaryOp::Add,
            XPathValue::String("2".to_string()),
            XPathValue::Number(3.0),
        )
        .unwrap();
        assert_eq!(sum.number_value(), 5.0);
        let nan: XPathValue<MockNode<'_>> = apply(
            BinaryOp::Mul,
            XPathValue::String("x".to_string()),
            XPathValue::Number(3.0),
        )
        .unwrap();
        assert!(nan.number_value().is_nan());
    }

    #[test]
    fn union_merges_in_document_order() {
        let tree = sample_tree();
        let merged = apply(
            BinaryOp::Union,
            XPathValue::NodeSet(vec![tree.node(5)]),
            XPathValue::NodeSet(vec![tree.node(2), tree.node(5)]),
        )
        .unwrap();
        match merged {
            XPathValue::NodeSet(nodes) => {
                assert_eq!(nodes.iter().map(|n| n.id).collect::<Vec<_>>(), vec![2, 5]);
            }
            other => panic!("expected a node-set, got {other:?}"),
        }
        assert!(
            apply(
                BinaryOp::Union,
                XPathValue::NodeSet(vec![tree.node(2)]),
                XPathValue::Number(1.0),
            )
            .is_err()
        );
    }
}
