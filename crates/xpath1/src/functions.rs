//! The built-in XPath 1.0 function library.

use crate::engine::{XPathContext, XPathValue};
use crate::error::XPathError;
use crate::node::XPathNode;

/// Dispatches a call to the named built-in.
pub fn call<'a, N: XPathNode<'a> + 'a>(
    name: &str,
    args: Vec<XPathValue<N>>,
    ctx: &XPathContext<'a, '_, N>,
) -> Result<XPathValue<N>, XPathError> {
    match name {
        // Node-set
        "count" => count(name, args),
        "position" => {
            arity(name, &args, 0, 0)?;
            Ok(XPathValue::Number(ctx.position as f64))
        }
        "last" => {
            arity(name, &args, 0, 0)?;
            Ok(XPathValue::Number(ctx.size as f64))
        }
        "name" => node_name(name, args, ctx, true),
        "local-name" => node_name(name, args, ctx, false),

        // String
        "string" => {
            arity(name, &args, 0, 1)?;
            Ok(XPathValue::String(match args.into_iter().next() {
                Some(v) => v.string_value(),
                None => ctx.node.string_value(),
            }))
        }
        "concat" => {
            arity(name, &args, 2, usize::MAX)?;
            Ok(XPathValue::String(
                args.iter().map(XPathValue::string_value).collect(),
            ))
        }
        "starts-with" => {
            arity(name, &args, 2, 2)?;
            Ok(XPathValue::Boolean(
                args[0].string_value().starts_with(&args[1].string_value()),
            ))
        }
        "contains" => {
            arity(name, &args, 2, 2)?;
            Ok(XPathValue::Boolean(
                args[0].string_value().contains(&args[1].string_value()),
            ))
        }
        "substring-before" => {
            arity(name, &args, 2, 2)?;
            let haystack = args[0].string_value();
            let needle = args[1].string_value();
            Ok(XPathValue::String(
                haystack
                    .find(&needle)
                    .map(|at| haystack[..at].to_string())
                    .unwrap_or_default(),
            ))
        }
        "substring-after" => {
            arity(name, &args, 2, 2)?;
            let haystack = args[0].string_value();
            let needle = args[1].string_value();
            Ok(XPathValue::String(
                haystack
                    .find(&needle)
                    .map(|at| haystack[at + needle.len()..].to_string())
                    .unwrap_or_default(),
            ))
        }
        "substring" => substring(name, args),
        "string-length" => {
            arity(name, &args, 0, 1)?;
            let s = match args.into_iter().next() {
                Some(v) => v.string_value(),
                None => ctx.node.string_value(),
            };
            Ok(XPathValue::Number(s.chars().count() as f64))
        }
        "normalize-space" => {
            arity(name, &args, 0, 1)?;
            let s = match args.into_iter().next() {
                Some(v) => v.string_value(),
                None => ctx.node.string_value(),
            };
            Ok(XPathValue::String(
                s.split_whitespace().collect::<Vec<_>>().join(" "),
            ))
        }
        "translate" => translate(name, args),

        // Boolean
        "boolean" => {
            arity(name, &args, 1, 1)?;
            Ok(XPathValue::Boolean(args[0].boolean_value()))
        }
        "not" => {
            arity(name, &args, 1, 1)?;
            Ok(XPathValue::Boolean(!args[0].boolean_value()))
        }
        "true" => {
            arity(name, &args, 0, 0)?;
            Ok(XPathValue::Boolean(true))
        }
        "false" => {
            arity(name, &args, 0, 0)?;
            Ok(XPathValue::Boolean(false))
        }

        // Number
        "number" => {
            arity(name, &args, 0, 1)?;
            Ok(XPathValue::Number(match args.into_iter().next() {
                Some(v) => v.number_value(),
                None => XPathValue::<N>::String(ctx.node.string_value()).number_value(),
            }))
        }
        "sum" => sum(name, args),
        "floor" => {
            arity(name, &args, 1, 1)?;
            Ok(XPathValue::Number(args[0].number_value().floor()))
        }
        "ceiling" => {
            arity(name, &args, 1, 1)?;
            Ok(XPathValue::Number(args[0].number_value().ceil()))
        }
        "round" => {
            arity(name, &args, 1, 1)?;
            Ok(XPathValue::Number(xpath_round(args[0].number_value())))
        }

        _ => Err(XPathError::UnknownFunction(name.to_string())),
    }
}

fn arity<N>(
    name: &str,
    args: &[XPathValue<N>],
    min: usize,
    max: usize,
) -> Result<(), XPathError> {
    if args.len() < min || args.len() > max {
        return Err(XPathError::function(
            name,
            format!("wrong number of arguments ({})", args.len()),
        ));
    }
    Ok(())
}

fn count<'a, N: XPathNode<'a>>(
    name: &str,
    args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    arity(name, &args, 1, 1)?;
    match &args[0] {
        XPathValue::NodeSet(nodes) => Ok(XPathValue::Number(nodes.len() as f64)),
        other => Err(XPathError::Type(format!(
            "count() requires a node-set, got {other:?}"
        ))),
    }
}

fn sum<'a, N: XPathNode<'a>>(
    name: &str,
    args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    arity(name, &args, 1, 1)?;
    match &args[0] {
        XPathValue::NodeSet(nodes) => Ok(XPathValue::Number(
            nodes
                .iter()
                .map(|n| n.string_value().trim().parse().unwrap_or(f64::NAN))
                .sum(),
        )),
        other => Err(XPathError::Type(format!(
            "sum() requires a node-set, got {other:?}"
        ))),
    }
}

fn node_name<'a, N: XPathNode<'a>>(
    name: &str,
    args: Vec<XPathValue<N>>,
    ctx: &XPathContext<'a, '_, N>,
    qualified: bool,
) -> Result<XPathValue<N>, XPathError> {
    arity(name, &args, 0, 1)?;
    let target = match args.into_iter().next() {
        None => Some(ctx.node),
        // The named node is the set's first in document order, not the first
        // in collection order.
        Some(XPathValue::NodeSet(nodes)) => nodes.into_iter().min(),
        Some(other) => {
            return Err(XPathError::Type(format!(
                "{name}() requires a node-set, got {other:?}"
            )));
        }
    };
    let text = target
        .and_then(|n| n.name())
        .map(|q| {
            if qualified {
                q.to_string()
            } else {
                q.local.to_string()
            }
        })
        .unwrap_or_default();
    Ok(XPathValue::String(text))
}

/// substring() counts characters from 1 and rounds its numeric arguments, so
/// `substring("12345", 1.5, 2.6)` is `"234"`.
fn substring<'a, N: XPathNode<'a>>(
    name: &str,
    args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    arity(name, &args, 2, 3)?;
    let s = args[0].string_value();
    let begin = xpath_round(args[1].number_value());
    if begin.is_nan() {
        return Ok(XPathValue::String(String::new()));
    }
    let end = match args.get(2) {
        Some(len) => begin + xpath_round(len.number_value()),
        None => f64::INFINITY,
    };
    let kept = s
        .chars()
        .enumerate()
        .filter(|(i, _)| {
            let pos = (*i + 1) as f64;
            pos >= begin && pos < end
        })
        .map(|(_, c)| c)
        .collect();
    Ok(XPathValue::String(kept))
}

fn translate<'a, N: XPathNode<'a>>(
    name: &str,
    args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    arity(name, &args, 3, 3)?;
    let input = args[0].string_value();
    let from: Vec<char> = args[1].string_value().chars().collect();
    let to: Vec<char> = args[2].string_value().chars().collect();
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match from.iter().position(|f| *f == c) {
            Some(i) => {
                if let Some(replacement) = to.get(i) {
                    out.push(*replacement);
                }
                // A source character with no counterpart is deleted.
            }
            None => out.push(c),
        }
    }
    Ok(XPathValue::String(out))
}

/// XPath rounds half towards positive infinity, unlike `f64::round`.
fn xpath_round(n: f64) -> f64 {
    if n.is_nan() { n } else { (n + 0.5).floor() }
}
