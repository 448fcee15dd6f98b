use crate::ast::SortKey;
use crate::executor::TemplateExecutor;
use larix_xpath1::XPathNode;
use log::warn;
use std::cmp::Ordering;

/// A computed sort key. `None` marks a key that could not be computed; it
/// sorts last regardless of direction so the order stays deterministic.
enum KeyValue {
    Text(String),
    Number(f64),
}

/// Reorders the node-list in place. Keys are applied in reverse declaration
/// order with a stable sort, so earlier keys dominate. The mutation is
/// visible to the iteration that follows, which is the point.
pub(crate) fn sort_node_list<'s, 'a, N: XPathNode<'a> + 'a>(
    executor: &TemplateExecutor<'s, 'a, N>,
    nodes: &mut Vec<N>,
    sort_keys: &[SortKey],
    node: N,
    position: usize,
    size: usize,
) {
    for key in sort_keys.iter().rev() {
        apply_key(executor, nodes, key, node, position, size);
    }
}

fn apply_key<'s, 'a, N: XPathNode<'a> + 'a>(
    executor: &TemplateExecutor<'s, 'a, N>,
    nodes: &mut Vec<N>,
    key: &SortKey,
    node: N,
    position: usize,
    size: usize,
) {
    let numeric = match key
        .data_type
        .as_ref()
        .map(|avt| executor.eval_avt(avt, node, position, size))
        .as_deref()
    {
        None | Some("text") => false,
        Some("number") => true,
        Some(other) => {
            warn!("unknown sort data-type '{other}'; sorting as text");
            false
        }
    };
    let descending = match key
        .order
        .as_ref()
        .map(|avt| executor.eval_avt(avt, node, position, size))
        .as_deref()
    {
        None | Some("ascending") => false,
        Some("descending") => true,
        Some(other) => {
            warn!("unknown sort order '{other}'; sorting ascending");
            false
        }
    };

    let len = nodes.len();
    let mut keyed: Vec<(Option<KeyValue>, N)> = nodes
        .iter()
        .enumerate()
        .map(|(i, &member)| {
            // The key select sees the member with its proximity position.
            let text = match &key.select {
                Some(expr) => match executor.eval(expr, member, i + 1, len) {
                    Ok(value) => Some(value.string_value()),
                    Err(e) => {
                        warn!("sort key evaluation failed: {e}");
                        None
                    }
                },
                None => Some(member.string_value()),
            };
            let value = match text {
                None => None,
                Some(t) if numeric => {
                    let parsed: f64 = t.trim().parse().unwrap_or(f64::NAN);
                    if parsed.is_nan() {
                        None
                    } else {
                        Some(KeyValue::Number(parsed))
                    }
                }
                Some(t) => Some(KeyValue::Text(t)),
            };
            (value, member)
        })
        .collect();

    // Vec::sort_by is stable: equal keys keep their input order.
    keyed.sort_by(|(a, _), (b, _)| compare(a, b, descending));
    *nodes = keyed.into_iter().map(|(_, member)| member).collect();
}

fn compare(a: &Option<KeyValue>, b: &Option<KeyValue>, descending: bool) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => {
            let ordering = match (x, y) {
                (KeyValue::Text(s1), KeyValue::Text(s2)) => s1.cmp(s2),
                (KeyValue::Number(n1), KeyValue::Number(n2)) => {
                    n1.partial_cmp(n2).unwrap_or(Ordering::Equal)
                }
                // One pass computes keys of a single type.
                _ => Ordering::Equal,
            };
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        }
    }
}
