use crate::ast::SortKey;
use crate::error::XsltError;
use crate::executor::TemplateExecutor;
use crate::executor_handlers::sort;
use larix_xpath1::{Expr, XPathNode, XPathValue};
use log::warn;

/// Builds the selected node-list (or the stripped children when there is no
/// `select`), runs the sort prelude, and pushes every member through template
/// dispatch with its proximity position. The insertion point is untouched.
pub(crate) fn handle<'s, 'a, N: XPathNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    select: &Option<Expr>,
    sort_keys: &[SortKey],
    node: N,
    position: usize,
    size: usize,
) -> Result<(), XsltError> {
    let mut selected = match select {
        Some(expr) => match executor.eval(expr, node, position, size) {
            Ok(XPathValue::NodeSet(nodes)) => nodes,
            Ok(other) => {
                warn!("apply-templates select must evaluate to a node-set, got {other:?}");
                return Ok(());
            }
            Err(e) => {
                warn!("apply-templates select failed: {e}");
                return Ok(());
            }
        },
        None => executor.applicable_children(node),
    };

    sort::sort_node_list(executor, &mut selected, sort_keys, node, position, size);

    let len = selected.len();
    for (i, member) in selected.into_iter().enumerate() {
        executor.process_node(member, i + 1, len)?;
    }
    Ok(())
}
