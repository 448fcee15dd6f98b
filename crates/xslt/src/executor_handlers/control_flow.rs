use crate::ast::{Instruction, SortKey};
use crate::error::XsltError;
use crate::executor::TemplateExecutor;
use crate::executor_handlers::sort;
use larix_xpath1::{Expr, XPathNode, XPathValue};
use log::warn;

pub(crate) fn handle_if<'s, 'a, N: XPathNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    test: &Option<Expr>,
    body: &[Instruction],
    node: N,
    position: usize,
    size: usize,
) -> Result<(), XsltError> {
    let Some(expr) = test else { return Ok(()) };
    let truth = match executor.eval(expr, node, position, size) {
        Ok(value) => value.boolean_value(),
        Err(e) => {
            warn!("xsl:if test failed: {e}");
            return Ok(());
        }
    };
    if truth {
        executor.execute_body(body, node, position, size, None)?;
    }
    Ok(())
}

/// Iterates the selected node-set, executing the body (after its sort
/// prelude) once per member with the member as context node.
pub(crate) fn handle_for_each<'s, 'a, N: XPathNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    select: &Option<Expr>,
    sort_keys: &[SortKey],
    body: &[Instruction],
    node: N,
    position: usize,
    size: usize,
) -> Result<(), XsltError> {
    let Some(expr) = select else { return Ok(()) };
    let mut selected = match executor.eval(expr, node, position, size) {
        Ok(XPathValue::NodeSet(nodes)) => nodes,
        Ok(other) => {
            warn!("for-each select must evaluate to a node-set, got {other:?}");
            return Ok(());
        }
        Err(e) => {
            warn!("for-each select failed: {e}");
            return Ok(());
        }
    };

    sort::sort_node_list(executor, &mut selected, sort_keys, node, position, size);

    let len = selected.len();
    for (i, member) in selected.into_iter().enumerate() {
        executor.execute_body(body, member, i + 1, len, None)?;
    }
    Ok(())
}
