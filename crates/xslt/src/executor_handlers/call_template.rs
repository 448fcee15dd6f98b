use crate::ast::WithParam;
use crate::error::XsltError;
use crate::executor::TemplateExecutor;
use larix_xpath1::XPathNode;
use log::warn;
use std::collections::HashMap;

/// Resolves the called template's QName against the insertion point's
/// in-scope result-tree namespaces, evaluates the `with-param` values in the
/// caller's scope, and runs the template body against the current node.
pub(crate) fn handle<'s, 'a, N: XPathNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    name: Option<&str>,
    params: &[WithParam],
    node: N,
    position: usize,
    size: usize,
) -> Result<(), XsltError> {
    // A missing name was reported at compile time.
    let Some(qname) = name else { return Ok(()) };

    let (local, ns_uri) = match qname.split_once(':') {
        Some((prefix, local)) => {
            match executor.result.uri_for_prefix(executor.insert, prefix) {
                Some(uri) => (local, Some(uri)),
                None => {
                    warn!("call-template: unresolved namespace prefix '{prefix}' in '{qname}'");
                    return Ok(());
                }
            }
        }
        None => (qname, None),
    };

    let sheet = executor.stylesheet;
    let Some(body) = sheet.named.get(&(local.to_string(), ns_uri)) else {
        warn!("call-template: no template named '{qname}'");
        return Ok(());
    };

    let mut passed = HashMap::new();
    for param in params {
        let value = executor.variable_value(&param.select, &param.body, node, position, size)?;
        passed.insert(param.name.clone(), value);
    }

    executor.execute_body(body, node, position, size, Some(passed))
}
