//! Handlers for the typed result-node instructions: `attribute`, `comment`
//! and `processing-instruction`.

use crate::ast::{Avt, Instruction};
use crate::error::XsltError;
use crate::executor::TemplateExecutor;
use crate::tree::{Namespace, ResultAttr, ResultKind};
use larix_xpath1::XPathNode;
use log::warn;

pub(crate) fn attribute<'s, 'a, N: XPathNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    name: &Option<Avt>,
    namespace: &Option<Avt>,
    body: &[Instruction],
    node: N,
    position: usize,
    size: usize,
) -> Result<(), XsltError> {
    let Some(name_avt) = name else { return Ok(()) };
    let attr_name = executor.eval_avt(name_avt, node, position, size);
    if attr_name == "xmlns" {
        warn!("xsl:attribute may not create an attribute named 'xmlns'");
        return Ok(());
    }
    if attr_name.is_empty() {
        warn!("xsl:attribute produced an empty name; ignored");
        return Ok(());
    }

    let insert = executor.insert;
    if !matches!(executor.result.kind(insert), ResultKind::Element { .. }) {
        warn!("xsl:attribute '{attr_name}' outside an element; ignored");
        return Ok(());
    }
    // Attributes must be produced before any children of the element.
    if executor.result.has_children(insert) {
        warn!("xsl:attribute '{attr_name}' after children were added; ignored");
        return Ok(());
    }

    let attr_ns = match namespace {
        Some(avt) => {
            let uri = executor.eval_avt(avt, node, position, size);
            if uri.is_empty() {
                None
            } else {
                Some(bind_namespace(executor, insert, &uri))
            }
        }
        None => None,
    };

    let value = executor.body_to_string(body, node, position, size)?;
    executor.result.set_attribute(
        insert,
        ResultAttr {
            name: attr_name,
            namespace: attr_ns,
            value,
        },
    );
    Ok(())
}

/// Reuses a prefixed in-scope binding for `uri` on the owning element, or
/// declares one with a generated prefix. Namespaced attributes always need a
/// prefix, so an in-scope default binding does not qualify.
fn bind_namespace<'s, 'a, N: XPathNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    element: crate::tree::NodeId,
    uri: &str,
) -> Namespace {
    if let Some(binding) = executor.result.namespace_for_uri(element, uri)
        && binding.prefix.is_some()
    {
        return binding;
    }
    let mut n = 0;
    let prefix = loop {
        let candidate = format!("ns{n}");
        if executor.result.uri_for_prefix(element, &candidate).is_none() {
            break candidate;
        }
        n += 1;
    };
    let binding = Namespace {
        prefix: Some(prefix),
        uri: uri.to_string(),
    };
    executor.result.declare_namespace(element, binding.clone());
    binding
}

pub(crate) fn comment<'s, 'a, N: XPathNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    body: &[Instruction],
    node: N,
    position: usize,
    size: usize,
) -> Result<(), XsltError> {
    // The XML lexical rules ("--", trailing "-") are not enforced here.
    let content = executor.body_to_string(body, node, position, size)?;
    executor.result.append_comment(executor.insert, content);
    Ok(())
}

pub(crate) fn processing_instruction<'s, 'a, N: XPathNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    name: &Option<Avt>,
    body: &[Instruction],
    node: N,
    position: usize,
    size: usize,
) -> Result<(), XsltError> {
    let Some(name_avt) = name else { return Ok(()) };
    let target = executor.eval_avt(name_avt, node, position, size);
    if target.is_empty() {
        warn!("processing-instruction produced an empty target; ignored");
        return Ok(());
    }
    // The "?>" lexical constraint on the data is not enforced here.
    let data = executor.body_to_string(body, node, position, size)?;
    executor.result.append_pi(executor.insert, target, data);
    Ok(())
}
