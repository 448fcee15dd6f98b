//! Handlers for literal output: `value-of` text and literal result elements.

use crate::ast::{Instruction, LiteralAttr, NamespaceDecl};
use crate::error::XsltError;
use crate::executor::TemplateExecutor;
use crate::tree::{Namespace, ResultAttr, ResultKind};
use larix_xpath1::{Expr, XPathNode};
use log::warn;

pub(crate) fn value_of<'s, 'a, N: XPathNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    select: &Option<Expr>,
    disable_escaping: bool,
    node: N,
    position: usize,
    size: usize,
) {
    let Some(expr) = select else { return };
    match executor.eval(expr, node, position, size) {
        Ok(value) => {
            let text = value.string_value();
            if !text.is_empty() {
                executor
                    .result
                    .append_text(executor.insert, &text, disable_escaping);
            }
        }
        Err(e) => warn!("value-of evaluation failed: {e}"),
    }
}

/// Shallow-copies a literal result element under the insertion point and
/// descends into its body with the copy as the new insertion point.
///
/// The element's own namespace follows the search-or-declare policy: reuse
/// the insertion point's binding when the URI matches, otherwise any
/// in-scope declaration found walking up from the copy, otherwise a fresh
/// declaration on the copy itself.
#[allow(clippy::too_many_arguments)]
pub(crate) fn literal_element<'s, 'a, N: XPathNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    name: &str,
    namespace: Option<&str>,
    preferred_prefix: Option<&str>,
    ns_decls: &[NamespaceDecl],
    attributes: &[LiteralAttr],
    body: &[Instruction],
    node: N,
    position: usize,
    size: usize,
) -> Result<(), XsltError> {
    let decls: Vec<Namespace> = ns_decls
        .iter()
        .map(|decl| Namespace {
            prefix: decl.prefix.clone(),
            uri: decl.uri.clone(),
        })
        .collect();

    let saved_insert = executor.insert;
    let element =
        executor
            .result
            .append_element(saved_insert, name.to_string(), None, decls);

    if let Some(uri) = namespace {
        let reused = match executor.result.kind(saved_insert) {
            ResultKind::Element {
                namespace: Some(ns),
                ..
            } if ns.uri == uri => Some(ns.clone()),
            _ => executor.result.namespace_for_uri(element, uri),
        };
        let binding = match reused {
            Some(ns) => ns,
            None => {
                let fresh = Namespace {
                    prefix: preferred_prefix.map(str::to_string),
                    uri: uri.to_string(),
                };
                executor.result.declare_namespace(element, fresh.clone());
                fresh
            }
        };
        executor.result.set_element_namespace(element, Some(binding));
    }

    for attr in attributes {
        let value = executor.eval_avt(&attr.value, node, position, size);
        let attr_ns = attr.namespace.as_ref().and_then(|uri| {
            let found = executor.result.namespace_for_uri(element, uri);
            if found.is_none() {
                warn!("no in-scope declaration for attribute namespace '{uri}'");
            }
            found
        });
        executor.result.set_attribute(
            element,
            ResultAttr {
                name: attr.name.clone(),
                namespace: attr_ns,
                value,
            },
        );
    }

    executor.insert = element;
    let outcome = executor.execute_body(body, node, position, size, None);
    executor.insert = saved_insert;
    outcome
}
