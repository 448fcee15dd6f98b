//! The transformation context and driver: template rule dispatch, the
//! built-in rules, and the body interpreter the instruction handlers call
//! back into.

use crate::ast::{Avt, AvtPart, Instruction, SpaceHandling, Stylesheet};
use crate::error::XsltError;
use crate::executor_handlers::{apply_templates, call_template, control_flow, literals, nodes};
use crate::output::OutputMethod;
use crate::source::XmlDocument;
use crate::tree::{DocType, Namespace, NodeId, ResultDocument, ResultKind};
use larix_xpath1::{Expr, NodeKind, XPathContext, XPathError, XPathNode, XPathValue, evaluate};
use log::warn;
use std::collections::HashMap;
use std::marker::PhantomData;

/// Applies a compiled stylesheet to a parsed document, producing the result
/// document. Fails only on fatal conditions (an unknown output method);
/// instruction-level problems are logged and skipped.
pub fn apply_stylesheet<'a>(
    style: &Stylesheet,
    source: &'a XmlDocument<'a>,
) -> Result<ResultDocument, XsltError> {
    TemplateExecutor::new(style, source.root_node())?.run()
}

/// The single piece of mutable state threaded through a transformation.
///
/// The current node, proximity position and context size travel as arguments
/// through the recursion, so every instruction restores them on every exit
/// path simply by returning. The insertion point and the variable scope stack
/// live here and are saved and restored around the constructs that move them.
pub struct TemplateExecutor<'s, 'a, N: XPathNode<'a> + 'a> {
    pub(crate) stylesheet: &'s Stylesheet,
    pub(crate) root: N,
    pub(crate) result: ResultDocument,
    pub(crate) insert: NodeId,
    scopes: Vec<HashMap<String, XPathValue<N>>>,
    _marker: PhantomData<&'a ()>,
}

impl<'s, 'a, N: XPathNode<'a> + 'a> TemplateExecutor<'s, 'a, N> {
    pub fn new(stylesheet: &'s Stylesheet, root: N) -> Result<Self, XsltError> {
        let method = match stylesheet.output.method.as_deref() {
            None | Some("xml") => OutputMethod::Xml,
            Some("html") => OutputMethod::Html,
            Some("text") => OutputMethod::Text,
            Some(other) => return Err(XsltError::UnknownOutputMethod(other.to_string())),
        };

        let mut result = ResultDocument::new(method);
        result.version = stylesheet.output.version.clone();
        result.encoding = stylesheet.output.encoding.clone();
        if method == OutputMethod::Html
            && (stylesheet.output.doctype_public.is_some()
                || stylesheet.output.doctype_system.is_some())
        {
            result.doctype = Some(DocType {
                name: "html".to_string(),
                public_id: stylesheet.output.doctype_public.clone(),
                system_id: stylesheet.output.doctype_system.clone(),
            });
        }

        let insert = result.root();
        Ok(Self {
            stylesheet,
            root,
            result,
            insert,
            scopes: vec![HashMap::new()],
            _marker: PhantomData,
        })
    }

    /// Drives the whole transformation: global variables, the source root,
    /// and the final doctype.
    pub fn run(mut self) -> Result<ResultDocument, XsltError> {
        self.evaluate_globals()?;
        self.process_node(self.root, 1, 1)?;
        self.attach_doctype();
        Ok(self.result)
    }

    fn evaluate_globals(&mut self) -> Result<(), XsltError> {
        let sheet = self.stylesheet;
        for decl in &sheet.globals {
            let value = self.variable_value(&decl.select, &decl.body, self.root, 1, 1)?;
            self.scopes[0].insert(decl.name.clone(), value);
        }
        Ok(())
    }

    /// XML output with declared doctype identifiers names the DTD after the
    /// result's root element.
    fn attach_doctype(&mut self) {
        let output = &self.stylesheet.output;
        if self.result.method == OutputMethod::Xml
            && (output.doctype_public.is_some() || output.doctype_system.is_some())
            && let Some(root_element) = self.result.root_element()
            && let ResultKind::Element { name, namespace, .. } = self.result.kind(root_element)
        {
            let qname = match namespace {
                Some(Namespace {
                    prefix: Some(prefix),
                    ..
                }) => format!("{prefix}:{name}"),
                _ => name.clone(),
            };
            self.result.doctype = Some(DocType {
                name: qname,
                public_id: output.doctype_public.clone(),
                system_id: output.doctype_system.clone(),
            });
        }
    }

    /// Dispatches one source node: a matching template rule, or the built-in
    /// rules on a miss.
    pub(crate) fn process_node(
        &mut self,
        node: N,
        position: usize,
        size: usize,
    ) -> Result<(), XsltError> {
        let sheet = self.stylesheet;
        match sheet.rule_for(node, self.root) {
            Some(rule) => self.execute_body(&rule.body, node, position, size, None),
            None => self.builtin_rule(node),
        }
    }

    /// The built-in template rules: recurse through element content, copy
    /// text, stay silent on everything else.
    fn builtin_rule(&mut self, node: N) -> Result<(), XsltError> {
        match node.kind() {
            NodeKind::Root | NodeKind::Element => {
                let children = self.applicable_children(node);
                let size = children.len();
                for (i, child) in children.into_iter().enumerate() {
                    match child.kind() {
                        NodeKind::Root | NodeKind::Element => {
                            self.process_node(child, i + 1, size)?;
                        }
                        NodeKind::Text => self.copy_text(child),
                        _ => {}
                    }
                }
                Ok(())
            }
            NodeKind::Text => {
                self.copy_text(node);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn copy_text(&mut self, node: N) {
        let content = node.string_value();
        if !content.is_empty() {
            self.result.append_text(self.insert, &content, false);
        }
    }

    /// The children a default selection covers: elements, and text that
    /// survives whitespace stripping. Comments and PIs are not selected.
    pub(crate) fn applicable_children(&self, node: N) -> Vec<N> {
        node.children()
            .filter(|child| match child.kind() {
                NodeKind::Root | NodeKind::Element => true,
                NodeKind::Text => !self.strips(*child),
                _ => false,
            })
            .collect()
    }

    /// Whether a text node is a blank node elided by the stylesheet's
    /// strip-space declarations.
    pub(crate) fn strips(&self, text: N) -> bool {
        let content = text.string_value();
        if content.is_empty()
            || !content.chars().all(|c| matches!(c, ' ' | '\t' | '\n' | '\r'))
        {
            return false;
        }
        text.parent()
            .and_then(|p| p.name())
            .is_some_and(|q| self.stylesheet.space_handling(q.local) == SpaceHandling::Strip)
    }

    /// Runs a template body against a context node. Each activation gets its
    /// own variable frame; `params` carries the values a `call-template`
    /// passed for the body's `xsl:param` declarations.
    pub(crate) fn execute_body(
        &mut self,
        body: &[Instruction],
        node: N,
        position: usize,
        size: usize,
        mut params: Option<HashMap<String, XPathValue<N>>>,
    ) -> Result<(), XsltError> {
        self.scopes.push(HashMap::new());
        let outcome = self.run_body(body, node, position, size, &mut params);
        self.scopes.pop();
        outcome
    }

    fn run_body(
        &mut self,
        body: &[Instruction],
        node: N,
        position: usize,
        size: usize,
        params: &mut Option<HashMap<String, XPathValue<N>>>,
    ) -> Result<(), XsltError> {
        for instruction in body {
            match instruction {
                Instruction::Text(text) => {
                    if !text.is_empty() {
                        self.result.append_text(self.insert, text, false);
                    }
                }
                Instruction::LiteralElement {
                    name,
                    namespace,
                    preferred_prefix,
                    ns_decls,
                    attributes,
                    body,
                } => literals::literal_element(
                    self,
                    name,
                    namespace.as_deref(),
                    preferred_prefix.as_deref(),
                    ns_decls,
                    attributes,
                    body,
                    node,
                    position,
                    size,
                )?,
                Instruction::ApplyTemplates { select, sort_keys } => {
                    apply_templates::handle(self, select, sort_keys, node, position, size)?;
                }
                Instruction::CallTemplate {
                    name,
                    params: with_params,
                } => {
                    call_template::handle(self, name.as_deref(), with_params, node, position, size)?;
                }
                Instruction::ValueOf {
                    select,
                    disable_escaping,
                } => literals::value_of(self, select, *disable_escaping, node, position, size),
                Instruction::If { test, body } => {
                    control_flow::handle_if(self, test, body, node, position, size)?;
                }
                Instruction::ForEach {
                    select,
                    sort_keys,
                    body,
                } => {
                    control_flow::handle_for_each(
                        self, select, sort_keys, body, node, position, size,
                    )?;
                }
                Instruction::Variable {
                    name,
                    select,
                    body,
                } => {
                    let value = self.variable_value(select, body, node, position, size)?;
                    self.set_variable(name, value);
                }
                Instruction::Param {
                    name,
                    select,
                    body,
                } => {
                    let value = match params.as_mut().and_then(|map| map.remove(name)) {
                        Some(passed) => passed,
                        None => self.variable_value(select, body, node, position, size)?,
                    };
                    self.set_variable(name, value);
                }
                Instruction::Attribute {
                    name,
                    namespace,
                    body,
                } => nodes::attribute(self, name, namespace, body, node, position, size)?,
                Instruction::Comment { body } => {
                    nodes::comment(self, body, node, position, size)?;
                }
                Instruction::ProcessingInstruction { name, body } => {
                    nodes::processing_instruction(self, name, body, node, position, size)?;
                }
                Instruction::Element { name } => {
                    let tag = name
                        .as_ref()
                        .map(|avt| self.eval_avt(avt, node, position, size))
                        .unwrap_or_default();
                    warn!("xsl:element '{tag}' is not implemented; the instruction is skipped");
                }
            }
        }
        Ok(())
    }

    // --- Evaluation plumbing shared by the handlers ---

    fn merged_variables(&self) -> HashMap<String, XPathValue<N>> {
        let mut merged = HashMap::new();
        for scope in &self.scopes {
            merged.extend(scope.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        merged
    }

    fn set_variable(&mut self, name: &str, value: XPathValue<N>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), value);
        }
    }

    pub(crate) fn eval(
        &self,
        expr: &Expr,
        node: N,
        position: usize,
        size: usize,
    ) -> Result<XPathValue<N>, XPathError> {
        let variables = self.merged_variables();
        let ctx = XPathContext::new(node, self.root, position, size, &variables);
        evaluate(expr, &ctx)
    }

    /// Instantiates an attribute value template to its string.
    pub(crate) fn eval_avt(&self, avt: &Avt, node: N, position: usize, size: usize) -> String {
        let mut out = String::new();
        for part in &avt.parts {
            match part {
                AvtPart::Literal(text) => out.push_str(text),
                AvtPart::Expr(expr) => match self.eval(expr, node, position, size) {
                    Ok(value) => out.push_str(&value.string_value()),
                    Err(e) => warn!("attribute value template evaluation failed: {e}"),
                },
            }
        }
        out
    }

    /// The value of a variable-like construct: its `select` expression, or
    /// its body instantiated to a string.
    pub(crate) fn variable_value(
        &mut self,
        select: &Option<Expr>,
        body: &[Instruction],
        node: N,
        position: usize,
        size: usize,
    ) -> Result<XPathValue<N>, XsltError> {
        match select {
            Some(expr) => match self.eval(expr, node, position, size) {
                Ok(value) => Ok(value),
                Err(e) => {
                    warn!("variable evaluation failed: {e}");
                    Ok(XPathValue::String(String::new()))
                }
            },
            None if !body.is_empty() => Ok(XPathValue::String(
                self.body_to_string(body, node, position, size)?,
            )),
            None => Ok(XPathValue::String(String::new())),
        }
    }

    /// Instantiates a body and returns the text it would have emitted. The
    /// body runs against a scratch document, so nothing of it can reach the
    /// real result tree.
    pub(crate) fn body_to_string(
        &mut self,
        body: &[Instruction],
        node: N,
        position: usize,
        size: usize,
    ) -> Result<String, XsltError> {
        let saved_result =
            std::mem::replace(&mut self.result, ResultDocument::new(OutputMethod::Text));
        let saved_insert = self.insert;
        self.insert = self.result.root();

        let outcome = self.execute_body(body, node, position, size, None);
        let text = self.result.text_content(self.result.root());

        self.result = saved_result;
        self.insert = saved_insert;
        outcome.map(|_| text)
    }
}
