//! Compiles a stylesheet document into its executable form.
//!
//! Whitespace-only text between stylesheet elements is dropped here; the
//! executor trusts that template text it sees is significant. Instructions
//! with missing or unparsable required attributes are reported through the
//! `log` facade and compiled to no-ops, so a bad instruction never takes the
//! whole stylesheet down.

use crate::ast::*;
use crate::error::XsltError;
use crate::pattern;
use larix_xpath1::{Expr, parse_expression};
use log::warn;
use roxmltree::Node;

pub fn compile(source: &str) -> Result<Stylesheet, XsltError> {
    let doc = roxmltree::Document::parse(source)?;
    let root = doc.root_element();
    if root.tag_name().namespace() != Some(XSLT_NS)
        || !matches!(root.tag_name().name(), "stylesheet" | "transform")
    {
        return Err(XsltError::Compile(
            "document root must be xsl:stylesheet or xsl:transform".to_string(),
        ));
    }

    let mut sheet = Stylesheet::default();
    for child in root.children().filter(|c| c.is_element()) {
        if child.tag_name().namespace() != Some(XSLT_NS) {
            // Foreign top-level elements are permitted and carry no meaning here.
            continue;
        }
        match child.tag_name().name() {
            "template" => compile_template(child, &mut sheet)?,
            "output" => {
                sheet.output.method = child.attribute("method").map(str::to_string);
                sheet.output.version = child.attribute("version").map(str::to_string);
                sheet.output.encoding = child.attribute("encoding").map(str::to_string);
                sheet.output.doctype_public =
                    child.attribute("doctype-public").map(str::to_string);
                sheet.output.doctype_system =
                    child.attribute("doctype-system").map(str::to_string);
            }
            "strip-space" => space_entries(child, SpaceHandling::Strip, &mut sheet),
            "preserve-space" => space_entries(child, SpaceHandling::Preserve, &mut sheet),
            "variable" | "param" => {
                let Some(name) = child.attribute("name") else {
                    warn!("top-level xsl:variable without a name; ignored");
                    continue;
                };
                sheet.globals.push(VariableDecl {
                    name: name.to_string(),
                    select: optional_expr(child, "select"),
                    body: compile_children(child),
                });
            }
            other => warn!("ignoring unknown top-level element xsl:{other}"),
        }
    }
    Ok(sheet)
}

fn compile_template(node: Node, sheet: &mut Stylesheet) -> Result<(), XsltError> {
    let body = compile_children(node);

    if let Some(name) = node.attribute("name") {
        let (local, ns_uri) = resolve_qname(node, name);
        sheet.named.insert((local, ns_uri), body.clone());
    }

    if let Some(match_text) = node.attribute("match") {
        let pattern = pattern::parse(match_text)?;
        let priority = match node.attribute("priority") {
            Some(text) => text.parse().unwrap_or_else(|_| {
                warn!("invalid template priority '{text}'; using the default");
                pattern.default_priority()
            }),
            None => pattern.default_priority(),
        };
        sheet.rules.push(TemplateRule {
            pattern,
            priority,
            mode: node.attribute("mode").map(str::to_string),
            body,
        });
    } else if node.attribute("name").is_none() {
        warn!("xsl:template needs a match pattern or a name; ignored");
    }
    Ok(())
}

fn space_entries(node: Node, handling: SpaceHandling, sheet: &mut Stylesheet) {
    match node.attribute("elements") {
        Some(elements) => {
            for name in elements.split_whitespace() {
                // Entries are keyed by local name; a QName keeps its local part.
                let local = name.rsplit(':').next().unwrap_or(name);
                sheet.strip_space.insert(local.to_string(), handling);
            }
        }
        None => warn!("strip-space/preserve-space without an elements attribute; ignored"),
    }
}

/// Compiles the element children and significant text of `parent` into a body.
fn compile_children(parent: Node) -> Vec<Instruction> {
    compile_nodes(parent.children())
}

fn compile_nodes<'a, 'input: 'a>(
    nodes: impl Iterator<Item = Node<'a, 'input>>,
) -> Vec<Instruction> {
    let mut body = Vec::new();
    for child in nodes {
        if child.is_text() {
            let text = child.text().unwrap_or_default();
            if !text.trim().is_empty() {
                body.push(Instruction::Text(text.to_string()));
            }
        } else if child.is_element() {
            if child.tag_name().namespace() == Some(XSLT_NS) {
                if let Some(instruction) = compile_instruction(child) {
                    body.push(instruction);
                }
            } else {
                body.push(compile_literal_element(child));
            }
        }
        // Comments and processing instructions in the stylesheet are inert.
    }
    body
}

fn compile_instruction(node: Node) -> Option<Instruction> {
    let name = node.tag_name().name();
    match name {
        "apply-templates" => {
            let (sort_keys, rest) = sort_prelude(node);
            for stray in rest.iter().filter(|n| n.is_element()) {
                if is_xsl(stray, "with-param") {
                    // Parameters on apply-templates are not supported.
                    warn!("xsl:with-param on xsl:apply-templates is ignored");
                } else {
                    warn!(
                        "misplaced {} under xsl:apply-templates",
                        stray.tag_name().name()
                    );
                }
            }
            // A present-but-unparsable select must not fall back to the
            // child list; the whole instruction becomes a no-op instead.
            let select = match node.attribute("select") {
                Some(text) => match parse_attr_expr(node, text) {
                    Some(expr) => Some(expr),
                    None => return None,
                },
                None => None,
            };
            Some(Instruction::ApplyTemplates { select, sort_keys })
        }
        "call-template" => {
            let mut params = Vec::new();
            for child in node.children().filter(|c| c.is_element()) {
                if is_xsl(&child, "with-param") {
                    let Some(param_name) = child.attribute("name") else {
                        warn!("xsl:with-param without a name; ignored");
                        continue;
                    };
                    params.push(WithParam {
                        name: param_name.to_string(),
                        select: optional_expr(child, "select"),
                        body: compile_children(child),
                    });
                } else {
                    warn!(
                        "misplaced {} under xsl:call-template",
                        child.tag_name().name()
                    );
                }
            }
            Some(Instruction::CallTemplate {
                name: required_attr(node, "name").map(str::to_string),
                params,
            })
        }
        "value-of" => {
            let disable_escaping = match node.attribute("disable-output-escaping") {
                Some("yes") => true,
                Some("no") | None => false,
                Some(other) => {
                    warn!("unknown disable-output-escaping value '{other}'");
                    false
                }
            };
            Some(Instruction::ValueOf {
                select: required_expr(node, "select"),
                disable_escaping,
            })
        }
        "if" => Some(Instruction::If {
            test: required_expr(node, "test"),
            body: compile_children(node),
        }),
        "for-each" => {
            let (sort_keys, rest) = sort_prelude(node);
            Some(Instruction::ForEach {
                select: required_expr(node, "select"),
                sort_keys,
                body: compile_nodes(rest.into_iter()),
            })
        }
        "sort" => {
            warn!("xsl:sort is only allowed at the start of for-each or apply-templates");
            None
        }
        "attribute" => Some(Instruction::Attribute {
            name: required_avt(node, "name"),
            namespace: node.attribute("namespace").map(parse_avt),
            body: compile_children(node),
        }),
        "comment" => Some(Instruction::Comment {
            body: compile_children(node),
        }),
        "processing-instruction" => Some(Instruction::ProcessingInstruction {
            name: required_avt(node, "name"),
            body: compile_children(node),
        }),
        "text" => {
            let text: String = node.children().filter_map(|c| c.text()).collect();
            Some(Instruction::Text(text))
        }
        "variable" | "param" => {
            let Some(var_name) = node.attribute("name") else {
                warn!("xsl:{name} without a name; ignored");
                return None;
            };
            let select = optional_expr(node, "select");
            let body = compile_children(node);
            Some(if name == "param" {
                Instruction::Param {
                    name: var_name.to_string(),
                    select,
                    body,
                }
            } else {
                Instruction::Variable {
                    name: var_name.to_string(),
                    select,
                    body,
                }
            })
        }
        "with-param" => {
            warn!("xsl:with-param must be a direct child of xsl:call-template");
            None
        }
        "element" => Some(Instruction::Element {
            name: required_avt(node, "name"),
        }),
        other => {
            warn!("unknown stylesheet element xsl:{other} in a template body; skipped");
            None
        }
    }
}

fn compile_literal_element(node: Node) -> Instruction {
    let tag = node.tag_name();
    let namespace = tag.namespace().map(str::to_string);
    let preferred_prefix = namespace.as_deref().and_then(|uri| {
        node.namespaces()
            .find(|ns| ns.uri() == uri)
            .and_then(|ns| ns.name().map(str::to_string))
    });

    let attributes = node
        .attributes()
        .map(|attr| LiteralAttr {
            name: attr.name().to_string(),
            namespace: attr.namespace().map(str::to_string),
            value: parse_avt(attr.value()),
        })
        .collect();

    Instruction::LiteralElement {
        name: tag.name().to_string(),
        namespace,
        preferred_prefix,
        ns_decls: own_namespaces(node),
        attributes,
        body: compile_children(node),
    }
}

/// The namespace declarations this element introduces: its in-scope bindings
/// minus the parent's, minus the XSLT and reserved xml namespaces.
fn own_namespaces(node: Node) -> Vec<NamespaceDecl> {
    let inherited: Vec<(Option<&str>, &str)> = node
        .parent()
        .map(|p| p.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
        .unwrap_or_default();
    node.namespaces()
        .filter(|ns| {
            ns.uri() != XSLT_NS
                && ns.name() != Some("xml")
                && !inherited.contains(&(ns.name(), ns.uri()))
        })
        .map(|ns| NamespaceDecl {
            prefix: ns.name().map(str::to_string),
            uri: ns.uri().to_string(),
        })
        .collect()
}

/// Splits the children of a for-each/apply-templates into the leading run of
/// `xsl:sort` elements and the remaining body nodes.
fn sort_prelude<'a, 'input>(node: Node<'a, 'input>) -> (Vec<SortKey>, Vec<Node<'a, 'input>>) {
    let mut keys = Vec::new();
    let mut rest = Vec::new();
    let mut in_prelude = true;
    for child in node.children() {
        if in_prelude {
            if child.is_element() && is_xsl(&child, "sort") {
                keys.push(SortKey {
                    select: optional_expr(child, "select"),
                    data_type: child.attribute("data-type").map(parse_avt),
                    order: child.attribute("order").map(parse_avt),
                });
                continue;
            }
            if child.is_text() && child.text().unwrap_or_default().trim().is_empty() {
                continue;
            }
            in_prelude = false;
        }
        if child.is_element() && is_xsl(&child, "sort") {
            warn!("xsl:sort after the body has started; ignored");
            continue;
        }
        rest.push(child);
    }
    (keys, rest)
}

fn is_xsl(node: &Node, local: &str) -> bool {
    node.tag_name().namespace() == Some(XSLT_NS) && node.tag_name().name() == local
}

/// Resolves `prefix:local` against the node's in-scope namespaces. An
/// unprefixed name stays in no namespace.
fn resolve_qname(node: Node, qname: &str) -> (String, Option<String>) {
    match qname.split_once(':') {
        Some((prefix, local)) => {
            let uri = node
                .namespaces()
                .find(|ns| ns.name() == Some(prefix))
                .map(|ns| ns.uri().to_string());
            if uri.is_none() {
                warn!("undeclared namespace prefix '{prefix}' in '{qname}'");
            }
            (local.to_string(), uri)
        }
        None => (qname.to_string(), None),
    }
}

fn required_attr<'a, 'input>(node: Node<'a, 'input>, attr: &str) -> Option<&'a str> {
    let value = node.attribute(attr);
    if value.is_none() {
        warn!(
            "xsl:{} requires a {attr} attribute; the instruction is a no-op",
            node.tag_name().name()
        );
    }
    value
}

fn required_expr(node: Node, attr: &str) -> Option<Expr> {
    parse_attr_expr(node, required_attr(node, attr)?)
}

fn optional_expr(node: Node, attr: &str) -> Option<Expr> {
    parse_attr_expr(node, node.attribute(attr)?)
}

fn parse_attr_expr(node: Node, text: &str) -> Option<Expr> {
    match parse_expression(text) {
        Ok(expr) => Some(expr),
        Err(e) => {
            warn!(
                "bad expression on xsl:{}: {e}; the instruction is a no-op",
                node.tag_name().name()
            );
            None
        }
    }
}

fn required_avt(node: Node, attr: &str) -> Option<Avt> {
    required_attr(node, attr).map(parse_avt)
}

/// Parses an attribute value template: literal text with `{expression}`
/// substitutions; `{{` and `}}` escape the braces. Embedded expressions defer
/// to the XPath parser.
pub(crate) fn parse_avt(text: &str) -> Avt {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                if !literal.is_empty() {
                    parts.push(AvtPart::Literal(std::mem::take(&mut literal)));
                }
                let mut expr_text = String::new();
                let mut quote: Option<char> = None;
                for next in chars.by_ref() {
                    match quote {
                        Some(q) if next == q => {
                            quote = None;
                            expr_text.push(next);
                        }
                        Some(_) => expr_text.push(next),
                        None if next == '\'' || next == '"' => {
                            quote = Some(next);
                            expr_text.push(next);
                        }
                        None if next == '}' => break,
                        None => expr_text.push(next),
                    }
                }
                match parse_expression(&expr_text) {
                    Ok(expr) => parts.push(AvtPart::Expr(expr)),
                    Err(e) => warn!("bad expression in attribute value template: {e}"),
                }
            }
            other => literal.push(other),
        }
    }
    if !literal.is_empty() {
        parts.push(AvtPart::Literal(literal));
    }
    Avt { parts }
}
