//! The output declaration and the serializer for the three output methods.

use crate::error::XsltError;
use crate::tree::{Namespace, ResultDocument, ResultKind};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};

/// The resolved output method of a transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMethod {
    #[default]
    Xml,
    Html,
    Text,
}

/// The `xsl:output` declaration, as written in the stylesheet. The method is
/// kept verbatim; the driver resolves it and treats unknown values as fatal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputSpec {
    pub method: Option<String>,
    pub version: Option<String>,
    pub encoding: Option<String>,
    pub doctype_public: Option<String>,
    pub doctype_system: Option<String>,
}

/// HTML elements serialized without a closing tag.
const HTML_VOID: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Serializes a result document according to its output method.
pub fn serialize(doc: &ResultDocument) -> Result<String, XsltError> {
    match doc.method {
        OutputMethod::Text => Ok(doc.text_content(doc.root())),
        OutputMethod::Xml => serialize_xml(doc),
        OutputMethod::Html => serialize_html(doc),
    }
}

fn serialize_xml(doc: &ResultDocument) -> Result<String, XsltError> {
    let mut writer = Writer::new(Vec::new());

    if doc.version.is_some() || doc.encoding.is_some() {
        let version = doc.version.clone().unwrap_or_else(|| "1.0".to_string());
        let encoding = doc.encoding.clone().unwrap_or_else(|| "UTF-8".to_string());
        emit(
            &mut writer,
            Event::Decl(BytesDecl::new(&version, Some(&encoding), None)),
        )?;
    }

    if let Some(doctype) = &doc.doctype {
        let mut text = doctype.name.clone();
        match (&doctype.public_id, &doctype.system_id) {
            (Some(public), Some(system)) => {
                text.push_str(&format!(" PUBLIC \"{public}\" \"{system}\""));
            }
            (Some(public), None) => text.push_str(&format!(" PUBLIC \"{public}\"")),
            (None, Some(system)) => text.push_str(&format!(" SYSTEM \"{system}\"")),
            (None, None) => {}
        }
        emit(&mut writer, Event::DocType(BytesText::from_escaped(text)))?;
    }

    for &child in doc.children(doc.root()) {
        write_node(doc, child, &mut writer, false)?;
    }
    finish(writer)
}

fn serialize_html(doc: &ResultDocument) -> Result<String, XsltError> {
    let mut writer = Writer::new(Vec::new());

    if let Some(doctype) = &doc.doctype {
        let mut text = doctype.name.clone();
        match (&doctype.public_id, &doctype.system_id) {
            (Some(public), Some(system)) => {
                text.push_str(&format!(" PUBLIC \"{public}\" \"{system}\""));
            }
            (Some(public), None) => text.push_str(&format!(" PUBLIC \"{public}\"")),
            (None, Some(system)) => text.push_str(&format!(" SYSTEM \"{system}\"")),
            (None, None) => {}
        }
        emit(&mut writer, Event::DocType(BytesText::from_escaped(text)))?;
    }

    for &child in doc.children(doc.root()) {
        write_node(doc, child, &mut writer, true)?;
    }
    finish(writer)
}

fn write_node(
    doc: &ResultDocument,
    id: crate::tree::NodeId,
    writer: &mut Writer<Vec<u8>>,
    html: bool,
) -> Result<(), XsltError> {
    match doc.kind(id) {
        ResultKind::Document => {}
        ResultKind::Element {
            name,
            namespace,
            attributes,
            ns_decls,
        } => {
            let qname = qualified(name, namespace);
            let mut start = BytesStart::new(qname.clone());
            for ns in ns_decls {
                match &ns.prefix {
                    Some(prefix) => {
                        start.push_attribute((format!("xmlns:{prefix}").as_str(), ns.uri.as_str()))
                    }
                    None => start.push_attribute(("xmlns", ns.uri.as_str())),
                }
            }
            for attr in attributes {
                let attr_name = match &attr.namespace {
                    Some(Namespace {
                        prefix: Some(prefix),
                        ..
                    }) => format!("{prefix}:{}", attr.name),
                    _ => attr.name.clone(),
                };
                start.push_attribute((attr_name.as_str(), attr.value.as_str()));
            }

            let children = doc.children(id);
            if html {
                emit(writer, Event::Start(start))?;
                if HTML_VOID.contains(&name.to_ascii_lowercase().as_str()) {
                    return Ok(());
                }
                for &child in children {
                    write_node(doc, child, writer, html)?;
                }
                emit(writer, Event::End(BytesEnd::new(qname)))?;
            } else if children.is_empty() {
                emit(writer, Event::Empty(start))?;
            } else {
                emit(writer, Event::Start(start))?;
                for &child in children {
                    write_node(doc, child, writer, html)?;
                }
                emit(writer, Event::End(BytesEnd::new(qname)))?;
            }
        }
        ResultKind::Text { content, raw } => {
            let event = if *raw {
                Event::Text(BytesText::from_escaped(content.as_str()))
            } else {
                Event::Text(BytesText::new(content))
            };
            emit(writer, event)?;
        }
        ResultKind::Comment { content } => {
            emit(
                writer,
                Event::Comment(BytesText::from_escaped(content.as_str())),
            )?;
        }
        ResultKind::ProcessingInstruction { target, data } => {
            let content = if data.is_empty() {
                target.clone()
            } else {
                format!("{target} {data}")
            };
            emit(writer, Event::PI(BytesPI::new(content)))?;
        }
    }
    Ok(())
}

fn qualified(name: &str, namespace: &Option<Namespace>) -> String {
    match namespace {
        Some(Namespace {
            prefix: Some(prefix),
            ..
        }) => format!("{prefix}:{name}"),
        _ => name.to_string(),
    }
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), XsltError> {
    writer
        .write_event(event)
        .map_err(|e| XsltError::Serialize(e.to_string()))
}

fn finish(writer: Writer<Vec<u8>>) -> Result<String, XsltError> {
    String::from_utf8(writer.into_inner()).map_err(|e| XsltError::Serialize(e.to_string()))
}
