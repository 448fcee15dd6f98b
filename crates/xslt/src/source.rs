//! The source document: a roxmltree-backed tree exposed through the
//! [`XPathNode`] contract.

use larix_xpath1::{ExpandedName, NodeKind, XPathNode};
use roxmltree::Node;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// An owned, parsed source document.
pub struct XmlDocument<'input> {
    doc: roxmltree::Document<'input>,
}

impl<'input> XmlDocument<'input> {
    pub fn parse(text: &'input str) -> Result<Self, roxmltree::Error> {
        let doc = roxmltree::Document::parse(text)?;
        Ok(Self { doc })
    }

    pub fn root_node(&self) -> SourceNode<'_, 'input> {
        SourceNode::Tree(self.doc.root())
    }
}

/// A node of the source tree. roxmltree models attributes as data on their
/// element rather than as navigable nodes, so they get a dedicated variant
/// addressed by (owner, index).
#[derive(Debug, Clone, Copy)]
pub enum SourceNode<'a, 'input> {
    Tree(Node<'a, 'input>),
    Attr { owner: Node<'a, 'input>, index: usize },
}

impl PartialEq for SourceNode<'_, '_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SourceNode::Tree(a), SourceNode::Tree(b)) => a.id() == b.id(),
            (
                SourceNode::Attr { owner: a, index: i },
                SourceNode::Attr { owner: b, index: j },
            ) => a.id() == b.id() && i == j,
            _ => false,
        }
    }
}

impl Eq for SourceNode<'_, '_> {}

impl PartialOrd for SourceNode<'_, '_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Document order; an element precedes its own attributes.
impl Ord for SourceNode<'_, '_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SourceNode::Tree(a), SourceNode::Tree(b)) => a.id().get().cmp(&b.id().get()),
            (
                SourceNode::Attr { owner: a, index: i },
                SourceNode::Attr { owner: b, index: j },
            ) => a.id().get().cmp(&b.id().get()).then(i.cmp(j)),
            (SourceNode::Tree(e), SourceNode::Attr { owner, .. }) => {
                if e.id() == owner.id() {
                    Ordering::Less
                } else {
                    e.id().get().cmp(&owner.id().get())
                }
            }
            (SourceNode::Attr { owner, .. }, SourceNode::Tree(e)) => {
                if owner.id() == e.id() {
                    Ordering::Greater
                } else {
                    owner.id().get().cmp(&e.id().get())
                }
            }
        }
    }
}

impl Hash for SourceNode<'_, '_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            SourceNode::Tree(node) => {
                0u8.hash(state);
                node.id().hash(state);
            }
            SourceNode::Attr { owner, index } => {
                1u8.hash(state);
                owner.id().hash(state);
                index.hash(state);
            }
        }
    }
}

impl<'a> XPathNode<'a> for SourceNode<'a, 'a> {
    fn kind(&self) -> NodeKind {
        match self {
            SourceNode::Tree(node) => {
                if node.is_root() {
                    NodeKind::Root
                } else if node.is_element() {
                    NodeKind::Element
                } else if node.is_text() {
                    // CDATA sections arrive merged into text nodes.
                    NodeKind::Text
                } else if node.is_comment() {
                    NodeKind::Comment
                } else if node.is_pi() {
                    NodeKind::ProcessingInstruction
                } else {
                    NodeKind::Element
                }
            }
            SourceNode::Attr { .. } => NodeKind::Attribute,
        }
    }

    fn name(&self) -> Option<ExpandedName<'a>> {
        match self {
            SourceNode::Tree(node) => {
                if node.is_element() {
                    Some(ExpandedName::local(node.tag_name().name()))
                } else if node.is_pi() {
                    node.pi().map(|pi| ExpandedName::local(pi.target))
                } else {
                    None
                }
            }
            SourceNode::Attr { owner, index } => owner.attributes().nth(*index).map(|attr| {
                let prefix = (attr.namespace() == Some("http://www.w3.org/XML/1998/namespace"))
                    .then_some("xml");
                ExpandedName {
                    prefix,
                    local: attr.name(),
                }
            }),
        }
    }

    fn string_value(&self) -> String {
        match self {
            SourceNode::Tree(node) => {
                if node.is_element() || node.is_root() {
                    node.descendants()
                        .filter(|n| n.is_text())
                        .filter_map(|n| n.text())
                        .collect()
                } else if node.is_pi() {
                    node.pi()
                        .and_then(|pi| pi.value)
                        .unwrap_or_default()
                        .to_string()
                } else {
                    node.text().unwrap_or_default().to_string()
                }
            }
            SourceNode::Attr { owner, index } => owner
                .attributes()
                .nth(*index)
                .map(|attr| attr.value().to_string())
                .unwrap_or_default(),
        }
    }

    fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
        match self {
            SourceNode::Tree(node) => {
                let owner = *node;
                let count = node.attributes().len();
                Box::new((0..count).map(move |index| SourceNode::Attr { owner, index }))
            }
            SourceNode::Attr { .. } => Box::new(std::iter::empty()),
        }
    }

    fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
        match self {
            SourceNode::Tree(node) => Box::new(node.children().map(SourceNode::Tree)),
            SourceNode::Attr { .. } => Box::new(std::iter::empty()),
        }
    }

    fn parent(&self) -> Option<Self> {
        match self {
            SourceNode::Tree(node) => node.parent().map(SourceNode::Tree),
            SourceNode::Attr { owner, .. } => Some(SourceNode::Tree(*owner)),
        }
    }
}
