//! The result document under construction.
//!
//! The tree only ever grows by appending under an insertion point, so every
//! node is reachable from the root and previously written subtrees are never
//! mutated. Node handles are arena ids owned by the document.

use crate::output::OutputMethod;

/// Handle to a node of a [`ResultDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// A namespace binding: a prefix (or the default namespace) and a URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub prefix: Option<String>,
    pub uri: String,
}

/// An attribute of a result element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultAttr {
    pub name: String,
    pub namespace: Option<Namespace>,
    pub value: String,
}

/// The document type declaration attached by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocType {
    pub name: String,
    pub public_id: Option<String>,
    pub system_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ResultKind {
    Document,
    Element {
        name: String,
        namespace: Option<Namespace>,
        attributes: Vec<ResultAttr>,
        ns_decls: Vec<Namespace>,
    },
    Text {
        content: String,
        /// Set by `disable-output-escaping="yes"`; the serializer writes the
        /// content without escaping.
        raw: bool,
    },
    Comment {
        content: String,
    },
    ProcessingInstruction {
        target: String,
        data: String,
    },
}

#[derive(Debug)]
struct ResultNode {
    kind: ResultKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug)]
pub struct ResultDocument {
    nodes: Vec<ResultNode>,
    pub method: OutputMethod,
    pub version: Option<String>,
    /// Always UTF-8 in memory; a declared encoding is carried for the
    /// serialized declaration.
    pub encoding: Option<String>,
    pub doctype: Option<DocType>,
}

impl ResultDocument {
    pub fn new(method: OutputMethod) -> Self {
        ResultDocument {
            nodes: vec![ResultNode {
                kind: ResultKind::Document,
                parent: None,
                children: Vec::new(),
            }],
            method,
            version: None,
            encoding: None,
            doctype: None,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The first element child of the document node, if any.
    pub fn root_element(&self) -> Option<NodeId> {
        self.nodes[0]
            .children
            .iter()
            .copied()
            .find(|id| matches!(self.nodes[id.0].kind, ResultKind::Element { .. }))
    }

    pub fn kind(&self, id: NodeId) -> &ResultKind {
        &self.nodes[id.0].kind
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn has_children(&self, id: NodeId) -> bool {
        !self.nodes[id.0].children.is_empty()
    }

    fn append(&mut self, parent: NodeId, kind: ResultKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(ResultNode {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn append_element(
        &mut self,
        parent: NodeId,
        name: String,
        namespace: Option<Namespace>,
        ns_decls: Vec<Namespace>,
    ) -> NodeId {
        self.append(
            parent,
            ResultKind::Element {
                name,
                namespace,
                attributes: Vec::new(),
                ns_decls,
            },
        )
    }

    /// Appends text under `parent`, merging into a preceding text sibling of
    /// the same escaping mode.
    pub fn append_text(&mut self, parent: NodeId, content: &str, raw: bool) -> NodeId {
        let last_child = self.nodes[parent.0].children.last().copied();
        if let Some(last) = last_child
            && let ResultKind::Text {
                content: existing,
                raw: existing_raw,
            } = &mut self.nodes[last.0].kind
            && *existing_raw == raw
        {
            existing.push_str(content);
            return last;
        }
        self.append(
            parent,
            ResultKind::Text {
                content: content.to_string(),
                raw,
            },
        )
    }

    pub fn append_comment(&mut self, parent: NodeId, content: String) -> NodeId {
        self.append(parent, ResultKind::Comment { content })
    }

    pub fn append_pi(&mut self, parent: NodeId, target: String, data: String) -> NodeId {
        self.append(parent, ResultKind::ProcessingInstruction { target, data })
    }

    /// Sets an attribute on an element, replacing an existing attribute with
    /// the same name and namespace. Returns false when the node cannot carry
    /// attributes.
    pub fn set_attribute(&mut self, id: NodeId, attr: ResultAttr) -> bool {
        match &mut self.nodes[id.0].kind {
            ResultKind::Element { attributes, .. } => {
                let ns_uri = attr.namespace.as_ref().map(|n| &n.uri);
                match attributes
                    .iter_mut()
                    .find(|a| a.name == attr.name && a.namespace.as_ref().map(|n| &n.uri) == ns_uri)
                {
                    Some(existing) => *existing = attr,
                    None => attributes.push(attr),
                }
                true
            }
            _ => false,
        }
    }

    /// Searches from `from` upward for an in-scope binding of `uri`.
    pub fn namespace_for_uri(&self, from: NodeId, uri: &str) -> Option<Namespace> {
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            if let ResultKind::Element {
                namespace,
                ns_decls,
                ..
            } = &self.nodes[id.0].kind
            {
                if let Some(ns) = namespace
                    && ns.uri == uri
                {
                    return Some(ns.clone());
                }
                if let Some(ns) = ns_decls.iter().find(|ns| ns.uri == uri) {
                    return Some(ns.clone());
                }
            }
            cursor = self.nodes[id.0].parent;
        }
        None
    }

    /// Resolves a prefix against the in-scope declarations at `from`.
    pub fn uri_for_prefix(&self, from: NodeId, prefix: &str) -> Option<String> {
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            if let ResultKind::Element {
                namespace,
                ns_decls,
                ..
            } = &self.nodes[id.0].kind
            {
                if let Some(ns) = ns_decls.iter().find(|ns| ns.prefix.as_deref() == Some(prefix)) {
                    return Some(ns.uri.clone());
                }
                if let Some(ns) = namespace
                    && ns.prefix.as_deref() == Some(prefix)
                {
                    return Some(ns.uri.clone());
                }
            }
            cursor = self.nodes[id.0].parent;
        }
        None
    }

    /// Rebinds the namespace of an element node.
    pub fn set_element_namespace(&mut self, id: NodeId, ns: Option<Namespace>) {
        if let ResultKind::Element { namespace, .. } = &mut self.nodes[id.0].kind {
            *namespace = ns;
        }
    }

    /// Declares a namespace on an element unless an identical binding is
    /// already present there.
    pub fn declare_namespace(&mut self, id: NodeId, ns: Namespace) {
        if let ResultKind::Element { ns_decls, .. } = &mut self.nodes[id.0].kind
            && !ns_decls.contains(&ns)
        {
            ns_decls.push(ns);
        }
    }

    /// The concatenated text content of a subtree.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut stack: Vec<NodeId> = self.nodes[id.0].children.iter().rev().copied().collect();
        if let ResultKind::Text { content, .. } = &self.nodes[id.0].kind {
            out.push_str(content);
        }
        while let Some(next) = stack.pop() {
            if let ResultKind::Text { content, .. } = &self.nodes[next.0].kind {
                out.push_str(content);
            }
            stack.extend(self.nodes[next.0].children.iter().rev().copied());
        }
        out
    }
}
