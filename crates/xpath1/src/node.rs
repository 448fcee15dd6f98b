//! The contract for a navigable, read-only tree the evaluator walks.

use std::hash::Hash;

/// A qualified name split into its optional prefix and local part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExpandedName<'a> {
    pub prefix: Option<&'a str>,
    pub local: &'a str,
}

impl<'a> ExpandedName<'a> {
    pub fn local(local: &'a str) -> Self {
        ExpandedName {
            prefix: None,
            local,
        }
    }
}

impl std::fmt::Display for ExpandedName<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.prefix {
            Some(p) => write!(f, "{}:{}", p, self.local),
            None => write!(f, "{}", self.local),
        }
    }
}

/// Node kinds of the XPath 1.0 data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Root,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
}

/// A node in a read-only hierarchical document.
///
/// The XPath and XSLT engines are written exclusively against this trait, so
/// any tree that can answer these questions can serve as a source document.
/// Implementations are cheap handles (`Copy`); `Ord` must agree with document
/// order, which the engines rely on when merging node-sets.
///
/// `'a` is the lifetime of the underlying document.
pub trait XPathNode<'a>:
    std::fmt::Debug + Clone + Copy + PartialEq + Eq + Hash + PartialOrd + Ord
{
    fn kind(&self) -> NodeKind;

    /// The node's qualified name: element and attribute names, or the target
    /// of a processing instruction. `None` for unnamed kinds.
    fn name(&self) -> Option<ExpandedName<'a>>;

    /// The string value per the XPath 1.0 `string()` rules: text content for
    /// a text node, concatenated descendant text for elements and the root,
    /// the value for attributes, the content for comments and PIs.
    fn string_value(&self) -> String;

    /// Attribute nodes of an element; empty for every other kind.
    fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a>;

    /// Child nodes in document order; empty for leaf kinds.
    fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a>;

    /// The parent node; `None` for the root. Attributes report their owning
    /// element.
    fn parent(&self) -> Option<Self>;
}

/// A self-contained mock tree, public so downstream crates can exercise their
/// engine code against it.
pub mod tests {
    use super::*;
    use std::cmp::Ordering;
    use std::hash::Hasher;

    #[derive(Debug, Clone)]
    struct MockData<'a> {
        kind: NodeKind,
        name: Option<ExpandedName<'a>>,
        value: String,
        children: Vec<usize>,
        attributes: Vec<usize>,
        parent: Option<usize>,
    }

    #[derive(Debug, Default)]
    pub struct MockTree<'a> {
        nodes: Vec<MockData<'a>>,
    }

    /// A handle into a [`MockTree`]; ids are assigned in document order.
    #[derive(Debug, Clone, Copy)]
    pub struct MockNode<'a> {
        pub id: usize,
        pub tree: &'a MockTree<'a>,
    }

    impl PartialEq for MockNode<'_> {
        fn eq(&self, other: &Self) -> bool {
            self.id == other.id
        }
    }
    impl Eq for MockNode<'_> {}

    impl PartialOrd for MockNode<'_> {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            Some(self.cmp(other))
        }
    }
    impl Ord for MockNode<'_> {
        fn cmp(&self, other: &Self) -> Ordering {
            self.id.cmp(&other.id)
        }
    }

    impl Hash for MockNode<'_> {
        fn hash<H: Hasher>(&self, state: &mut H) {
            self.id.hash(state);
        }
    }

    impl<'a> XPathNode<'a> for MockNode<'a> {
        fn kind(&self) -> NodeKind {
            self.tree.nodes[self.id].kind
        }

        fn name(&self) -> Option<ExpandedName<'a>> {
            self.tree.nodes[self.id].name
        }

        fn string_value(&self) -> String {
            match self.kind() {
                NodeKind::Root | NodeKind::Element => {
                    let mut out = String::new();
                    let mut stack: Vec<usize> =
                        self.tree.nodes[self.id].children.iter().rev().copied().collect();
                    while let Some(id) = stack.pop() {
                        let data = &self.tree.nodes[id];
                        if data.kind == NodeKind::Text {
                            out.push_str(&data.value);
                        }
                        stack.extend(data.children.iter().rev().copied());
                    }
                    out
                }
                _ => self.tree.nodes[self.id].value.clone(),
            }
        }

        fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
            let tree = self.tree;
            let ids = tree.nodes[self.id].attributes.clone();
            Box::new(ids.into_iter().map(move |id| MockNode { id, tree }))
        }

        fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
            let tree = self.tree;
            let ids = tree.nodes[self.id].children.clone();
            Box::new(ids.into_iter().map(move |id| MockNode { id, tree }))
        }

        fn parent(&self) -> Option<Self> {
            self.tree.nodes[self.id].parent.map(|id| MockNode {
                id,
                tree: self.tree,
            })
        }
    }

    impl<'a> MockTree<'a> {
        pub fn node(&'a self, id: usize) -> MockNode<'a> {
            MockNode { id, tree: self }
        }

        fn push(&mut self, kind: NodeKind, name: Option<ExpandedName<'a>>, value: &str) -> usize {
            self.nodes.push(MockData {
                kind,
                name,
                value: value.to_string(),
                children: Vec::new(),
                attributes: Vec::new(),
                parent: None,
            });
            self.nodes.len() - 1
        }

        fn attach(&mut self, parent: usize, child: usize, attribute: bool) {
            self.nodes[child].parent = Some(parent);
            if attribute {
                self.nodes[parent].attributes.push(child);
            } else {
                self.nodes[parent].children.push(child);
            }
        }
    }

    /// Builds the shared fixture tree:
    ///
    /// ```text
    /// <doc>                         id 0 (root), 1 (<doc>)
    ///   <item key="b">beta</item>   id 2, attr 3, text 4
    ///   <item key="a">alpha</item>  id 5, attr 6, text 7
    ///   <!-- marker -->             id 8
    ///   <empty/>                    id 9
    ///   <?render flag?>             id 10
    /// </doc>
    /// ```
    pub fn sample_tree<'a>() -> MockTree<'a> {
        let mut tree = MockTree::default();
        let root = tree.push(NodeKind::Root, None, "");
        let doc = tree.push(NodeKind::Element, Some(ExpandedName::local("doc")), "");
        tree.attach(root, doc, false);

        let item1 = tree.push(NodeKind::Element, Some(ExpandedName::local("item")), "");
        tree.attach(doc, item1, false);
        let key1 = tree.push(NodeKind::Attribute, Some(ExpandedName::local("key")), "b");
        tree.attach(item1, key1, true);
        let text1 = tree.push(NodeKind::Text, None, "beta");
        tree.attach(item1, text1, false);

        let item2 = tree.push(NodeKind::Element, Some(ExpandedName::local("item")), "");
        tree.attach(doc, item2, false);
        let key2 = tree.push(NodeKind::Attribute, Some(ExpandedName::local("key")), "a");
        tree.attach(item2, key2, true);
        let text2 = tree.push(NodeKind::Text, None, "alpha");
        tree.attach(item2, text2, false);

        let comment = tree.push(NodeKind::Comment, None, " marker ");
        tree.attach(doc, comment, false);
        let empty = tree.push(NodeKind::Element, Some(ExpandedName::local("empty")), "");
        tree.attach(doc, empty, false);
        let pi = tree.push(
            NodeKind::ProcessingInstruction,
            Some(ExpandedName::local("render")),
            "flag",
        );
        tree.attach(doc, pi, false);

        tree
    }

    #[test]
    fn string_value_concatenates_descendant_text() {
        let tree = sample_tree();
        assert_eq!(tree.node(0).string_value(), "betaalpha");
        assert_eq!(tree.node(2).string_value(), "beta");
        assert_eq!(tree.node(3).string_value(), "b");
        assert_eq!(tree.node(8).string_value(), " marker ");
    }

    #[test]
    fn navigation_links_are_consistent() {
        let tree = sample_tree();
        let doc = tree.node(1);
        let kids: Vec<_> = doc.children().collect();
        assert_eq!(kids.len(), 5);
        assert!(kids.iter().all(|k| k.parent() == Some(doc)));
        let attrs: Vec<_> = tree.node(2).attributes().collect();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].parent(), Some(tree.node(2)));
    }
}
