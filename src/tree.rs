//! Node arena for specification trees.
//!
//! Every document of a compilation is parsed into one [`Arena`]. Nodes are
//! addressed by [`NodeId`], which doubles as the surrogate id used for cycle
//! bookkeeping: parsing and cloning always allocate fresh slots, so an id is
//! unique for the whole compilation. Removing a node only unlinks it from its
//! parent; the slot itself stays allocated until the arena is dropped.

use std::fmt;
use std::path::Path;

use crate::error::OptgenError;

/// Stable index of a node inside an [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Node kind. Elements outside the known vocabulary keep their name verbatim
/// so that path queries can address them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag {
    Config,
    Option,
    Name,
    Value,
    Include,
    Copy,
    Comment,
    Element(String),
}

impl Tag {
    pub fn from_name(name: &str) -> Self {
        match name {
            "config" => Tag::Config,
            "option" => Tag::Option,
            "name" => Tag::Name,
            "value" => Tag::Value,
            "include" => Tag::Include,
            "copy" => Tag::Copy,
            other => Tag::Element(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Tag::Config => "config",
            Tag::Option => "option",
            Tag::Name => "name",
            Tag::Value => "value",
            Tag::Include => "include",
            Tag::Copy => "copy",
            Tag::Comment => "#comment",
            Tag::Element(name) => name,
        }
    }

    pub fn is_comment(&self) -> bool {
        matches!(self, Tag::Comment)
    }
}

/// Copy-expansion colour of a node. Only meaningful for `copy` directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expansion {
    #[default]
    Unexpanded,
    /// On the expansion chain currently being resolved.
    Expanding,
    /// Consumed; any later encounter is skipped.
    Expanded,
}

/// One tagged node of a specification tree.
#[derive(Debug, Clone)]
pub struct SpecNode {
    pub tag: Tag,
    /// Attributes in source order.
    pub attrs: Vec<(String, String)>,
    /// Comment body for comment markers.
    pub text: Option<String>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) expansion: Expansion,
}

impl SpecNode {
    fn new(tag: Tag, attrs: Vec<(String, String)>) -> Self {
        Self {
            tag,
            attrs,
            text: None,
            parent: None,
            children: Vec::new(),
            expansion: Expansion::Unexpanded,
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attrs(&self) -> bool {
        !self.attrs.is_empty()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn expansion(&self) -> Expansion {
        self.expansion
    }
}

/// Compilation-wide node storage.
#[derive(Debug, Default)]
pub struct Arena {
    nodes: Vec<SpecNode>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots ever allocated, including unlinked ones.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &SpecNode {
        &self.nodes[id.0]
    }

    pub(crate) fn set_expansion(&mut self, id: NodeId, state: Expansion) {
        self.nodes[id.0].expansion = state;
    }

    fn push(&mut self, node: SpecNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn alloc(&mut self, tag: Tag, attrs: Vec<(String, String)>) -> NodeId {
        self.push(SpecNode::new(tag, attrs))
    }

    pub fn alloc_comment(&mut self, text: &str) -> NodeId {
        let mut node = SpecNode::new(Tag::Comment, Vec::new());
        node.text = Some(text.to_string());
        self.push(node)
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.unlink(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Insert `nodes` as siblings immediately after `anchor`, keeping their
    /// order. Does nothing when `anchor` is detached.
    pub fn insert_after(&mut self, anchor: NodeId, nodes: &[NodeId]) {
        let Some(parent) = self.nodes[anchor.0].parent else {
            return;
        };
        for &node in nodes {
            self.unlink(node);
        }
        let Some(pos) = self.position_in_parent(anchor) else {
            return;
        };
        for (offset, &node) in nodes.iter().enumerate() {
            self.nodes[node.0].parent = Some(parent);
            self.nodes[parent.0].children.insert(pos + 1 + offset, node);
        }
    }

    /// Detach `id` from its parent. The subtree below `id` is left intact.
    pub fn unlink(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    /// Detach and return all children of `id`.
    pub fn take_children(&mut self, id: NodeId) -> Vec<NodeId> {
        let children = std::mem::take(&mut self.nodes[id.0].children);
        for &child in &children {
            self.nodes[child.0].parent = None;
        }
        children
    }

    /// Clone the subtree rooted at `id` into fresh slots. The clone is
    /// detached and every node in it starts [`Expansion::Unexpanded`].
    pub fn deep_clone(&mut self, id: NodeId) -> NodeId {
        let source = &self.nodes[id.0];
        let mut node = SpecNode::new(source.tag.clone(), source.attrs.clone());
        node.text = source.text.clone();
        let children = source.children.clone();
        let copy = self.push(node);
        for child in children {
            let cloned = self.deep_clone(child);
            self.nodes[cloned.0].parent = Some(copy);
            self.nodes[copy.0].children.push(cloned);
        }
        copy
    }

    fn position_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.nodes[id.0].parent?;
        self.nodes[parent.0].children.iter().position(|&c| c == id)
    }

    /// All nodes below `id` in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[id.0].children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.nodes[next.0].children.iter().rev().copied());
        }
        out
    }

    /// `id` followed by its descendants in document order.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = vec![id];
        out.extend(self.descendants(id));
        out
    }

    pub fn children_tagged(&self, id: NodeId, tag: &Tag) -> Vec<NodeId> {
        self.nodes[id.0]
            .children
            .iter()
            .copied()
            .filter(|&c| &self.nodes[c.0].tag == tag)
            .collect()
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.nodes[id.0].parent;
        while let Some(p) = current {
            out.push(p);
            current = self.nodes[p.0].parent;
        }
        out
    }

    /// Topmost ancestor of `id` (or `id` itself when detached).
    pub fn tree_root(&self, id: NodeId) -> NodeId {
        self.ancestors(id).last().copied().unwrap_or(id)
    }

    pub fn preceding_siblings(&self, id: NodeId) -> Vec<NodeId> {
        match (self.nodes[id.0].parent, self.position_in_parent(id)) {
            (Some(parent), Some(pos)) => {
                self.nodes[parent.0].children[..pos].iter().rev().copied().collect()
            }
            _ => Vec::new(),
        }
    }

    pub fn following_siblings(&self, id: NodeId) -> Vec<NodeId> {
        match (self.nodes[id.0].parent, self.position_in_parent(id)) {
            (Some(parent), Some(pos)) => self.nodes[parent.0].children[pos + 1..].to_vec(),
            _ => Vec::new(),
        }
    }

    /// Sort key giving document order among nodes of one tree.
    pub(crate) fn order_key(&self, id: NodeId) -> Vec<usize> {
        let mut key = Vec::new();
        let mut current = id;
        while let Some(pos) = self.position_in_parent(current) {
            key.push(pos);
            current = self.nodes[current.0].parent.unwrap_or(current);
        }
        key.push(0);
        key.reverse();
        key
    }

    /// Human-readable location of a node, e.g. `/config/option[server]/copy[17]`.
    pub fn path_of(&self, id: NodeId) -> String {
        let mut chain = self.ancestors(id);
        chain.reverse();
        chain.push(id);

        let mut out = String::new();
        for n in chain {
            let node = &self.nodes[n.0];
            out.push('/');
            match &node.tag {
                Tag::Config => out.push_str("config"),
                Tag::Option => {
                    out.push_str(&format!("option[{}]", node.attr("name").unwrap_or("")))
                }
                Tag::Name | Tag::Value => out.push_str(&format!(
                    "{}[{}]",
                    node.tag.name(),
                    node.attr("val").unwrap_or("")
                )),
                Tag::Comment => out.push_str(&format!("<comment>[{n}]")),
                other => out.push_str(&format!("{}[{n}]", other.name())),
            }
        }
        out
    }

    /// Indented listing of a subtree with surrogate ids, used for trace logs.
    pub fn outline(&self, id: NodeId) -> String {
        let depth_of_root = self.ancestors(id).len();
        let mut out = String::new();
        for n in self.subtree(id) {
            let node = &self.nodes[n.0];
            if node.tag.is_comment() {
                continue;
            }
            let depth = self.ancestors(n).len() - depth_of_root;
            let shown: Vec<String> = node
                .attrs
                .iter()
                .filter(|(k, _)| matches!(k.as_str(), "path" | "name" | "val" | "file"))
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            out.push_str(&format!(
                "{}{}[{}]: {}\n",
                "  ".repeat(depth),
                node.tag.name(),
                n,
                shown.join(",")
            ));
        }
        out
    }

    /// Parse an XML document into the arena and return its root element.
    pub fn parse_document(&mut self, text: &str, origin: &Path) -> Result<NodeId, OptgenError> {
        let doc = roxmltree::Document::parse(text).map_err(|source| OptgenError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        Ok(self.import(doc.root_element()))
    }

    fn import(&mut self, element: roxmltree::Node<'_, '_>) -> NodeId {
        let attrs = element
            .attributes()
            .map(|a| (a.name().to_string(), a.value().to_string()))
            .collect();
        let id = self.alloc(Tag::from_name(element.tag_name().name()), attrs);
        for child in element.children() {
            if child.is_element() {
                let c = self.import(child);
                self.append_child(id, c);
            } else if child.is_comment() {
                let c = self.alloc_comment(child.text().unwrap_or_default());
                self.append_child(id, c);
            }
        }
        id
    }
}
