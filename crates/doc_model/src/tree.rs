//! Styled tree storage and construction

use crate::{ComputedStyle, DocModelError, ElementData, NodeId, NodeKind, Result, StyledNode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A styled document tree: elements and text nodes with resolved styles.
///
/// Nodes are stored by [`NodeId`]; child order lives in each parent. The
/// first node inserted without a parent becomes the root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StyledTree {
    nodes: HashMap<NodeId, StyledNode>,
    root: Option<NodeId>,
}

impl StyledTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Insert an element as the last child of `parent`, or as the root when
    /// `parent` is `None`.
    pub fn insert_element(&mut self, element: ElementData, parent: Option<NodeId>) -> Result<NodeId> {
        self.insert(NodeKind::Element(element), parent, None)
    }

    /// Insert a text node as the last child of `parent`
    pub fn insert_text(&mut self, text: impl Into<String>, parent: NodeId) -> Result<NodeId> {
        self.insert(NodeKind::Text(text.into()), Some(parent), None)
    }

    /// Insert a node at a given child index of `parent`
    pub fn insert_at(&mut self, kind: NodeKind, parent: NodeId, index: usize) -> Result<NodeId> {
        self.insert(kind, Some(parent), Some(index))
    }

    /// Shorthand for inserting `<tag style="...">` under `parent`
    pub fn append_element(&mut self, parent: Option<NodeId>, tag: &str, declarations: &str) -> Result<NodeId> {
        let element = ElementData::new(tag).with_style(ComputedStyle::from_declarations(declarations));
        self.insert_element(element, parent)
    }

    fn insert(&mut self, kind: NodeKind, parent: Option<NodeId>, index: Option<usize>) -> Result<NodeId> {
        match parent {
            Some(parent_id) => {
                let parent_node = self
                    .nodes
                    .get(&parent_id)
                    .ok_or(DocModelError::NodeNotFound(parent_id.as_uuid()))?;
                if parent_node.is_text() {
                    return Err(DocModelError::InvalidOperation(
                        "Text nodes cannot have children".into(),
                    ));
                }
            }
            None => {
                if self.root.is_some() {
                    return Err(DocModelError::InvalidOperation(
                        "Tree already has a root".into(),
                    ));
                }
                if matches!(kind, NodeKind::Text(_)) {
                    return Err(DocModelError::InvalidOperation(
                        "The root must be an element".into(),
                    ));
                }
            }
        }

        let node = StyledNode::new(kind, parent);
        let id = node.id();
        self.nodes.insert(id, node);

        match parent {
            Some(parent_id) => {
                let parent_node = self
                    .nodes
                    .get_mut(&parent_id)
                    .ok_or(DocModelError::NodeNotFound(parent_id.as_uuid()))?;
                match index {
                    Some(i) => parent_node.insert_child(i, id),
                    None => parent_node.push_child(id),
                }
            }
            None => self.root = Some(id),
        }

        Ok(id)
    }

    pub fn get(&self, id: NodeId) -> Option<&StyledNode> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut StyledNode> {
        self.nodes.get_mut(&id)
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.get(id).and_then(StyledNode::element)
    }

    /// Replace the resolved style of an element
    pub fn set_style(&mut self, id: NodeId, style: ComputedStyle) -> Result<()> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or(DocModelError::NodeNotFound(id.as_uuid()))?;
        let element = node
            .element_mut()
            .ok_or(DocModelError::NotAnElement(id.as_uuid()))?;
        element.style = style;
        Ok(())
    }

    /// Set one attribute of an element
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: impl Into<String>) -> Result<()> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or(DocModelError::NodeNotFound(id.as_uuid()))?;
        let element = node
            .element_mut()
            .ok_or(DocModelError::NotAnElement(id.as_uuid()))?;
        element.attributes.insert(name.to_ascii_lowercase(), value.into());
        Ok(())
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(StyledNode::children).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(StyledNode::parent)
    }

    /// Ancestors from the parent up to the root
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&current| self.parent(current))
    }

    /// Nearest ancestor element with the given tag
    pub fn find_ancestor(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        self.ancestors(id)
            .find(|&ancestor| self.element(ancestor).is_some_and(|el| el.is(tag)))
    }

    /// First direct child element with the given tag
    pub fn first_child_element(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&child| self.element(child).is_some_and(|el| el.is(tag)))
    }

    /// Direct child elements with one of the given tags, in document order
    pub fn child_elements<'a>(&'a self, id: NodeId, tags: &'a [&'a str]) -> impl Iterator<Item = NodeId> + 'a {
        self.children(id).iter().copied().filter(move |&child| {
            self.element(child)
                .is_some_and(|el| tags.iter().any(|tag| el.is(tag)))
        })
    }

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.get(id) else {
            return;
        };
        match &node.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element(_) => {
                for &child in node.children() {
                    self.collect_text(child, out);
                }
            }
        }
    }
}
