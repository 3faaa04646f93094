/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! An in-memory document and style resolver, for tests of the box constructor.
//!
//! Unless a test sets a style explicitly, elements get the display value of a small user
//! agent style sheet and inherit the inherited properties of their parent.

use std::cell::RefCell;

use html5ever::{LocalName, Namespace, ns};
use rustc_hash::FxHashMap;
use servo_arc::Arc;

use crate::node::{ContentTree, NodeKind, OpaqueNode};
use crate::style::{ComputedStyle, Display, PseudoElement, StyleResolver};

struct TestNode {
    kind: NodeKind,
    name: Option<LocalName>,
    namespace: Option<Namespace>,
    attributes: Vec<(LocalName, String)>,
    text: String,
    parent: Option<OpaqueNode>,
    children: Vec<OpaqueNode>,
}

pub struct TestDocument {
    nodes: RefCell<Vec<TestNode>>,
    styles: RefCell<FxHashMap<(OpaqueNode, Option<PseudoElement>), Arc<ComputedStyle>>>,
}

impl Default for TestDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl TestDocument {
    pub fn new() -> Self {
        let document = TestNode {
            kind: NodeKind::Document,
            name: None,
            namespace: None,
            attributes: Vec::new(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: RefCell::new(vec![document]),
            styles: Default::default(),
        }
    }

    pub fn document(&self) -> OpaqueNode {
        OpaqueNode(0)
    }

    fn create(&self, node: TestNode) -> OpaqueNode {
        let mut nodes = self.nodes.borrow_mut();
        nodes.push(node);
        OpaqueNode(nodes.len() - 1)
    }

    /// Creates a detached element in the HTML namespace.
    pub fn create_element(&self, name: &str) -> OpaqueNode {
        self.create_element_ns(ns!(html), name)
    }

    pub fn create_element_ns(&self, namespace: Namespace, name: &str) -> OpaqueNode {
        self.create(TestNode {
            kind: NodeKind::Element,
            name: Some(LocalName::from(name)),
            namespace: Some(namespace),
            attributes: Vec::new(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
        })
    }

    pub fn create_text(&self, text: &str) -> OpaqueNode {
        self.create(TestNode {
            kind: NodeKind::Text,
            name: None,
            namespace: None,
            attributes: Vec::new(),
            text: text.to_owned(),
            parent: None,
            children: Vec::new(),
        })
    }

    pub fn create_comment(&self, text: &str) -> OpaqueNode {
        let node = self.create_text(text);
        self.nodes.borrow_mut()[node.0].kind = NodeKind::Comment;
        node
    }

    pub fn append_child(&self, parent: OpaqueNode, child: OpaqueNode) {
        let mut nodes = self.nodes.borrow_mut();
        nodes[parent.0].children.push(child);
        nodes[child.0].parent = Some(parent);
    }

    /// Inserts `child` before `reference`, or at the end when `reference` is `None`.
    pub fn insert_before(
        &self,
        parent: OpaqueNode,
        child: OpaqueNode,
        reference: Option<OpaqueNode>,
    ) {
        let mut nodes = self.nodes.borrow_mut();
        let index = reference
            .and_then(|reference| {
                nodes[parent.0]
                    .children
                    .iter()
                    .position(|sibling| *sibling == reference)
            })
            .unwrap_or(nodes[parent.0].children.len());
        nodes[parent.0].children.insert(index, child);
        nodes[child.0].parent = Some(parent);
    }

    /// Detaches `child` from `parent`, returning the sibling that followed it.
    pub fn remove_child(&self, parent: OpaqueNode, child: OpaqueNode) -> Option<OpaqueNode> {
        let mut nodes = self.nodes.borrow_mut();
        let index = nodes[parent.0]
            .children
            .iter()
            .position(|sibling| *sibling == child)?;
        nodes[parent.0].children.remove(index);
        nodes[child.0].parent = None;
        nodes[parent.0].children.get(index).copied()
    }

    pub fn set_text(&self, node: OpaqueNode, text: &str) {
        self.nodes.borrow_mut()[node.0].text = text.to_owned();
    }

    pub fn set_attribute(&self, node: OpaqueNode, name: &str, value: &str) {
        let mut nodes = self.nodes.borrow_mut();
        let name = LocalName::from(name);
        let attributes = &mut nodes[node.0].attributes;
        match attributes.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing)) => *existing = value.to_owned(),
            None => attributes.push((name, value.to_owned())),
        }
    }

    pub fn set_style(&self, node: OpaqueNode, style: ComputedStyle) {
        self.styles.borrow_mut().insert((node, None), Arc::new(style));
    }

    pub fn set_pseudo_style(&self, node: OpaqueNode, pseudo: PseudoElement, style: ComputedStyle) {
        let style = ComputedStyle {
            pseudo_element: Some(pseudo),
            ..style
        };
        self.styles
            .borrow_mut()
            .insert((node, Some(pseudo)), Arc::new(style));
    }

    pub fn clear_pseudo_style(&self, node: OpaqueNode, pseudo: PseudoElement) {
        self.styles.borrow_mut().remove(&(node, Some(pseudo)));
    }

    /// Builds `<html><body></body></html>` and returns the body.
    pub fn with_body() -> (Self, OpaqueNode) {
        let document = Self::new();
        let html = document.create_element("html");
        let body = document.create_element("body");
        document.append_child(document.document(), html);
        document.append_child(html, body);
        (document, body)
    }

    /// Creates an element with an explicit style and appends it to `parent`.
    pub fn append_element(
        &self,
        parent: OpaqueNode,
        name: &str,
        style: ComputedStyle,
    ) -> OpaqueNode {
        let element = self.create_element(name);
        self.set_style(element, style);
        self.append_child(parent, element);
        element
    }

    pub fn append_text(&self, parent: OpaqueNode, text: &str) -> OpaqueNode {
        let node = self.create_text(text);
        self.append_child(parent, node);
        node
    }

    fn user_agent_display(&self, node: OpaqueNode) -> Display {
        let nodes = self.nodes.borrow();
        let node = &nodes[node.0];
        if node.namespace != Some(ns!(html)) {
            return Display::Inline;
        }
        match node.name.as_ref().map(|name| &**name) {
            Some(
                "html" | "body" | "div" | "p" | "section" | "ul" | "ol" | "h1" | "h2" | "fieldset" |
                "legend",
            ) => Display::Block,
            Some("li") => Display::ListItem,
            Some("table") => Display::Table,
            Some("caption") => Display::TableCaption,
            Some("colgroup") => Display::TableColumnGroup,
            Some("col") => Display::TableColumn,
            Some("thead") => Display::TableHeaderGroup,
            Some("tbody") => Display::TableRowGroup,
            Some("tfoot") => Display::TableFooterGroup,
            Some("tr") => Display::TableRow,
            Some("td" | "th") => Display::TableCell,
            Some("head" | "script" | "style" | "title") => Display::None,
            _ => Display::Inline,
        }
    }
}

impl ContentTree for TestDocument {
    fn root_element(&self) -> Option<OpaqueNode> {
        let nodes = self.nodes.borrow();
        nodes[0]
            .children
            .iter()
            .copied()
            .find(|child| nodes[child.0].kind == NodeKind::Element)
    }

    fn kind(&self, node: OpaqueNode) -> NodeKind {
        self.nodes.borrow()[node.0].kind
    }

    fn local_name(&self, node: OpaqueNode) -> Option<LocalName> {
        self.nodes.borrow()[node.0].name.clone()
    }

    fn namespace(&self, node: OpaqueNode) -> Option<Namespace> {
        self.nodes.borrow()[node.0].namespace.clone()
    }

    fn attribute(&self, node: OpaqueNode, name: &LocalName) -> Option<String> {
        self.nodes.borrow()[node.0]
            .attributes
            .iter()
            .find(|(attribute, _)| attribute == name)
            .map(|(_, value)| value.clone())
    }

    fn text(&self, node: OpaqueNode) -> Option<String> {
        let nodes = self.nodes.borrow();
        let node = &nodes[node.0];
        (node.kind == NodeKind::Text).then(|| node.text.clone())
    }

    fn parent(&self, node: OpaqueNode) -> Option<OpaqueNode> {
        self.nodes.borrow()[node.0].parent
    }

    fn first_child(&self, node: OpaqueNode) -> Option<OpaqueNode> {
        self.nodes.borrow()[node.0].children.first().copied()
    }

    fn last_child(&self, node: OpaqueNode) -> Option<OpaqueNode> {
        self.nodes.borrow()[node.0].children.last().copied()
    }

    fn next_sibling(&self, node: OpaqueNode) -> Option<OpaqueNode> {
        let nodes = self.nodes.borrow();
        let parent = nodes[node.0].parent?;
        let siblings = &nodes[parent.0].children;
        let index = siblings.iter().position(|sibling| *sibling == node)?;
        siblings.get(index + 1).copied()
    }

    fn previous_sibling(&self, node: OpaqueNode) -> Option<OpaqueNode> {
        let nodes = self.nodes.borrow();
        let parent = nodes[node.0].parent?;
        let siblings = &nodes[parent.0].children;
        let index = siblings.iter().position(|sibling| *sibling == node)?;
        index.checked_sub(1).map(|index| siblings[index])
    }
}

impl StyleResolver for TestDocument {
    fn resolve_style(
        &self,
        node: OpaqueNode,
        parent_style: Option<&ComputedStyle>,
        pseudo: Option<PseudoElement>,
    ) -> Option<Arc<ComputedStyle>> {
        if let Some(style) = self.styles.borrow().get(&(node, pseudo)) {
            return Some(style.clone());
        }
        if pseudo.is_some() || self.kind(node) != NodeKind::Element {
            return None;
        }
        let inherited = match parent_style {
            Some(parent) => ComputedStyle::inheriting_from(parent),
            None => ComputedStyle::default(),
        };
        Some(Arc::new(ComputedStyle {
            display: self.user_agent_display(node),
            ..inherited
        }))
    }
}
