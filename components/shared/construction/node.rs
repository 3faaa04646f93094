/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use html5ever::{LocalName, Namespace, ns};
use serde::Serialize;

/// An opaque handle to a node in the content tree. The content layer guarantees that the
/// handle stays the same for the lifetime of the node, across mutations of the tree.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct OpaqueNode(pub usize);

impl OpaqueNode {
    /// Returns the raw identifier of this node.
    pub fn id(&self) -> usize {
        self.0
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum NodeKind {
    Document,
    Element,
    Text,
    Comment,
}

/// Read access to the content tree.
///
/// All queries take `&self`: the content layer is free to mutate the tree between calls
/// into the box constructor, and must then notify it through one of the mutation entry
/// points.
pub trait ContentTree {
    /// The root element of the document, if there is one.
    fn root_element(&self) -> Option<OpaqueNode>;

    fn kind(&self, node: OpaqueNode) -> NodeKind;

    /// The local name of an element, `None` for every other kind of node.
    fn local_name(&self, node: OpaqueNode) -> Option<LocalName>;

    /// The namespace of an element, `None` for every other kind of node.
    fn namespace(&self, node: OpaqueNode) -> Option<Namespace>;

    fn attribute(&self, node: OpaqueNode, name: &LocalName) -> Option<String>;

    /// The character data of a text node.
    fn text(&self, node: OpaqueNode) -> Option<String>;

    fn parent(&self, node: OpaqueNode) -> Option<OpaqueNode>;
    fn first_child(&self, node: OpaqueNode) -> Option<OpaqueNode>;
    fn last_child(&self, node: OpaqueNode) -> Option<OpaqueNode>;
    fn next_sibling(&self, node: OpaqueNode) -> Option<OpaqueNode>;
    fn previous_sibling(&self, node: OpaqueNode) -> Option<OpaqueNode>;

    /// The node whose boxes the boxes of `node` are built into. This is the parent node,
    /// unless the content layer redirects children somewhere else (for instance into a
    /// shadow tree slot).
    fn insertion_parent(&self, node: OpaqueNode) -> Option<OpaqueNode> {
        self.parent(node)
    }

    fn is_element(&self, node: OpaqueNode) -> bool {
        self.kind(node) == NodeKind::Element
    }

    fn is_text(&self, node: OpaqueNode) -> bool {
        self.kind(node) == NodeKind::Text
    }

    /// Whether this is an element with the given local name in the HTML namespace.
    fn is_html_element(&self, node: OpaqueNode, name: &LocalName) -> bool {
        self.local_name(node).as_ref() == Some(name) && self.namespace(node) == Some(ns!(html))
    }
}

impl dyn ContentTree + '_ {
    /// Iterates over the children of `node` through a trait object.
    pub fn child_nodes(&self, node: OpaqueNode) -> impl Iterator<Item = OpaqueNode> + '_ {
        std::iter::successors(self.first_child(node), move |child| self.next_sibling(*child))
    }

    /// Collects `node` and all of its descendants, breadth first.
    pub fn subtree(&self, node: OpaqueNode) -> Vec<OpaqueNode> {
        let mut nodes = vec![node];
        let mut index = 0;
        while index < nodes.len() {
            let current = nodes[index];
            index += 1;
            nodes.extend(self.child_nodes(current));
        }
        nodes
    }
}
