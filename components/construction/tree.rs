/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The box tree and its side tables.
//!
//! Besides the boxes themselves, the tree keeps the tables that external passes query
//! instead of walking the tree:
//!
//!  - the primary box of each content node, except for nodes whose boxes are deliberately
//!    left out of the table (text and line breaks), which are found by searching the boxes
//!    of their parent;
//!  - the placeholder of each out-of-flow box;
//!  - the computed style of each `display: none` element, kept for later restyles;
//!  - the boxes built for the pseudo-elements of each element.
//!
//! Every removal of a box goes through [`BoxTree::destroy_box`], which keeps the tables in
//! sync with the boxes.

use construction_api::{ComputedStyle, OpaqueNode, PseudoElement};
use log::trace;
use rustc_hash::FxHashMap;
use servo_arc::Arc;

use crate::box_list::{BoxList, BoxListIter};
use crate::boxes::{BoxArena, BoxData, BoxId, BoxKind, ChildListId, LayoutBox, SplitRole};
use crate::error::Result;

pub struct BoxTree {
    pub(crate) arena: BoxArena,
    root: Option<BoxId>,
    primary_boxes: FxHashMap<OpaqueNode, BoxId>,
    placeholders: FxHashMap<BoxId, BoxId>,
    undisplayed: FxHashMap<OpaqueNode, Arc<ComputedStyle>>,
    pseudo_boxes: FxHashMap<(OpaqueNode, PseudoElement), BoxId>,
}

impl BoxTree {
    pub fn new(max_boxes: usize) -> Self {
        Self {
            arena: BoxArena::new(max_boxes),
            root: None,
            primary_boxes: Default::default(),
            placeholders: Default::default(),
            undisplayed: Default::default(),
            pseudo_boxes: Default::default(),
        }
    }

    /// The viewport box, once the tree was built.
    pub fn root(&self) -> Option<BoxId> {
        self.root
    }

    pub(crate) fn set_root(&mut self, root: Option<BoxId>) {
        self.root = root;
    }

    pub fn get(&self, id: BoxId) -> Option<&LayoutBox> {
        self.arena.get(id)
    }

    pub fn contains(&self, id: BoxId) -> bool {
        self.arena.contains(id)
    }

    /// The number of live boxes.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn child_list(&self, id: BoxId, list: ChildListId) -> BoxList {
        self.arena
            .get(id)
            .map(|layout_box| layout_box.child_list(list))
            .unwrap_or_default()
    }

    pub fn children(&self, id: BoxId, list: ChildListId) -> BoxListIter<'_> {
        self.child_list(id, list).iter(&self.arena)
    }

    /// The children of `id` in every one of its child lists.
    pub fn all_children(&self, id: BoxId) -> Vec<BoxId> {
        let Some(layout_box) = self.arena.get(id) else {
            return Vec::new();
        };
        layout_box
            .child_list_ids()
            .flat_map(|list| layout_box.child_list(list).iter(&self.arena))
            .collect()
    }

    pub fn parent(&self, id: BoxId) -> Option<BoxId> {
        self.arena.get(id)?.parent
    }

    /// Iterates over the ancestors of `id`, starting with its parent.
    pub fn ancestors(&self, id: BoxId) -> impl Iterator<Item = BoxId> + '_ {
        std::iter::successors(self.parent(id), move |ancestor| self.parent(*ancestor))
    }

    pub fn primary_box(&self, node: OpaqueNode) -> Option<BoxId> {
        self.primary_boxes.get(&node).copied()
    }

    pub fn placeholder_for(&self, out_of_flow: BoxId) -> Option<BoxId> {
        self.placeholders.get(&out_of_flow).copied()
    }

    pub fn out_of_flow_for(&self, placeholder: BoxId) -> Option<BoxId> {
        self.arena.get(placeholder)?.out_of_flow_for_placeholder()
    }

    /// Iterates over every out-of-flow box and its placeholder.
    pub fn placeholder_pairs(&self) -> impl Iterator<Item = (BoxId, BoxId)> + '_ {
        self.placeholders
            .iter()
            .map(|(out_of_flow, placeholder)| (*out_of_flow, *placeholder))
    }

    pub fn undisplayed_style(&self, node: OpaqueNode) -> Option<&Arc<ComputedStyle>> {
        self.undisplayed.get(&node)
    }

    pub fn pseudo_box(&self, node: OpaqueNode, pseudo: PseudoElement) -> Option<BoxId> {
        self.pseudo_boxes.get(&(node, pseudo)).copied()
    }

    /// The in-flow representative of `id`: its placeholder when it is out of flow.
    pub fn in_flow_box(&self, id: BoxId) -> BoxId {
        self.placeholder_for(id).unwrap_or(id)
    }

    /// The first box of the split chain `id` belongs to, or `id` itself.
    pub fn first_in_split_chain(&self, id: BoxId) -> BoxId {
        let mut current = id;
        while let Some(previous) = self
            .arena
            .get(current)
            .and_then(|layout_box| layout_box.split.chain())
            .and_then(|chain| chain.previous)
        {
            current = previous;
        }
        current
    }

    /// Every box of the split chain `id` belongs to, in order. A box that is not split is
    /// its own chain.
    pub fn split_chain(&self, id: BoxId) -> Vec<BoxId> {
        let first = self.first_in_split_chain(id);
        std::iter::successors(Some(first), |current| {
            self.arena
                .get(*current)
                .and_then(|layout_box| layout_box.split.chain())
                .and_then(|chain| chain.next)
        })
        .collect()
    }

    pub fn last_in_split_chain(&self, id: BoxId) -> BoxId {
        self.split_chain(id).last().copied().unwrap_or(id)
    }

    /// `id` followed by its next-in-flow continuations.
    pub fn continuations(&self, id: BoxId) -> Vec<BoxId> {
        std::iter::successors(Some(id), |current| {
            self.arena
                .get(*current)
                .and_then(|layout_box| layout_box.next_in_flow)
        })
        .collect()
    }

    pub(crate) fn allocate(&mut self, layout_box: LayoutBox) -> Result<BoxId> {
        self.arena.allocate(layout_box)
    }

    pub(crate) fn set_primary_box(&mut self, node: OpaqueNode, id: BoxId) {
        self.primary_boxes.insert(node, id);
    }

    pub(crate) fn register_placeholder(&mut self, out_of_flow: BoxId, placeholder: BoxId) {
        debug_assert!(!self.placeholders.contains_key(&out_of_flow));
        self.placeholders.insert(out_of_flow, placeholder);
    }

    pub(crate) fn set_undisplayed_style(&mut self, node: OpaqueNode, style: Arc<ComputedStyle>) {
        self.undisplayed.insert(node, style);
    }

    pub(crate) fn remove_undisplayed_style(
        &mut self,
        node: OpaqueNode,
    ) -> Option<Arc<ComputedStyle>> {
        self.undisplayed.remove(&node)
    }

    pub(crate) fn set_pseudo_box(&mut self, node: OpaqueNode, pseudo: PseudoElement, id: BoxId) {
        self.pseudo_boxes.insert((node, pseudo), id);
    }

    /// Runs `f` on a child list of `parent`, writing the list back afterwards.
    pub(crate) fn with_child_list<R>(
        &mut self,
        parent: BoxId,
        list: ChildListId,
        f: impl FnOnce(&mut BoxList, &mut BoxArena) -> R,
    ) -> R {
        let mut children = self.arena[parent].child_list(list);
        let result = f(&mut children, &mut self.arena);
        self.arena[parent].set_child_list(list, children);
        result
    }

    fn adopt(&mut self, parent: BoxId, list: ChildListId, children: BoxList) {
        for child in children.to_vec(&self.arena) {
            let child = &mut self.arena[child];
            child.parent = Some(parent);
            child.parent_list = list;
        }
    }

    /// Installs the first children of a freshly built box.
    pub(crate) fn set_initial_children(
        &mut self,
        parent: BoxId,
        list: ChildListId,
        children: BoxList,
    ) {
        debug_assert!(
            self.arena[parent].child_list(list).is_empty(),
            "{:?} already has {:?} children",
            parent,
            list
        );
        self.adopt(parent, list, children);
        self.arena[parent].set_child_list(list, children);
    }

    pub(crate) fn append_children(&mut self, parent: BoxId, list: ChildListId, children: BoxList) {
        self.insert_children_after(parent, list, None, children, true);
    }

    /// Links `children` into a child list of `parent` after `previous`, or at the start of
    /// the list when `previous` is `None` and `at_end` is false.
    pub(crate) fn insert_children_after(
        &mut self,
        parent: BoxId,
        list: ChildListId,
        previous: Option<BoxId>,
        children: BoxList,
        at_end: bool,
    ) {
        if children.is_empty() {
            return;
        }
        self.adopt(parent, list, children);
        self.with_child_list(parent, list, |existing, arena| {
            let previous = if at_end { existing.last() } else { previous };
            existing.insert_list_after(arena, previous, children);
        });
    }

    /// Unlinks `id` from its parent, leaving it detached.
    pub(crate) fn unlink(&mut self, id: BoxId) {
        let Some(layout_box) = self.arena.get(id) else {
            return;
        };
        let list = layout_box.parent_list;
        match layout_box.parent {
            Some(parent) if self.arena.contains(parent) => {
                self.with_child_list(parent, list, |children, arena| children.remove(arena, id));
            },
            _ => {
                let layout_box = &mut self.arena[id];
                layout_box.previous_sibling = None;
                layout_box.next_sibling = None;
            },
        }
        self.arena[id].parent = None;
    }

    /// Moves `id` from wherever it is to a child list of `parent`, after `previous`.
    pub(crate) fn move_box(
        &mut self,
        id: BoxId,
        parent: BoxId,
        list: ChildListId,
        previous: Option<BoxId>,
    ) {
        self.unlink(id);
        self.insert_children_after(parent, list, previous, BoxList::single(id), false);
    }

    /// Destroys `id` and everything below it, together with the out-of-flow boxes whose
    /// placeholders are below it, wherever those live. `on_destroy` sees each box right
    /// before it goes away.
    pub(crate) fn destroy_box(&mut self, id: BoxId, on_destroy: &mut dyn FnMut(BoxId, &LayoutBox)) {
        if !self.arena.contains(id) {
            return;
        }
        self.unlink(id);
        self.destroy_subtree(id, on_destroy);
    }

    fn destroy_subtree(&mut self, id: BoxId, on_destroy: &mut dyn FnMut(BoxId, &LayoutBox)) {
        for child in self.all_children(id) {
            if self.arena.contains(child) {
                self.destroy_subtree(child, on_destroy);
            }
        }

        let (placeholder_target, out_of_flow) = match self.arena.get(id) {
            Some(layout_box) => (
                layout_box.out_of_flow_for_placeholder(),
                layout_box.is_out_of_flow(),
            ),
            None => return,
        };

        if let Some(target) = placeholder_target {
            // The out-of-flow box may live under a containing block outside of this subtree.
            if self.placeholders.get(&target) == Some(&id) {
                self.placeholders.remove(&target);
                if self.arena.contains(target) {
                    self.unlink(target);
                    self.destroy_subtree(target, on_destroy);
                }
            }
        }
        if out_of_flow {
            if let Some(placeholder) = self.placeholders.remove(&id) {
                if self.arena.contains(placeholder) {
                    self.unlink(placeholder);
                    self.release(placeholder, on_destroy);
                }
            }
        }
        self.release(id, on_destroy);
    }

    fn release(&mut self, id: BoxId, on_destroy: &mut dyn FnMut(BoxId, &LayoutBox)) {
        let Some(layout_box) = self.arena.get(id) else {
            return;
        };
        on_destroy(id, layout_box);

        if let Some(node) = layout_box.node {
            if self.primary_boxes.get(&node) == Some(&id) {
                self.primary_boxes.remove(&node);
            }
            if let Some(pseudo) = layout_box.pseudo {
                if self.pseudo_boxes.get(&(node, pseudo)) == Some(&id) {
                    self.pseudo_boxes.remove(&(node, pseudo));
                }
            }
        }
        let (previous_in_flow, next_in_flow) =
            (layout_box.previous_in_flow, layout_box.next_in_flow);
        let chain = layout_box.split.chain();

        if let Some(previous) = previous_in_flow.and_then(|previous| self.arena.get_mut(previous)) {
            previous.next_in_flow = next_in_flow;
        }
        if let Some(next) = next_in_flow.and_then(|next| self.arena.get_mut(next)) {
            next.previous_in_flow = previous_in_flow;
        }
        if let Some(chain) = chain {
            let previous = chain.previous.and_then(|previous| self.arena.get_mut(previous));
            if let Some(previous) = previous {
                if let Some(links) = previous.split.chain_mut() {
                    links.next = None;
                }
            }
            if let Some(next) = chain.next.and_then(|next| self.arena.get_mut(next)) {
                if let Some(links) = next.split.chain_mut() {
                    links.previous = None;
                }
            }
        }
        trace!("Destroying {:?}", id);
        self.arena.release(id);
    }

    /// Finds the box of `node` below `container`, for nodes that are not in the primary box
    /// table. Only anonymous boxes and boxes of the container's own node are searched, as
    /// the box of a child node is never below the box of another element.
    pub fn find_box_below(&self, container: BoxId, node: OpaqueNode) -> Option<BoxId> {
        let container_node = self.arena.get(container)?.node;
        let mut stack: Vec<BoxId> = self
            .split_chain(container)
            .into_iter()
            .flat_map(|member| self.children(member, ChildListId::Principal).collect::<Vec<_>>())
            .collect();
        stack.reverse();
        while let Some(current) = stack.pop() {
            let layout_box = &self.arena[current];
            if layout_box.node == Some(node) &&
                layout_box.pseudo.is_none() &&
                !layout_box.is_anonymous()
            {
                return Some(current);
            }
            let searchable = layout_box.is_anonymous() ||
                layout_box.node == container_node ||
                matches!(layout_box.kind, BoxKind::FirstLetter | BoxKind::FirstLine);
            if !searchable {
                continue;
            }
            let mut children: Vec<BoxId> = self.children(current, ChildListId::Principal).collect();
            if let BoxData::Placeholder { out_of_flow } = layout_box.data {
                children.push(out_of_flow);
            }
            children.reverse();
            stack.extend(children);
        }
        None
    }

    /// Whether `id` is a member of an inline split, or the child of one.
    pub fn touches_split_chain(&self, id: BoxId) -> bool {
        let Some(layout_box) = self.arena.get(id) else {
            return false;
        };
        layout_box.is_special() ||
            layout_box
                .parent
                .and_then(|parent| self.arena.get(parent))
                .is_some_and(|parent| parent.split != SplitRole::Normal)
    }
}
