/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Keeping the box tree in sync with the content tree.
//!
//! The content layer notifies the [`BoxConstructor`] of every change to the content tree
//! right after it happened. Each notification is patched locally when possible: new boxes
//! are built for inserted nodes and linked next to the boxes of their siblings, and the
//! boxes of removed nodes are destroyed. When a local patch would break one of the
//! structural rules of the box tree (a block-level box inside an inline, part of a split
//! inline, anonymous table boxes that new content should join), the patch is abandoned and
//! the boxes of the nearest element that can be rebuilt as a whole are reconstructed
//! instead.

use construction_api::style::Display;
use construction_api::{
    AnonymousBoxType, BoxHistoryState, ComputedStyle, HistoryKey, HistoryStore, NodeKind,
    OpaqueNode, PendingRestyles, PseudoElement, RestyleEvent, RestyleHint,
};
use log::{debug, trace, warn};
use servo_arc::Arc;

use crate::box_list::BoxList;
use crate::boxes::{BoxData, BoxId, BoxKind, BoxStateFlags, ChildListId, LayoutBox};
use crate::construct::{self, ParentInfo};
use crate::context::ConstructionContext;
use crate::dispatch::{self, ConstructionFlags};
use crate::dump::BoxDump;
use crate::error::{ConstructionError, Result};
use crate::state::{BoxConstructorState, ContainingBlocks};
use crate::tree::BoxTree;
use crate::{first_line, generated_content, table};

/// What a construction pass for inserted content ended up doing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum PassOutcome {
    Inserted,
    /// The new boxes were discarded, and the containing block must be rebuilt instead.
    NeedsReconstruction,
}

/// What removing the boxes of a node ended up doing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Removal {
    Removed,
    /// The containing block of the node was rebuilt, which took care of the node.
    Reconstructed,
}

/// Runs a construction pass over `tree`. A pass that fails is undone before the error is
/// returned.
fn run_pass<R>(
    tree: &mut BoxTree,
    context: ConstructionContext<'_>,
    containing_blocks: ContainingBlocks,
    pass: impl FnOnce(&mut BoxConstructorState<'_>) -> Result<R>,
) -> Result<R> {
    let mut state = BoxConstructorState::new(tree, context, containing_blocks);
    let result = pass(&mut state);
    if let Err(ref error) = result {
        warn!("Construction pass failed: {}", error);
        state.discard();
    }
    result
}

/// Saves the transient state of a box that is about to be destroyed.
fn save_history(history: &dyn HistoryStore, layout_box: &LayoutBox) {
    if let (BoxData::Scroll { position }, Some(node)) = (&layout_box.data, layout_box.node) {
        history.save_state(
            HistoryKey {
                node,
                pseudo: layout_box.pseudo,
            },
            BoxHistoryState {
                scroll_position: *position,
            },
        );
    }
}

/// Anonymous boxes that only exist to satisfy a structural rule, and must be rebuilt
/// together with their siblings. The anonymous boxes that every box of some element has,
/// like the scrolled block of a scroll container, are not.
fn is_structural_anonymous(layout_box: &LayoutBox) -> bool {
    match layout_box.style.anonymous_box {
        None |
        Some(
            AnonymousBoxType::Viewport |
            AnonymousBoxType::ScrolledContent |
            AnonymousBoxType::FieldsetContent,
        ) => false,
        Some(AnonymousBoxType::Table) => layout_box.node.is_none(),
        Some(_) => true,
    }
}

fn is_anonymous_table_part(layout_box: &LayoutBox) -> bool {
    layout_box.is_anonymous() && layout_box.kind.is_table_part() && layout_box.node.is_none()
}

/// The box that the boxes of the children of the element with primary box `primary` go
/// into.
fn insertion_box(tree: &BoxTree, primary: BoxId) -> BoxId {
    match tree.arena[primary].kind {
        BoxKind::ScrollContainer | BoxKind::Fieldset | BoxKind::TableWrapper => tree
            .child_list(primary, ChildListId::Principal)
            .first()
            .unwrap_or(primary),
        _ => primary,
    }
}

/// Builds and maintains the box tree of one document.
pub struct BoxConstructor<'a> {
    context: ConstructionContext<'a>,
    tree: BoxTree,
    /// The depth of nested [`BoxConstructor::begin_update`] calls.
    update_depth: u32,
    /// Whether counters and quotes must be recomputed at the end of the update batch.
    generated_content_dirty: bool,
    restyles: PendingRestyles,
}

impl<'a> BoxConstructor<'a> {
    pub fn new(context: ConstructionContext<'a>) -> Self {
        Self {
            tree: BoxTree::new(context.prefs.max_boxes),
            context,
            update_depth: 0,
            generated_content_dirty: false,
            restyles: PendingRestyles::default(),
        }
    }

    pub fn tree(&self) -> &BoxTree {
        &self.tree
    }

    pub fn context(&self) -> ConstructionContext<'a> {
        self.context
    }

    /// Restyle events posted since the last call, in the order they were first posted.
    pub fn take_restyle_events(&mut self) -> Vec<RestyleEvent> {
        self.restyles.drain()
    }

    pub fn pending_restyles(&self) -> &PendingRestyles {
        &self.restyles
    }

    /// A JSON-serializable snapshot of the box tree.
    pub fn dump(&self) -> Option<BoxDump> {
        self.tree.dump()
    }

    /// The primary box of `node`, including nodes that are not in the primary box table,
    /// like text nodes.
    pub fn primary_box_for(&self, node: OpaqueNode) -> Option<BoxId> {
        if let Some(id) = self.tree.primary_box(node) {
            return Some(id);
        }
        let container = self.container_box_for(node)?;
        self.tree.find_box_below(container, node)
    }

    /// The box of the nearest ancestor of `node` that has one.
    fn container_box_for(&self, node: OpaqueNode) -> Option<BoxId> {
        let content = self.context.content;
        std::iter::successors(content.insertion_parent(node), |ancestor| {
            content.insertion_parent(*ancestor)
        })
        .find_map(|ancestor| self.tree.primary_box(ancestor))
    }

    /// Whether `node` is an element inside a `display: none` subtree.
    fn is_undisplayed(&self, node: OpaqueNode) -> bool {
        let content = self.context.content;
        std::iter::successors(Some(node), |ancestor| content.insertion_parent(*ancestor))
            .take_while(|ancestor| self.tree.primary_box(*ancestor).is_none())
            .any(|ancestor| self.tree.undisplayed_style(ancestor).is_some())
    }

    pub fn is_updating(&self) -> bool {
        self.update_depth > 0
    }

    /// Starts a batch of updates. Deferred work runs when the outermost batch ends.
    pub fn begin_update(&mut self) {
        self.update_depth += 1;
    }

    pub fn end_update(&mut self) {
        debug_assert!(self.update_depth > 0, "unbalanced end_update");
        self.update_depth = self.update_depth.saturating_sub(1);
        if self.update_depth == 0 {
            self.flush_deferred_work();
        }
    }

    /// Runs the bookkeeping deferred to the end of an update batch. Running it again
    /// without changes in between does nothing.
    fn flush_deferred_work(&mut self) {
        if !std::mem::take(&mut self.generated_content_dirty) {
            return;
        }
        let changed =
            generated_content::recompute_generated_content(&mut self.tree, self.context.content);
        for node in changed {
            self.restyles.post(node, RestyleHint::REFLOW);
        }
    }

    fn batched<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        self.begin_update();
        let result = f(self);
        self.end_update();
        result
    }

    /// Builds the box tree of the whole document, replacing the existing one.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "BoxConstructor::construct_root", skip_all, level = "debug")
    )]
    pub fn construct_root(&mut self) -> Result<()> {
        self.batched(|constructor| constructor.rebuild_root())
    }

    fn destroy_root(&mut self) {
        let Some(root) = self.tree.root() else {
            return;
        };
        let history = self.context.history;
        self.tree
            .destroy_box(root, &mut |_, layout_box| save_history(history, layout_box));
        self.tree.set_root(None);
    }

    fn rebuild_root(&mut self) -> Result<()> {
        self.destroy_root();
        let content = self.context.content;
        let root_element = content
            .root_element()
            .ok_or(ConstructionError::NoRootElement)?;
        debug!("Building the box tree of {:?}", root_element);

        let context = self.context;
        let viewport_style = context
            .styles
            .resolve_anonymous_style(AnonymousBoxType::Viewport, &ComputedStyle::default());
        let viewport = self
            .tree
            .allocate(LayoutBox::new(BoxKind::Viewport, viewport_style.clone(), None))?;
        self.tree.set_root(Some(viewport));

        let containing_blocks = ContainingBlocks {
            float: None,
            absolute: Some(viewport),
            fixed: Some(viewport),
            popup: Some(viewport),
        };
        let result = run_pass(&mut self.tree, context, containing_blocks, |state| {
            if context.styles.resolve_style(root_element, None, None).is_none() {
                return Err(ConstructionError::StyleUnavailable(root_element));
            }
            let parent = ParentInfo {
                id: viewport,
                kind: BoxKind::Viewport,
                style: viewport_style,
                node: None,
            };
            let mut items = BoxList::new();
            construct::process_child(state, root_element, &parent, &mut items)?;
            table::close_pseudo_chain(state, &mut items);
            state
                .tree
                .set_initial_children(viewport, ChildListId::Principal, items);
            Ok(())
        });
        if result.is_err() {
            self.tree.destroy_box(viewport, &mut |_, _| {});
            self.tree.set_root(None);
        } else {
            self.generated_content_dirty = true;
            self.restyles.post(root_element, RestyleHint::REFLOW);
        }
        result
    }

    /// Notifies the constructor that the children of `container` from `first_new_child`
    /// to its last child were appended.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "BoxConstructor::content_appended", skip_all, level = "debug")
    )]
    pub fn content_appended(
        &mut self,
        container: OpaqueNode,
        first_new_child: OpaqueNode,
    ) -> Result<()> {
        let content = self.context.content;
        if content.insertion_parent(first_new_child) != Some(container) {
            return Err(ConstructionError::DetachedContent(first_new_child));
        }
        let last = content.last_child(container).unwrap_or(first_new_child);
        self.batched(|constructor| constructor.insert_content(container, first_new_child, last))
    }

    /// Notifies the constructor that `child` was inserted into `container`.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "BoxConstructor::content_inserted", skip_all, level = "debug")
    )]
    pub fn content_inserted(&mut self, container: OpaqueNode, child: OpaqueNode) -> Result<()> {
        if self.context.content.insertion_parent(child) != Some(container) {
            return Err(ConstructionError::DetachedContent(child));
        }
        self.batched(|constructor| constructor.insert_content(container, child, child))
    }

    /// Notifies the constructor that `child` was removed from `container`. The content
    /// layer calls this after the removal, with the removed subtree still intact.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "BoxConstructor::content_removed", skip_all, level = "debug")
    )]
    pub fn content_removed(&mut self, container: OpaqueNode, child: OpaqueNode) -> Result<()> {
        self.batched(|constructor| constructor.remove_content(container, child).map(|_| ()))
    }

    /// Notifies the constructor that the character data of the text node `node` changed.
    pub fn character_data_changed(&mut self, node: OpaqueNode) -> Result<()> {
        let content = self.context.content;
        let Some(text) = content.text(node) else {
            return Ok(());
        };
        if content.insertion_parent(node).is_none() {
            return Err(ConstructionError::DetachedContent(node));
        }
        self.batched(|constructor| {
            let Some(id) = constructor.primary_box_for(node) else {
                // Whitespace that was dropped may not be whitespace anymore.
                return constructor.recreate(node);
            };
            let tree = &constructor.tree;
            let in_place = tree.continuations(id).len() == 1 &&
                tree.parent(id).is_some_and(|parent| {
                    let parent_box = &tree.arena[parent];
                    !is_structural_anonymous(parent_box) &&
                        parent_box.kind != BoxKind::FirstLetter &&
                        first_line::first_letter_container(tree, parent).is_none()
                });
            if !in_place {
                return constructor.recreate(node);
            }
            if let BoxData::Text(data) = &mut constructor.tree.arena[id].data {
                data.text = text;
            }
            if let Some(parent) = content.insertion_parent(node) {
                constructor.restyles.post(parent, RestyleHint::REFLOW);
            }
            Ok(())
        })
    }

    /// Rebuilds the boxes of `node` from scratch.
    pub fn recreate_boxes_for(&mut self, node: OpaqueNode) -> Result<()> {
        self.batched(|constructor| constructor.recreate(node))
    }

    /// Notifies the constructor that the computed style of `node` changed. Changes that
    /// affect the structure of the box tree rebuild the boxes of the node; any other change
    /// updates the style of its boxes in place.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "BoxConstructor::restyle", skip_all, level = "debug")
    )]
    pub fn restyle(&mut self, node: OpaqueNode) -> Result<()> {
        self.batched(|constructor| constructor.restyle_node(node))
    }

    fn restyle_node(&mut self, node: OpaqueNode) -> Result<()> {
        let context = self.context;
        if context.content.kind(node) != NodeKind::Element {
            return Ok(());
        }
        let parent_style = self
            .container_box_for(node)
            .map(|container| self.tree.arena[container].style.clone());
        let Some(new_style) = context
            .styles
            .resolve_style(node, parent_style.as_deref(), None)
        else {
            return Err(ConstructionError::StyleUnavailable(node));
        };

        let Some(primary) = self.tree.primary_box(node) else {
            if let Some(old_style) = self.tree.undisplayed_style(node) {
                if new_style.display == Display::None {
                    trace!("{:?} stays undisplayed", node);
                    self.tree.set_undisplayed_style(node, new_style);
                    return Ok(());
                }
                debug_assert_eq!(old_style.display, Display::None);
            }
            return self.recreate(node);
        };

        let old_style = self.tree.arena[primary].style.clone();
        if old_style.needs_reconstruction_for(&new_style) ||
            self.pseudo_boxes_changed(node, primary, &new_style)
        {
            debug!("Style change of {:?} needs new boxes", node);
            return self.recreate(node);
        }

        trace!("Updating the style of the boxes of {:?} in place", node);
        for member in self.tree.split_chain(primary) {
            self.swap_style(member, node, &old_style, &new_style);
        }
        self.restyles.post(node, RestyleHint::REPAINT);
        Ok(())
    }

    /// Whether a new style of `node` adds or removes one of its pseudo-elements.
    fn pseudo_boxes_changed(
        &self,
        node: OpaqueNode,
        primary: BoxId,
        new_style: &ComputedStyle,
    ) -> bool {
        let context = self.context;
        let has_pseudo = |pseudo| {
            context
                .styles
                .resolve_style(node, Some(new_style), Some(pseudo))
                .is_some()
        };
        let generates = |pseudo| {
            context.prefs.generated_content_enabled &&
                context
                    .styles
                    .resolve_style(node, Some(new_style), Some(pseudo))
                    .is_some_and(|style| style.generates_pseudo_content())
        };
        for pseudo in [PseudoElement::Before, PseudoElement::After] {
            if self.tree.pseudo_box(node, pseudo).is_some() != generates(pseudo) {
                return true;
            }
        }
        let insertion = insertion_box(&self.tree, primary);
        let flags = self.tree.arena[insertion].flags;
        let wants_first_letter = flags.contains(BoxStateFlags::WANTS_FIRST_LETTER);
        let wants_first_line = flags.contains(BoxStateFlags::WANTS_FIRST_LINE);
        (context.prefs.first_letter_enabled &&
            wants_first_letter != has_pseudo(PseudoElement::FirstLetter)) ||
            (context.prefs.first_line_enabled &&
                wants_first_line != has_pseudo(PseudoElement::FirstLine))
    }

    /// Replaces the style of `id` and of the anonymous boxes of `node` below it, along with
    /// the text boxes that inherit it.
    fn swap_style(
        &mut self,
        id: BoxId,
        node: OpaqueNode,
        old_style: &ComputedStyle,
        new_style: &Arc<ComputedStyle>,
    ) {
        let styles = self.context.styles;
        let layout_box = &mut self.tree.arena[id];
        layout_box.style = match layout_box.style.anonymous_box {
            Some(box_type) => styles.resolve_anonymous_style(box_type, new_style),
            None => new_style.clone(),
        };
        let children: Vec<BoxId> = self.tree.children(id, ChildListId::Principal).collect();
        for child in children {
            let child_box = &self.tree.arena[child];
            let owned_anonymous = child_box.is_anonymous() && child_box.node == Some(node);
            let inherited_text = child_box.kind == BoxKind::Text && *child_box.style == *old_style;
            if owned_anonymous {
                self.swap_style(child, node, old_style, new_style);
            } else if inherited_text {
                self.tree.arena[child].style = new_style.clone();
            }
        }
    }

    /// Removes the boxes of `node` and builds new ones.
    fn recreate(&mut self, node: OpaqueNode) -> Result<()> {
        let content = self.context.content;
        let Some(container) = content.insertion_parent(node) else {
            return Err(ConstructionError::DetachedContent(node));
        };
        if content.kind(container) == NodeKind::Document {
            return self.rebuild_root();
        }
        if self.remove_content(container, node)? == Removal::Reconstructed {
            return Ok(());
        }
        self.insert_content(container, node, node)
    }

    /// The node to rebuild so that the boxes below `id` are rebuilt with it, or `None` when
    /// the whole tree must be rebuilt.
    ///
    /// That is the nearest box at or above `id` that belongs to an element, and that can be
    /// removed and built again without touching its siblings.
    fn containing_block_for_reconstruction(&self, id: BoxId) -> Option<OpaqueNode> {
        let tree = &self.tree;
        let start = tree.in_flow_box(tree.first_in_split_chain(id));
        let mut current = start;
        loop {
            let layout_box = tree.get(current)?;
            let parent = tree.get(layout_box.parent?)?;
            if parent.kind == BoxKind::Viewport {
                return None;
            }
            let rebuildable = layout_box.node.is_some() &&
                layout_box.pseudo.is_none() &&
                !layout_box.is_anonymous() &&
                !layout_box.is_special() &&
                !layout_box.is_generated_content() &&
                !layout_box.is_placeholder() &&
                !matches!(
                    layout_box.kind,
                    BoxKind::Inline | BoxKind::Text | BoxKind::FirstLine | BoxKind::FirstLetter
                ) &&
                (!layout_box.kind.is_table_part() || layout_box.kind == BoxKind::TableWrapper) &&
                !parent.is_special() &&
                !is_structural_anonymous(parent) &&
                parent.kind != BoxKind::Inline;
            if rebuildable {
                return layout_box.node;
            }
            let next = tree.first_in_split_chain(tree.parent(current)?);
            current = tree.in_flow_box(next);
        }
    }

    /// Rebuilds the boxes of the nearest element above `id` that can be rebuilt as a
    /// whole.
    fn reconstruct_containing_block(&mut self, id: BoxId) -> Result<()> {
        match self.containing_block_for_reconstruction(id) {
            Some(node) => {
                debug!("Reconstructing the containing block {:?}", node);
                let content = self.context.content;
                let Some(container) = content.insertion_parent(node) else {
                    return self.rebuild_root();
                };
                match self.remove_boxes(container, node, true)? {
                    Removal::Reconstructed => Ok(()),
                    Removal::Removed => self.insert_content(container, node, node),
                }
            },
            None => {
                debug!("Reconstructing the whole box tree");
                self.rebuild_root()
            },
        }
    }

    /// The box of the child `node` of `container`, when `container` has the box `parent`.
    fn box_of_child(&self, node: OpaqueNode, parent: BoxId) -> Option<BoxId> {
        self.tree
            .primary_box(node)
            .or_else(|| self.tree.find_box_below(parent, node))
    }

    /// The box in the principal list of `parent` that holds `id`, which may be `id`, its
    /// placeholder or an anonymous box around it.
    fn representative_in(&self, id: BoxId, parent: BoxId, last: bool) -> Option<BoxId> {
        let tree = &self.tree;
        let end = if last {
            tree.last_in_split_chain(id)
        } else {
            tree.first_in_split_chain(id)
        };
        let end = if last {
            tree.continuations(end).last().copied().unwrap_or(end)
        } else {
            end
        };
        let mut current = tree.in_flow_box(end);
        loop {
            let layout_box = tree.get(current)?;
            let current_parent = layout_box.parent?;
            if current_parent == parent {
                return (layout_box.parent_list == ChildListId::Principal).then_some(current);
            }
            current = tree.in_flow_box(current_parent);
        }
    }

    /// Walks the content siblings of a node from `start` on, and returns the first box in
    /// the principal list of `parent` that belongs to one of them.
    fn find_sibling_box(
        &self,
        start: Option<OpaqueNode>,
        parent: BoxId,
        forward: bool,
    ) -> Option<BoxId> {
        let content = self.context.content;
        let mut current = start;
        while let Some(node) = current {
            if let Some(id) = self
                .box_of_child(node, parent)
                .and_then(|id| self.representative_in(id, parent, !forward))
            {
                return Some(id);
            }
            // The children of a `display: contents` element are siblings too.
            let boxless_element = content.is_element(node) &&
                self.tree.primary_box(node).is_none() &&
                self.tree.undisplayed_style(node).is_none();
            if boxless_element {
                let inner = if forward {
                    content.first_child(node)
                } else {
                    content.last_child(node)
                };
                if let Some(id) = self.find_sibling_box(inner, parent, forward) {
                    return Some(id);
                }
            }
            current = if forward {
                content.next_sibling(node)
            } else {
                content.previous_sibling(node)
            };
        }
        None
    }

    /// Builds boxes for the children of `container` from `first` to `last`, and links them
    /// into the tree.
    fn insert_content(
        &mut self,
        container: OpaqueNode,
        first: OpaqueNode,
        last: OpaqueNode,
    ) -> Result<()> {
        let context = self.context;
        let content = context.content;
        if content.kind(container) == NodeKind::Document || self.tree.root().is_none() {
            return self.rebuild_root();
        }

        let Some(primary) = self.tree.primary_box(container) else {
            if self.is_undisplayed(container) {
                trace!("Ignoring content inserted into undisplayed {:?}", container);
                return Ok(());
            }
            // A `display: contents` container, or one whose children are never built.
            return match self.container_box_for(container) {
                Some(ancestor) => self.reconstruct_containing_block(ancestor),
                None => Ok(()),
            };
        };
        let element_style = self.tree.arena[primary].style.clone();
        let skips_children = dispatch::find_construction_data(content, container, &element_style)
            .is_none_or(|data| data.flags.contains(ConstructionFlags::SKIP_CHILDREN));
        if skips_children || self.tree.arena[primary].kind.is_leaf() {
            return Ok(());
        }
        let insertion = insertion_box(&self.tree, primary);

        if self.tree.arena[insertion].is_special() {
            debug!("Insertion into part of a split inline {:?}", insertion);
            return self.reconstruct_containing_block(insertion);
        }

        let letter_container = first_line::first_letter_container(&self.tree, insertion);
        if let Some(block) = letter_container {
            first_line::unwrap_first_line_and_letter(&mut self.tree, block);
        }

        let previous = self
            .find_sibling_box(content.previous_sibling(first), insertion, false)
            .or_else(|| {
                self.tree
                    .pseudo_box(container, PseudoElement::Before)
                    .and_then(|before| self.representative_in(before, insertion, true))
            });
        let next = self
            .find_sibling_box(content.next_sibling(last), insertion, true)
            .or_else(|| {
                self.tree
                    .pseudo_box(container, PseudoElement::After)
                    .and_then(|after| self.representative_in(after, insertion, false))
            });

        let neighbours_anonymous_table_parts = [previous, next]
            .into_iter()
            .flatten()
            .any(|neighbour| is_anonymous_table_part(&self.tree.arena[neighbour]));
        if neighbours_anonymous_table_parts {
            debug!("Insertion next to anonymous table boxes in {:?}", insertion);
            self.reconstruct_containing_block(insertion)?;
            return self.rewrap(letter_container);
        }

        let mut nodes = vec![first];
        let mut current = first;
        while current != last {
            match content.next_sibling(current) {
                Some(next) => {
                    nodes.push(next);
                    current = next;
                },
                None => break,
            }
        }

        let layout_box = &self.tree.arena[insertion];
        let parent = ParentInfo {
            id: insertion,
            kind: layout_box.kind,
            style: element_style,
            node: Some(container),
        };
        let svg_content = layout_box.flags.contains(BoxStateFlags::SVG_CONTENT) ||
            layout_box.kind == BoxKind::SvgOuter;
        let wraps_inline_children = layout_box
            .flags
            .contains(BoxStateFlags::WRAPS_INLINE_CHILDREN);
        let neighbours_wrapper_blocks = [previous, next].into_iter().flatten().any(|neighbour| {
            self.tree.arena[neighbour].style.anonymous_box == Some(AnonymousBoxType::WrapperBlock)
        });

        let containing_blocks = ContainingBlocks::for_descendants_of(&self.tree, insertion);
        let outcome = run_pass(&mut self.tree, context, containing_blocks, |state| {
            if svg_content {
                state
                    .additional_state_bits
                    .insert(BoxStateFlags::SVG_CONTENT);
            }
            let mut items = BoxList::new();
            for node in &nodes {
                construct::process_child(state, *node, &parent, &mut items)?;
            }
            table::close_pseudo_chain(state, &mut items);
            state.additional_state_bits = BoxStateFlags::empty();

            let arena = &state.tree.arena;
            let block_in_inline = parent.kind == BoxKind::Inline &&
                items.iter(arena).any(|id| arena[id].is_block_level());
            let inline_in_wrapper = wraps_inline_children &&
                (neighbours_wrapper_blocks ||
                    items.iter(arena).any(|id| arena[id].is_inline_level()));
            if block_in_inline || inline_in_wrapper {
                debug!(
                    "Discarding boxes built for {:?}: block in inline {}, \
                     inline in wrapping container {}",
                    first, block_in_inline, inline_in_wrapper
                );
                state.discard();
                return Ok(PassOutcome::NeedsReconstruction);
            }

            if parent.kind == BoxKind::Table {
                items = table::route_table_children(state, insertion, items);
            }
            trace!("Inserting {} boxes into {:?}", items.len(&state.tree.arena), insertion);
            state
                .tree
                .insert_children_after(insertion, ChildListId::Principal, previous, items, false);
            Ok(PassOutcome::Inserted)
        })?;

        if outcome == PassOutcome::NeedsReconstruction {
            self.reconstruct_containing_block(insertion)?;
        } else {
            self.restyles.post(container, RestyleHint::REFLOW);
            self.generated_content_dirty = true;
        }
        self.rewrap(letter_container)
    }

    /// Applies `::first-line` and `::first-letter` again to a block whose boxes changed.
    fn rewrap(&mut self, block: Option<BoxId>) -> Result<()> {
        let Some(block) = block.filter(|block| self.tree.contains(*block)) else {
            return Ok(());
        };
        let containing_blocks = ContainingBlocks::for_descendants_of(&self.tree, block);
        run_pass(&mut self.tree, self.context, containing_blocks, |state| {
            first_line::wrap_first_line_and_letter(state, block)
        })
    }

    /// Removes the boxes of `child`, which was removed from `container`.
    fn remove_content(&mut self, container: OpaqueNode, child: OpaqueNode) -> Result<Removal> {
        let content = self.context.content;
        if content.kind(container) == NodeKind::Document {
            debug!("Root element removed, destroying the box tree");
            self.destroy_root();
            self.forget_subtree(child);
            return Ok(Removal::Removed);
        }
        self.remove_boxes(container, child, false)
    }

    /// Whether removing the in-flow box `in_flow` would leave the anonymous boxes around
    /// it, or the split inline it is part of, in a shape that a fresh build would not
    /// produce.
    fn removal_needs_reconstruction(&self, in_flow: BoxId) -> bool {
        let tree = &self.tree;
        if tree.touches_split_chain(in_flow) {
            return true;
        }
        let layout_box = &tree.arena[in_flow];
        let parent_is_wrapper = layout_box
            .parent
            .and_then(|parent| tree.get(parent))
            .is_some_and(|parent| {
                is_structural_anonymous(parent) ||
                    parent.flags.contains(BoxStateFlags::WRAPS_INLINE_CHILDREN)
            });
        // Anonymous tables on both sides of the box would have to merge.
        let next_to_anonymous_table = [layout_box.previous_sibling, layout_box.next_sibling]
            .into_iter()
            .flatten()
            .any(|sibling| is_anonymous_table_part(&tree.arena[sibling]));
        parent_is_wrapper || next_to_anonymous_table
    }

    /// Evicts the undisplayed styles and pending restyles of `node` and its descendants.
    fn forget_subtree(&mut self, node: OpaqueNode) {
        for node in self.context.content.subtree(node) {
            self.tree.remove_undisplayed_style(node);
            self.restyles.forget(node);
        }
    }

    fn remove_boxes(
        &mut self,
        container: OpaqueNode,
        child: OpaqueNode,
        reconstructing: bool,
    ) -> Result<Removal> {
        let content = self.context.content;
        let container_box = self
            .tree
            .primary_box(container)
            .or_else(|| self.container_box_for(container));
        let found = self.tree.primary_box(child).or_else(|| {
            container_box.and_then(|container_box| self.tree.find_box_below(container_box, child))
        });

        let Some(id) = found else {
            let had_undisplayed_style = self.tree.undisplayed_style(child).is_some();
            self.forget_subtree(child);
            if content.is_element(child) &&
                !had_undisplayed_style &&
                !self.is_undisplayed(container)
            {
                // The boxes of the children of a `display: contents` element are boxes of
                // the container.
                if let Some(container_box) = container_box {
                    if self.tree.children(container_box, ChildListId::Principal).next().is_some() {
                        self.reconstruct_containing_block(container_box)?;
                        return Ok(Removal::Reconstructed);
                    }
                }
            }
            return Ok(Removal::Removed);
        };

        let parent = self.tree.parent(self.tree.in_flow_box(id));
        let letter_container =
            parent.and_then(|parent| first_line::first_letter_container(&self.tree, parent));
        if let Some(block) = letter_container {
            first_line::unwrap_first_line_and_letter(&mut self.tree, block);
        }

        let in_flow = self.tree.in_flow_box(id);
        let needs_reconstruction = !reconstructing && self.removal_needs_reconstruction(in_flow);
        if needs_reconstruction {
            debug!("Removal of {:?} touches anonymous or split boxes", child);
            let parent = self.tree.parent(in_flow).unwrap_or(in_flow);
            self.reconstruct_containing_block(parent)?;
            self.rewrap(letter_container)?;
            return Ok(Removal::Reconstructed);
        }

        let history = self.context.history;
        let members: Vec<BoxId> = self
            .tree
            .split_chain(id)
            .into_iter()
            .flat_map(|member| self.tree.continuations(member))
            .collect();
        trace!("Destroying {} boxes of {:?}", members.len(), child);
        for member in members {
            self.tree
                .destroy_box(member, &mut |_, layout_box| save_history(history, layout_box));
        }
        self.forget_subtree(child);
        self.restyles.post(container, RestyleHint::REFLOW);
        self.generated_content_dirty = true;
        self.rewrap(letter_container)?;
        Ok(Removal::Removed)
    }
}

#[cfg(test)]
mod test {
    use construction_api::HistoryMap;
    use construction_api::testing::TestDocument;

    use super::*;

    fn anonymous(box_type: AnonymousBoxType, node: Option<OpaqueNode>) -> LayoutBox {
        LayoutBox::new(
            BoxKind::Block,
            Arc::new(ComputedStyle::for_anonymous_box(box_type, &ComputedStyle::default())),
            node,
        )
    }

    #[test]
    fn structural_anonymous_boxes() {
        let node = Some(OpaqueNode(4));
        assert!(is_structural_anonymous(&anonymous(AnonymousBoxType::WrapperBlock, node)));
        assert!(is_structural_anonymous(&anonymous(AnonymousBoxType::TableCell, None)));
        assert!(is_structural_anonymous(&anonymous(AnonymousBoxType::Table, None)));
        assert!(!is_structural_anonymous(&anonymous(AnonymousBoxType::Table, node)));
        assert!(!is_structural_anonymous(&anonymous(AnonymousBoxType::ScrolledContent, node)));
        assert!(!is_structural_anonymous(&anonymous(AnonymousBoxType::Viewport, None)));
    }

    #[test]
    fn first_line_and_letter_are_wrapped_once() {
        let (doc, body) = TestDocument::with_body();
        let inline = ComputedStyle {
            display: Display::Inline,
            ..Default::default()
        };
        let paragraph = doc.append_element(
            body,
            "p",
            ComputedStyle {
                display: Display::Block,
                ..Default::default()
            },
        );
        doc.set_pseudo_style(paragraph, PseudoElement::FirstLine, inline.clone());
        doc.set_pseudo_style(paragraph, PseudoElement::FirstLetter, inline);
        doc.append_text(paragraph, "Hello");
        let history = HistoryMap::default();
        let mut constructor = BoxConstructor::new(ConstructionContext::new(&doc, &doc, &history));
        constructor.construct_root().unwrap();

        let outline = |constructor: &BoxConstructor| {
            constructor
                .dump()
                .and_then(|dump| dump.find(paragraph).map(BoxDump::outline))
                .unwrap_or_default()
        };
        let before = outline(&constructor);
        assert!(before.contains("FirstLine ::first-line"));
        assert!(before.contains("FirstLetter ::first-letter"));
        let box_count = constructor.tree.len();

        let block = constructor.primary_box_for(paragraph).unwrap();
        let context = constructor.context();
        for _ in 0..2 {
            let containing_blocks = ContainingBlocks::for_descendants_of(&constructor.tree, block);
            run_pass(&mut constructor.tree, context, containing_blocks, |state| {
                first_line::wrap_first_line_and_letter(state, block)
            })
            .unwrap();
            assert_eq!(outline(&constructor), before);
            assert_eq!(constructor.tree.len(), box_count);
        }
    }
}
