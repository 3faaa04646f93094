/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The state of one construction pass.
//!
//! A [`BoxConstructorState`] lives for a single pass over some content, and carries what
//! is cheaper to thread through the recursion than to recompute: the containing blocks
//! of out-of-flow boxes, with the boxes collected for each of them so far, and the open
//! chain of table pseudo boxes.
//!
//! Containing blocks are pushed with scoped guards. Dropping a guard moves the boxes
//! collected for its containing block into the tree and restores the containing block
//! that was current before, so the flush runs however the scope is left.

use std::ops::{Deref, DerefMut};

use construction_api::{AnonymousBoxType, ComputedStyle, OpaqueNode};
use log::{debug, trace};

use crate::box_list::BoxList;
use crate::boxes::{BoxData, BoxId, BoxKind, BoxStateFlags, ChildListId, LayoutBox};
use crate::context::ConstructionContext;
use crate::error::Result;
use crate::table::PseudoBoxRegistry;
use crate::tree::BoxTree;

/// The categories of out-of-flow boxes, in the order their containing blocks are flushed.
/// Placeholders of later categories may be inside boxes of earlier ones, and must already
/// be in the tree when the later ones are flushed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum OutOfFlowCategory {
    Float,
    Absolute,
    Fixed,
    Popup,
}

impl OutOfFlowCategory {
    pub(crate) fn child_list(&self) -> ChildListId {
        match self {
            OutOfFlowCategory::Float => ChildListId::Float,
            OutOfFlowCategory::Absolute => ChildListId::Absolute,
            OutOfFlowCategory::Fixed => ChildListId::Fixed,
            OutOfFlowCategory::Popup => ChildListId::Popup,
        }
    }

    pub(crate) fn for_style(style: &ComputedStyle) -> Option<Self> {
        if style.is_popup() {
            Some(OutOfFlowCategory::Popup)
        } else if style.is_fixed_positioned() {
            Some(OutOfFlowCategory::Fixed)
        } else if style.is_absolutely_positioned() {
            Some(OutOfFlowCategory::Absolute)
        } else if style.is_floating() {
            Some(OutOfFlowCategory::Float)
        } else {
            None
        }
    }
}

/// The out-of-flow boxes collected for one containing block.
#[derive(Debug, Default)]
pub(crate) struct AbsoluteItems {
    /// `None` when there is no containing block for this category, in which case boxes of
    /// the category stay in flow.
    pub containing_block: Option<BoxId>,
    pub items: BoxList,
}

impl AbsoluteItems {
    pub(crate) fn new(containing_block: Option<BoxId>) -> Self {
        Self {
            containing_block,
            items: BoxList::new(),
        }
    }
}

pub(crate) struct BoxConstructorState<'a> {
    pub tree: &'a mut BoxTree,
    pub context: ConstructionContext<'a>,
    pub float_items: AbsoluteItems,
    pub absolute_items: AbsoluteItems,
    pub fixed_items: AbsoluteItems,
    pub popup_items: AbsoluteItems,
    pub pseudo_boxes: PseudoBoxRegistry,
    /// Bits set on every box built while they are set.
    pub additional_state_bits: BoxStateFlags,
    /// Every box allocated by this pass, so that a failed pass can be undone.
    created: Vec<BoxId>,
}

impl<'a> BoxConstructorState<'a> {
    pub(crate) fn new(
        tree: &'a mut BoxTree,
        context: ConstructionContext<'a>,
        containing_blocks: ContainingBlocks,
    ) -> Self {
        Self {
            tree,
            context,
            float_items: AbsoluteItems::new(containing_blocks.float),
            absolute_items: AbsoluteItems::new(containing_blocks.absolute),
            fixed_items: AbsoluteItems::new(containing_blocks.fixed),
            popup_items: AbsoluteItems::new(containing_blocks.popup),
            pseudo_boxes: PseudoBoxRegistry::default(),
            additional_state_bits: BoxStateFlags::empty(),
            created: Vec::new(),
        }
    }

    fn items_mut(&mut self, category: OutOfFlowCategory) -> &mut AbsoluteItems {
        match category {
            OutOfFlowCategory::Float => &mut self.float_items,
            OutOfFlowCategory::Absolute => &mut self.absolute_items,
            OutOfFlowCategory::Fixed => &mut self.fixed_items,
            OutOfFlowCategory::Popup => &mut self.popup_items,
        }
    }

    fn items(&self, category: OutOfFlowCategory) -> &AbsoluteItems {
        match category {
            OutOfFlowCategory::Float => &self.float_items,
            OutOfFlowCategory::Absolute => &self.absolute_items,
            OutOfFlowCategory::Fixed => &self.fixed_items,
            OutOfFlowCategory::Popup => &self.popup_items,
        }
    }

    /// Allocates a box, applying the additional state bits of the pass.
    pub(crate) fn create_box(&mut self, mut layout_box: LayoutBox) -> Result<BoxId> {
        layout_box.flags.insert(self.additional_state_bits);
        let id = self.tree.allocate(layout_box)?;
        self.created.push(id);
        Ok(id)
    }

    /// Allocates an anonymous box of the given type inside a box with style `parent_style`.
    pub(crate) fn create_anonymous_box(
        &mut self,
        kind: BoxKind,
        box_type: AnonymousBoxType,
        parent_style: &ComputedStyle,
        node: Option<OpaqueNode>,
    ) -> Result<BoxId> {
        let style = self
            .context
            .styles
            .resolve_anonymous_style(box_type, parent_style);
        self.create_box(LayoutBox::new(kind, style, node))
    }

    pub(crate) fn push_containing_block(
        &mut self,
        category: OutOfFlowCategory,
        containing_block: Option<BoxId>,
    ) -> ContainingBlockScope<'_, 'a> {
        trace!("Pushing {:?} containing block {:?}", category, containing_block);
        let saved = std::mem::replace(
            self.items_mut(category),
            AbsoluteItems::new(containing_block),
        );
        ContainingBlockScope {
            state: self,
            category,
            saved: Some(saved),
        }
    }

    pub(crate) fn push_float_containing_block(
        &mut self,
        containing_block: Option<BoxId>,
    ) -> ContainingBlockScope<'_, 'a> {
        self.push_containing_block(OutOfFlowCategory::Float, containing_block)
    }

    /// Moves the boxes collected for a containing block into the tree.
    fn flush(&mut self, category: OutOfFlowCategory, items: AbsoluteItems) {
        if items.items.is_empty() {
            return;
        }
        match items.containing_block {
            Some(containing_block) if self.tree.contains(containing_block) => {
                trace!(
                    "Flushing {:?} boxes into {:?}",
                    category, containing_block
                );
                self.tree
                    .append_children(containing_block, category.child_list(), items.items);
            },
            _ => debug!("Dropping {:?} boxes without a containing block", category),
        }
    }

    /// Adds a freshly built box to the boxes of its parent. In-flow boxes go to `in_flow`.
    /// Out-of-flow boxes go to the list of their containing block, and a placeholder takes
    /// their place in `in_flow`.
    pub(crate) fn add_child(&mut self, id: BoxId, in_flow: &mut BoxList) -> Result<()> {
        let style = self.tree.arena[id].style.clone();
        let category = OutOfFlowCategory::for_style(&style)
            .filter(|category| self.items(*category).containing_block.is_some());
        let Some(category) = category else {
            in_flow.append(&mut self.tree.arena, id);
            return Ok(());
        };

        let placeholder = self.create_placeholder(id, &style)?;
        in_flow.append(&mut self.tree.arena, placeholder);
        let items = match category {
            OutOfFlowCategory::Float => &mut self.float_items,
            OutOfFlowCategory::Absolute => &mut self.absolute_items,
            OutOfFlowCategory::Fixed => &mut self.fixed_items,
            OutOfFlowCategory::Popup => &mut self.popup_items,
        };
        items.items.append(&mut self.tree.arena, id);
        Ok(())
    }

    /// Creates the placeholder of `out_of_flow` and registers the pair.
    pub(crate) fn create_placeholder(
        &mut self,
        out_of_flow: BoxId,
        style: &ComputedStyle,
    ) -> Result<BoxId> {
        let placeholder_style = self
            .context
            .styles
            .resolve_anonymous_style(AnonymousBoxType::Placeholder, style);
        let node = self.tree.arena[out_of_flow].node;
        let placeholder = self.create_box(
            LayoutBox::new(BoxKind::Placeholder, placeholder_style, node)
                .with_data(BoxData::Placeholder { out_of_flow }),
        )?;
        self.tree.arena[out_of_flow]
            .flags
            .insert(BoxStateFlags::OUT_OF_FLOW);
        self.tree.register_placeholder(out_of_flow, placeholder);
        Ok(placeholder)
    }

    /// Registers `id` as a float of the current float containing block, for boxes that
    /// become floats after they were built, like floating first letters.
    pub(crate) fn add_float(&mut self, id: BoxId) {
        self.float_items.items.append(&mut self.tree.arena, id);
    }

    /// Removes floats whose placeholders are in `placeholders` from the current float
    /// containing block, returning them.
    pub(crate) fn take_floats_for(&mut self, placeholders: &[BoxId]) -> BoxList {
        let mut taken = BoxList::new();
        for placeholder in placeholders {
            let Some(float) = self.tree.out_of_flow_for(*placeholder) else {
                continue;
            };
            if self
                .float_items
                .items
                .contains(&self.tree.arena, float)
            {
                self.float_items.items.remove(&mut self.tree.arena, float);
                taken.append(&mut self.tree.arena, float);
            }
        }
        taken
    }

    /// Undoes a failed pass: every box it allocated is unlinked and destroyed, and nothing
    /// collected so far is flushed.
    pub(crate) fn discard(&mut self) {
        debug!("Discarding {} boxes of a failed construction pass", self.created.len());
        for category in [
            OutOfFlowCategory::Float,
            OutOfFlowCategory::Absolute,
            OutOfFlowCategory::Fixed,
            OutOfFlowCategory::Popup,
        ] {
            self.items_mut(category).items = BoxList::new();
        }
        self.pseudo_boxes = PseudoBoxRegistry::default();
        let created = std::mem::take(&mut self.created);
        for id in created.iter().rev() {
            self.tree.unlink(*id);
        }
        for id in created.iter().rev() {
            self.tree.destroy_box(*id, &mut |_, _| {});
        }
    }
}

impl Drop for BoxConstructorState<'_> {
    fn drop(&mut self) {
        for category in [
            OutOfFlowCategory::Float,
            OutOfFlowCategory::Absolute,
            OutOfFlowCategory::Fixed,
            OutOfFlowCategory::Popup,
        ] {
            let items = std::mem::take(self.items_mut(category));
            self.flush(category, items);
        }
    }
}

/// The containing blocks a construction pass starts with.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct ContainingBlocks {
    pub float: Option<BoxId>,
    pub absolute: Option<BoxId>,
    pub fixed: Option<BoxId>,
    pub popup: Option<BoxId>,
}

impl ContainingBlocks {
    /// Finds the containing blocks for boxes built as descendants of `parent`, an existing
    /// box of the tree.
    pub(crate) fn for_descendants_of(tree: &BoxTree, parent: BoxId) -> Self {
        let root = tree.root();
        let mut blocks = ContainingBlocks {
            fixed: root,
            popup: root,
            ..Default::default()
        };
        let mut absolute_resolved = false;
        for ancestor in std::iter::once(parent).chain(tree.ancestors(parent)) {
            let Some(layout_box) = tree.get(ancestor) else {
                continue;
            };
            if blocks.float.is_none() && layout_box.kind.is_float_containing_block() {
                blocks.float = Some(ancestor);
            }
            if !absolute_resolved {
                if layout_box
                    .flags
                    .contains(BoxStateFlags::FORCED_EMPTY_ABSPOS_CONTAINER)
                {
                    // Absolutely positioned boxes stay in flow below this box.
                    absolute_resolved = true;
                } else if layout_box.kind == BoxKind::Viewport ||
                    (layout_box
                        .style
                        .establishes_containing_block_for_absolute_descendants() &&
                        layout_box.kind.supports_child_list(ChildListId::Absolute))
                {
                    blocks.absolute = Some(ancestor);
                    absolute_resolved = true;
                }
            }
            if blocks.float.is_some() && absolute_resolved {
                break;
            }
        }
        blocks
    }
}

/// A containing block pushed on a [`BoxConstructorState`]. Dereferences to the state.
pub(crate) struct ContainingBlockScope<'s, 'a> {
    state: &'s mut BoxConstructorState<'a>,
    category: OutOfFlowCategory,
    saved: Option<AbsoluteItems>,
}

impl<'a> Deref for ContainingBlockScope<'_, 'a> {
    type Target = BoxConstructorState<'a>;

    fn deref(&self) -> &Self::Target {
        self.state
    }
}

impl DerefMut for ContainingBlockScope<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.state
    }
}

impl Drop for ContainingBlockScope<'_, '_> {
    fn drop(&mut self) {
        let Some(saved) = self.saved.take() else {
            return;
        };
        let items = std::mem::replace(self.state.items_mut(self.category), saved);
        self.state.flush(self.category, items);
    }
}

/// Either a pushed scope or the state itself, for routines that push a containing block
/// only under some conditions.
pub(crate) fn maybe_push<'s, 'a>(
    state: &'s mut BoxConstructorState<'a>,
    category: OutOfFlowCategory,
    containing_block: Option<Option<BoxId>>,
) -> ContainingBlockScope<'s, 'a> {
    match containing_block {
        Some(containing_block) => state.push_containing_block(category, containing_block),
        None => ContainingBlockScope {
            state,
            category,
            saved: None,
        },
    }
}
