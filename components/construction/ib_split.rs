/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Inlines that contain block-level boxes.
//!
//! <https://drafts.csswg.org/css2/#anonymous-block-level>
//!
//! An inline box whose children include block-level boxes is split into three boxes that
//! end up as siblings: the original inline with the children before the first block-level
//! box, an anonymous block with everything from the first to the last block-level box,
//! and a continuation inline with the rest. The three are linked into a split chain, and
//! are all marked special, so that incremental updates touching them rebuild their
//! containing block instead.

use construction_api::AnonymousBoxType;
use log::debug;

use crate::box_list::BoxList;
use crate::boxes::{BoxId, BoxKind, ChildListId, LayoutBox, SplitChain, SplitRole};
use crate::error::Result;
use crate::state::BoxConstructorState;
use crate::tree::BoxTree;

/// Whether the inline `inline` has block-level children.
pub(crate) fn needs_split(tree: &BoxTree, inline: BoxId) -> bool {
    tree.children(inline, ChildListId::Principal)
        .any(|child| tree.arena[child].is_block_level())
}

/// Collects the placeholders below `id` whose out-of-flow boxes would have a containing
/// block outside of `id`, without descending into boxes that contain their own floats.
fn collect_placeholders(tree: &BoxTree, id: BoxId, placeholders: &mut Vec<BoxId>) {
    for child in tree.children(id, ChildListId::Principal) {
        let layout_box = &tree.arena[child];
        if layout_box.is_placeholder() {
            placeholders.push(child);
        } else if !layout_box.kind.is_float_containing_block() {
            collect_placeholders(tree, child, placeholders);
        }
    }
}

/// Splits the inline `inline` around its block-level children, returning the boxes that
/// replace it in its parent, in order.
pub(crate) fn split_inline(
    state: &mut BoxConstructorState<'_>,
    inline: BoxId,
) -> Result<Vec<BoxId>> {
    let children = state.tree.child_list(inline, ChildListId::Principal);
    let block_level: Vec<BoxId> = children
        .iter(&state.tree.arena)
        .filter(|child| state.tree.arena[*child].is_block_level())
        .collect();
    let (Some(first_block), Some(last_block)) = (block_level.first(), block_level.last()) else {
        return Ok(vec![inline]);
    };
    let (first_block, last_block) = (*first_block, *last_block);

    let (style, node) = {
        let layout_box = &state.tree.arena[inline];
        (layout_box.style.clone(), layout_box.node)
    };

    // Allocate everything before moving any box, so a failure leaves the inline intact.
    let block = state.create_anonymous_box(
        BoxKind::Block,
        AnonymousBoxType::InlineSplitBlock,
        &style,
        node,
    )?;
    let continuation = state.create_box(LayoutBox::new(BoxKind::Inline, style, node))?;
    debug!(
        "Splitting inline {:?} into {:?} and {:?}",
        inline, block, continuation
    );

    let (middle, trailing) = state
        .tree
        .with_child_list(inline, ChildListId::Principal, |list, arena| {
            let trailing = list.split_after(arena, last_block);
            let middle = list.extract_range(arena, first_block, last_block);
            (middle, trailing)
        });
    state
        .tree
        .set_initial_children(block, ChildListId::Principal, middle);
    state
        .tree
        .set_initial_children(continuation, ChildListId::Principal, trailing);

    // Floats whose placeholders moved into the block now have it as containing block.
    let mut placeholders = Vec::new();
    collect_placeholders(state.tree, block, &mut placeholders);
    let floats = state.take_floats_for(&placeholders);
    state.tree.append_children(block, ChildListId::Float, floats);

    let previous = state.tree.arena[inline]
        .split
        .chain()
        .and_then(|chain| chain.previous);
    state.tree.arena[inline].split = SplitRole::SplitInline {
        chain: SplitChain {
            previous,
            next: Some(block),
        },
    };
    state.tree.arena[block].split = SplitRole::SplitAnonBlock {
        chain: SplitChain {
            previous: Some(inline),
            next: Some(continuation),
        },
    };
    state.tree.arena[continuation].split = SplitRole::SplitInline {
        chain: SplitChain {
            previous: Some(block),
            next: None,
        },
    };
    Ok(vec![inline, block, continuation])
}

/// Whether a principal list obeys the split invariant: no inline-level box of the list has
/// a block-level child, and every split chain is an odd-length alternation of inlines and
/// anonymous blocks.
pub fn check_split_invariant(tree: &BoxTree, list: &BoxList) -> bool {
    list.iter(&tree.arena).all(|id| {
        let layout_box = &tree.arena[id];
        if layout_box.kind == BoxKind::Inline && needs_split(tree, id) {
            return false;
        }
        let chain = tree.split_chain(id);
        if chain.len() > 1 {
            let alternates = chain.iter().enumerate().all(|(index, member)| {
                match tree.arena[*member].split {
                    SplitRole::SplitInline { .. } => index % 2 == 0,
                    SplitRole::SplitAnonBlock { .. } => index % 2 == 1,
                    SplitRole::Normal => false,
                }
            });
            if chain.len() % 2 == 0 || !alternates {
                return false;
            }
        }
        layout_box
            .child_list_ids()
            .all(|child_list| check_split_invariant(tree, &layout_box.child_list(child_list)))
    })
}
