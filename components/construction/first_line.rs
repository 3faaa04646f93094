/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! `::first-line` and `::first-letter`.
//!
//! <https://drafts.csswg.org/css-pseudo-4/#first-text-line>
//!
//! Both are applied after the children of a block container were built, by wrapping
//! existing boxes: the leading run of inline-level children goes into a first-line box,
//! and the first letter of the first text is split off its text box into a first-letter
//! box. Mutations near the start of such a block unwrap both first, and wrap again once
//! the mutation is done.

use construction_api::{ComputedStyle, OpaqueNode, PseudoElement};
use log::debug;
use unicode_categories::UnicodeCategories;

use crate::box_list::BoxList;
use crate::boxes::{BoxData, BoxId, BoxKind, BoxStateFlags, ChildListId, LayoutBox, TextData};
use crate::construct::is_collapsible_whitespace;
use crate::error::Result;
use crate::state::BoxConstructorState;
use crate::tree::BoxTree;

/// Records on `block` whether the element `node` has `::first-line` or `::first-letter`
/// styles.
pub(crate) fn note_block_pseudo_elements(
    state: &mut BoxConstructorState<'_>,
    block: BoxId,
    node: OpaqueNode,
    style: &ComputedStyle,
) {
    let prefs = state.context.prefs;
    let styles = state.context.styles;
    let mut flags = BoxStateFlags::empty();
    if prefs.first_line_enabled &&
        styles
            .resolve_style(node, Some(style), Some(PseudoElement::FirstLine))
            .is_some()
    {
        flags.insert(BoxStateFlags::WANTS_FIRST_LINE);
    }
    if prefs.first_letter_enabled &&
        styles
            .resolve_style(node, Some(style), Some(PseudoElement::FirstLetter))
            .is_some()
    {
        flags.insert(BoxStateFlags::WANTS_FIRST_LETTER);
    }
    state.tree.arena[block].flags.insert(flags);
}

/// The length in bytes of the first letter of `text`: leading punctuation and whitespace,
/// then one character with the marks that combine with it.
pub(crate) fn first_letter_length(text: &str) -> usize {
    let mut characters = text.char_indices().peekable();
    let mut seen_punctuation = false;
    while let Some(&(_, character)) = characters.peek() {
        if !character.is_whitespace() && !character.is_punctuation() {
            break;
        }
        seen_punctuation |= character.is_punctuation();
        characters.next();
    }
    let Some((index, letter)) = characters.next() else {
        return if seen_punctuation { text.len() } else { 0 };
    };
    let mut end = index + letter.len_utf8();
    for (index, character) in characters {
        if !character.is_mark() && !character.is_punctuation() {
            break;
        }
        end = index + character.len_utf8();
    }
    end
}

/// Finds the first text box of `block` that has something other than collapsible
/// whitespace, stopping at the first block-level box.
fn find_first_letter_text(tree: &BoxTree, block: BoxId) -> Option<BoxId> {
    // `Err` stops the search at a box that ends the first line.
    fn search(tree: &BoxTree, parent: BoxId) -> std::result::Result<Option<BoxId>, ()> {
        for child in tree.children(parent, ChildListId::Principal) {
            let layout_box = &tree.arena[child];
            match layout_box.kind {
                BoxKind::Placeholder => continue,
                BoxKind::Text => {
                    if layout_box.text().is_some_and(|text| !is_collapsible_whitespace(text)) {
                        return Ok(Some(child));
                    }
                },
                BoxKind::Inline | BoxKind::FirstLine => {
                    if let Some(found) = search(tree, child)? {
                        return Ok(Some(found));
                    }
                },
                _ => return Err(()),
            }
        }
        Ok(None)
    }
    search(tree, block).ok().flatten()
}

fn resolve_pseudo_style(
    state: &BoxConstructorState<'_>,
    block: BoxId,
    pseudo: PseudoElement,
) -> Option<(OpaqueNode, servo_arc::Arc<ComputedStyle>)> {
    let layout_box = state.tree.get(block)?;
    let node = layout_box.node?;
    let style = state
        .context
        .styles
        .resolve_style(node, Some(&layout_box.style), Some(pseudo))?;
    Some((node, style))
}

/// Wraps the leading inline-level children of `block` in a first-line box.
fn wrap_first_line(state: &mut BoxConstructorState<'_>, block: BoxId) -> Result<()> {
    if state.tree.arena[block]
        .flags
        .contains(BoxStateFlags::HAS_FIRST_LINE)
    {
        return Ok(());
    }
    let Some((node, style)) = resolve_pseudo_style(state, block, PseudoElement::FirstLine) else {
        return Ok(());
    };
    let run: Vec<BoxId> = state
        .tree
        .children(block, ChildListId::Principal)
        .take_while(|child| state.tree.arena[*child].is_inline_level())
        .collect();
    let (Some(first), Some(last)) = (run.first().copied(), run.last().copied()) else {
        return Ok(());
    };

    let mut line_box = LayoutBox::new(BoxKind::FirstLine, style, Some(node));
    line_box.pseudo = Some(PseudoElement::FirstLine);
    let line = state.create_box(line_box)?;
    let children = state
        .tree
        .with_child_list(block, ChildListId::Principal, |list, arena| {
            list.extract_range(arena, first, last)
        });
    state
        .tree
        .set_initial_children(line, ChildListId::Principal, children);
    state.tree.insert_children_after(
        block,
        ChildListId::Principal,
        None,
        BoxList::single(line),
        false,
    );
    state.tree.arena[block]
        .flags
        .insert(BoxStateFlags::HAS_FIRST_LINE);
    Ok(())
}

/// Splits the first letter of the first text of `block` into a first-letter box.
fn wrap_first_letter(state: &mut BoxConstructorState<'_>, block: BoxId) -> Result<()> {
    if state.tree.arena[block]
        .flags
        .contains(BoxStateFlags::HAS_FIRST_LETTER)
    {
        return Ok(());
    }
    let Some((node, letter_style)) =
        resolve_pseudo_style(state, block, PseudoElement::FirstLetter)
    else {
        return Ok(());
    };
    let Some(text_box) = find_first_letter_text(state.tree, block) else {
        return Ok(());
    };
    let (text, offset, text_style, text_node) = {
        let layout_box = &state.tree.arena[text_box];
        let Some(text) = layout_box.text() else {
            return Ok(());
        };
        let offset = match &layout_box.data {
            BoxData::Text(data) => data.offset,
            _ => 0,
        };
        (
            text.to_owned(),
            offset,
            layout_box.style.clone(),
            layout_box.node,
        )
    };
    let length = first_letter_length(&text);
    if length == 0 {
        return Ok(());
    }

    // Allocate everything before moving any box.
    let mut letter_box = LayoutBox::new(BoxKind::FirstLetter, letter_style.clone(), Some(node));
    letter_box.pseudo = Some(PseudoElement::FirstLetter);
    let letter = state.create_box(letter_box)?;
    let continuation = if length < text.len() {
        let mut remainder = LayoutBox::new(BoxKind::Text, text_style, text_node).with_data(
            BoxData::Text(TextData {
                text: text[length..].to_owned(),
                offset: offset + length,
                generated: None,
            }),
        );
        remainder.previous_in_flow = Some(text_box);
        Some(state.create_box(remainder)?)
    } else {
        None
    };
    let floating = letter_style.is_floating() && state.float_items.containing_block.is_some();
    let placeholder = if floating {
        Some(state.create_placeholder(letter, &letter_style)?)
    } else {
        None
    };

    let (Some(parent), previous) = ({
        let layout_box = &state.tree.arena[text_box];
        (layout_box.parent, layout_box.previous_sibling)
    }) else {
        return Ok(());
    };
    debug!("Splitting first letter of {:?} into {:?}", text_box, letter);
    if let BoxData::Text(data) = &mut state.tree.arena[text_box].data {
        data.text.truncate(length);
    }
    state.tree.arena[text_box].next_in_flow = continuation;
    state.tree.unlink(text_box);
    state
        .tree
        .set_initial_children(letter, ChildListId::Principal, BoxList::single(text_box));

    let in_flow = placeholder.unwrap_or(letter);
    state.tree.insert_children_after(
        parent,
        ChildListId::Principal,
        previous,
        BoxList::single(in_flow),
        false,
    );
    if let Some(continuation) = continuation {
        state.tree.insert_children_after(
            parent,
            ChildListId::Principal,
            Some(in_flow),
            BoxList::single(continuation),
            false,
        );
    }
    if floating {
        state.add_float(letter);
    }
    state.tree.arena[block]
        .flags
        .insert(BoxStateFlags::HAS_FIRST_LETTER);
    Ok(())
}

/// Applies `::first-line` and `::first-letter` to `block`, if it wants them. Does nothing
/// for a block that already has them.
pub(crate) fn wrap_first_line_and_letter(
    state: &mut BoxConstructorState<'_>,
    block: BoxId,
) -> Result<()> {
    let flags = state.tree.arena[block].flags;
    if flags.contains(BoxStateFlags::WANTS_FIRST_LINE) {
        wrap_first_line(state, block)?;
    }
    if flags.contains(BoxStateFlags::WANTS_FIRST_LETTER) {
        wrap_first_letter(state, block)?;
    }
    Ok(())
}

/// Finds the first-letter box of `block`, or the placeholder standing for it when it floats.
fn find_first_letter(tree: &BoxTree, block: BoxId) -> Option<BoxId> {
    let mut stack: Vec<BoxId> = tree.children(block, ChildListId::Principal).collect();
    stack.reverse();
    while let Some(current) = stack.pop() {
        let layout_box = &tree.arena[current];
        if layout_box.kind == BoxKind::FirstLetter {
            return Some(current);
        }
        if let Some(out_of_flow) = layout_box.out_of_flow_for_placeholder() {
            if tree.get(out_of_flow).map(|target| target.kind) == Some(BoxKind::FirstLetter) {
                return Some(out_of_flow);
            }
            continue;
        }
        if matches!(layout_box.kind, BoxKind::Inline | BoxKind::FirstLine) {
            let mut children: Vec<BoxId> = tree.children(current, ChildListId::Principal).collect();
            children.reverse();
            stack.extend(children);
        }
    }
    None
}

/// Merges the first letter of `block` back into its text.
fn unwrap_first_letter(tree: &mut BoxTree, block: BoxId) {
    if !tree.arena[block]
        .flags
        .contains(BoxStateFlags::HAS_FIRST_LETTER)
    {
        return;
    }
    tree.arena[block]
        .flags
        .remove(BoxStateFlags::HAS_FIRST_LETTER);
    let Some(letter) = find_first_letter(tree, block) else {
        return;
    };
    let in_flow = tree.in_flow_box(letter);
    let previous = tree.arena[in_flow].previous_sibling;
    let Some(parent) = tree.parent(in_flow) else {
        return;
    };

    if let Some(text_box) = tree.child_list(letter, ChildListId::Principal).first() {
        let continuation = tree.arena[text_box].next_in_flow;
        if let Some(continuation) = continuation {
            let remainder = tree.arena[continuation].text().unwrap_or_default().to_owned();
            if let BoxData::Text(data) = &mut tree.arena[text_box].data {
                data.text.push_str(&remainder);
            }
            tree.arena[text_box].next_in_flow = None;
            tree.arena[continuation].previous_in_flow = None;
            tree.destroy_box(continuation, &mut |_, _| {});
        }
        tree.move_box(text_box, parent, ChildListId::Principal, previous);
    }
    tree.destroy_box(letter, &mut |_, _| {});
    debug!("Unwrapped first letter of {:?}", block);
}

/// Moves the children of the first-line box of `block` back into `block`.
fn unwrap_first_line(tree: &mut BoxTree, block: BoxId) {
    if !tree.arena[block]
        .flags
        .contains(BoxStateFlags::HAS_FIRST_LINE)
    {
        return;
    }
    tree.arena[block]
        .flags
        .remove(BoxStateFlags::HAS_FIRST_LINE);
    let Some(line) = tree
        .children(block, ChildListId::Principal)
        .find(|child| tree.arena[*child].kind == BoxKind::FirstLine)
    else {
        return;
    };
    let previous = tree.arena[line].previous_sibling;
    let children = tree.with_child_list(line, ChildListId::Principal, |list, _| list.take());
    tree.insert_children_after(block, ChildListId::Principal, previous, children, false);
    tree.destroy_box(line, &mut |_, _| {});
}

/// Undoes [`wrap_first_line_and_letter`].
pub(crate) fn unwrap_first_line_and_letter(tree: &mut BoxTree, block: BoxId) {
    if !tree.contains(block) {
        return;
    }
    unwrap_first_letter(tree, block);
    unwrap_first_line(tree, block);
}

/// The block container whose first line or first letter may include boxes added to or
/// removed from `parent`, if it has any of them.
pub(crate) fn first_letter_container(tree: &BoxTree, parent: BoxId) -> Option<BoxId> {
    let mut current = parent;
    loop {
        let layout_box = tree.get(current)?;
        if !matches!(
            layout_box.kind,
            BoxKind::Inline | BoxKind::FirstLine | BoxKind::FirstLetter
        ) {
            let wants = BoxStateFlags::WANTS_FIRST_LETTER | BoxStateFlags::WANTS_FIRST_LINE;
            return layout_box.flags.intersects(wants).then_some(current);
        }
        current = tree.parent(tree.in_flow_box(current))?;
    }
}
