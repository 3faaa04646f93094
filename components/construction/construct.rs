/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Building the boxes of content nodes.
//!
//! Children are built in document order into a [`BoxList`] owned by the caller. Every
//! child goes through [`table::place_and_build`], which decides whether the child needs
//! anonymous table boxes around it, and then through the construction routine that the
//! dispatch tables pick for it.

use construction_api::style::Display;
use construction_api::{
    AnonymousBoxType, ComputedStyle, HistoryKey, NodeKind, OpaqueNode, PseudoElement,
};
use html5ever::{local_name, ns};
use log::trace;
use servo_arc::Arc;

use crate::box_list::BoxList;
use crate::boxes::{BoxData, BoxId, BoxKind, BoxStateFlags, ChildListId, LayoutBox, TextData};
use crate::dispatch::{self, ConstructionData, ConstructionFlags, ConstructionRoutine};
use crate::error::Result;
use crate::state::{BoxConstructorState, OutOfFlowCategory, maybe_push};
use crate::table::{self, TableRole};
use crate::{first_line, generated_content, ib_split};

/// The box that children are being built for.
#[derive(Clone, Debug)]
pub(crate) struct ParentInfo {
    /// The box the children are added to.
    pub id: BoxId,
    pub kind: BoxKind,
    /// The style the children inherit from.
    pub style: Arc<ComputedStyle>,
    /// The element whose children are being built.
    pub node: Option<OpaqueNode>,
}

/// Whether `text` only holds whitespace that collapses away.
pub(crate) fn is_collapsible_whitespace(text: &str) -> bool {
    text.chars()
        .all(|character| matches!(character, ' ' | '\t' | '\n' | '\r' | '\u{c}'))
}

/// Builds the boxes of the children of `node`, including its `::before` and `::after`
/// pseudo-elements, into `items`.
///
/// The anonymous table boxes of the parent that were pending when this was called are
/// set aside while the children are built, so every box gets its own chain.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(name = "BoxConstructor::process_children", skip_all, level = "trace")
)]
pub(crate) fn process_children(
    state: &mut BoxConstructorState<'_>,
    node: OpaqueNode,
    parent: &ParentInfo,
    items: &mut BoxList,
) -> Result<()> {
    let saved = std::mem::take(&mut state.pseudo_boxes);
    let result = process_children_in_order(state, node, parent, items, true);
    state.pseudo_boxes = saved;
    result
}

fn process_children_in_order(
    state: &mut BoxConstructorState<'_>,
    node: OpaqueNode,
    parent: &ParentInfo,
    items: &mut BoxList,
    close_chain: bool,
) -> Result<()> {
    let content = state.context.content;
    build_pseudo_element(state, node, parent, PseudoElement::Before, items)?;
    for child in content.child_nodes(node) {
        process_child(state, child, parent, items)?;
    }
    build_pseudo_element(state, node, parent, PseudoElement::After, items)?;
    if close_chain {
        table::close_pseudo_chain(state, items);
    }
    Ok(())
}

fn build_pseudo_element(
    state: &mut BoxConstructorState<'_>,
    node: OpaqueNode,
    parent: &ParentInfo,
    pseudo: PseudoElement,
    items: &mut BoxList,
) -> Result<()> {
    let Some(style) = generated_content::pseudo_style(state, node, parent, pseudo) else {
        return Ok(());
    };
    table::place_and_build(state, TableRole::Other, parent, items, |state, _, list| {
        generated_content::construct_pseudo_box(state, node, style, pseudo, list)
    })
}

/// Builds the boxes of one child of `parent.node` into `items`, or into the anonymous table
/// boxes it needs.
pub(crate) fn process_child(
    state: &mut BoxConstructorState<'_>,
    child: OpaqueNode,
    parent: &ParentInfo,
    items: &mut BoxList,
) -> Result<()> {
    let content = state.context.content;
    match content.kind(child) {
        NodeKind::Document | NodeKind::Comment => Ok(()),
        NodeKind::Text => {
            if !accepts_text(state, parent) {
                return Ok(());
            }
            let text = content.text(child).unwrap_or_default();
            if is_collapsible_whitespace(&text) && suppresses_whitespace(state, parent) {
                trace!("Skipping whitespace {:?} between table parts", child);
                return Ok(());
            }
            table::place_and_build(state, TableRole::Other, parent, items, |state, target, list| {
                construct_text(state, child, text, target, list)
            })
        },
        NodeKind::Element => {
            let Some(style) = state
                .context
                .styles
                .resolve_style(child, Some(&parent.style), None)
            else {
                trace!("No style for {:?}, building no boxes", child);
                return Ok(());
            };
            match style.display {
                Display::None => {
                    state.tree.set_undisplayed_style(child, style);
                    return Ok(());
                },
                Display::Contents => {
                    state.tree.remove_undisplayed_style(child);
                    return construct_contents(state, child, style, parent, items);
                },
                _ => {},
            }
            state.tree.remove_undisplayed_style(child);

            let Some(data) = dispatch::find_construction_data(content, child, &style) else {
                return Ok(());
            };
            if data.flags.contains(ConstructionFlags::SUPPRESS_BOX) {
                trace!("Suppressed boxes of {:?}", child);
                return Ok(());
            }
            if !accepts_element(parent, data.routine) {
                trace!("{:?} does not render inside a {:?}", child, parent.kind);
                return Ok(());
            }
            let role = TableRole::for_routine(data.routine, style.used_display());
            table::place_and_build(state, role, parent, items, |state, _, list| {
                construct_element(state, child, style, data, list)
            })
        },
    }
}

fn is_svg_container(kind: BoxKind) -> bool {
    matches!(kind, BoxKind::SvgOuter | BoxKind::SvgElement)
}

/// SVG only renders text inside its text content elements.
fn accepts_text(state: &BoxConstructorState<'_>, parent: &ParentInfo) -> bool {
    if !is_svg_container(parent.kind) {
        return true;
    }
    let content = state.context.content;
    let Some(node) = parent.node else {
        return false;
    };
    content.namespace(node) == Some(ns!(svg)) &&
        matches!(
            content.local_name(node),
            Some(local_name!("text") | local_name!("tspan") | local_name!("textPath"))
        )
}

/// SVG containers only hold SVG content, and SVG content only renders inside an SVG root.
fn accepts_element(parent: &ParentInfo, routine: ConstructionRoutine) -> bool {
    let is_svg_routine = matches!(
        routine,
        ConstructionRoutine::SvgOuter |
            ConstructionRoutine::SvgElement |
            ConstructionRoutine::SvgForeignObject
    );
    if is_svg_container(parent.kind) {
        is_svg_routine
    } else {
        !is_svg_routine || routine == ConstructionRoutine::SvgOuter
    }
}

fn suppresses_whitespace(state: &BoxConstructorState<'_>, parent: &ParentInfo) -> bool {
    state.context.prefs.suppress_table_whitespace &&
        (parent.kind.is_table_structure() || state.pseudo_boxes.is_open())
}

fn construct_text(
    state: &mut BoxConstructorState<'_>,
    node: OpaqueNode,
    text: String,
    parent: &ParentInfo,
    items: &mut BoxList,
) -> Result<()> {
    let id = state.create_box(
        LayoutBox::new(BoxKind::Text, parent.style.clone(), Some(node)).with_data(BoxData::Text(
            TextData {
                text,
                ..Default::default()
            },
        )),
    )?;
    items.append(&mut state.tree.arena, id);
    Ok(())
}

/// An element with `display: contents` has no box. Its children are built as if they were
/// children of its parent, in the same chain of anonymous table boxes.
fn construct_contents(
    state: &mut BoxConstructorState<'_>,
    node: OpaqueNode,
    style: Arc<ComputedStyle>,
    parent: &ParentInfo,
    items: &mut BoxList,
) -> Result<()> {
    let contents_parent = ParentInfo {
        style,
        node: Some(node),
        ..parent.clone()
    };
    process_children_in_order(state, node, &contents_parent, items, false)
}

fn construct_element(
    state: &mut BoxConstructorState<'_>,
    node: OpaqueNode,
    style: Arc<ComputedStyle>,
    data: ConstructionData,
    items: &mut BoxList,
) -> Result<()> {
    match data.routine {
        ConstructionRoutine::Table => table::construct_table(state, node, style, items),
        _ => construct_generic(state, node, style, data, items),
    }
}

/// Builds every kind of element box but tables.
///
/// Scroll containers and fieldsets are two boxes: the box of the element, and an anonymous
/// block inside it that holds the children.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(name = "BoxConstructor::construct_generic", skip_all, level = "trace")
)]
fn construct_generic(
    state: &mut BoxConstructorState<'_>,
    node: OpaqueNode,
    style: Arc<ComputedStyle>,
    data: ConstructionData,
    items: &mut BoxList,
) -> Result<()> {
    let kind = data.routine.box_kind();
    let content = state.context.content;
    let mut layout_box = LayoutBox::new(kind, style.clone(), Some(node));
    if kind == BoxKind::Replaced {
        let source = content
            .attribute(node, &local_name!("src"))
            .or_else(|| content.attribute(node, &local_name!("data")));
        layout_box.data = BoxData::Replaced { source };
    }
    if data.flags.contains(ConstructionFlags::FORCE_VIEW) {
        layout_box.flags.insert(BoxStateFlags::HAS_VIEW);
    }
    if data.flags.contains(ConstructionFlags::WRAP_KIDS_IN_BLOCKS) {
        layout_box.flags.insert(BoxStateFlags::WRAPS_INLINE_CHILDREN);
    }
    if data.flags.contains(ConstructionFlags::FORCE_EMPTY_ABSPOS_CONTAINER) {
        layout_box
            .flags
            .insert(BoxStateFlags::FORCED_EMPTY_ABSPOS_CONTAINER);
    }

    let scrollable = style.is_scroll_container() &&
        matches!(kind, BoxKind::Block | BoxKind::Flex | BoxKind::Grid);
    let (outer, insertion) = if scrollable || kind == BoxKind::Fieldset {
        let (inner_kind, inner_type) = if kind == BoxKind::Fieldset {
            (BoxKind::Block, AnonymousBoxType::FieldsetContent)
        } else {
            layout_box.kind = BoxKind::ScrollContainer;
            let position = state
                .context
                .history
                .take_state(HistoryKey { node, pseudo: None })
                .map(|saved| saved.scroll_position)
                .unwrap_or_default();
            layout_box.data = BoxData::Scroll { position };
            (kind, AnonymousBoxType::ScrolledContent)
        };
        let outer = state.create_box(layout_box)?;
        let inner = state.create_anonymous_box(inner_kind, inner_type, &style, Some(node))?;
        (outer, inner)
    } else {
        let id = state.create_box(layout_box)?;
        (id, id)
    };
    if !data.flags.contains(ConstructionFlags::SKIP_BOX_MAP) {
        state.tree.set_primary_box(node, outer);
    }

    if kind.is_leaf() || data.flags.contains(ConstructionFlags::SKIP_CHILDREN) {
        return state.add_child(outer, items);
    }

    let insertion_kind = state.tree.arena[insertion].kind;
    {
        let absolute = if data
            .flags
            .contains(ConstructionFlags::FORCE_EMPTY_ABSPOS_CONTAINER)
        {
            Some(None)
        } else if style.establishes_containing_block_for_absolute_descendants() &&
            insertion_kind.supports_child_list(ChildListId::Absolute)
        {
            Some(Some(insertion))
        } else {
            None
        };
        let mut absolute_scope = maybe_push(state, OutOfFlowCategory::Absolute, absolute);

        let float = if insertion_kind.is_float_containing_block() {
            Some(Some(insertion))
        } else if matches!(
            insertion_kind,
            BoxKind::Flex | BoxKind::Grid | BoxKind::SvgOuter | BoxKind::Math
        ) {
            // Floats are ignored inside these, and stay in flow.
            Some(None)
        } else {
            None
        };
        let mut scope = maybe_push(&mut *absolute_scope, OutOfFlowCategory::Float, float);

        if data.flags.contains(ConstructionFlags::ALLOW_BLOCK_STYLES) {
            first_line::note_block_pseudo_elements(&mut *scope, insertion, node, &style);
        }

        let saved_bits = scope.additional_state_bits;
        if kind == BoxKind::SvgOuter {
            scope.additional_state_bits.insert(BoxStateFlags::SVG_CONTENT);
        }
        let child_parent = ParentInfo {
            id: insertion,
            kind: insertion_kind,
            style: style.clone(),
            node: Some(node),
        };
        let mut children = BoxList::new();
        let result = process_children(&mut *scope, node, &child_parent, &mut children);
        scope.additional_state_bits = saved_bits;
        result?;

        if style.display == Display::ListItem {
            generated_content::construct_marker(&mut *scope, node, &style, insertion)?;
        }
        if data.flags.contains(ConstructionFlags::WRAP_KIDS_IN_BLOCKS) {
            children = wrap_inline_runs(&mut *scope, children, &style, node)?;
        }
        scope
            .tree
            .set_initial_children(insertion, ChildListId::Principal, children);
        if outer != insertion {
            scope
                .tree
                .set_initial_children(outer, ChildListId::Principal, BoxList::single(insertion));
        }
        first_line::wrap_first_line_and_letter(&mut *scope, insertion)?;
    }

    if kind == BoxKind::Inline && ib_split::needs_split(state.tree, outer) {
        for part in ib_split::split_inline(state, outer)? {
            state.add_child(part, items)?;
        }
        return Ok(());
    }
    state.add_child(outer, items)
}

/// Wraps every run of inline-level boxes of `children` in an anonymous block, for boxes
/// that only take block-level children. Runs of collapsible whitespace are dropped.
pub(crate) fn wrap_inline_runs(
    state: &mut BoxConstructorState<'_>,
    children: BoxList,
    style: &ComputedStyle,
    node: OpaqueNode,
) -> Result<BoxList> {
    let mut wrapped = BoxList::new();
    let mut run: Vec<BoxId> = Vec::new();
    for child in children.to_vec(&state.tree.arena) {
        let layout_box = &state.tree.arena[child];
        if layout_box.is_inline_level() && !layout_box.is_placeholder() {
            run.push(child);
            continue;
        }
        flush_inline_run(state, &mut run, &mut wrapped, style, node)?;
        wrapped.append(&mut state.tree.arena, child);
    }
    flush_inline_run(state, &mut run, &mut wrapped, style, node)?;
    Ok(wrapped)
}

fn flush_inline_run(
    state: &mut BoxConstructorState<'_>,
    run: &mut Vec<BoxId>,
    wrapped: &mut BoxList,
    style: &ComputedStyle,
    node: OpaqueNode,
) -> Result<()> {
    if run.is_empty() {
        return Ok(());
    }
    let only_whitespace = run.iter().all(|id| {
        state.tree.arena[*id]
            .text()
            .is_some_and(is_collapsible_whitespace)
    });
    if only_whitespace {
        for id in run.drain(..) {
            state.tree.destroy_box(id, &mut |_, _| {});
        }
        return Ok(());
    }

    let wrapper = state.create_anonymous_box(
        BoxKind::Block,
        AnonymousBoxType::WrapperBlock,
        style,
        Some(node),
    )?;
    let mut contents = BoxList::new();
    for id in run.drain(..) {
        contents.append(&mut state.tree.arena, id);
    }
    state
        .tree
        .set_initial_children(wrapper, ChildListId::Principal, contents);
    wrapped.append(&mut state.tree.arena, wrapper);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn collapsible_whitespace() {
        assert!(is_collapsible_whitespace(" \n\t "));
        assert!(is_collapsible_whitespace(""));
        assert!(!is_collapsible_whitespace(" a "));
        assert!(!is_collapsible_whitespace("\u{a0}"));
    }

    #[test]
    fn svg_content_needs_an_svg_root() {
        let style = Arc::new(ComputedStyle::default());
        let mut arena = crate::boxes::BoxArena::new(1);
        let id = arena
            .allocate(LayoutBox::new(BoxKind::Block, style.clone(), None))
            .unwrap();
        let block = ParentInfo {
            id,
            kind: BoxKind::Block,
            style: style.clone(),
            node: None,
        };
        let svg = ParentInfo {
            kind: BoxKind::SvgOuter,
            ..block.clone()
        };
        assert!(accepts_element(&block, ConstructionRoutine::SvgOuter));
        assert!(!accepts_element(&block, ConstructionRoutine::SvgElement));
        assert!(accepts_element(&block, ConstructionRoutine::Block));
        assert!(accepts_element(&svg, ConstructionRoutine::SvgElement));
        assert!(!accepts_element(&svg, ConstructionRoutine::Block));
    }
}
