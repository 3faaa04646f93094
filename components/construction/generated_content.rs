/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Boxes for `::before`, `::after` and `::marker`, and the text of counters and quotes.
//!
//! <https://drafts.csswg.org/css-content-3/>
//! <https://drafts.csswg.org/css-lists-3/#auto-numbering>
//!
//! The text of a counter or a quote depends on everything before it in the document, so
//! it is left empty when the box is built and filled in by
//! [`recompute_generated_content`], which walks the whole tree once after a batch of
//! mutations.

use construction_api::style::{Content, ContentItem, Display, ListStyleType};
use construction_api::{ComputedStyle, ContentTree, OpaqueNode, PseudoElement};
use log::debug;
use servo_arc::Arc;

use crate::box_list::BoxList;
use crate::boxes::{BoxData, BoxId, BoxKind, BoxStateFlags, ChildListId, LayoutBox, TextData};
use crate::construct::ParentInfo;
use crate::error::Result;
use crate::state::BoxConstructorState;
use crate::tree::BoxTree;

/// The counter that list items increment implicitly.
const LIST_ITEM_COUNTER: &str = "list-item";

/// The style of the `::before` or `::after` pseudo-element of `node`, if it generates a box.
pub(crate) fn pseudo_style(
    state: &BoxConstructorState<'_>,
    node: OpaqueNode,
    parent: &ParentInfo,
    pseudo: PseudoElement,
) -> Option<Arc<ComputedStyle>> {
    if !state.context.prefs.generated_content_enabled ||
        parent.kind.is_leaf() ||
        matches!(parent.kind, BoxKind::SvgOuter | BoxKind::SvgElement)
    {
        return None;
    }
    let style = state
        .context
        .styles
        .resolve_style(node, Some(&parent.style), Some(pseudo))?;
    style.generates_pseudo_content().then_some(style)
}

fn initial_text(content: &dyn ContentTree, node: OpaqueNode, item: &ContentItem) -> String {
    match item {
        ContentItem::String(string) => string.clone(),
        ContentItem::Attr(name) => content.attribute(node, name).unwrap_or_default(),
        _ => String::new(),
    }
}

/// Builds the text boxes for the items of a `content` value.
fn construct_content_items(
    state: &mut BoxConstructorState<'_>,
    node: OpaqueNode,
    pseudo: PseudoElement,
    style: &Arc<ComputedStyle>,
    items: &[ContentItem],
) -> Result<BoxList> {
    let content = state.context.content;
    let mut children = BoxList::new();
    for item in items {
        let mut text_box = LayoutBox::new(BoxKind::Text, style.clone(), Some(node)).with_data(
            BoxData::Text(TextData {
                text: initial_text(content, node, item),
                offset: 0,
                generated: Some(item.clone()),
            }),
        );
        text_box.pseudo = Some(pseudo);
        let id = state.create_box(text_box)?;
        children.append(&mut state.tree.arena, id);
    }
    Ok(children)
}

fn construct_generated_box(
    state: &mut BoxConstructorState<'_>,
    kind: BoxKind,
    node: OpaqueNode,
    style: &Arc<ComputedStyle>,
    pseudo: PseudoElement,
    items: &[ContentItem],
) -> Result<BoxId> {
    let saved_bits = state.additional_state_bits;
    state
        .additional_state_bits
        .insert(BoxStateFlags::GENERATED_CONTENT);
    let result = (|| -> Result<BoxId> {
        let mut layout_box = LayoutBox::new(kind, style.clone(), Some(node));
        layout_box.pseudo = Some(pseudo);
        let id = state.create_box(layout_box)?;
        state.tree.set_pseudo_box(node, pseudo, id);
        let children = construct_content_items(state, node, pseudo, style, items)?;
        state
            .tree
            .set_initial_children(id, ChildListId::Principal, children);
        Ok(id)
    })();
    state.additional_state_bits = saved_bits;
    result
}

/// Builds the box of a `::before` or `::after` pseudo-element into `items`.
pub(crate) fn construct_pseudo_box(
    state: &mut BoxConstructorState<'_>,
    node: OpaqueNode,
    style: Arc<ComputedStyle>,
    pseudo: PseudoElement,
    items: &mut BoxList,
) -> Result<()> {
    let Content::Items(content_items) = &style.content else {
        return Ok(());
    };
    let kind = if style.used_display() == Display::Inline {
        BoxKind::Inline
    } else {
        BoxKind::Block
    };
    let id = construct_generated_box(state, kind, node, &style, pseudo, content_items)?;
    state.add_child(id, items)
}

/// Builds the marker of the list item `node` into the marker list of `block`.
pub(crate) fn construct_marker(
    state: &mut BoxConstructorState<'_>,
    node: OpaqueNode,
    element_style: &ComputedStyle,
    block: BoxId,
) -> Result<()> {
    if !state.context.prefs.generated_content_enabled ||
        !state.tree.arena[block]
            .kind
            .supports_child_list(ChildListId::Marker)
    {
        return Ok(());
    }
    let style = state
        .context
        .styles
        .resolve_style(node, Some(element_style), Some(PseudoElement::Marker))
        .unwrap_or_else(|| {
            Arc::new(ComputedStyle {
                pseudo_element: Some(PseudoElement::Marker),
                ..ComputedStyle::inheriting_from(element_style)
            })
        });
    let items = match &style.content {
        Content::Items(items) => items.clone(),
        Content::None => return Ok(()),
        Content::Normal if style.list_style_type == ListStyleType::None => return Ok(()),
        Content::Normal => vec![ContentItem::Counter(
            LIST_ITEM_COUNTER.to_owned(),
            style.list_style_type,
        )],
    };
    let marker = construct_generated_box(
        state,
        BoxKind::Marker,
        node,
        &style,
        PseudoElement::Marker,
        &items,
    )?;
    state
        .tree
        .set_initial_children(block, ChildListId::Marker, BoxList::single(marker));
    Ok(())
}

fn alphabetic(value: i32, first: u8) -> Option<String> {
    if value < 1 {
        return None;
    }
    let mut remaining = value as u32;
    let mut letters = Vec::new();
    while remaining > 0 {
        remaining -= 1;
        letters.push((first + (remaining % 26) as u8) as char);
        remaining /= 26;
    }
    Some(letters.into_iter().rev().collect())
}

fn roman(value: i32) -> Option<String> {
    const NUMERALS: [(i32, &str); 13] = [
        (1000, "m"),
        (900, "cm"),
        (500, "d"),
        (400, "cd"),
        (100, "c"),
        (90, "xc"),
        (50, "l"),
        (40, "xl"),
        (10, "x"),
        (9, "ix"),
        (5, "v"),
        (4, "iv"),
        (1, "i"),
    ];
    if !(1..4000).contains(&value) {
        return None;
    }
    let mut remaining = value;
    let mut result = String::new();
    for (numeral_value, numeral) in NUMERALS {
        while remaining >= numeral_value {
            result.push_str(numeral);
            remaining -= numeral_value;
        }
    }
    Some(result)
}

/// Formats a counter value. Values a numbering system cannot represent fall back to
/// decimal.
pub(crate) fn format_counter(value: i32, list_style_type: ListStyleType) -> String {
    let formatted = match list_style_type {
        ListStyleType::None => Some(String::new()),
        ListStyleType::Disc => Some("\u{2022}".to_owned()),
        ListStyleType::Circle => Some("\u{25e6}".to_owned()),
        ListStyleType::Square => Some("\u{25aa}".to_owned()),
        ListStyleType::Decimal => None,
        ListStyleType::LowerAlpha => alphabetic(value, b'a'),
        ListStyleType::UpperAlpha => alphabetic(value, b'A'),
        ListStyleType::LowerRoman => roman(value),
        ListStyleType::UpperRoman => roman(value).map(|numeral| numeral.to_uppercase()),
    };
    formatted.unwrap_or_else(|| value.to_string())
}

/// The text of a default list marker, with its suffix.
fn marker_text(value: i32, list_style_type: ListStyleType) -> String {
    match list_style_type {
        ListStyleType::None => String::new(),
        ListStyleType::Disc | ListStyleType::Circle | ListStyleType::Square => {
            format!("{} ", format_counter(value, list_style_type))
        },
        _ => format!("{}. ", format_counter(value, list_style_type)),
    }
}

/// The counters in scope at some point of the walk, innermost last.
#[derive(Default)]
struct CounterScopes {
    counters: Vec<(String, i32)>,
}

impl CounterScopes {
    fn reset(&mut self, name: &str, value: i32) {
        self.counters.push((name.to_owned(), value));
    }

    fn increment(&mut self, name: &str, by: i32) {
        match self
            .counters
            .iter_mut()
            .rev()
            .find(|(counter, _)| counter == name)
        {
            Some((_, value)) => *value = value.saturating_add(by),
            None => self.counters.push((name.to_owned(), by)),
        }
    }

    fn value(&self, name: &str) -> i32 {
        self.counters
            .iter()
            .rev()
            .find(|(counter, _)| counter == name)
            .map_or(0, |(_, value)| *value)
    }

    fn values(&self, name: &str) -> Vec<i32> {
        self.counters
            .iter()
            .filter(|(counter, _)| counter == name)
            .map(|(_, value)| *value)
            .collect()
    }
}

struct GeneratedContentWalker<'t> {
    tree: &'t BoxTree,
    content: &'t dyn ContentTree,
    counters: CounterScopes,
    quote_depth: usize,
    updates: Vec<(BoxId, String)>,
}

impl GeneratedContentWalker<'_> {
    fn applies_counter_properties(&self, id: BoxId, layout_box: &LayoutBox) -> bool {
        layout_box.node.is_some() &&
            !layout_box.is_anonymous() &&
            !matches!(layout_box.kind, BoxKind::Text | BoxKind::Placeholder) &&
            self.tree.first_in_split_chain(id) == id
    }

    fn apply_counter_properties(&mut self, style: &ComputedStyle, is_element: bool) {
        for (name, value) in &style.counter_reset {
            self.counters.reset(name, *value);
        }
        let mut incremented_list_item = false;
        for (name, by) in &style.counter_increment {
            incremented_list_item |= name == LIST_ITEM_COUNTER;
            self.counters.increment(name, *by);
        }
        if is_element && style.display == Display::ListItem && !incremented_list_item {
            self.counters.increment(LIST_ITEM_COUNTER, 1);
        }
    }

    fn quote(quotes: &[(String, String)], depth: usize, open: bool) -> String {
        let Some(last) = quotes.len().checked_sub(1) else {
            return String::new();
        };
        let (open_quote, close_quote) = &quotes[depth.min(last)];
        if open {
            open_quote.clone()
        } else {
            close_quote.clone()
        }
    }

    fn text_for(&mut self, id: BoxId, layout_box: &LayoutBox, item: &ContentItem) -> String {
        let style = &layout_box.style;
        match item {
            ContentItem::String(string) => string.clone(),
            ContentItem::Attr(name) => layout_box
                .node
                .and_then(|node| self.content.attribute(node, name))
                .unwrap_or_default(),
            ContentItem::OpenQuote => {
                let text = Self::quote(&style.quotes, self.quote_depth, true);
                self.quote_depth += 1;
                text
            },
            ContentItem::CloseQuote => match self.quote_depth.checked_sub(1) {
                Some(depth) => {
                    self.quote_depth = depth;
                    Self::quote(&style.quotes, depth, false)
                },
                None => String::new(),
            },
            ContentItem::NoOpenQuote => {
                self.quote_depth += 1;
                String::new()
            },
            ContentItem::NoCloseQuote => {
                self.quote_depth = self.quote_depth.saturating_sub(1);
                String::new()
            },
            ContentItem::Counter(name, list_style_type) => {
                let value = self.counters.value(name);
                let is_default_marker = self
                    .tree
                    .parent(id)
                    .and_then(|parent| self.tree.get(parent))
                    .is_some_and(|parent| {
                        parent.kind == BoxKind::Marker && parent.style.content == Content::Normal
                    });
                if is_default_marker {
                    marker_text(value, *list_style_type)
                } else {
                    format_counter(value, *list_style_type)
                }
            },
            ContentItem::Counters(name, separator, list_style_type) => {
                let values = self.counters.values(name);
                if values.is_empty() {
                    return format_counter(0, *list_style_type);
                }
                values
                    .into_iter()
                    .map(|value| format_counter(value, *list_style_type))
                    .collect::<Vec<_>>()
                    .join(separator)
            },
        }
    }

    fn visit(&mut self, id: BoxId) {
        let tree = self.tree;
        let Some(layout_box) = tree.get(id) else {
            return;
        };
        if let Some(out_of_flow) = layout_box.out_of_flow_for_placeholder() {
            self.visit(out_of_flow);
            return;
        }
        if self.applies_counter_properties(id, layout_box) {
            self.apply_counter_properties(&layout_box.style, layout_box.pseudo.is_none());
        }
        if let BoxData::Text(TextData {
            text,
            generated: Some(item),
            ..
        }) = &layout_box.data
        {
            let new_text = self.text_for(id, layout_box, item);
            if *text != new_text {
                self.updates.push((id, new_text));
            }
        }

        // Counters instantiated by descendants go out of scope with this box.
        let scope = self.counters.counters.len();
        for list in [ChildListId::Marker, ChildListId::Caption, ChildListId::Principal] {
            for child in tree.children(id, list) {
                self.visit(child);
            }
        }
        self.counters.counters.truncate(scope);
    }
}

/// Recomputes the text of every counter and quote of the tree, in document order. Returns
/// the nodes whose generated text changed.
pub(crate) fn recompute_generated_content(
    tree: &mut BoxTree,
    content: &dyn ContentTree,
) -> Vec<OpaqueNode> {
    let Some(root) = tree.root() else {
        return Vec::new();
    };
    let mut walker = GeneratedContentWalker {
        tree: &*tree,
        content,
        counters: CounterScopes::default(),
        quote_depth: 0,
        updates: Vec::new(),
    };
    walker.visit(root);
    let updates = walker.updates;

    let mut changed = Vec::new();
    for (id, text) in updates {
        let Some(layout_box) = tree.arena.get_mut(id) else {
            continue;
        };
        if let BoxData::Text(data) = &mut layout_box.data {
            data.text = text;
        }
        if let Some(node) = layout_box.node {
            if !changed.contains(&node) {
                changed.push(node);
            }
        }
    }
    debug!("Generated content changed for {} nodes", changed.len());
    changed
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn counter_styles() {
        assert_eq!(format_counter(3, ListStyleType::Decimal), "3");
        assert_eq!(format_counter(1, ListStyleType::LowerAlpha), "a");
        assert_eq!(format_counter(28, ListStyleType::UpperAlpha), "AB");
        assert_eq!(format_counter(1994, ListStyleType::LowerRoman), "mcmxciv");
        assert_eq!(format_counter(4, ListStyleType::UpperRoman), "IV");
        assert_eq!(format_counter(0, ListStyleType::LowerRoman), "0");
        assert_eq!(format_counter(-2, ListStyleType::LowerAlpha), "-2");
        assert_eq!(format_counter(7, ListStyleType::None), "");
    }

    #[test]
    fn marker_suffixes() {
        assert_eq!(marker_text(2, ListStyleType::Decimal), "2. ");
        assert_eq!(marker_text(2, ListStyleType::Disc), "\u{2022} ");
        assert_eq!(marker_text(2, ListStyleType::None), "");
    }

    #[test]
    fn nested_counters_shadow_outer_ones() {
        let mut counters = CounterScopes::default();
        counters.reset("section", 0);
        counters.increment("section", 1);
        counters.reset("section", 5);
        counters.increment("section", 2);
        assert_eq!(counters.value("section"), 7);
        assert_eq!(counters.values("section"), vec![1, 7]);
        counters.counters.truncate(1);
        assert_eq!(counters.value("section"), 1);
        counters.increment("chapter", 3);
        assert_eq!(counters.value("chapter"), 3);
    }
}
