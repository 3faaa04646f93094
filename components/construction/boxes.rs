/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The boxes of the box tree and the arena that owns them.

use std::ops::{Index, IndexMut};

use bitflags::bitflags;
use construction_api::style::{ComputedStyle, ContentItem, Display};
use construction_api::{OpaqueNode, PseudoElement};
use serde::Serialize;
use servo_arc::Arc;
use smallvec::SmallVec;
use strum::{Display as StrumDisplay, IntoStaticStr};

use crate::box_list::BoxList;
use crate::error::{ConstructionError, Result};

/// A handle to a box in a [`BoxArena`]. Handles of destroyed boxes are never reused for
/// new boxes, thanks to the generation counter.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct BoxId {
    index: u32,
    generation: u32,
}

#[derive(Clone, Copy, Debug, Eq, Hash, IntoStaticStr, PartialEq, Serialize, StrumDisplay)]
pub enum BoxKind {
    /// The root of the box tree: the initial containing block, and the containing block of
    /// fixed positioned and popup boxes.
    Viewport,
    /// A block container, including atomic inline blocks, list items, table captions and
    /// the anonymous blocks created by construction.
    Block,
    Inline,
    Text,
    LineBreak,
    /// A replaced element, like an image or a form control.
    Replaced,
    /// The in-flow stand-in of an out-of-flow box.
    Placeholder,
    /// A box with `overflow` other than `visible`. Its only child is the scrolled block.
    ScrollContainer,
    Fieldset,
    Flex,
    Grid,
    /// The box around a table and its captions.
    TableWrapper,
    Table,
    TableColumnGroup,
    TableColumn,
    TableRowGroup,
    TableRow,
    TableCell,
    /// The marker of a list item.
    Marker,
    FirstLetter,
    FirstLine,
    Math,
    SvgOuter,
    SvgElement,
    SvgForeignObject,
}

impl BoxKind {
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            BoxKind::Text | BoxKind::LineBreak | BoxKind::Replaced | BoxKind::Placeholder
        )
    }

    /// Kinds that take part in an inline formatting context regardless of their style.
    fn is_always_inline_level(&self) -> bool {
        matches!(
            self,
            BoxKind::Inline |
                BoxKind::Text |
                BoxKind::LineBreak |
                BoxKind::Placeholder |
                BoxKind::FirstLetter |
                BoxKind::FirstLine |
                BoxKind::Marker
        )
    }

    /// Whether boxes of this kind hold the floats whose placeholders are among their
    /// descendants.
    pub fn is_float_containing_block(&self) -> bool {
        matches!(
            self,
            BoxKind::Block | BoxKind::TableCell | BoxKind::SvgForeignObject
        )
    }

    /// Whether boxes of this kind are part of the internal structure of a table.
    pub fn is_table_part(&self) -> bool {
        matches!(
            self,
            BoxKind::TableWrapper |
                BoxKind::Table |
                BoxKind::TableColumnGroup |
                BoxKind::TableColumn |
                BoxKind::TableRowGroup |
                BoxKind::TableRow |
                BoxKind::TableCell
        )
    }

    /// Table parts whose children are themselves table parts.
    pub fn is_table_structure(&self) -> bool {
        matches!(
            self,
            BoxKind::TableWrapper |
                BoxKind::Table |
                BoxKind::TableColumnGroup |
                BoxKind::TableRowGroup |
                BoxKind::TableRow
        )
    }

    pub fn supports_child_list(&self, list: ChildListId) -> bool {
        if self.is_leaf() {
            return false;
        }
        match list {
            ChildListId::Principal => true,
            ChildListId::Float => self.is_float_containing_block(),
            ChildListId::Absolute => matches!(
                self,
                BoxKind::Viewport |
                    BoxKind::Block |
                    BoxKind::Inline |
                    BoxKind::TableWrapper |
                    BoxKind::TableCell |
                    BoxKind::Flex |
                    BoxKind::Grid |
                    BoxKind::Fieldset |
                    BoxKind::SvgForeignObject
            ),
            ChildListId::Fixed | ChildListId::Popup => *self == BoxKind::Viewport,
            ChildListId::Overflow => matches!(self, BoxKind::Block | BoxKind::Inline),
            ChildListId::Caption => *self == BoxKind::TableWrapper,
            ChildListId::ColGroup => *self == BoxKind::Table,
            ChildListId::Marker => *self == BoxKind::Block,
        }
    }
}

/// The named child lists of a box.
#[derive(Clone, Copy, Debug, Eq, Hash, IntoStaticStr, PartialEq, Serialize, StrumDisplay)]
#[strum(serialize_all = "kebab-case")]
pub enum ChildListId {
    /// The in-flow children.
    Principal,
    Float,
    Absolute,
    Fixed,
    Popup,
    /// Children pushed out of this box by the measurement pass.
    Overflow,
    Caption,
    ColGroup,
    Marker,
}

impl ChildListId {
    /// The lists holding out-of-flow boxes, in the order they are flushed.
    pub const OUT_OF_FLOW: [ChildListId; 4] = [
        ChildListId::Float,
        ChildListId::Absolute,
        ChildListId::Fixed,
        ChildListId::Popup,
    ];

    pub fn is_out_of_flow(&self) -> bool {
        Self::OUT_OF_FLOW.contains(self)
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct BoxStateFlags: u16 {
        /// This box is a float, absolutely positioned, or a popup, and is represented in
        /// the normal flow by a placeholder.
        const OUT_OF_FLOW = 1 << 0;
        /// This box was built for generated content.
        const GENERATED_CONTENT = 1 << 1;
        /// This box was never measured.
        const FIRST_REFLOW = 1 << 2;
        /// This box is a compositing boundary.
        const HAS_VIEW = 1 << 3;
        /// Inline-level children of this box are wrapped in anonymous blocks.
        const WRAPS_INLINE_CHILDREN = 1 << 4;
        /// The element of this box has a `::first-letter` style.
        const WANTS_FIRST_LETTER = 1 << 5;
        /// The element of this box has a `::first-line` style.
        const WANTS_FIRST_LINE = 1 << 6;
        /// A first-letter box was built somewhere in the principal list of this box.
        const HAS_FIRST_LETTER = 1 << 7;
        /// A first-line box was built at the start of the principal list of this box.
        const HAS_FIRST_LINE = 1 << 8;
        /// This box is inside an SVG subtree.
        const SVG_CONTENT = 1 << 9;
        /// Absolutely positioned descendants of this box were built in flow.
        const FORCED_EMPTY_ABSPOS_CONTAINER = 1 << 10;
    }
}

/// The links of a box that belongs to an inline that was split around block-level content.
/// The chain alternates inline, anonymous block, inline, and so on.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct SplitChain {
    pub previous: Option<BoxId>,
    pub next: Option<BoxId>,
}

/// How a box takes part in an inline/block split. The split chain is never reachable
/// through child lists: walking the principal lists of the tree visits the members of a
/// chain as unrelated siblings.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub enum SplitRole {
    #[default]
    Normal,
    SplitInline {
        chain: SplitChain,
    },
    SplitAnonBlock {
        chain: SplitChain,
    },
}

impl SplitRole {
    pub fn chain(&self) -> Option<SplitChain> {
        match *self {
            SplitRole::Normal => None,
            SplitRole::SplitInline { chain } | SplitRole::SplitAnonBlock { chain } => Some(chain),
        }
    }

    pub(crate) fn chain_mut(&mut self) -> Option<&mut SplitChain> {
        match self {
            SplitRole::Normal => None,
            SplitRole::SplitInline { chain } | SplitRole::SplitAnonBlock { chain } => Some(chain),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextData {
    pub text: String,
    /// The offset of `text` in the character data of the node, in bytes.
    pub offset: usize,
    /// The item of the `content` property this text was generated for.
    pub generated: Option<ContentItem>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum BoxData {
    #[default]
    None,
    Text(TextData),
    Placeholder {
        out_of_flow: BoxId,
    },
    Replaced {
        source: Option<String>,
    },
    Scroll {
        position: (i32, i32),
    },
}

pub struct LayoutBox {
    pub kind: BoxKind,
    pub style: Arc<ComputedStyle>,
    /// The content node this box was built for. Anonymous boxes created for a node, like
    /// the anonymous block of a split inline, share the node of the box they belong to.
    pub node: Option<OpaqueNode>,
    pub pseudo: Option<PseudoElement>,
    pub parent: Option<BoxId>,
    /// The child list of `parent` that this box is in.
    pub parent_list: ChildListId,
    pub next_sibling: Option<BoxId>,
    pub previous_sibling: Option<BoxId>,
    pub(crate) child_lists: SmallVec<[(ChildListId, BoxList); 2]>,
    pub next_in_flow: Option<BoxId>,
    pub previous_in_flow: Option<BoxId>,
    pub flags: BoxStateFlags,
    pub split: SplitRole,
    pub data: BoxData,
}

impl LayoutBox {
    pub fn new(kind: BoxKind, style: Arc<ComputedStyle>, node: Option<OpaqueNode>) -> Self {
        Self {
            kind,
            style,
            node,
            pseudo: None,
            parent: None,
            parent_list: ChildListId::Principal,
            next_sibling: None,
            previous_sibling: None,
            child_lists: SmallVec::new(),
            next_in_flow: None,
            previous_in_flow: None,
            flags: BoxStateFlags::FIRST_REFLOW,
            split: SplitRole::Normal,
            data: BoxData::None,
        }
    }

    pub fn with_data(mut self, data: BoxData) -> Self {
        self.data = data;
        self
    }

    pub fn child_list(&self, list: ChildListId) -> BoxList {
        self.child_lists
            .iter()
            .find(|(id, _)| *id == list)
            .map(|(_, children)| *children)
            .unwrap_or_default()
    }

    pub(crate) fn set_child_list(&mut self, list: ChildListId, children: BoxList) {
        debug_assert!(
            children.is_empty() || self.kind.supports_child_list(list),
            "{:?} boxes have no {:?} list",
            self.kind,
            list
        );
        match self.child_lists.iter_mut().find(|(id, _)| *id == list) {
            Some((_, existing)) => *existing = children,
            None if children.is_empty() => {},
            None => self.child_lists.push((list, children)),
        }
    }

    /// The child lists of this box that are not empty.
    pub fn child_list_ids(&self) -> impl Iterator<Item = ChildListId> + '_ {
        self.child_lists
            .iter()
            .filter(|(_, children)| !children.is_empty())
            .map(|(id, _)| *id)
    }

    pub fn is_anonymous(&self) -> bool {
        self.style.anonymous_box.is_some()
    }

    pub fn is_out_of_flow(&self) -> bool {
        self.flags.contains(BoxStateFlags::OUT_OF_FLOW)
    }

    pub fn is_special(&self) -> bool {
        self.split != SplitRole::Normal
    }

    pub fn is_placeholder(&self) -> bool {
        self.kind == BoxKind::Placeholder
    }

    pub fn is_generated_content(&self) -> bool {
        self.flags.contains(BoxStateFlags::GENERATED_CONTENT)
    }

    /// Whether this box takes part in an inline formatting context.
    pub fn is_inline_level(&self) -> bool {
        if self.is_out_of_flow() {
            return false;
        }
        self.kind.is_always_inline_level() || self.style.used_display().is_inline_outside()
    }

    pub fn is_block_level(&self) -> bool {
        !self.is_inline_level()
    }

    pub fn is_caption(&self) -> bool {
        self.kind == BoxKind::Block && self.style.display == Display::TableCaption
    }

    pub fn out_of_flow_for_placeholder(&self) -> Option<BoxId> {
        match self.data {
            BoxData::Placeholder { out_of_flow } => Some(out_of_flow),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.data {
            BoxData::Text(data) => Some(&data.text),
            _ => None,
        }
    }
}

struct Slot {
    generation: u32,
    entry: Option<LayoutBox>,
}

/// The storage of every box of a tree.
pub struct BoxArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    limit: usize,
}

impl BoxArena {
    pub fn new(limit: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            limit,
        }
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub(crate) fn allocate(&mut self, layout_box: LayoutBox) -> Result<BoxId> {
        if self.live >= self.limit {
            return Err(ConstructionError::BoxLimitExceeded { limit: self.limit });
        }
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(layout_box);
            return Ok(BoxId {
                index,
                generation: slot.generation,
            });
        }
        self.slots.push(Slot {
            generation: 0,
            entry: Some(layout_box),
        });
        Ok(BoxId {
            index: (self.slots.len() - 1) as u32,
            generation: 0,
        })
    }

    pub(crate) fn release(&mut self, id: BoxId) -> Option<LayoutBox> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(entry)
    }

    pub fn get(&self, id: BoxId) -> Option<&LayoutBox> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: BoxId) -> Option<&mut LayoutBox> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_mut())
    }

    pub fn contains(&self, id: BoxId) -> bool {
        self.get(id).is_some()
    }
}

impl Index<BoxId> for BoxArena {
    type Output = LayoutBox;

    fn index(&self, id: BoxId) -> &LayoutBox {
        match self.get(id) {
            Some(layout_box) => layout_box,
            None => panic!("use of destroyed box {:?}", id),
        }
    }
}

impl IndexMut<BoxId> for BoxArena {
    fn index_mut(&mut self, id: BoxId) -> &mut LayoutBox {
        match self.get_mut(id) {
            Some(layout_box) => layout_box,
            None => panic!("use of destroyed box {:?}", id),
        }
    }
}
