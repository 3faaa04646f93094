/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Computed values consumed by box construction.
//!
//! This is not a general purpose style struct. It carries the subset of computed values
//! that decide which boxes are built: the box generation properties, the positioning
//! scheme, generated content and the few inherited properties that generated content
//! depends on. Everything else is opaque to the box constructor and represented by
//! [`ComputedStyle::paint_generation`].

use html5ever::LocalName;
use servo_arc::Arc;
use strum::{Display as StrumDisplay, EnumString, IntoStaticStr};

use crate::node::OpaqueNode;

/// The computed value of the `display` property.
///
/// <https://drafts.csswg.org/css-display-3/#the-display-properties>
#[derive(Clone, Copy, Debug, Default, EnumString, Eq, Hash, IntoStaticStr, PartialEq, StrumDisplay)]
#[strum(serialize_all = "kebab-case")]
pub enum Display {
    None,
    Contents,
    #[default]
    Inline,
    Block,
    FlowRoot,
    InlineBlock,
    ListItem,
    Table,
    InlineTable,
    TableRowGroup,
    TableHeaderGroup,
    TableFooterGroup,
    TableRow,
    TableCell,
    TableColumnGroup,
    TableColumn,
    TableCaption,
    Flex,
    InlineFlex,
    Grid,
    InlineGrid,
    /// A box placed in the popup layer of the viewport, above all other content.
    #[strum(serialize = "-moz-popup")]
    MozPopup,
}

impl Display {
    /// Whether boxes with this display participate in an inline formatting context.
    pub fn is_inline_outside(&self) -> bool {
        matches!(
            self,
            Display::Inline |
                Display::InlineBlock |
                Display::InlineTable |
                Display::InlineFlex |
                Display::InlineGrid
        )
    }

    /// <https://drafts.csswg.org/css-display-3/#layout-specific-display>
    pub fn is_table_internal(&self) -> bool {
        matches!(
            self,
            Display::TableRowGroup |
                Display::TableHeaderGroup |
                Display::TableFooterGroup |
                Display::TableRow |
                Display::TableCell |
                Display::TableColumnGroup |
                Display::TableColumn |
                Display::TableCaption
        )
    }

    pub fn is_row_group(&self) -> bool {
        matches!(
            self,
            Display::TableRowGroup | Display::TableHeaderGroup | Display::TableFooterGroup
        )
    }

    /// The display value used for a box that floats or is absolutely positioned.
    ///
    /// <https://drafts.csswg.org/css2/#dis-pos-flo>
    pub fn blockified(&self) -> Display {
        match self {
            Display::Inline |
            Display::InlineBlock |
            Display::TableRowGroup |
            Display::TableHeaderGroup |
            Display::TableFooterGroup |
            Display::TableRow |
            Display::TableCell |
            Display::TableColumnGroup |
            Display::TableColumn |
            Display::TableCaption => Display::Block,
            Display::InlineTable => Display::Table,
            Display::InlineFlex => Display::Flex,
            Display::InlineGrid => Display::Grid,
            other => *other,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, EnumString, Eq, Hash, IntoStaticStr, PartialEq, StrumDisplay)]
#[strum(serialize_all = "kebab-case")]
pub enum Position {
    #[default]
    Static,
    Relative,
    Absolute,
    Fixed,
    Sticky,
}

#[derive(Clone, Copy, Debug, Default, EnumString, Eq, Hash, IntoStaticStr, PartialEq, StrumDisplay)]
#[strum(serialize_all = "kebab-case")]
pub enum Float {
    #[default]
    None,
    Left,
    Right,
}

#[derive(Clone, Copy, Debug, Default, EnumString, Eq, Hash, IntoStaticStr, PartialEq, StrumDisplay)]
#[strum(serialize_all = "kebab-case")]
pub enum Overflow {
    #[default]
    Visible,
    Hidden,
    Clip,
    Scroll,
    Auto,
}

/// <https://drafts.csswg.org/css-lists-3/#text-markers>
#[derive(Clone, Copy, Debug, Default, EnumString, Eq, Hash, IntoStaticStr, PartialEq, StrumDisplay)]
#[strum(serialize_all = "kebab-case")]
pub enum ListStyleType {
    None,
    #[default]
    Disc,
    Circle,
    Square,
    Decimal,
    LowerAlpha,
    UpperAlpha,
    LowerRoman,
    UpperRoman,
}

/// One item of the `content` property.
///
/// <https://drafts.csswg.org/css-content-3/#content-property>
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum ContentItem {
    String(String),
    Attr(LocalName),
    OpenQuote,
    CloseQuote,
    NoOpenQuote,
    NoCloseQuote,
    Counter(String, ListStyleType),
    Counters(String, String, ListStyleType),
}

impl ContentItem {
    /// Whether the text of this item depends on its position in the document.
    pub fn depends_on_document_order(&self) -> bool {
        !matches!(self, ContentItem::String(_) | ContentItem::Attr(_))
    }
}

#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub enum Content {
    #[default]
    Normal,
    None,
    Items(Vec<ContentItem>),
}

/// <https://drafts.csswg.org/css-pseudo-4/>
#[derive(Clone, Copy, Debug, Eq, Hash, IntoStaticStr, Ord, PartialEq, PartialOrd, StrumDisplay)]
pub enum PseudoElement {
    #[strum(serialize = "::before")]
    Before,
    #[strum(serialize = "::after")]
    After,
    #[strum(serialize = "::marker")]
    Marker,
    #[strum(serialize = "::first-letter")]
    FirstLetter,
    #[strum(serialize = "::first-line")]
    FirstLine,
}

/// The types of boxes that the box constructor synthesizes without a corresponding
/// element. Their styles are resolved with [`StyleResolver::resolve_anonymous_style`].
#[derive(Clone, Copy, Debug, Eq, Hash, IntoStaticStr, PartialEq, StrumDisplay)]
#[strum(serialize_all = "kebab-case")]
pub enum AnonymousBoxType {
    /// The initial containing block.
    Viewport,
    /// The block wrapping the inner table and its captions.
    TableWrapper,
    Table,
    TableColumnGroup,
    TableRowGroup,
    TableRow,
    TableCell,
    /// The block in the middle of an inline that was split around block-level content.
    InlineSplitBlock,
    /// The block wrapping inline-level children of a container that only accepts blocks.
    WrapperBlock,
    /// The block holding the content of a scroll container.
    ScrolledContent,
    /// The block holding the content of a `<fieldset>`.
    FieldsetContent,
    /// The in-flow stand-in of a float or of an absolutely positioned box.
    Placeholder,
}

impl AnonymousBoxType {
    /// The display value of boxes of this type.
    pub fn display(&self) -> Display {
        match self {
            AnonymousBoxType::Viewport |
            AnonymousBoxType::TableWrapper |
            AnonymousBoxType::InlineSplitBlock |
            AnonymousBoxType::WrapperBlock |
            AnonymousBoxType::ScrolledContent |
            AnonymousBoxType::FieldsetContent => Display::Block,
            AnonymousBoxType::Table => Display::Table,
            AnonymousBoxType::TableColumnGroup => Display::TableColumnGroup,
            AnonymousBoxType::TableRowGroup => Display::TableRowGroup,
            AnonymousBoxType::TableRow => Display::TableRow,
            AnonymousBoxType::TableCell => Display::TableCell,
            AnonymousBoxType::Placeholder => Display::Inline,
        }
    }

    pub fn is_table_part(&self) -> bool {
        matches!(
            self,
            AnonymousBoxType::TableWrapper |
                AnonymousBoxType::Table |
                AnonymousBoxType::TableColumnGroup |
                AnonymousBoxType::TableRowGroup |
                AnonymousBoxType::TableRow |
                AnonymousBoxType::TableCell
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ComputedStyle {
    pub display: Display,
    pub position: Position,
    pub float: Float,
    pub overflow: Overflow,
    pub content: Content,
    pub counter_reset: Vec<(String, i32)>,
    pub counter_increment: Vec<(String, i32)>,
    /// Inherited.
    pub quotes: Vec<(String, String)>,
    /// Inherited.
    pub list_style_type: ListStyleType,
    /// Set on styles synthesized for anonymous boxes.
    pub anonymous_box: Option<AnonymousBoxType>,
    /// Set on styles resolved for a pseudo-element.
    pub pseudo_element: Option<PseudoElement>,
    /// Changes whenever a property that does not affect box construction changes. The style
    /// engine bumps it so that a restyle can tell a repaint from a reconstruction.
    pub paint_generation: u32,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: Display::Inline,
            position: Position::Static,
            float: Float::None,
            overflow: Overflow::Visible,
            content: Content::Normal,
            counter_reset: Vec::new(),
            counter_increment: Vec::new(),
            quotes: vec![
                ("\u{201c}".to_owned(), "\u{201d}".to_owned()),
                ("\u{2018}".to_owned(), "\u{2019}".to_owned()),
            ],
            list_style_type: ListStyleType::Disc,
            anonymous_box: None,
            pseudo_element: None,
            paint_generation: 0,
        }
    }
}

impl ComputedStyle {
    /// A style with initial values for everything but the inherited properties, which are
    /// taken from `parent`.
    pub fn inheriting_from(parent: &ComputedStyle) -> Self {
        Self {
            quotes: parent.quotes.clone(),
            list_style_type: parent.list_style_type,
            ..Default::default()
        }
    }

    /// The style of an anonymous box of the given type inside a box with style `parent`.
    pub fn for_anonymous_box(box_type: AnonymousBoxType, parent: &ComputedStyle) -> Self {
        Self {
            display: box_type.display(),
            anonymous_box: Some(box_type),
            ..Self::inheriting_from(parent)
        }
    }

    pub fn is_floating(&self) -> bool {
        self.float != Float::None && !self.is_absolutely_positioned()
    }

    /// Whether this box is absolutely positioned, which includes fixed positioning.
    pub fn is_absolutely_positioned(&self) -> bool {
        matches!(self.position, Position::Absolute | Position::Fixed)
    }

    pub fn is_fixed_positioned(&self) -> bool {
        self.position == Position::Fixed
    }

    pub fn is_popup(&self) -> bool {
        self.display == Display::MozPopup
    }

    /// Whether this box takes itself out of the normal flow.
    pub fn is_out_of_flow(&self) -> bool {
        self.is_floating() || self.is_absolutely_positioned() || self.is_popup()
    }

    /// Whether this box is the containing block of its absolutely positioned descendants.
    pub fn establishes_containing_block_for_absolute_descendants(&self) -> bool {
        self.position != Position::Static
    }

    /// <https://drafts.csswg.org/css-overflow-3/#scroll-container>
    pub fn is_scroll_container(&self) -> bool {
        matches!(
            self.overflow,
            Overflow::Hidden | Overflow::Scroll | Overflow::Auto
        )
    }

    /// The display value used for box construction, after blockification of out-of-flow
    /// boxes.
    pub fn used_display(&self) -> Display {
        if self.is_floating() || self.is_absolutely_positioned() {
            self.display.blockified()
        } else {
            self.display
        }
    }

    /// Whether `content` generates a box for a `::before` or `::after` pseudo-element.
    ///
    /// <https://drafts.csswg.org/css-content-3/#valdef-content-normal>
    pub fn generates_pseudo_content(&self) -> bool {
        match &self.content {
            Content::Items(items) => !items.is_empty() && self.display != Display::None,
            Content::Normal | Content::None => false,
        }
    }

    /// Whether switching from this style to `new` requires rebuilding the boxes of the
    /// element, rather than updating their style in place.
    pub fn needs_reconstruction_for(&self, new: &ComputedStyle) -> bool {
        self.display != new.display ||
            self.position != new.position ||
            self.float != new.float ||
            self.is_scroll_container() != new.is_scroll_container() ||
            self.content != new.content ||
            (self.display == Display::ListItem && self.list_style_type != new.list_style_type)
    }
}

/// The style system, as seen from box construction.
pub trait StyleResolver {
    /// Resolves the style of an element, or of one of its pseudo-elements when `pseudo` is
    /// given. Returns `None` for a pseudo-element that no rule applies to, and for elements
    /// that the style system has not styled.
    fn resolve_style(
        &self,
        node: OpaqueNode,
        parent_style: Option<&ComputedStyle>,
        pseudo: Option<PseudoElement>,
    ) -> Option<Arc<ComputedStyle>>;

    /// Synthesizes the style of an anonymous box of type `box_type` inside a box with style
    /// `parent_style`.
    fn resolve_anonymous_style(
        &self,
        box_type: AnonymousBoxType,
        parent_style: &ComputedStyle,
    ) -> Arc<ComputedStyle> {
        Arc::new(ComputedStyle::for_anonymous_box(box_type, parent_style))
    }
}
