/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Selection of the construction routine for an element.
//!
//! Elements are looked up first by tag, in the table of their markup language (HTML, then
//! MathML, then SVG), and then by their used `display` value. A tag entry is either fixed
//! data, or a resolver that looks at the element and its style and may decline, in which
//! case the `display` table decides.

use bitflags::bitflags;
use construction_api::style::Display;
use construction_api::{ComputedStyle, ContentTree, OpaqueNode};
use html5ever::{LocalName, local_name, ns};

use crate::boxes::BoxKind;

bitflags! {
    /// Flags that every construction routine obeys, whichever table they came from.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub(crate) struct ConstructionFlags: u16 {
        /// Do not record the box in the primary box table.
        const SKIP_BOX_MAP = 1 << 0;
        /// The box is a compositing boundary.
        const FORCE_VIEW = 1 << 1;
        /// Absolutely positioned descendants are built in flow.
        const FORCE_EMPTY_ABSPOS_CONTAINER = 1 << 2;
        /// Runs of inline-level children are wrapped in anonymous blocks.
        const WRAP_KIDS_IN_BLOCKS = 1 << 3;
        /// No box at all.
        const SUPPRESS_BOX = 1 << 4;
        /// Children of the element are never built.
        const SKIP_CHILDREN = 1 << 5;
        /// The box is a block container that `::first-letter` and `::first-line` apply to.
        const ALLOW_BLOCK_STYLES = 1 << 6;
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ConstructionRoutine {
    Block,
    Inline,
    LineBreak,
    Replaced,
    Fieldset,
    Flex,
    Grid,
    Table,
    TableRowGroup,
    TableRow,
    TableCell,
    TableColumnGroup,
    TableColumn,
    Math,
    SvgOuter,
    SvgElement,
    SvgForeignObject,
}

impl ConstructionRoutine {
    pub(crate) fn box_kind(&self) -> BoxKind {
        match self {
            ConstructionRoutine::Block => BoxKind::Block,
            ConstructionRoutine::Inline => BoxKind::Inline,
            ConstructionRoutine::LineBreak => BoxKind::LineBreak,
            ConstructionRoutine::Replaced => BoxKind::Replaced,
            ConstructionRoutine::Fieldset => BoxKind::Fieldset,
            ConstructionRoutine::Flex => BoxKind::Flex,
            ConstructionRoutine::Grid => BoxKind::Grid,
            ConstructionRoutine::Table => BoxKind::TableWrapper,
            ConstructionRoutine::TableRowGroup => BoxKind::TableRowGroup,
            ConstructionRoutine::TableRow => BoxKind::TableRow,
            ConstructionRoutine::TableCell => BoxKind::TableCell,
            ConstructionRoutine::TableColumnGroup => BoxKind::TableColumnGroup,
            ConstructionRoutine::TableColumn => BoxKind::TableColumn,
            ConstructionRoutine::Math => BoxKind::Math,
            ConstructionRoutine::SvgOuter => BoxKind::SvgOuter,
            ConstructionRoutine::SvgElement => BoxKind::SvgElement,
            ConstructionRoutine::SvgForeignObject => BoxKind::SvgForeignObject,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct ConstructionData {
    pub flags: ConstructionFlags,
    pub routine: ConstructionRoutine,
}

const fn data(routine: ConstructionRoutine, flags: ConstructionFlags) -> ConstructionData {
    ConstructionData { flags, routine }
}

const fn simple(routine: ConstructionRoutine) -> ConstructionData {
    data(routine, ConstructionFlags::empty())
}

type Resolver = fn(&dyn ContentTree, OpaqueNode, &ComputedStyle) -> Option<ConstructionData>;

/// An entry of a tag table.
#[derive(Clone, Copy)]
pub(crate) enum ConstructionStrategy {
    Fixed(ConstructionData),
    /// A per-element decision. Returning `None` falls back to the `display` table.
    Resolve(Resolver),
}

fn find_html_data(name: &LocalName) -> Option<ConstructionStrategy> {
    use ConstructionRoutine::*;
    use ConstructionStrategy::*;

    let strategy = match *name {
        local_name!("img") => Resolve(resolve_image),
        local_name!("br") => Fixed(data(
            LineBreak,
            ConstructionFlags::SKIP_BOX_MAP.union(ConstructionFlags::SKIP_CHILDREN),
        )),
        local_name!("input") | local_name!("textarea") | local_name!("select") => Fixed(data(
            Replaced,
            ConstructionFlags::FORCE_VIEW.union(ConstructionFlags::SKIP_CHILDREN),
        )),
        local_name!("canvas") | local_name!("video") | local_name!("iframe") => Fixed(data(
            Replaced,
            ConstructionFlags::FORCE_VIEW.union(ConstructionFlags::SKIP_CHILDREN),
        )),
        local_name!("object") | local_name!("embed") => Resolve(resolve_object),
        // Options only render inside their select, whose children are never built.
        local_name!("option") | local_name!("optgroup") => {
            Fixed(data(Block, ConstructionFlags::SUPPRESS_BOX))
        },
        local_name!("fieldset") => Resolve(resolve_fieldset),
        _ => return None,
    };
    Some(strategy)
}

fn find_mathml_data(name: &LocalName) -> Option<ConstructionStrategy> {
    use ConstructionRoutine::*;
    use ConstructionStrategy::*;

    let strategy = match *name {
        local_name!("math") => Fixed(data(Math, ConstructionFlags::FORCE_EMPTY_ABSPOS_CONTAINER)),
        local_name!("mglyph") => Fixed(data(Replaced, ConstructionFlags::SKIP_CHILDREN)),
        _ => Fixed(simple(Math)),
    };
    Some(strategy)
}

fn find_svg_data(name: &LocalName) -> Option<ConstructionStrategy> {
    use ConstructionRoutine::*;
    use ConstructionStrategy::*;

    let strategy = match *name {
        local_name!("svg") => Fixed(data(
            SvgOuter,
            ConstructionFlags::FORCE_EMPTY_ABSPOS_CONTAINER.union(ConstructionFlags::FORCE_VIEW),
        )),
        local_name!("foreignObject") => Fixed(data(
            SvgForeignObject,
            ConstructionFlags::ALLOW_BLOCK_STYLES,
        )),
        _ => Fixed(simple(SvgElement)),
    };
    Some(strategy)
}

/// The table of last resort, keyed by the used `display` value.
pub(crate) fn find_display_data(display: Display) -> Option<ConstructionData> {
    use ConstructionRoutine::*;

    let data = match display {
        Display::None | Display::Contents => return None,
        Display::Block |
        Display::FlowRoot |
        Display::ListItem |
        Display::InlineBlock |
        Display::TableCaption |
        Display::MozPopup => data(Block, ConstructionFlags::ALLOW_BLOCK_STYLES),
        Display::Inline => simple(Inline),
        Display::Table | Display::InlineTable => simple(Table),
        Display::TableRowGroup | Display::TableHeaderGroup | Display::TableFooterGroup => {
            simple(TableRowGroup)
        },
        Display::TableRow => simple(TableRow),
        Display::TableCell => data(TableCell, ConstructionFlags::ALLOW_BLOCK_STYLES),
        Display::TableColumnGroup => simple(TableColumnGroup),
        Display::TableColumn => data(TableColumn, ConstructionFlags::SKIP_CHILDREN),
        Display::Flex | Display::InlineFlex => data(Flex, ConstructionFlags::WRAP_KIDS_IN_BLOCKS),
        Display::Grid | Display::InlineGrid => data(Grid, ConstructionFlags::WRAP_KIDS_IN_BLOCKS),
    };
    Some(data)
}

/// Finds how to build the boxes of an element with the given style.
pub(crate) fn find_construction_data(
    content: &dyn ContentTree,
    node: OpaqueNode,
    style: &ComputedStyle,
) -> Option<ConstructionData> {
    if let (Some(name), Some(namespace)) = (content.local_name(node), content.namespace(node)) {
        let strategy = if namespace == ns!(html) {
            find_html_data(&name)
        } else if namespace == ns!(mathml) {
            find_mathml_data(&name)
        } else if namespace == ns!(svg) {
            find_svg_data(&name)
        } else {
            None
        };
        match strategy {
            Some(ConstructionStrategy::Fixed(data)) => return Some(data),
            Some(ConstructionStrategy::Resolve(resolver)) => {
                if let Some(data) = resolver(content, node, style) {
                    return Some(data);
                }
            },
            None => {},
        }
    }
    find_display_data(style.used_display())
}

/// An image with a source is replaced content. A broken image is a plain inline box.
fn resolve_image(
    content: &dyn ContentTree,
    node: OpaqueNode,
    _style: &ComputedStyle,
) -> Option<ConstructionData> {
    match content.attribute(node, &local_name!("src")) {
        Some(source) if !source.is_empty() => Some(data(
            ConstructionRoutine::Replaced,
            ConstructionFlags::SKIP_CHILDREN,
        )),
        _ => Some(data(
            ConstructionRoutine::Inline,
            ConstructionFlags::SKIP_CHILDREN,
        )),
    }
}

/// Plugins with something to show are replaced content with their own view. Otherwise the
/// children of the element are its fallback content, built according to `display`.
fn resolve_object(
    content: &dyn ContentTree,
    node: OpaqueNode,
    _style: &ComputedStyle,
) -> Option<ConstructionData> {
    let has_source = content.attribute(node, &local_name!("data")).is_some() ||
        content.attribute(node, &local_name!("src")).is_some();
    has_source.then_some(data(
        ConstructionRoutine::Replaced,
        ConstructionFlags::FORCE_VIEW.union(ConstructionFlags::SKIP_CHILDREN),
    ))
}

fn resolve_fieldset(
    _content: &dyn ContentTree,
    _node: OpaqueNode,
    style: &ComputedStyle,
) -> Option<ConstructionData> {
    matches!(
        style.used_display(),
        Display::Block | Display::InlineBlock | Display::FlowRoot
    )
    .then_some(simple(ConstructionRoutine::Fieldset))
}

#[cfg(test)]
mod test {
    use construction_api::testing::TestDocument;
    use construction_api::style::Float;

    use super::*;

    fn style(display: Display) -> ComputedStyle {
        ComputedStyle {
            display,
            ..Default::default()
        }
    }

    #[test]
    fn tag_tables_win_over_display() {
        let document = TestDocument::new();
        let br = document.create_element("br");
        let data = find_construction_data(&document, br, &style(Display::Block)).unwrap();
        assert_eq!(data.routine, ConstructionRoutine::LineBreak);
        assert!(data.flags.contains(ConstructionFlags::SKIP_BOX_MAP));
    }

    #[test]
    fn broken_images_are_inline_boxes() {
        let document = TestDocument::new();
        let image = document.create_element("img");
        let data = find_construction_data(&document, image, &style(Display::Inline)).unwrap();
        assert_eq!(data.routine, ConstructionRoutine::Inline);

        document.set_attribute(image, "src", "cat.png");
        let data = find_construction_data(&document, image, &style(Display::Inline)).unwrap();
        assert_eq!(data.routine, ConstructionRoutine::Replaced);
    }

    #[test]
    fn objects_without_source_fall_back_to_display() {
        let document = TestDocument::new();
        let object = document.create_element("object");
        let data = find_construction_data(&document, object, &style(Display::Block)).unwrap();
        assert_eq!(data.routine, ConstructionRoutine::Block);

        document.set_attribute(object, "data", "movie.swf");
        let data = find_construction_data(&document, object, &style(Display::Block)).unwrap();
        assert_eq!(data.routine, ConstructionRoutine::Replaced);
        assert!(data.flags.contains(ConstructionFlags::FORCE_VIEW));
    }

    #[test]
    fn other_namespaces_have_their_own_tables() {
        let document = TestDocument::new();
        let svg = document.create_element_ns(ns!(svg), "svg");
        let data = find_construction_data(&document, svg, &style(Display::Inline)).unwrap();
        assert_eq!(data.routine, ConstructionRoutine::SvgOuter);
        assert!(data.flags.contains(ConstructionFlags::FORCE_EMPTY_ABSPOS_CONTAINER));

        let mi = document.create_element_ns(ns!(mathml), "mi");
        let data = find_construction_data(&document, mi, &style(Display::Inline)).unwrap();
        assert_eq!(data.routine, ConstructionRoutine::Math);
    }

    #[test]
    fn display_table_uses_the_blockified_value() {
        let document = TestDocument::new();
        let span = document.create_element("span");
        let floated_cell = ComputedStyle {
            display: Display::TableCell,
            float: Float::Left,
            ..Default::default()
        };
        let data = find_construction_data(&document, span, &floated_cell).unwrap();
        assert_eq!(data.routine, ConstructionRoutine::Block);
        assert!(find_display_data(Display::None).is_none());
    }
}
