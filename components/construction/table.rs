/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Tables, and the anonymous table boxes that make every table part sit in a parent of the
//! right type.
//!
//! <https://drafts.csswg.org/css-tables-3/#fixup-algorithm>
//!
//! While the children of a box are built, the [`PseudoBoxRegistry`] of the construction
//! state holds the chain of anonymous table boxes that are still open: for each level of
//! table structure, the pending box and the children collected for it so far. A child that
//! needs a parent of some level either goes into the pending box of that level, or gets
//! the missing levels synthesized first. A child that fits the actual parent closes the
//! whole chain, which links the pending boxes together and emits the outermost one.

use construction_api::style::Display;
use construction_api::{AnonymousBoxType, ComputedStyle, OpaqueNode};
use log::{debug, trace};
use servo_arc::Arc;
use smallvec::SmallVec;

use crate::box_list::BoxList;
use crate::boxes::{BoxArena, BoxId, BoxKind, ChildListId, LayoutBox};
use crate::construct::{self, ParentInfo};
use crate::dispatch::ConstructionRoutine;
use crate::error::Result;
use crate::state::{BoxConstructorState, OutOfFlowCategory, maybe_push};

/// The levels of table structure, outermost first.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub(crate) enum PseudoLevel {
    Table,
    ColGroup,
    RowGroup,
    Row,
    Cell,
}

impl PseudoLevel {
    /// The order in which open levels are closed: innermost first. Row groups close before
    /// column groups, but the two never share a list: a pending column group goes into the
    /// column groups of the table and a pending row group into its rows.
    const CLOSING_ORDER: [PseudoLevel; 5] = [
        PseudoLevel::Cell,
        PseudoLevel::Row,
        PseudoLevel::RowGroup,
        PseudoLevel::ColGroup,
        PseudoLevel::Table,
    ];

    fn parent(self) -> Option<PseudoLevel> {
        match self {
            PseudoLevel::Table => None,
            PseudoLevel::ColGroup | PseudoLevel::RowGroup => Some(PseudoLevel::Table),
            PseudoLevel::Row => Some(PseudoLevel::RowGroup),
            PseudoLevel::Cell => Some(PseudoLevel::Row),
        }
    }

    /// The level of a box of the given kind, when it is a table part whose children are
    /// themselves table parts.
    pub(crate) fn of_kind(kind: BoxKind) -> Option<PseudoLevel> {
        match kind {
            BoxKind::Table => Some(PseudoLevel::Table),
            BoxKind::TableColumnGroup => Some(PseudoLevel::ColGroup),
            BoxKind::TableRowGroup => Some(PseudoLevel::RowGroup),
            BoxKind::TableRow => Some(PseudoLevel::Row),
            _ => None,
        }
    }

    fn box_kind(self) -> BoxKind {
        match self {
            PseudoLevel::Table => BoxKind::Table,
            PseudoLevel::ColGroup => BoxKind::TableColumnGroup,
            PseudoLevel::RowGroup => BoxKind::TableRowGroup,
            PseudoLevel::Row => BoxKind::TableRow,
            PseudoLevel::Cell => BoxKind::TableCell,
        }
    }

    fn anonymous_box_type(self) -> AnonymousBoxType {
        match self {
            PseudoLevel::Table => AnonymousBoxType::Table,
            PseudoLevel::ColGroup => AnonymousBoxType::TableColumnGroup,
            PseudoLevel::RowGroup => AnonymousBoxType::TableRowGroup,
            PseudoLevel::Row => AnonymousBoxType::TableRow,
            PseudoLevel::Cell => AnonymousBoxType::TableCell,
        }
    }

    /// The open levels closed before a box of this level is added next to them: the level
    /// itself and everything below it in its branch.
    fn branch(self) -> &'static [PseudoLevel] {
        match self {
            PseudoLevel::Table => &PseudoLevel::CLOSING_ORDER,
            PseudoLevel::ColGroup => &[PseudoLevel::ColGroup],
            PseudoLevel::RowGroup => &[PseudoLevel::Cell, PseudoLevel::Row, PseudoLevel::RowGroup],
            PseudoLevel::Row => &[PseudoLevel::Cell, PseudoLevel::Row],
            PseudoLevel::Cell => &[PseudoLevel::Cell],
        }
    }
}

/// What a child is, as far as table structure goes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum TableRole {
    Caption,
    ColGroup,
    Column,
    RowGroup,
    Row,
    Cell,
    /// Anything that is not a table part, including whole tables.
    Other,
}

impl TableRole {
    pub(crate) fn for_routine(routine: ConstructionRoutine, display: Display) -> Self {
        match routine {
            ConstructionRoutine::TableRowGroup => TableRole::RowGroup,
            ConstructionRoutine::TableRow => TableRole::Row,
            ConstructionRoutine::TableCell => TableRole::Cell,
            ConstructionRoutine::TableColumnGroup => TableRole::ColGroup,
            ConstructionRoutine::TableColumn => TableRole::Column,
            ConstructionRoutine::Block if display == Display::TableCaption => TableRole::Caption,
            _ => TableRole::Other,
        }
    }

    /// The level of the box built for a child with this role.
    fn own_level(self) -> Option<PseudoLevel> {
        match self {
            TableRole::ColGroup => Some(PseudoLevel::ColGroup),
            TableRole::RowGroup => Some(PseudoLevel::RowGroup),
            TableRole::Row => Some(PseudoLevel::Row),
            TableRole::Cell => Some(PseudoLevel::Cell),
            TableRole::Caption | TableRole::Column | TableRole::Other => None,
        }
    }

    /// The level of the parent a child with this role needs inside a parent of level
    /// `parent`, or `None` if the child fits a parent that is not a table part.
    fn required_level(self, parent: Option<PseudoLevel>) -> Option<PseudoLevel> {
        use PseudoLevel::*;

        match (parent, self) {
            (None | Some(Table) | Some(ColGroup), TableRole::Column) => Some(ColGroup),
            (None, TableRole::Other) => None,
            (
                None | Some(Table),
                TableRole::Caption | TableRole::ColGroup | TableRole::RowGroup,
            ) => Some(Table),
            (None | Some(Table), TableRole::Row) => Some(RowGroup),
            (_, TableRole::Cell) => Some(Row),
            (Some(RowGroup), TableRole::Row) => Some(RowGroup),
            (Some(_), _) => Some(Cell),
        }
    }
}

#[derive(Debug)]
struct PendingPseudoBox {
    id: BoxId,
    style: Arc<ComputedStyle>,
    children: BoxList,
    /// For a pending table, the wrapper box it goes into.
    wrapper: Option<BoxId>,
    /// For a pending table, its column groups.
    col_groups: BoxList,
    /// For a pending table, the captions of its wrapper.
    captions: BoxList,
    /// For a pending cell, the chain of anonymous table boxes its own children need.
    inner: Option<Box<PseudoBoxRegistry>>,
}

impl PendingPseudoBox {
    fn new(id: BoxId, style: Arc<ComputedStyle>) -> Self {
        Self {
            id,
            style,
            children: BoxList::new(),
            wrapper: None,
            col_groups: BoxList::new(),
            captions: BoxList::new(),
            inner: None,
        }
    }

    fn list_mut(&mut self, list: PendingList) -> &mut BoxList {
        match list {
            PendingList::Children => &mut self.children,
            PendingList::ColGroups => &mut self.col_groups,
            PendingList::Captions => &mut self.captions,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum PendingList {
    Children,
    ColGroups,
    Captions,
}

/// The open chain of anonymous table boxes of one box whose children are being built.
#[derive(Debug, Default)]
pub(crate) struct PseudoBoxRegistry {
    levels: [Option<PendingPseudoBox>; 5],
    lowest: Option<PseudoLevel>,
}

impl PseudoBoxRegistry {
    /// Whether some anonymous table box is pending.
    pub(crate) fn is_open(&self) -> bool {
        self.lowest.is_some()
    }

    /// The innermost pending level.
    #[cfg(test)]
    pub(crate) fn lowest(&self) -> Option<PseudoLevel> {
        self.lowest
    }

    fn is_level_open(&self, level: PseudoLevel) -> bool {
        self.levels[level as usize].is_some()
    }

    fn pending(&self, level: PseudoLevel) -> Option<&PendingPseudoBox> {
        self.levels[level as usize].as_ref()
    }

    fn pending_mut(&mut self, level: PseudoLevel) -> Option<&mut PendingPseudoBox> {
        self.levels[level as usize].as_mut()
    }

    fn open(&mut self, level: PseudoLevel, pending: PendingPseudoBox) {
        debug_assert!(!self.is_level_open(level));
        self.levels[level as usize] = Some(pending);
        self.update_lowest();
    }

    fn close(&mut self, level: PseudoLevel) -> Option<PendingPseudoBox> {
        let pending = self.levels[level as usize].take();
        self.update_lowest();
        pending
    }

    fn update_lowest(&mut self) {
        self.lowest = PseudoLevel::CLOSING_ORDER
            .into_iter()
            .find(|level| self.is_level_open(*level));
    }

    fn take_list(&mut self, level: PseudoLevel, list: PendingList) -> BoxList {
        self.pending_mut(level)
            .map(|pending| pending.list_mut(list).take())
            .unwrap_or_default()
    }

    fn restore_list(&mut self, level: PseudoLevel, list: PendingList, boxes: BoxList) {
        if let Some(pending) = self.pending_mut(level) {
            *pending.list_mut(list) = boxes;
        }
    }
}

/// Where a child goes once the chain was prepared for it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Placement {
    /// Into the boxes of the actual parent.
    Direct,
    /// Into a list of a pending box.
    Pending(PseudoLevel, PendingList),
    /// Nowhere: column groups only take columns.
    Suppress,
}

fn prepare_placement(
    state: &mut BoxConstructorState<'_>,
    role: TableRole,
    parent: &ParentInfo,
    items: &mut BoxList,
) -> Result<Placement> {
    let parent_level = PseudoLevel::of_kind(parent.kind);
    if parent_level == Some(PseudoLevel::ColGroup) && role != TableRole::Column {
        return Ok(Placement::Suppress);
    }

    let needed = role.required_level(parent_level);
    let Some(needed) = needed.filter(|needed| Some(*needed) != parent_level) else {
        close_pseudo_chain(state, items);
        return Ok(Placement::Direct);
    };

    // Collect the levels to synthesize, innermost first, up to an open level or the
    // actual parent.
    let mut missing: SmallVec<[PseudoLevel; 4]> = SmallVec::new();
    let mut level = Some(needed);
    while let Some(current) = level {
        if Some(current) == parent_level || state.pseudo_boxes.is_level_open(current) {
            break;
        }
        missing.push(current);
        level = current.parent();
    }

    // A child that goes into a cell is content of the cell, not a sibling of the open
    // levels.
    let own_level = role.own_level().filter(|_| needed != PseudoLevel::Cell);
    if let Some(next) = missing.last().copied().or(own_level) {
        for level in next.branch() {
            if state.pseudo_boxes.is_level_open(*level) {
                close_level(state, *level, items);
            }
        }
    }
    for level in missing.iter().rev() {
        open_level(state, *level, parent)?;
    }

    let list = match (role, needed) {
        (TableRole::Caption, PseudoLevel::Table) => PendingList::Captions,
        (TableRole::ColGroup, PseudoLevel::Table) => PendingList::ColGroups,
        _ => PendingList::Children,
    };
    Ok(Placement::Pending(needed, list))
}

fn open_level(
    state: &mut BoxConstructorState<'_>,
    level: PseudoLevel,
    parent: &ParentInfo,
) -> Result<()> {
    let parent_style = level
        .parent()
        .and_then(|parent_level| state.pseudo_boxes.pending(parent_level))
        .map(|pending| pending.style.clone())
        .unwrap_or_else(|| parent.style.clone());

    let pending = if level == PseudoLevel::Table {
        let wrapper = state.create_anonymous_box(
            BoxKind::TableWrapper,
            AnonymousBoxType::TableWrapper,
            &parent_style,
            None,
        )?;
        let wrapper_style = state.tree.arena[wrapper].style.clone();
        let table = state.create_anonymous_box(
            BoxKind::Table,
            AnonymousBoxType::Table,
            &wrapper_style,
            None,
        )?;
        let mut pending = PendingPseudoBox::new(table, state.tree.arena[table].style.clone());
        pending.wrapper = Some(wrapper);
        pending
    } else {
        let id = state.create_anonymous_box(
            level.box_kind(),
            level.anonymous_box_type(),
            &parent_style,
            None,
        )?;
        PendingPseudoBox::new(id, state.tree.arena[id].style.clone())
    };
    debug!("Opening anonymous {:?} {:?}", level, pending.id);
    state.pseudo_boxes.open(level, pending);
    Ok(())
}

/// Finishes the pending box of `level` and adds it to the pending box of the level above,
/// or to `items` when that level is not open.
fn close_level(state: &mut BoxConstructorState<'_>, level: PseudoLevel, items: &mut BoxList) {
    let Some(mut pending) = state.pseudo_boxes.close(level) else {
        return;
    };
    trace!("Closing anonymous {:?} {:?}", level, pending.id);
    if let Some(inner) = pending.inner.take() {
        let outer = std::mem::replace(&mut state.pseudo_boxes, *inner);
        close_pseudo_chain(state, &mut pending.children);
        state.pseudo_boxes = outer;
    }
    let tree = &mut *state.tree;
    tree.set_initial_children(pending.id, ChildListId::Principal, pending.children);
    let output = match pending.wrapper {
        Some(wrapper) => {
            tree.set_initial_children(pending.id, ChildListId::ColGroup, pending.col_groups);
            tree.set_initial_children(wrapper, ChildListId::Principal, BoxList::single(pending.id));
            tree.set_initial_children(wrapper, ChildListId::Caption, pending.captions);
            wrapper
        },
        None => pending.id,
    };

    let list = if level == PseudoLevel::ColGroup {
        PendingList::ColGroups
    } else {
        PendingList::Children
    };
    match level
        .parent()
        .and_then(|parent_level| state.pseudo_boxes.pending_mut(parent_level))
    {
        Some(parent) => parent.list_mut(list).append(&mut state.tree.arena, output),
        None => items.append(&mut state.tree.arena, output),
    }
}

/// Closes every open level, emitting the outermost pending boxes into `items`.
pub(crate) fn close_pseudo_chain(state: &mut BoxConstructorState<'_>, items: &mut BoxList) {
    if !state.pseudo_boxes.is_open() {
        return;
    }
    for level in PseudoLevel::CLOSING_ORDER {
        close_level(state, level, items);
    }
}

/// Builds a child with the given role into the right parent: `items` when it fits the
/// actual parent, and the pending anonymous box it needs otherwise.
pub(crate) fn place_and_build<'a>(
    state: &mut BoxConstructorState<'a>,
    role: TableRole,
    parent: &ParentInfo,
    items: &mut BoxList,
    build: impl FnOnce(&mut BoxConstructorState<'a>, &ParentInfo, &mut BoxList) -> Result<()>,
) -> Result<()> {
    let (level, list) = match prepare_placement(state, role, parent, items)? {
        Placement::Suppress => {
            trace!("Dropping {:?} child of a column group", role);
            return Ok(());
        },
        Placement::Direct => return build(state, parent, items),
        Placement::Pending(level, list) => (level, list),
    };

    let Some(pending) = state.pseudo_boxes.pending(level) else {
        return build(state, parent, items);
    };
    let target = ParentInfo {
        id: if list == PendingList::Captions {
            pending.wrapper.unwrap_or(pending.id)
        } else {
            pending.id
        },
        kind: if list == PendingList::Captions {
            BoxKind::TableWrapper
        } else {
            level.box_kind()
        },
        style: parent.style.clone(),
        node: parent.node,
    };

    let mut boxes = state.pseudo_boxes.take_list(level, list);
    let result = if level == PseudoLevel::Cell {
        build_into_cell(state, role, &target, &mut boxes, build)
    } else {
        build(state, &target, &mut boxes)
    };
    state.pseudo_boxes.restore_list(level, list, boxes);
    result
}

/// Builds a child into the pending anonymous cell. The cell is not a table part, so a
/// misparented table part gets its own anonymous table inside the cell, kept open across
/// siblings until the cell is closed.
fn build_into_cell<'a>(
    state: &mut BoxConstructorState<'a>,
    role: TableRole,
    cell: &ParentInfo,
    boxes: &mut BoxList,
    build: impl FnOnce(&mut BoxConstructorState<'a>, &ParentInfo, &mut BoxList) -> Result<()>,
) -> Result<()> {
    let inner = state
        .pseudo_boxes
        .pending_mut(PseudoLevel::Cell)
        .and_then(|pending| pending.inner.take())
        .map(|inner| *inner)
        .unwrap_or_default();

    let (result, inner) = {
        let mut scope = state.push_float_containing_block(Some(cell.id));
        let outer = std::mem::replace(&mut scope.pseudo_boxes, inner);
        let result = place_and_build(&mut *scope, role, cell, boxes, build);
        let inner = std::mem::replace(&mut scope.pseudo_boxes, outer);
        (result, inner)
    };

    if inner.is_open() {
        if let Some(pending) = state.pseudo_boxes.pending_mut(PseudoLevel::Cell) {
            pending.inner = Some(Box::new(inner));
        }
    }
    result
}

/// Splits the children built for an inner table into its captions, its column groups and
/// everything else, keeping the order within each list.
fn split_table_children(arena: &mut BoxArena, children: BoxList) -> (BoxList, BoxList, BoxList) {
    let mut captions = BoxList::new();
    let mut col_groups = BoxList::new();
    let mut rows = BoxList::new();
    for child in children.to_vec(arena) {
        let layout_box = &arena[child];
        if layout_box.is_caption() && !layout_box.is_out_of_flow() {
            captions.append(arena, child);
        } else if layout_box.kind == BoxKind::TableColumnGroup {
            col_groups.append(arena, child);
        } else {
            rows.append(arena, child);
        }
    }
    (captions, col_groups, rows)
}

/// Builds a table element: a wrapper box holding the captions and the inner table, which
/// holds the column groups and the rows.
pub(crate) fn construct_table(
    state: &mut BoxConstructorState<'_>,
    node: OpaqueNode,
    style: Arc<ComputedStyle>,
    items: &mut BoxList,
) -> Result<()> {
    let wrapper = state.create_box(LayoutBox::new(
        BoxKind::TableWrapper,
        style.clone(),
        Some(node),
    ))?;
    let table = state.create_anonymous_box(
        BoxKind::Table,
        AnonymousBoxType::Table,
        &style,
        Some(node),
    )?;
    state.tree.set_primary_box(node, wrapper);

    let mut children = BoxList::new();
    {
        let positioned = style.establishes_containing_block_for_absolute_descendants();
        let mut scope = maybe_push(
            state,
            OutOfFlowCategory::Absolute,
            positioned.then_some(Some(wrapper)),
        );
        let table_parent = ParentInfo {
            id: table,
            kind: BoxKind::Table,
            style: style.clone(),
            node: Some(node),
        };
        construct::process_children(&mut *scope, node, &table_parent, &mut children)?;
    }

    let tree = &mut *state.tree;
    let (captions, col_groups, rows) = split_table_children(&mut tree.arena, children);
    tree.set_initial_children(table, ChildListId::Principal, rows);
    tree.set_initial_children(table, ChildListId::ColGroup, col_groups);
    tree.set_initial_children(wrapper, ChildListId::Principal, BoxList::single(table));
    tree.set_initial_children(wrapper, ChildListId::Caption, captions);

    state.add_child(wrapper, items)
}

/// Moves captions and column groups out of freshly built children of the inner table
/// `table` into the lists they belong to. Returns the remaining children.
pub(crate) fn route_table_children(
    state: &mut BoxConstructorState<'_>,
    table: BoxId,
    children: BoxList,
) -> BoxList {
    let tree = &mut *state.tree;
    let (captions, col_groups, rows) = split_table_children(&mut tree.arena, children);
    if let Some(wrapper) = tree.parent(table) {
        tree.append_children(wrapper, ChildListId::Caption, captions);
    }
    tree.append_children(table, ChildListId::ColGroup, col_groups);
    rows
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn misparented_parts_need_the_nearest_missing_level() {
        use PseudoLevel::*;

        assert_eq!(TableRole::Cell.required_level(None), Some(Row));
        assert_eq!(TableRole::Row.required_level(None), Some(RowGroup));
        assert_eq!(TableRole::Caption.required_level(None), Some(Table));
        assert_eq!(TableRole::Other.required_level(None), None);
        assert_eq!(TableRole::Other.required_level(Some(Table)), Some(Cell));
        assert_eq!(TableRole::Row.required_level(Some(Table)), Some(RowGroup));
        assert_eq!(TableRole::Column.required_level(Some(Table)), Some(ColGroup));
        assert_eq!(TableRole::Column.required_level(Some(Row)), Some(Cell));
        assert_eq!(TableRole::Caption.required_level(Some(RowGroup)), Some(Cell));
        assert_eq!(TableRole::Row.required_level(Some(RowGroup)), Some(RowGroup));
        assert_eq!(TableRole::Cell.required_level(Some(Row)), Some(Row));
        assert_eq!(TableRole::RowGroup.required_level(Some(Row)), Some(Cell));
    }

    #[test]
    fn roles_follow_the_construction_routine() {
        assert_eq!(
            TableRole::for_routine(ConstructionRoutine::Block, Display::TableCaption),
            TableRole::Caption
        );
        assert_eq!(
            TableRole::for_routine(ConstructionRoutine::Replaced, Display::TableCell),
            TableRole::Other
        );
        assert_eq!(
            TableRole::for_routine(ConstructionRoutine::TableColumn, Display::TableColumn),
            TableRole::Column
        );
    }

    #[test]
    fn lowest_level_tracks_the_innermost_open_box() {
        let mut arena = BoxArena::new(8);
        let style = Arc::new(ComputedStyle::default());
        let mut registry = PseudoBoxRegistry::default();
        assert!(!registry.is_open());

        let table = arena
            .allocate(LayoutBox::new(BoxKind::Table, style.clone(), None))
            .unwrap();
        let row = arena
            .allocate(LayoutBox::new(BoxKind::TableRow, style.clone(), None))
            .unwrap();
        registry.open(PseudoLevel::Table, PendingPseudoBox::new(table, style.clone()));
        registry.open(PseudoLevel::Row, PendingPseudoBox::new(row, style));
        assert_eq!(registry.lowest(), Some(PseudoLevel::Row));

        registry.close(PseudoLevel::Row);
        assert_eq!(registry.lowest(), Some(PseudoLevel::Table));
        registry.close(PseudoLevel::Table);
        assert!(!registry.is_open());
    }
}
