/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Sibling lists of boxes.
//!
//! A [`BoxList`] is the head and tail of a chain of boxes linked through their sibling
//! links. Construction routines build detached lists and hand them around; attaching a
//! list to a parent box is done by the box tree, which also sets the parent links. The
//! list operations here only ever touch sibling links.

use crate::boxes::{BoxArena, BoxId};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BoxList {
    first: Option<BoxId>,
    last: Option<BoxId>,
}

impl BoxList {
    pub fn new() -> Self {
        Self::default()
    }

    /// A list holding only `id`, which must not be linked into another list.
    pub fn single(id: BoxId) -> Self {
        Self {
            first: Some(id),
            last: Some(id),
        }
    }

    pub fn first(&self) -> Option<BoxId> {
        self.first
    }

    pub fn last(&self) -> Option<BoxId> {
        self.last
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_none()
    }

    pub fn iter<'a>(&self, arena: &'a BoxArena) -> BoxListIter<'a> {
        BoxListIter {
            arena,
            next: self.first,
        }
    }

    /// Collects the boxes of the list, for callers that mutate the arena while walking it.
    pub fn to_vec(&self, arena: &BoxArena) -> Vec<BoxId> {
        self.iter(arena).collect()
    }

    pub fn len(&self, arena: &BoxArena) -> usize {
        self.iter(arena).count()
    }

    pub fn contains(&self, arena: &BoxArena, id: BoxId) -> bool {
        self.iter(arena).any(|child| child == id)
    }

    pub(crate) fn append(&mut self, arena: &mut BoxArena, id: BoxId) {
        let previous = self.last;
        self.insert_after(arena, previous, id);
    }

    /// Links `id` after `previous`, or at the start of the list when `previous` is `None`.
    pub(crate) fn insert_after(
        &mut self,
        arena: &mut BoxArena,
        previous: Option<BoxId>,
        id: BoxId,
    ) {
        let next = match previous {
            Some(previous) => arena[previous].next_sibling,
            None => self.first,
        };
        {
            let new_box = &mut arena[id];
            new_box.previous_sibling = previous;
            new_box.next_sibling = next;
        }
        match previous {
            Some(previous) => arena[previous].next_sibling = Some(id),
            None => self.first = Some(id),
        }
        match next {
            Some(next) => arena[next].previous_sibling = Some(id),
            None => self.last = Some(id),
        }
    }

    /// Links all of `other` after `previous`, or at the start of the list when `previous`
    /// is `None`.
    pub(crate) fn insert_list_after(
        &mut self,
        arena: &mut BoxArena,
        previous: Option<BoxId>,
        other: BoxList,
    ) {
        let (Some(other_first), Some(other_last)) = (other.first, other.last) else {
            return;
        };
        let next = match previous {
            Some(previous) => arena[previous].next_sibling,
            None => self.first,
        };
        arena[other_first].previous_sibling = previous;
        arena[other_last].next_sibling = next;
        match previous {
            Some(previous) => arena[previous].next_sibling = Some(other_first),
            None => self.first = Some(other_first),
        }
        match next {
            Some(next) => arena[next].previous_sibling = Some(other_last),
            None => self.last = Some(other_last),
        }
    }

    /// Unlinks `id`, which must be in this list.
    pub(crate) fn remove(&mut self, arena: &mut BoxArena, id: BoxId) {
        let (previous, next) = {
            let removed = &mut arena[id];
            let links = (removed.previous_sibling, removed.next_sibling);
            removed.previous_sibling = None;
            removed.next_sibling = None;
            links
        };
        match previous {
            Some(previous) => arena[previous].next_sibling = next,
            None => self.first = next,
        }
        match next {
            Some(next) => arena[next].previous_sibling = previous,
            None => self.last = previous,
        }
    }

    /// Unlinks the boxes from `from` to `to` inclusive, which must be in this list in that
    /// order, and returns them as a new list.
    pub(crate) fn extract_range(
        &mut self,
        arena: &mut BoxArena,
        from: BoxId,
        to: BoxId,
    ) -> BoxList {
        let previous = arena[from].previous_sibling;
        let next = arena[to].next_sibling;
        match previous {
            Some(previous) => arena[previous].next_sibling = next,
            None => self.first = next,
        }
        match next {
            Some(next) => arena[next].previous_sibling = previous,
            None => self.last = previous,
        }
        arena[from].previous_sibling = None;
        arena[to].next_sibling = None;
        BoxList {
            first: Some(from),
            last: Some(to),
        }
    }

    /// Splits the list after `id`, returning the boxes that followed it.
    pub(crate) fn split_after(&mut self, arena: &mut BoxArena, id: BoxId) -> BoxList {
        match (arena[id].next_sibling, self.last) {
            (Some(next), Some(last)) => self.extract_range(arena, next, last),
            _ => BoxList::new(),
        }
    }

    /// Removes and returns every box of the list.
    pub(crate) fn take(&mut self) -> BoxList {
        std::mem::take(self)
    }
}

pub struct BoxListIter<'a> {
    arena: &'a BoxArena,
    next: Option<BoxId>,
}

impl Iterator for BoxListIter<'_> {
    type Item = BoxId;

    fn next(&mut self) -> Option<BoxId> {
        let id = self.next?;
        self.next = self.arena.get(id).and_then(|layout_box| layout_box.next_sibling);
        Some(id)
    }
}

#[cfg(test)]
mod test {
    use construction_api::ComputedStyle;
    use servo_arc::Arc;

    use super::*;
    use crate::boxes::{BoxKind, LayoutBox};

    fn boxes(arena: &mut BoxArena, count: usize) -> Vec<BoxId> {
        let style = Arc::new(ComputedStyle::default());
        (0..count)
            .map(|_| {
                arena
                    .allocate(LayoutBox::new(BoxKind::Inline, style.clone(), None))
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn insert_and_remove_keep_both_directions_linked() {
        let mut arena = BoxArena::new(16);
        let ids = boxes(&mut arena, 4);
        let mut list = BoxList::new();
        list.append(&mut arena, ids[0]);
        list.append(&mut arena, ids[2]);
        list.insert_after(&mut arena, Some(ids[0]), ids[1]);
        list.insert_after(&mut arena, None, ids[3]);
        assert_eq!(list.to_vec(&arena), vec![ids[3], ids[0], ids[1], ids[2]]);
        assert_eq!(arena[ids[1]].previous_sibling, Some(ids[0]));

        list.remove(&mut arena, ids[3]);
        list.remove(&mut arena, ids[2]);
        assert_eq!(list.first(), Some(ids[0]));
        assert_eq!(list.last(), Some(ids[1]));
        assert_eq!(arena[ids[1]].next_sibling, None);
        assert_eq!(arena[ids[0]].previous_sibling, None);
    }

    #[test]
    fn ranges_can_be_moved_between_lists() {
        let mut arena = BoxArena::new(16);
        let ids = boxes(&mut arena, 5);
        let mut list = BoxList::new();
        for id in &ids {
            list.append(&mut arena, *id);
        }

        let middle = list.extract_range(&mut arena, ids[1], ids[3]);
        assert_eq!(list.to_vec(&arena), vec![ids[0], ids[4]]);
        assert_eq!(middle.to_vec(&arena), vec![ids[1], ids[2], ids[3]]);

        let mut other = BoxList::single(ids[4]);
        list.remove(&mut arena, ids[4]);
        other.insert_list_after(&mut arena, None, middle);
        assert_eq!(other.to_vec(&arena), vec![ids[1], ids[2], ids[3], ids[4]]);

        let tail = other.split_after(&mut arena, ids[2]);
        assert_eq!(tail.to_vec(&arena), vec![ids[3], ids[4]]);
        assert_eq!(other.last(), Some(ids[2]));
        assert!(other.split_after(&mut arena, ids[2]).is_empty());
    }
}
