/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::cell::RefCell;

use rustc_hash::FxHashMap;

use crate::node::OpaqueNode;
use crate::style::PseudoElement;

/// Identifies the box whose state is stored: the primary box of an element, or the box of
/// one of its pseudo-elements.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct HistoryKey {
    pub node: OpaqueNode,
    pub pseudo: Option<PseudoElement>,
}

/// Transient state of a box that is not derived from style or content, and that must
/// survive the destruction and reconstruction of the box.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BoxHistoryState {
    pub scroll_position: (i32, i32),
}

pub trait HistoryStore {
    /// Captures the state of a box that is about to be destroyed.
    fn save_state(&self, key: HistoryKey, state: BoxHistoryState);

    /// Removes and returns the state captured for a box, if any.
    fn take_state(&self, key: HistoryKey) -> Option<BoxHistoryState>;
}

/// A [`HistoryStore`] backed by a hash map, for embedders without session history.
#[derive(Debug, Default)]
pub struct HistoryMap {
    entries: RefCell<FxHashMap<HistoryKey, BoxHistoryState>>,
}

impl HistoryMap {
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl HistoryStore for HistoryMap {
    fn save_state(&self, key: HistoryKey, state: BoxHistoryState) {
        self.entries.borrow_mut().insert(key, state);
    }

    fn take_state(&self, key: HistoryKey) -> Option<BoxHistoryState> {
        self.entries.borrow_mut().remove(&key)
    }
}
