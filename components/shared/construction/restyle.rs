/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use bitflags::bitflags;
use rustc_hash::FxHashMap;

use crate::node::OpaqueNode;

bitflags! {
    /// Work that box construction asks the style engine and the layout passes to do.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct RestyleHint: u8 {
        /// Recompute the style of the element itself. Posted when the text that one of its
        /// `::first-letter` or `::first-line` pseudo-elements applies to has changed.
        const RESTYLE_SELF = 1 << 0;
        /// Recompute the styles of the descendants of the element.
        const RESTYLE_DESCENDANTS = 1 << 1;
        /// The boxes of the element changed and need to be measured again.
        const REFLOW = 1 << 2;
        /// The text of generated content changed.
        const REPAINT = 1 << 3;
    }
}

impl std::fmt::Display for RestyleHint {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        let mut first_elem = true;

        let to_iter = [
            (RestyleHint::RESTYLE_SELF, "Restyle self"),
            (RestyleHint::RESTYLE_DESCENDANTS, "Restyle descendants"),
            (RestyleHint::REFLOW, "Reflow"),
            (RestyleHint::REPAINT, "Repaint"),
        ];

        for &(hint, hint_str) in &to_iter {
            if self.contains(hint) {
                if !first_elem {
                    write!(f, " | ")?;
                }
                write!(f, "{}", hint_str)?;
                first_elem = false;
            }
        }

        if first_elem {
            write!(f, "NoHint")?;
        }

        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RestyleEvent {
    pub node: OpaqueNode,
    pub hint: RestyleHint,
}

/// The queue of restyle events waiting for the style engine. Hints posted for the same
/// node are coalesced, and events are handed out in the order their node was first posted.
#[derive(Debug, Default)]
pub struct PendingRestyles {
    order: Vec<OpaqueNode>,
    hints: FxHashMap<OpaqueNode, RestyleHint>,
}

impl PendingRestyles {
    pub fn post(&mut self, node: OpaqueNode, hint: RestyleHint) {
        if hint.is_empty() {
            return;
        }
        match self.hints.get_mut(&node) {
            Some(existing) => existing.insert(hint),
            None => {
                self.order.push(node);
                self.hints.insert(node, hint);
            },
        }
    }

    pub fn hint_for(&self, node: OpaqueNode) -> RestyleHint {
        self.hints.get(&node).copied().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Drops every hint posted for `node`, for instance because it left the document.
    pub fn forget(&mut self, node: OpaqueNode) {
        if self.hints.remove(&node).is_some() {
            self.order.retain(|queued| *queued != node);
        }
    }

    pub fn drain(&mut self) -> Vec<RestyleEvent> {
        let mut hints = std::mem::take(&mut self.hints);
        std::mem::take(&mut self.order)
            .into_iter()
            .filter_map(|node| hints.remove(&node).map(|hint| RestyleEvent { node, hint }))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hints_for_the_same_node_are_coalesced() {
        let mut pending = PendingRestyles::default();
        pending.post(OpaqueNode(2), RestyleHint::REFLOW);
        pending.post(OpaqueNode(1), RestyleHint::REPAINT);
        pending.post(OpaqueNode(2), RestyleHint::RESTYLE_SELF);
        pending.post(OpaqueNode(3), RestyleHint::empty());

        assert_eq!(
            pending.drain(),
            vec![
                RestyleEvent {
                    node: OpaqueNode(2),
                    hint: RestyleHint::REFLOW | RestyleHint::RESTYLE_SELF,
                },
                RestyleEvent {
                    node: OpaqueNode(1),
                    hint: RestyleHint::REPAINT,
                },
            ]
        );
        assert!(pending.is_empty());
    }

    #[test]
    fn display_lists_every_hint() {
        let hint = RestyleHint::REFLOW | RestyleHint::REPAINT;
        assert_eq!(hint.to_string(), "Reflow | Repaint");
        assert_eq!(RestyleHint::empty().to_string(), "NoHint");
    }
}
