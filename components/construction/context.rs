/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use construction_api::{ContentTree, HistoryStore, StyleResolver};

use crate::prefs::ConstructionPrefs;

/// The collaborators of the box constructor, resolved once when it is created.
#[derive(Clone, Copy)]
pub struct ConstructionContext<'a> {
    pub content: &'a dyn ContentTree,
    pub styles: &'a dyn StyleResolver,
    pub history: &'a dyn HistoryStore,
    pub prefs: ConstructionPrefs,
}

impl<'a> ConstructionContext<'a> {
    pub fn new(
        content: &'a dyn ContentTree,
        styles: &'a dyn StyleResolver,
        history: &'a dyn HistoryStore,
    ) -> Self {
        Self {
            content,
            styles,
            history,
            prefs: ConstructionPrefs::default(),
        }
    }

    pub fn with_prefs(self, prefs: ConstructionPrefs) -> Self {
        Self { prefs, ..self }
    }
}
