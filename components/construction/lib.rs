/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

#![deny(unsafe_code)]

//! Box tree construction.
//!
//! The [`BoxConstructor`] builds the box tree of a document from its content tree and the
//! computed styles of its nodes, and keeps it up to date as the content tree changes. The
//! box tree follows the content tree closely, with the anonymous boxes that CSS requires
//! added: anonymous table parts around misparented table content, anonymous blocks around
//! block-level content of inlines, wrappers for `::first-line` and `::first-letter`, and
//! placeholders for boxes that are taken out of the normal flow.

mod box_list;
mod boxes;
mod construct;
mod context;
mod dispatch;
mod dump;
mod error;
mod first_line;
mod generated_content;
mod ib_split;
mod mutation;
mod prefs;
mod state;
mod table;
mod tree;

pub use box_list::{BoxList, BoxListIter};
pub use boxes::{
    BoxData, BoxId, BoxKind, BoxStateFlags, ChildListId, LayoutBox, SplitChain, SplitRole,
    TextData,
};
pub use context::ConstructionContext;
pub use dump::{BoxDump, ChildListDump};
pub use error::{ConstructionError, Result};
pub use ib_split::check_split_invariant;
pub use mutation::BoxConstructor;
pub use prefs::ConstructionPrefs;
pub use tree::BoxTree;
