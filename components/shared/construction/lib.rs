/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

#![deny(unsafe_code)]

//! The interfaces that the box constructor consumes and produces.
//!
//! The box constructor does not own the document, the style system or the session history.
//! Each of them is reached through one of the traits in this crate, which are injected into
//! the constructor once when it is created:
//!
//!  - [`ContentTree`] is the ordered, parsed document.
//!  - [`StyleResolver`] answers computed style queries for elements, pseudo-elements and
//!    anonymous boxes.
//!  - [`HistoryStore`] keeps transient per-box state across box reconstruction.
//!
//! In the other direction the constructor posts [`RestyleEvent`]s for the style engine.

mod history;
mod node;
mod restyle;
pub mod style;
#[cfg(feature = "test-support")]
pub mod testing;

pub use history::{BoxHistoryState, HistoryKey, HistoryMap, HistoryStore};
pub use node::{ContentTree, NodeKind, OpaqueNode};
pub use restyle::{PendingRestyles, RestyleEvent, RestyleHint};
pub use style::{AnonymousBoxType, ComputedStyle, PseudoElement, StyleResolver};
