/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use construction_api::OpaqueNode;

/// Convenient type alias of Result type for box construction.
pub type Result<T> = std::result::Result<T, ConstructionError>;

/// Errors returned by the box constructor.
///
/// Whenever one of these is returned from a construction pass, the pass has already
/// destroyed every box it built and removed them from the side tables.
#[non_exhaustive]
#[derive(thiserror::Error, Clone, Debug, Eq, PartialEq)]
pub enum ConstructionError {
    /// Building the box would exceed the configured number of live boxes.
    #[error("box limit of {limit} exceeded")]
    BoxLimitExceeded { limit: usize },
    /// A mutation notification named a node that is not attached to the document.
    #[error("node {0:?} is not attached to the document")]
    DetachedContent(OpaqueNode),
    /// The style system has no style for a node that needs a box.
    #[error("no style for node {0:?}")]
    StyleUnavailable(OpaqueNode),
    /// The document has no root element to build boxes for.
    #[error("the document has no root element")]
    NoRootElement,
}
