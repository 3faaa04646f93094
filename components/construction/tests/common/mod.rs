/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

#![allow(dead_code)]

use box_construction::{BoxConstructor, BoxDump, ConstructionContext};
use construction_api::style::Display;
use construction_api::testing::TestDocument;
use construction_api::{ComputedStyle, HistoryMap, OpaqueNode};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn styled(display: Display) -> ComputedStyle {
    ComputedStyle {
        display,
        ..Default::default()
    }
}

pub fn block() -> ComputedStyle {
    styled(Display::Block)
}

pub fn inline() -> ComputedStyle {
    styled(Display::Inline)
}

/// Builds the box tree of `document`.
pub fn build<'a>(document: &'a TestDocument, history: &'a HistoryMap) -> BoxConstructor<'a> {
    init_logger();
    let mut constructor =
        BoxConstructor::new(ConstructionContext::new(document, document, history));
    constructor.construct_root().unwrap();
    constructor
}

/// The outline of the boxes of `node`.
pub fn outline(constructor: &BoxConstructor, node: OpaqueNode) -> String {
    constructor
        .dump()
        .and_then(|dump| dump.find(node).map(BoxDump::outline))
        .unwrap_or_default()
}

/// Every box of a dump, depth first.
pub fn flatten(dump: &BoxDump) -> Vec<&BoxDump> {
    let mut boxes = vec![dump];
    for list in &dump.children {
        for child in &list.boxes {
            boxes.extend(flatten(child));
        }
    }
    boxes
}
