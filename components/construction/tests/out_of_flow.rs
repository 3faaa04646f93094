/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

mod common;

use box_construction::{BoxConstructor, BoxKind, ChildListId};
use common::{block, build, flatten, inline, outline};
use construction_api::style::{Display, Float, Position};
use construction_api::testing::TestDocument;
use construction_api::{ComputedStyle, HistoryMap, OpaqueNode};

fn positioned(display: Display, position: Position) -> ComputedStyle {
    ComputedStyle {
        display,
        position,
        ..Default::default()
    }
}

/// Appends a child of one of four shapes to `body`, picked by `seed`.
fn append_child(doc: &TestDocument, body: OpaqueNode, seed: u8) -> OpaqueNode {
    match seed % 4 {
        0 => {
            let div = doc.append_element(body, "div", block());
            doc.append_text(div, "static");
            div
        },
        1 => {
            let div = doc.append_element(
                body,
                "div",
                ComputedStyle {
                    display: Display::Block,
                    float: if seed & 4 == 0 { Float::Left } else { Float::Right },
                    ..Default::default()
                },
            );
            doc.append_text(div, "float");
            div
        },
        2 => {
            let position = if seed & 4 == 0 {
                Position::Absolute
            } else {
                Position::Fixed
            };
            let div = doc.append_element(body, "div", positioned(Display::Block, position));
            doc.append_text(div, "positioned");
            div
        },
        _ => {
            let relative = doc.append_element(
                body,
                "div",
                positioned(Display::Block, Position::Relative),
            );
            doc.append_text(relative, "relative");
            let span = doc.append_element(
                relative,
                "span",
                positioned(Display::Inline, Position::Absolute),
            );
            doc.append_element(span, "b", inline());
            relative
        },
    }
}

/// Every out-of-flow box has exactly one placeholder that points back at it, and every box
/// in the arena is reachable from the root.
fn out_of_flow_boxes_are_consistent(constructor: &BoxConstructor) -> bool {
    let tree = constructor.tree();
    let pairs: Vec<_> = tree.placeholder_pairs().collect();
    let pairs_agree = pairs.iter().all(|&(out_of_flow, placeholder)| {
        tree.out_of_flow_for(placeholder) == Some(out_of_flow) &&
            tree.placeholder_for(out_of_flow) == Some(placeholder) &&
            tree.in_flow_box(out_of_flow) == placeholder &&
            tree.get(out_of_flow).is_some_and(|layout_box| layout_box.is_out_of_flow()) &&
            tree.get(placeholder).is_some_and(|layout_box| layout_box.is_placeholder())
    });

    let Some(dump) = constructor.dump() else {
        return pairs.is_empty() && tree.is_empty();
    };
    let boxes = flatten(&dump);
    let out_of_flow = boxes.iter().filter(|layout_box| layout_box.out_of_flow).count();
    let placeholders = boxes
        .iter()
        .filter(|layout_box| layout_box.kind == BoxKind::Placeholder)
        .count();
    pairs_agree &&
        out_of_flow == pairs.len() &&
        placeholders == pairs.len() &&
        boxes.len() == tree.len()
}

fn placeholders_survive_mutations(seeds: Vec<u8>) -> bool {
    let (doc, body) = TestDocument::with_body();
    let children: Vec<OpaqueNode> = seeds
        .iter()
        .take(12)
        .map(|seed| append_child(&doc, body, *seed))
        .collect();
    let history = HistoryMap::default();
    let mut constructor = build(&doc, &history);
    if !out_of_flow_boxes_are_consistent(&constructor) {
        return false;
    }

    for (index, child) in children.iter().enumerate() {
        if index % 2 == 1 {
            continue;
        }
        doc.remove_child(body, *child);
        if constructor.content_removed(body, *child).is_err() ||
            !out_of_flow_boxes_are_consistent(&constructor)
        {
            return false;
        }
    }

    // Add some of them back at the end.
    for child in children.iter().step_by(4) {
        doc.append_child(body, *child);
        if constructor.content_appended(body, *child).is_err() ||
            !out_of_flow_boxes_are_consistent(&constructor)
        {
            return false;
        }
    }
    true
}

#[test]
fn test_placeholders_track_out_of_flow_boxes() {
    quickcheck::quickcheck(placeholders_survive_mutations as fn(Vec<u8>) -> bool);
}

#[test]
fn test_fixed_box_inside_relative_container() {
    let (doc, body) = TestDocument::with_body();
    let relative = doc.append_element(body, "div", positioned(Display::Block, Position::Relative));
    let fixed = doc.append_element(relative, "div", positioned(Display::Block, Position::Fixed));
    doc.append_text(fixed, "f");
    let history = HistoryMap::default();
    let mut constructor = build(&doc, &history);
    assert!(out_of_flow_boxes_are_consistent(&constructor));

    let box_count = constructor.tree().len();
    doc.remove_child(body, relative);
    constructor.content_removed(body, relative).unwrap();
    assert!(constructor.tree().placeholder_pairs().next().is_none());
    assert!(constructor.primary_box_for(fixed).is_none());
    // The relative block, its placeholder child, the fixed block and its text.
    assert_eq!(constructor.tree().len(), box_count - 4);
    assert!(out_of_flow_boxes_are_consistent(&constructor));
}

/// The boxes in the popup list of the viewport.
fn popups(constructor: &BoxConstructor) -> Vec<Option<OpaqueNode>> {
    constructor
        .dump()
        .and_then(|dump| {
            dump.children
                .into_iter()
                .find(|list| list.list == ChildListId::Popup)
        })
        .map(|list| list.boxes.iter().map(|popup| popup.node).collect())
        .unwrap_or_default()
}

#[test]
fn test_popup_goes_to_the_viewport() {
    let (doc, body) = TestDocument::with_body();
    let relative = doc.append_element(body, "div", positioned(Display::Block, Position::Relative));
    let popup = doc.append_element(
        relative,
        "div",
        positioned(Display::MozPopup, Position::Static),
    );
    doc.append_text(popup, "menu");
    let history = HistoryMap::default();
    let mut constructor = build(&doc, &history);

    assert_eq!(popups(&constructor), vec![Some(popup)]);
    assert_eq!(
        outline(&constructor, relative),
        "Block\n  Placeholder <placeholder>\n"
    );
    let popup_box = constructor.primary_box_for(popup).unwrap();
    let placeholder = constructor.tree().placeholder_for(popup_box).unwrap();
    assert_eq!(
        constructor.tree().parent(placeholder),
        constructor.primary_box_for(relative)
    );
    assert!(out_of_flow_boxes_are_consistent(&constructor));

    doc.remove_child(relative, popup);
    constructor.content_removed(relative, popup).unwrap();
    assert!(popups(&constructor).is_empty());
    assert!(constructor.tree().placeholder_pairs().next().is_none());
    assert_eq!(outline(&constructor, relative), "Block\n");
    assert!(out_of_flow_boxes_are_consistent(&constructor));
}
