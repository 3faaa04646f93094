/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

mod common;

use box_construction::{
    BoxConstructor, BoxData, BoxKind, ChildListId, ConstructionContext, ConstructionError,
    ConstructionPrefs, check_split_invariant,
};
use common::{block, build, inline, outline, styled};
use construction_api::style::{Display, Float, Overflow};
use construction_api::testing::TestDocument;
use construction_api::{
    BoxHistoryState, ComputedStyle, ContentTree, HistoryKey, HistoryMap, HistoryStore,
    OpaqueNode, RestyleHint,
};

#[test]
fn test_append_to_body() {
    let (doc, body) = TestDocument::with_body();
    doc.append_text(body, "a");
    let history = HistoryMap::default();
    let mut constructor = build(&doc, &history);
    constructor.take_restyle_events();

    let div = doc.append_element(body, "div", block());
    doc.append_text(div, "b");
    constructor.content_appended(body, div).unwrap();

    assert_eq!(
        outline(&constructor, body),
        "Block\n  Text \"a\"\n  Block\n    Text \"b\"\n"
    );
    assert_eq!(
        constructor.pending_restyles().hint_for(body),
        RestyleHint::REFLOW
    );
}

#[test]
fn test_insert_between_siblings() {
    let (doc, body) = TestDocument::with_body();
    let first = doc.append_element(body, "div", block());
    doc.append_text(first, "1");
    let third = doc.append_element(body, "div", block());
    doc.append_text(third, "3");
    let history = HistoryMap::default();
    let mut constructor = build(&doc, &history);

    let second = doc.create_element("div");
    doc.set_style(second, block());
    doc.insert_before(body, second, Some(third));
    doc.append_text(second, "2");
    constructor.content_inserted(body, second).unwrap();

    assert_eq!(
        outline(&constructor, body),
        "Block
  Block
    Text \"1\"
  Block
    Text \"2\"
  Block
    Text \"3\"
"
    );
}

#[test]
fn test_remove_and_reinsert_round_trip() {
    let (doc, body) = TestDocument::with_body();
    let first = doc.append_element(body, "div", block());
    doc.append_text(first, "1");
    let second = doc.append_element(body, "p", block());
    doc.append_text(second, "2");
    let third = doc.append_element(body, "span", inline());
    doc.append_text(third, "3");
    let history = HistoryMap::default();
    let mut constructor = build(&doc, &history);
    let before = outline(&constructor, body);
    let box_count = constructor.tree().len();

    let next = doc.remove_child(body, second);
    assert_eq!(next, Some(third));
    constructor.content_removed(body, second).unwrap();
    assert_eq!(
        outline(&constructor, body),
        "Block\n  Block\n    Text \"1\"\n  Inline\n    Text \"3\"\n"
    );
    assert!(constructor.primary_box_for(second).is_none());
    assert_eq!(constructor.tree().len(), box_count - 2);

    doc.insert_before(body, second, next);
    constructor.content_inserted(body, second).unwrap();
    assert_eq!(outline(&constructor, body), before);
    assert_eq!(constructor.tree().len(), box_count);
}

#[test]
fn test_block_appended_to_inline_splits_it() {
    let (doc, body) = TestDocument::with_body();
    let span = doc.append_element(body, "span", inline());
    doc.append_text(span, "a");
    let bold = doc.append_element(span, "b", inline());
    doc.append_text(bold, "bold");
    let history = HistoryMap::default();
    let mut constructor = build(&doc, &history);
    let before = outline(&constructor, body);

    let div = doc.append_element(span, "div", block());
    doc.append_text(div, "b");
    constructor.content_appended(span, div).unwrap();

    assert_eq!(
        outline(&constructor, body),
        "Block
  Inline (special)
    Text \"a\"
    Inline
      Text \"bold\"
  Block <inline-split-block> (special)
    Block
      Text \"b\"
  Inline (special)
"
    );
    let tree = constructor.tree();
    let body_box = constructor.primary_box_for(body).unwrap();
    assert!(check_split_invariant(
        tree,
        &tree.child_list(body_box, ChildListId::Principal)
    ));

    // Taking the block out again leaves a plain inline.
    doc.remove_child(span, div);
    constructor.content_removed(span, div).unwrap();
    assert_eq!(outline(&constructor, body), before);
}

#[test]
fn test_float_appended_to_empty_block() {
    let (doc, body) = TestDocument::with_body();
    let container = doc.append_element(body, "div", block());
    let history = HistoryMap::default();
    let mut constructor = build(&doc, &history);

    let float = doc.append_element(
        container,
        "div",
        ComputedStyle {
            display: Display::Block,
            float: Float::Left,
            ..Default::default()
        },
    );
    constructor.content_appended(container, float).unwrap();

    assert_eq!(
        outline(&constructor, container),
        "Block\n  Placeholder <placeholder>\n  float: Block\n"
    );
    let tree = constructor.tree();
    let float_box = constructor.primary_box_for(float).unwrap();
    assert_eq!(tree.parent(float_box), constructor.primary_box_for(container));
    assert_eq!(tree.get(float_box).unwrap().parent_list, ChildListId::Float);
}

#[test]
fn test_cell_appended_next_to_anonymous_table_joins_it() {
    let (doc, body) = TestDocument::with_body();
    let first = doc.append_element(body, "span", styled(Display::TableCell));
    doc.append_text(first, "a");
    let history = HistoryMap::default();
    let mut constructor = build(&doc, &history);
    let before = outline(&constructor, body);

    let second = doc.append_element(body, "span", styled(Display::TableCell));
    doc.append_text(second, "b");
    constructor.content_appended(body, second).unwrap();
    assert_eq!(
        outline(&constructor, body),
        "Block
  TableWrapper <table-wrapper>
    Table <table>
      TableRowGroup <table-row-group>
        TableRow <table-row>
          TableCell
            Text \"a\"
          TableCell
            Text \"b\"
"
    );

    doc.remove_child(body, second);
    constructor.content_removed(body, second).unwrap();
    assert_eq!(outline(&constructor, body), before);
}

#[test]
fn test_append_into_display_contents() {
    let (doc, body) = TestDocument::with_body();
    let contents = doc.append_element(body, "div", styled(Display::Contents));
    doc.append_text(contents, "a");
    let history = HistoryMap::default();
    let mut constructor = build(&doc, &history);

    let span = doc.append_element(contents, "span", inline());
    doc.append_text(span, "b");
    constructor.content_appended(contents, span).unwrap();

    assert_eq!(
        outline(&constructor, body),
        "Block\n  Text \"a\"\n  Inline\n    Text \"b\"\n"
    );
}

#[test]
fn test_content_in_undisplayed_subtree_is_ignored() {
    let (doc, body) = TestDocument::with_body();
    let hidden = doc.append_element(body, "div", styled(Display::None));
    let history = HistoryMap::default();
    let mut constructor = build(&doc, &history);
    let box_count = constructor.tree().len();

    let child = doc.append_element(hidden, "div", block());
    constructor.content_appended(hidden, child).unwrap();
    assert_eq!(constructor.tree().len(), box_count);
    assert!(constructor.primary_box_for(child).is_none());
}

#[test]
fn test_detached_content_is_rejected() {
    let (doc, body) = TestDocument::with_body();
    let history = HistoryMap::default();
    let mut constructor = build(&doc, &history);

    let orphan = doc.create_element("div");
    assert_eq!(
        constructor.content_inserted(body, orphan),
        Err(ConstructionError::DetachedContent(orphan))
    );
}

#[test]
fn test_character_data_updates_text_in_place() {
    let (doc, body) = TestDocument::with_body();
    let div = doc.append_element(body, "div", block());
    let text = doc.append_text(div, "old");
    let history = HistoryMap::default();
    let mut constructor = build(&doc, &history);
    let text_box = constructor.primary_box_for(text).unwrap();
    constructor.take_restyle_events();

    doc.set_text(text, "new");
    constructor.character_data_changed(text).unwrap();

    assert_eq!(constructor.primary_box_for(text), Some(text_box));
    assert_eq!(
        constructor.tree().get(text_box).unwrap().text(),
        Some("new")
    );
    assert_eq!(
        constructor.pending_restyles().hint_for(div),
        RestyleHint::REFLOW
    );
}

#[test]
fn test_restyle_without_structural_change_keeps_boxes() {
    let (doc, body) = TestDocument::with_body();
    let div = doc.append_element(body, "div", block());
    doc.append_text(div, "x");
    let history = HistoryMap::default();
    let mut constructor = build(&doc, &history);
    let div_box = constructor.primary_box_for(div).unwrap();
    constructor.take_restyle_events();

    doc.set_style(
        div,
        ComputedStyle {
            paint_generation: 1,
            ..block()
        },
    );
    constructor.restyle(div).unwrap();

    assert_eq!(constructor.primary_box_for(div), Some(div_box));
    assert_eq!(
        constructor.tree().get(div_box).unwrap().style.paint_generation,
        1
    );
    let events = constructor.take_restyle_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].node, div);
    assert_eq!(events[0].hint, RestyleHint::REPAINT);
}

#[test]
fn test_restyle_with_new_display_rebuilds_boxes() {
    let (doc, body) = TestDocument::with_body();
    let div = doc.append_element(body, "div", block());
    doc.append_text(div, "x");
    let history = HistoryMap::default();
    let mut constructor = build(&doc, &history);
    let old_box = constructor.primary_box_for(div).unwrap();

    doc.set_style(div, inline());
    constructor.restyle(div).unwrap();

    let new_box = constructor.primary_box_for(div).unwrap();
    assert_ne!(new_box, old_box);
    assert!(!constructor.tree().contains(old_box));
    assert_eq!(constructor.tree().get(new_box).unwrap().kind, BoxKind::Inline);

    doc.set_style(div, styled(Display::None));
    constructor.restyle(div).unwrap();
    assert!(constructor.primary_box_for(div).is_none());
    assert!(constructor.tree().undisplayed_style(div).is_some());
    assert_eq!(outline(&constructor, body), "Block\n");

    doc.set_style(div, block());
    constructor.restyle(div).unwrap();
    assert!(constructor.tree().undisplayed_style(div).is_none());
    assert_eq!(
        outline(&constructor, body),
        "Block\n  Block\n    Text \"x\"\n"
    );
}

fn box_data(constructor: &BoxConstructor, node: OpaqueNode) -> BoxData {
    let id = constructor.primary_box_for(node).unwrap();
    constructor.tree().get(id).unwrap().data.clone()
}

#[test]
fn test_scroll_position_survives_reconstruction() {
    let (doc, body) = TestDocument::with_body();
    let scroller = doc.append_element(
        body,
        "div",
        ComputedStyle {
            display: Display::Block,
            overflow: Overflow::Scroll,
            ..Default::default()
        },
    );
    doc.append_text(scroller, "x");
    let history = HistoryMap::default();
    let key = HistoryKey {
        node: scroller,
        pseudo: None,
    };
    history.save_state(
        key,
        BoxHistoryState {
            scroll_position: (3, 7),
        },
    );
    let mut constructor = build(&doc, &history);
    assert!(history.is_empty());

    assert_eq!(
        box_data(&constructor, scroller),
        BoxData::Scroll { position: (3, 7) }
    );

    constructor.recreate_boxes_for(scroller).unwrap();
    assert_eq!(
        box_data(&constructor, scroller),
        BoxData::Scroll { position: (3, 7) }
    );
    assert!(history.is_empty());

    doc.remove_child(body, scroller);
    constructor.content_removed(body, scroller).unwrap();
    assert_eq!(history.take_state(key).map(|state| state.scroll_position), Some((3, 7)));
}

#[test]
fn test_failed_insertion_leaves_the_tree_untouched() {
    let (doc, body) = TestDocument::with_body();
    doc.append_text(body, "a");
    let history = HistoryMap::default();
    let prefs = ConstructionPrefs {
        max_boxes: 5,
        ..Default::default()
    };
    let mut constructor =
        BoxConstructor::new(ConstructionContext::new(&doc, &doc, &history).with_prefs(prefs));
    constructor.construct_root().unwrap();
    let before = outline(&constructor, body);
    assert_eq!(constructor.tree().len(), 4);

    let div = doc.append_element(body, "div", block());
    doc.append_text(div, "b");
    assert_eq!(
        constructor.content_appended(body, div),
        Err(ConstructionError::BoxLimitExceeded { limit: 5 })
    );
    assert_eq!(constructor.tree().len(), 4);
    assert_eq!(outline(&constructor, body), before);
    assert!(constructor.primary_box_for(div).is_none());
}

#[test]
fn test_removing_the_root_element_destroys_the_tree() {
    let (doc, body) = TestDocument::with_body();
    doc.append_text(body, "a");
    let history = HistoryMap::default();
    let mut constructor = build(&doc, &history);
    let before = constructor.dump().unwrap().outline();

    let document = doc.document();
    let html = doc.root_element().unwrap();
    doc.remove_child(document, html);
    constructor.content_removed(document, html).unwrap();
    assert!(constructor.tree().root().is_none());
    assert_eq!(constructor.tree().len(), 0);
    assert!(constructor.primary_box_for(body).is_none());

    doc.append_child(document, html);
    constructor.content_inserted(document, html).unwrap();
    assert_eq!(constructor.dump().unwrap().outline(), before);
}
