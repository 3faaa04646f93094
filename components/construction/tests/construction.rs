/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

mod common;

use box_construction::{
    BoxConstructor, BoxData, BoxKind, ChildListId, ConstructionContext, ConstructionError,
    ConstructionPrefs, check_split_invariant,
};
use common::{block, build, inline, outline, styled};
use construction_api::style::{Display, Float, Overflow, Position};
use construction_api::testing::TestDocument;
use construction_api::{ComputedStyle, HistoryMap};

#[test]
fn test_document_structure() {
    let (doc, body) = TestDocument::with_body();
    doc.append_text(body, "hello");
    let history = HistoryMap::default();
    let constructor = build(&doc, &history);

    let dump = constructor.dump().unwrap();
    assert_eq!(
        dump.outline(),
        "Viewport <viewport>\n  Block\n    Block\n      Text \"hello\"\n"
    );
    assert!(constructor.primary_box_for(body).is_some());
    assert_eq!(constructor.tree().len(), 4);
}

#[test]
fn test_missing_root_element() {
    let doc = TestDocument::new();
    let history = HistoryMap::default();
    let mut constructor = BoxConstructor::new(ConstructionContext::new(&doc, &doc, &history));
    assert_eq!(
        constructor.construct_root(),
        Err(ConstructionError::NoRootElement)
    );
    assert!(constructor.tree().root().is_none());
}

#[test]
fn test_misparented_cell_gets_anonymous_table() {
    let (doc, body) = TestDocument::with_body();
    let cell = doc.append_element(body, "span", styled(Display::TableCell));
    doc.append_text(cell, "x");
    let history = HistoryMap::default();
    let constructor = build(&doc, &history);

    assert_eq!(
        outline(&constructor, body),
        "Block
  TableWrapper <table-wrapper>
    Table <table>
      TableRowGroup <table-row-group>
        TableRow <table-row>
          TableCell
            Text \"x\"
"
    );
}

#[test]
fn test_row_inside_row_gets_anonymous_table() {
    let (doc, body) = TestDocument::with_body();
    let outer = doc.append_element(body, "div", styled(Display::TableRow));
    let inner = doc.append_element(outer, "div", styled(Display::TableRow));
    doc.append_text(inner, "x");
    let history = HistoryMap::default();
    let constructor = build(&doc, &history);

    assert_eq!(
        outline(&constructor, body),
        "Block
  TableWrapper <table-wrapper>
    Table <table>
      TableRowGroup <table-row-group>
        TableRow
          TableCell <table-cell>
            TableWrapper <table-wrapper>
              Table <table>
                TableRowGroup <table-row-group>
                  TableRow
                    TableCell <table-cell>
                      Text \"x\"
"
    );
}

#[test]
fn test_row_group_inside_row_group_gets_anonymous_table() {
    let (doc, body) = TestDocument::with_body();
    let table = doc.create_element("table");
    doc.append_child(body, table);
    let outer = doc.create_element("tbody");
    doc.append_child(table, outer);
    let inner = doc.create_element("tbody");
    doc.append_child(outer, inner);
    let first = doc.create_element("tr");
    doc.append_child(inner, first);
    let cell = doc.create_element("td");
    doc.append_child(first, cell);
    doc.append_text(cell, "x");
    // A second misparented row group joins the same anonymous table.
    let second = doc.append_element(outer, "div", styled(Display::TableRowGroup));
    let row = doc.append_element(second, "div", styled(Display::TableRow));
    let cell = doc.append_element(row, "div", styled(Display::TableCell));
    doc.append_text(cell, "y");
    let history = HistoryMap::default();
    let constructor = build(&doc, &history);

    assert_eq!(
        outline(&constructor, outer),
        "TableRowGroup
  TableRow <table-row>
    TableCell <table-cell>
      TableWrapper <table-wrapper>
        Table <table>
          TableRowGroup
            TableRow
              TableCell
                Text \"x\"
          TableRowGroup
            TableRow
              TableCell
                Text \"y\"
"
    );
}

#[test]
fn test_adjacent_cells_share_anonymous_row() {
    let (doc, body) = TestDocument::with_body();
    for text in ["a", "b"] {
        let cell = doc.append_element(body, "span", styled(Display::TableCell));
        doc.append_text(cell, text);
    }
    doc.append_text(body, "after");
    let history = HistoryMap::default();
    let constructor = build(&doc, &history);

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
  Text \"after\"
"
    );
}

#[test]
fn test_table_captions_and_row_groups() {
    let (doc, body) = TestDocument::with_body();
    let table = doc.create_element("table");
    doc.append_child(body, table);
    doc.append_text(table, "\n  ");
    let caption = doc.create_element("caption");
    doc.append_child(table, caption);
    doc.append_text(caption, "c");
    let row = doc.create_element("tr");
    doc.append_child(table, row);
    doc.append_text(row, " ");
    let cell = doc.create_element("td");
    doc.append_child(row, cell);
    doc.append_text(cell, "x");
    doc.append_text(table, "\n");
    let history = HistoryMap::default();
    let constructor = build(&doc, &history);

    assert_eq!(
        outline(&constructor, table),
        "TableWrapper
  Table <table>
    TableRowGroup <table-row-group>
      TableRow
        TableCell
          Text \"x\"
  caption: Block
    Text \"c\"
"
    );
    let tree = constructor.tree();
    let wrapper = constructor.primary_box_for(table).unwrap();
    assert_eq!(tree.get(wrapper).unwrap().kind, BoxKind::TableWrapper);
    assert_eq!(tree.children(wrapper, ChildListId::Caption).count(), 1);
}

#[test]
fn test_floats_leave_placeholders() {
    let (doc, body) = TestDocument::with_body();
    let float = doc.append_element(
        body,
        "div",
        ComputedStyle {
            display: Display::Block,
            float: Float::Left,
            ..Default::default()
        },
    );
    doc.append_text(float, "f");
    doc.append_text(body, "t");
    let history = HistoryMap::default();
    let constructor = build(&doc, &history);

    assert_eq!(
        outline(&constructor, body),
        "Block
  Placeholder <placeholder>
  Text \"t\"
  float: Block
    Text \"f\"
"
    );
    let tree = constructor.tree();
    let float_box = constructor.primary_box_for(float).unwrap();
    let placeholder = tree.placeholder_for(float_box).unwrap();
    assert_eq!(tree.out_of_flow_for(placeholder), Some(float_box));
    assert_eq!(tree.in_flow_box(float_box), placeholder);
    assert_eq!(
        tree.parent(placeholder),
        constructor.primary_box_for(body)
    );
}

#[test]
fn test_absolute_boxes_use_nearest_positioned_ancestor() {
    let (doc, body) = TestDocument::with_body();
    let absolute_style = ComputedStyle {
        display: Display::Inline,
        position: Position::Absolute,
        ..Default::default()
    };
    let outer = doc.append_element(body, "span", absolute_style.clone());
    let relative = doc.append_element(
        body,
        "div",
        ComputedStyle {
            display: Display::Block,
            position: Position::Relative,
            ..Default::default()
        },
    );
    let inner = doc.append_element(relative, "span", absolute_style);
    let history = HistoryMap::default();
    let constructor = build(&doc, &history);

    let tree = constructor.tree();
    let outer_box = constructor.primary_box_for(outer).unwrap();
    let inner_box = constructor.primary_box_for(inner).unwrap();
    let relative_box = constructor.primary_box_for(relative).unwrap();
    // Absolutely positioned inlines are blockified.
    assert_eq!(tree.get(outer_box).unwrap().kind, BoxKind::Block);
    assert_eq!(tree.parent(outer_box), tree.root());
    assert_eq!(tree.get(outer_box).unwrap().parent_list, ChildListId::Absolute);
    assert_eq!(tree.parent(inner_box), Some(relative_box));
    assert_eq!(tree.get(inner_box).unwrap().parent_list, ChildListId::Absolute);
}

#[test]
fn test_fixed_boxes_go_to_the_viewport() {
    let (doc, body) = TestDocument::with_body();
    let relative = doc.append_element(
        body,
        "div",
        ComputedStyle {
            display: Display::Block,
            position: Position::Relative,
            ..Default::default()
        },
    );
    let fixed = doc.append_element(
        relative,
        "div",
        ComputedStyle {
            display: Display::Block,
            position: Position::Fixed,
            ..Default::default()
        },
    );
    let history = HistoryMap::default();
    let constructor = build(&doc, &history);

    let tree = constructor.tree();
    let fixed_box = constructor.primary_box_for(fixed).unwrap();
    assert_eq!(tree.parent(fixed_box), tree.root());
    assert_eq!(tree.get(fixed_box).unwrap().parent_list, ChildListId::Fixed);
}

#[test]
fn test_block_inside_inline_splits_it() {
    let (doc, body) = TestDocument::with_body();
    let span = doc.append_element(body, "span", inline());
    doc.append_text(span, "a");
    let div = doc.append_element(span, "div", block());
    doc.append_text(div, "b");
    doc.append_text(span, "c");
    let history = HistoryMap::default();
    let constructor = build(&doc, &history);

    assert_eq!(
        outline(&constructor, body),
        "Block
  Inline (special)
    Text \"a\"
  Block <inline-split-block> (special)
    Block
      Text \"b\"
  Inline (special)
    Text \"c\"
"
    );
    let tree = constructor.tree();
    let body_box = constructor.primary_box_for(body).unwrap();
    assert!(check_split_invariant(
        tree,
        &tree.child_list(body_box, ChildListId::Principal)
    ));
    let first = constructor.primary_box_for(span).unwrap();
    assert_eq!(tree.split_chain(first).len(), 3);
    assert_eq!(tree.first_in_split_chain(tree.last_in_split_chain(first)), first);
}

#[test]
fn test_display_contents_children_join_the_parent() {
    let (doc, body) = TestDocument::with_body();
    let contents = doc.append_element(body, "div", styled(Display::Contents));
    doc.append_text(contents, "a");
    let hidden = doc.append_element(body, "div", styled(Display::None));
    doc.append_text(hidden, "b");
    doc.append_child(body, doc.create_comment("c"));
    let history = HistoryMap::default();
    let constructor = build(&doc, &history);

    assert_eq!(outline(&constructor, body), "Block\n  Text \"a\"\n");
    assert!(constructor.primary_box_for(contents).is_none());
    assert!(constructor.tree().undisplayed_style(hidden).is_some());
}

#[test]
fn test_flex_containers_wrap_inline_runs() {
    let (doc, body) = TestDocument::with_body();
    let flex = doc.append_element(body, "div", styled(Display::Flex));
    doc.append_text(flex, "a");
    doc.append_element(flex, "span", inline());
    doc.append_text(flex, " ");
    let item = doc.append_element(flex, "div", block());
    doc.append_text(item, "b");
    doc.append_text(flex, "  ");
    let history = HistoryMap::default();
    let constructor = build(&doc, &history);

    assert_eq!(
        outline(&constructor, flex),
        "Flex
  Block <wrapper-block>
    Text \"a\"
    Inline
    Text \" \"
  Block
    Text \"b\"
"
    );
}

#[test]
fn test_scroll_containers_hold_a_scrolled_block() {
    let (doc, body) = TestDocument::with_body();
    let scroller = doc.append_element(
        body,
        "div",
        ComputedStyle {
            display: Display::Block,
            overflow: Overflow::Auto,
            ..Default::default()
        },
    );
    doc.append_text(scroller, "x");
    let history = HistoryMap::default();
    let constructor = build(&doc, &history);

    assert_eq!(
        outline(&constructor, scroller),
        "ScrollContainer\n  Block <scrolled-content>\n    Text \"x\"\n"
    );
}

#[test]
fn test_box_limit_unwinds_the_whole_build() {
    let (doc, body) = TestDocument::with_body();
    doc.append_text(body, "text");
    let history = HistoryMap::default();
    let prefs = ConstructionPrefs {
        max_boxes: 3,
        ..Default::default()
    };
    let mut constructor =
        BoxConstructor::new(ConstructionContext::new(&doc, &doc, &history).with_prefs(prefs));

    assert_eq!(
        constructor.construct_root(),
        Err(ConstructionError::BoxLimitExceeded { limit: 3 })
    );
    assert_eq!(constructor.tree().len(), 0);
    assert!(constructor.tree().root().is_none());
    assert!(constructor.primary_box_for(body).is_none());
}

#[test]
fn test_dump_serializes_to_json() {
    let (doc, body) = TestDocument::with_body();
    doc.append_text(body, "hello");
    let history = HistoryMap::default();
    let constructor = build(&doc, &history);

    let json = constructor.dump().unwrap().to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["kind"], "Viewport");
    assert_eq!(value["anonymous"], "viewport");
    assert_eq!(value["children"][0]["list"], "Principal");
}

#[test]
fn test_replaced_elements_and_line_breaks() {
    let (doc, body) = TestDocument::with_body();
    let image = doc.create_element("img");
    doc.set_attribute(image, "src", "cat.png");
    doc.append_child(body, image);
    let broken = doc.create_element("img");
    doc.append_child(body, broken);
    doc.append_child(body, doc.create_element("br"));
    let option = doc.create_element("option");
    doc.append_child(body, option);
    doc.append_text(option, "hidden");
    doc.append_text(body, "x");
    let history = HistoryMap::default();
    let constructor = build(&doc, &history);

    assert_eq!(
        outline(&constructor, body),
        "Block\n  Replaced\n  Inline\n  LineBreak\n  Text \"x\"\n"
    );
    let image_box = constructor.primary_box_for(image).unwrap();
    assert!(matches!(
        &constructor.tree().get(image_box).unwrap().data,
        BoxData::Replaced { source: Some(source) } if source == "cat.png"
    ));
    assert!(constructor.primary_box_for(option).is_none());
}
