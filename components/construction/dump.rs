/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Snapshots of the box tree, for debugging and for tests.

use std::fmt::Write;

use construction_api::OpaqueNode;
use serde::Serialize;

use crate::boxes::{BoxId, BoxKind, ChildListId};
use crate::tree::BoxTree;

#[derive(Clone, Debug, Serialize)]
pub struct BoxDump {
    pub id: BoxId,
    pub kind: BoxKind,
    pub node: Option<OpaqueNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pseudo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anonymous: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub special: bool,
    pub out_of_flow: bool,
    pub children: Vec<ChildListDump>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChildListDump {
    pub list: ChildListId,
    pub boxes: Vec<BoxDump>,
}

impl BoxTree {
    /// Dumps the whole tree, starting at the viewport.
    pub fn dump(&self) -> Option<BoxDump> {
        self.dump_box(self.root()?)
    }

    /// Dumps `id` and everything below it.
    pub fn dump_box(&self, id: BoxId) -> Option<BoxDump> {
        let layout_box = self.get(id)?;
        let children = layout_box
            .child_list_ids()
            .map(|list| ChildListDump {
                list,
                boxes: self
                    .children(id, list)
                    .filter_map(|child| self.dump_box(child))
                    .collect(),
            })
            .collect();
        Some(BoxDump {
            id,
            kind: layout_box.kind,
            node: layout_box.node,
            pseudo: layout_box.pseudo.map(|pseudo| pseudo.to_string()),
            anonymous: layout_box
                .style
                .anonymous_box
                .map(|box_type| box_type.to_string()),
            text: layout_box.text().map(str::to_owned),
            special: layout_box.is_special(),
            out_of_flow: layout_box.is_out_of_flow(),
            children,
        })
    }
}

impl BoxDump {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// An indented outline of the boxes, one per line, without box identifiers. Boxes in
    /// a list other than the principal one are prefixed with the name of the list.
    ///
    /// ```text
    /// Block
    ///   Inline (special)
    ///     Text "a"
    ///   float: Block
    /// ```
    pub fn outline(&self) -> String {
        let mut outline = String::new();
        self.write_outline(&mut outline, 0, ChildListId::Principal);
        outline
    }

    fn write_outline(&self, outline: &mut String, depth: usize, list: ChildListId) {
        for _ in 0..depth {
            outline.push_str("  ");
        }
        if list != ChildListId::Principal {
            let _ = write!(outline, "{}: ", list);
        }
        let _ = write!(outline, "{}", self.kind);
        if let Some(anonymous) = &self.anonymous {
            let _ = write!(outline, " <{}>", anonymous);
        }
        if let Some(pseudo) = &self.pseudo {
            let _ = write!(outline, " {}", pseudo);
        }
        if self.special {
            outline.push_str(" (special)");
        }
        if let Some(text) = &self.text {
            let _ = write!(outline, " {:?}", text);
        }
        outline.push('\n');
        for child_list in &self.children {
            for child in &child_list.boxes {
                child.write_outline(outline, depth + 1, child_list.list);
            }
        }
    }

    /// Finds the first box of `node` in this dump, depth first.
    pub fn find(&self, node: OpaqueNode) -> Option<&BoxDump> {
        if self.node == Some(node) && self.anonymous.is_none() && self.pseudo.is_none() {
            return Some(self);
        }
        self.children
            .iter()
            .flat_map(|list| list.boxes.iter())
            .find_map(|child| child.find(node))
    }
}
