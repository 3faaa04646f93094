/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Preferences controlling box construction.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct ConstructionPrefs {
    /// Build boxes for `::first-letter` pseudo-elements.
    pub first_letter_enabled: bool,

    /// Build boxes for `::first-line` pseudo-elements.
    pub first_line_enabled: bool,

    /// Build boxes for `::before`, `::after` and `::marker`.
    pub generated_content_enabled: bool,

    /// Drop whitespace-only text between table parts instead of wrapping it in anonymous
    /// cells.
    pub suppress_table_whitespace: bool,

    /// The maximum number of live boxes. Construction that would go past it fails with
    /// `ConstructionError::BoxLimitExceeded`.
    pub max_boxes: usize,
}

impl Default for ConstructionPrefs {
    fn default() -> Self {
        Self {
            first_letter_enabled: true,
            first_line_enabled: true,
            generated_content_enabled: true,
            suppress_table_whitespace: true,
            max_boxes: 1 << 20,
        }
    }
}

impl ConstructionPrefs {
    /// Reads preferences from a JSON object. Missing keys keep their default value.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_keys_use_defaults() {
        let prefs =
            ConstructionPrefs::from_json(r#"{ "max_boxes": 12, "first_line_enabled": false }"#)
                .unwrap();
        assert_eq!(prefs.max_boxes, 12);
        assert!(!prefs.first_line_enabled);
        assert!(prefs.first_letter_enabled);
        assert!(prefs.suppress_table_whitespace);
    }

    #[test]
    fn unknown_types_are_rejected() {
        assert!(ConstructionPrefs::from_json(r#"{ "max_boxes": "many" }"#).is_err());
    }
}
