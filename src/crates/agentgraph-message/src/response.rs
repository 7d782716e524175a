//! Normalizing `user_response` tool calls
//!
//! User responses arrive in several historical shapes: structured selection
//! arrays, single-option strings, quantity maps, or plain text under half a
//! dozen key spellings. [`parse_user_response`] normalizes them into one
//! [`UserResponse`] value using a fixed priority order, so routing code never
//! touches raw argument maps.
//!
//! Priority (first match wins):
//!
//! 1. An already-normalized result record under `result`.
//! 2. `selected_ids` / `selectedIds` / `selected` / `selectedOptions` /
//!    `selected_options` - one element is a single selection, several are a
//!    multi selection.
//! 3. `selected_option` / `selectedOption` as a string.
//! 4. `quantities` - a map of option id to positive integer count; zero and
//!    negative counts are dropped.
//! 5. Text under `text` / `rawText` / `response_text` / `responseText` /
//!    `input` / `value`.
//!
//! Keys are looked up both at the top level of the arguments and inside
//! `structured_data`. When the originating selection template forbids free
//! text, a text-only response parses to nothing and the caller routes via
//! its fallback edge.

use crate::tool_call::SelectionType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Normalized form of a user response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UserResponse {
    /// Free-text answer
    Text { value: String },

    /// A single selected option
    Single { option_id: String },

    /// Several selected options, in the order given
    Multi { option_ids: Vec<String> },

    /// Option id to positive count
    Quantity { quantities: HashMap<String, i64> },
}

/// Constraints declared by the selection request that produced a response
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionTemplate {
    /// Declared selection type, when the request was a selection
    pub selection_type: Option<SelectionType>,

    /// Whether a free-text answer is acceptable instead of a selection
    pub allow_free_text: bool,
}

impl SelectionTemplate {
    /// Template for a selection request that also accepts free text
    pub fn selection(selection_type: SelectionType) -> Self {
        Self {
            selection_type: Some(selection_type),
            allow_free_text: true,
        }
    }

    /// Forbid free-text answers
    pub fn strict(mut self) -> Self {
        self.allow_free_text = false;
        self
    }
}

/// Parse `user_response` arguments into a normalized [`UserResponse`]
///
/// Returns `None` when nothing parseable is present, or when the response is
/// text-only but `template` forbids free text for a selection request.
pub fn parse_user_response(
    arguments: &HashMap<String, Value>,
    template: Option<&SelectionTemplate>,
) -> Option<UserResponse> {
    let parsed = parse_untemplated(arguments)?;

    if let (UserResponse::Text { .. }, Some(template)) = (&parsed, template) {
        if !template.allow_free_text && template.selection_type.is_some() {
            return None;
        }
    }
    Some(parsed)
}

fn parse_untemplated(arguments: &HashMap<String, Value>) -> Option<UserResponse> {
    let structured = arguments.get("structured_data").and_then(Value::as_object);

    // 1. Already-normalized record
    if let Some(result) = arguments.get("result") {
        if let Ok(normalized) = serde_json::from_value::<UserResponse>(result.clone()) {
            return Some(normalized);
        }
    }

    // 2. Selection arrays
    const ARRAY_KEYS: [&str; 5] = [
        "selected_ids",
        "selectedIds",
        "selected",
        "selectedOptions",
        "selected_options",
    ];
    for key in ARRAY_KEYS {
        if let Some(ids) = lookup(arguments, structured, key).and_then(string_array) {
            match ids.len() {
                0 => continue,
                1 => {
                    return Some(UserResponse::Single {
                        option_id: ids.into_iter().next().unwrap_or_default(),
                    })
                }
                _ => return Some(UserResponse::Multi { option_ids: ids }),
            }
        }
    }

    // 3. Single option string
    for key in ["selected_option", "selectedOption"] {
        if let Some(option_id) = lookup(arguments, structured, key).and_then(Value::as_str) {
            return Some(UserResponse::Single {
                option_id: option_id.to_string(),
            });
        }
    }

    // 4. Quantities; only positive counts survive
    if let Some(raw) = lookup(arguments, structured, "quantities").and_then(Value::as_object) {
        let quantities: HashMap<String, i64> = raw
            .iter()
            .filter_map(|(id, count)| {
                count
                    .as_i64()
                    .filter(|count| *count > 0)
                    .map(|count| (id.clone(), count))
            })
            .collect();
        if !quantities.is_empty() {
            return Some(UserResponse::Quantity { quantities });
        }
    }

    // 5. Free text
    const TEXT_KEYS: [&str; 6] = [
        "text",
        "rawText",
        "response_text",
        "responseText",
        "input",
        "value",
    ];
    for key in TEXT_KEYS {
        if let Some(text) = lookup(arguments, structured, key).and_then(Value::as_str) {
            if !text.is_empty() {
                return Some(UserResponse::Text {
                    value: text.to_string(),
                });
            }
        }
    }

    None
}

fn lookup<'a>(
    arguments: &'a HashMap<String, Value>,
    structured: Option<&'a serde_json::Map<String, Value>>,
    key: &str,
) -> Option<&'a Value> {
    arguments
        .get(key)
        .or_else(|| structured.and_then(|map| map.get(key)))
}

fn string_array(value: &Value) -> Option<Vec<String>> {
    value.as_array().map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    })
}
