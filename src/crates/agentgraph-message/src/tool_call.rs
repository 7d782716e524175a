//! Tool call records and the HITL request functions
//!
//! A [`ToolCall`] is the structured record of an attempted or completed
//! external operation carried on a message. Three well-known function names
//! form the human-in-the-loop request protocol:
//!
//! | Function | Arguments |
//! |----------|-----------|
//! | `request_user_input` | `prompt_message`, optional `input_type` |
//! | `request_user_selection` | `items` (id/label/description), `prompt_message`, optional `selection_type` |
//! | `request_user_confirmation` | `message`, optional `options` |
//!
//! The reply travels back as a `user_response` call carrying free text and/or
//! `structured_data` (selected option(s), quantities). Pairing a pending
//! request with its response is what drives checkpoint resumption.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Function name for free-text HITL requests
pub const FN_REQUEST_USER_INPUT: &str = "request_user_input";

/// Function name for selection HITL requests
pub const FN_REQUEST_USER_SELECTION: &str = "request_user_selection";

/// Function name for confirmation HITL requests
pub const FN_REQUEST_USER_CONFIRMATION: &str = "request_user_confirmation";

/// Function name for the user's reply to any HITL request
pub const FN_USER_RESPONSE: &str = "user_response";

/// The three request-* function names, in no particular order
pub const HITL_REQUEST_FUNCTIONS: [&str; 3] = [
    FN_REQUEST_USER_INPUT,
    FN_REQUEST_USER_SELECTION,
    FN_REQUEST_USER_CONFIRMATION,
];

/// One option offered by a selection request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionItem {
    /// Stable identifier returned by the user's selection
    pub id: String,

    /// Human-readable label
    pub label: String,

    /// Optional longer description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SelectionItem {
    /// Create a selection item with an id and label
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Whether a selection request accepts one or many options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionType {
    Single,
    Multiple,
}

/// The function invocation inside a tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Function name
    pub name: String,

    /// Named arguments
    #[serde(default)]
    pub arguments: HashMap<String, Value>,
}

/// Structured record of an external operation carried on a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call id, used for request/response correlation
    pub id: String,

    /// Call type discriminator; always `"function"` for this protocol
    #[serde(rename = "type")]
    pub call_type: String,

    /// The invoked function and its arguments
    pub function: FunctionCall,
}

impl ToolCall {
    /// Create a tool call with a generated id
    pub fn new(name: impl Into<String>, arguments: HashMap<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: name.into(),
                arguments,
            },
        }
    }

    /// Replace the generated id (for correlation with an upstream system)
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Build a `request_user_input` call
    pub fn request_input(prompt_message: impl Into<String>) -> Self {
        let mut args = HashMap::new();
        args.insert("prompt_message".to_string(), Value::String(prompt_message.into()));
        Self::new(FN_REQUEST_USER_INPUT, args)
    }

    /// Build a `request_user_selection` call
    pub fn request_selection(
        items: Vec<SelectionItem>,
        prompt_message: impl Into<String>,
        selection_type: SelectionType,
    ) -> Self {
        let mut args = HashMap::new();
        args.insert(
            "items".to_string(),
            serde_json::to_value(items).unwrap_or(Value::Array(Vec::new())),
        );
        args.insert("prompt_message".to_string(), Value::String(prompt_message.into()));
        args.insert(
            "selection_type".to_string(),
            serde_json::to_value(selection_type).unwrap_or(Value::Null),
        );
        Self::new(FN_REQUEST_USER_SELECTION, args)
    }

    /// Build a `request_user_confirmation` call
    pub fn request_confirmation(message: impl Into<String>, options: Option<Vec<String>>) -> Self {
        let mut args = HashMap::new();
        args.insert("message".to_string(), Value::String(message.into()));
        if let Some(options) = options {
            args.insert(
                "options".to_string(),
                Value::Array(options.into_iter().map(Value::String).collect()),
            );
        }
        Self::new(FN_REQUEST_USER_CONFIRMATION, args)
    }

    /// Build a `user_response` call with optional text and structured data
    pub fn user_response(text: Option<String>, structured_data: Option<Value>) -> Self {
        let mut args = HashMap::new();
        if let Some(text) = text {
            args.insert("text".to_string(), Value::String(text));
        }
        if let Some(structured) = structured_data {
            args.insert("structured_data".to_string(), structured);
        }
        Self::new(FN_USER_RESPONSE, args)
    }

    /// Name of the invoked function
    pub fn function_name(&self) -> &str {
        &self.function.name
    }

    /// Whether this call is one of the three `request_user_*` functions
    pub fn is_hitl_request(&self) -> bool {
        HITL_REQUEST_FUNCTIONS.contains(&self.function.name.as_str())
    }

    /// Whether this call is a `user_response`
    pub fn is_user_response(&self) -> bool {
        self.function.name == FN_USER_RESPONSE
    }

    /// Fetch an argument by name
    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.function.arguments.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_input_shape() {
        let call = ToolCall::request_input("What is your name?");

        assert_eq!(call.call_type, "function");
        assert_eq!(call.function_name(), FN_REQUEST_USER_INPUT);
        assert!(call.is_hitl_request());
        assert!(!call.is_user_response());
        assert_eq!(
            call.argument("prompt_message"),
            Some(&Value::String("What is your name?".to_string()))
        );
    }

    #[test]
    fn test_request_selection_carries_items() {
        let items = vec![
            SelectionItem::new("opt1", "Option 1"),
            SelectionItem::new("opt2", "Option 2").with_description("the second"),
        ];
        let call = ToolCall::request_selection(items, "Pick one", SelectionType::Single);

        assert!(call.is_hitl_request());
        let items = call.argument("items").unwrap().as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["id"], "opt1");
        assert_eq!(call.argument("selection_type"), Some(&Value::String("single".into())));
    }

    #[test]
    fn test_user_response_shape() {
        let call = ToolCall::user_response(
            Some("ok".to_string()),
            Some(serde_json::json!({"selected_option": "opt1"})),
        );

        assert!(call.is_user_response());
        assert!(!call.is_hitl_request());
        assert_eq!(
            call.argument("structured_data").unwrap()["selected_option"],
            "opt1"
        );
    }

    #[test]
    fn test_serde_uses_type_field() {
        let call = ToolCall::request_input("hi");
        let json = serde_json::to_value(&call).unwrap();

        assert_eq!(json["type"], "function");
        assert_eq!(json["function"]["name"], FN_REQUEST_USER_INPUT);

        let back: ToolCall = serde_json::from_value(json).unwrap();
        assert_eq!(call, back);
    }
}
