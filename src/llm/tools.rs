//! Tool declarations offered to the model on every request.
//!
//! The model may answer with invocations of these tools; they are recorded on
//! the reply and never executed here.

use serde_json::{json, Value};

/// One declared tool: name, description and JSON-schema parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDeclaration {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// Name of the application-launch tool.
pub const OPEN_APP: &str = "openApp";
/// Name of the power / session control tool.
pub const SYSTEM_CONTROL: &str = "systemControl";
/// Name of the web search tool.
pub const WEB_SEARCH: &str = "webSearch";

/// The full tool set, in declaration order.
pub fn declared_tools() -> Vec<ToolDeclaration> {
    vec![
        ToolDeclaration {
            name: OPEN_APP,
            description: "Open a specific application on the computer.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "appName": {
                        "type": "string",
                        "description": "Name of the application to open (e.g., Chrome, Spotify, VS Code)"
                    }
                },
                "required": ["appName"]
            }),
        },
        ToolDeclaration {
            name: SYSTEM_CONTROL,
            description: "Perform system level operations like shutdown, restart, sleep.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "action": {
                        "type": "string",
                        "enum": ["shutdown", "restart", "sleep", "lock", "logout"],
                        "description": "The action to perform"
                    }
                },
                "required": ["action"]
            }),
        },
        ToolDeclaration {
            name: WEB_SEARCH,
            description: "Search the internet for a query.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "The search query" }
                },
                "required": ["query"]
            }),
        },
    ]
}
