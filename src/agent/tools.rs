//! Tool schemas offered to the model.

use serde_json::json;

use crate::provider::ToolDefinition;

const FILE_KINDS: [&str; 7] = ["manifest", "content", "background", "asset", "vendor", "doc", "other"];

fn tool(name: &str, description: &str, parameters: serde_json::Value) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        parameters,
    }
}

/// The seven tools of the conversion protocol, in the order the model should use them.
pub fn conversion_tools() -> Vec<ToolDefinition> {
    vec![
        tool(
            "set_analysis",
            "Analyze the UserScript and explain the conversion strategy. Call this first. \
             Use exactly three sections:\n\n## Core functionality\n[2-3 sentences on what the \
             script does for the user]\n\n## How it works\n[2-3 sentences on the technical \
             approach]\n\n## Requested permissions\n- GM_xxx: used for ... (one line per @grant)",
            json!({
                "type": "object",
                "properties": {
                    "text": {
                        "type": "string",
                        "description": "Three-section analysis (core functionality / how it works / requested permissions)"
                    }
                },
                "required": ["text"]
            }),
        ),
        tool(
            "plan_files",
            "Plan which files should exist for the MV3 extension based on this script.",
            json!({
                "type": "object",
                "properties": {
                    "summary": { "type": "string", "description": "A short summary of architecture decisions." },
                    "files": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "path": { "type": "string" },
                                "kind": { "type": "string", "enum": FILE_KINDS },
                                "required": { "type": "boolean" },
                                "reason": { "type": "string" }
                            },
                            "required": ["path", "kind", "required"]
                        }
                    }
                },
                "required": ["summary", "files"]
            }),
        ),
        tool(
            "write_file",
            "Create or overwrite one extension file.",
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Relative path inside extension package, e.g. manifest.json" },
                    "content": { "type": "string", "description": "Complete file content." },
                    "kind": { "type": "string", "enum": FILE_KINDS },
                    "required": { "type": "boolean" },
                    "reason": { "type": "string" }
                },
                "required": ["path", "content", "kind", "required"]
            }),
        ),
        tool(
            "delete_file",
            "Delete a previously planned/generated file.",
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string" },
                    "reason": { "type": "string" }
                },
                "required": ["path", "reason"]
            }),
        ),
        tool(
            "run_check",
            "Run a self-check for MV3 correctness and completeness.",
            json!({
                "type": "object",
                "properties": {
                    "pass": { "type": "boolean" },
                    "summary": { "type": "string" },
                    "issues": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "id": { "type": "string" },
                                "severity": { "type": "string", "enum": ["error", "warning"] },
                                "file": { "type": "string" },
                                "message": { "type": "string" },
                                "fixHint": { "type": "string" }
                            },
                            "required": ["id", "severity", "message"]
                        }
                    }
                },
                "required": ["pass", "summary", "issues"]
            }),
        ),
        tool(
            "apply_fix",
            "Start a fix round based on the latest run_check issues.",
            json!({
                "type": "object",
                "properties": { "summary": { "type": "string" } },
                "required": ["summary"]
            }),
        ),
        tool(
            "add_note",
            "Add an important note or warning for the user.",
            json!({
                "type": "object",
                "properties": { "message": { "type": "string" } },
                "required": ["message"]
            }),
        ),
    ]
}
