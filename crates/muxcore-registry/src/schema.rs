//! Discovered tool schemas.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One tool exposed by a server, as discovered by capability listing.
///
/// Replaced atomically on re-discovery; the pair `(server_id, tool_name)`
/// is unique within a registry snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// The server that exposes the tool.
    pub server_id: String,
    /// The tool's local name.
    pub tool_name: String,
    /// JSON Schema the Router validates call arguments against.
    pub input_schema: Value,
    /// JSON Schema describing the tool's result shape, if the server
    /// declares one.
    pub output_schema: Option<Value>,
    /// Human-readable description surfaced to planners.
    pub description: String,
    /// Whether calls to this tool require a human approval before dispatch.
    #[serde(default)]
    pub requires_approval: bool,
}
