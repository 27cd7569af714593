//! Tool registry and call resolution.

use super::ToolDefinition;
use crate::providers::FunctionCall;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A resolved tool call ready for execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedToolCall {
    /// The call ID, empty when the provider gave none.
    pub id: String,
    /// The tool name.
    pub name: String,
    /// The parsed arguments object.
    pub arguments: Value,
}

/// A tool call that failed parsing or resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnresolvedToolCall {
    /// The call ID if available.
    pub id: Option<String>,
    /// The tool name.
    pub name: String,
    /// Why the call was rejected.
    pub error: String,
}

impl UnresolvedToolCall {
    /// The JSON response handed back to the model for a rejected call.
    #[must_use]
    pub fn to_response(&self) -> Value {
        json!({ "success": false, "message": self.error })
    }
}

/// A named async tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool definition.
    fn definition(&self) -> ToolDefinition;

    /// Runs the tool. Failures are reported inside the returned JSON.
    async fn invoke(&self, arguments: Value) -> Value;
}

/// Registry of tools keyed by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool under its definition name, replacing any previous one.
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name;
        self.tools.write().insert(name, tool);
    }

    /// Gets a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().get(name).cloned()
    }

    /// Checks if a tool is registered.
    #[must_use]
    pub fn can_execute(&self, name: &str) -> bool {
        self.tools.read().contains_key(name)
    }

    /// Lists registered tool names, sorted.
    #[must_use]
    pub fn list_tools(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the definitions of the named tools that are registered.
    #[must_use]
    pub fn definitions(&self, names: &[&str]) -> Vec<ToolDefinition> {
        let tools = self.tools.read();
        names
            .iter()
            .filter_map(|name| tools.get(*name).map(|t| t.definition()))
            .collect()
    }

    /// Resolves a model tool call against the registry and an allow-list.
    ///
    /// Arguments may arrive as an object or as a JSON-encoded string.
    pub fn resolve(
        &self,
        call: &FunctionCall,
        allowed: &[&str],
    ) -> Result<ResolvedToolCall, UnresolvedToolCall> {
        let reject = |error: String| UnresolvedToolCall {
            id: call.id.clone(),
            name: call.name.clone(),
            error,
        };

        let arguments = match &call.args {
            Value::String(s) if s.trim().is_empty() => json!({}),
            Value::String(s) => match serde_json::from_str::<Value>(s) {
                Ok(v @ Value::Object(_)) => v,
                _ => return Err(reject("Invalid JSON in arguments".to_string())),
            },
            Value::Object(obj) => Value::Object(obj.clone()),
            Value::Null => json!({}),
            _ => return Err(reject("Arguments must be a JSON object".to_string())),
        };

        if !self.can_execute(&call.name) {
            return Err(reject(format!("Tool '{}' is not registered", call.name)));
        }
        if !allowed.contains(&call.name.as_str()) {
            return Err(reject(format!(
                "Tool '{}' is not available to this stage",
                call.name
            )));
        }

        Ok(ResolvedToolCall {
            id: call.id.clone().unwrap_or_default(),
            name: call.name.clone(),
            arguments,
        })
    }

    /// Resolves and runs a batch of calls, in order.
    pub fn parse_and_resolve(
        &self,
        calls: &[FunctionCall],
        allowed: &[&str],
    ) -> Vec<Result<ResolvedToolCall, UnresolvedToolCall>> {
        calls.iter().map(|call| self.resolve(call, allowed)).collect()
    }

    /// Runs a resolved call and returns the tool's JSON response.
    pub async fn call(&self, resolved: &ResolvedToolCall) -> Value {
        let Some(tool) = self.get(&resolved.name) else {
            warn!(tool = %resolved.name, "Tool disappeared between resolve and call");
            return json!({
                "success": false,
                "message": format!("Tool '{}' is not registered", resolved.name),
            });
        };
        debug!(tool = %resolved.name, "Invoking tool");
        tool.invoke(resolved.arguments.clone()).await
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.list_tools())
            .finish()
    }
}
