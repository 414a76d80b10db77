//! Tool capabilities the model may invoke.
//!
//! A tool either completes synchronously with a [`ToolReply`] or suspends with
//! an interrupt payload that must be answered by a human before the tool can
//! finish. Suspension is an explicit return value, not an unwind, so the
//! dispatch loop can pattern-match on it.

mod human;
mod search;

pub use human::{HumanAssistance, VerifyRecord};
pub use search::WebSearch;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

/// What a completed tool execution feeds back into the conversation.
#[derive(Debug, Clone)]
pub enum ToolReply {
    /// Plain text, wrapped as a tool-role message.
    Text(String),
    /// A state update plus the tool-role message announcing it.
    Update {
        fields: HashMap<String, Value>,
        message: String,
    },
}

/// Result of driving a tool: either it finished, or it needs human input.
#[derive(Debug, Clone)]
pub enum ToolOutcome {
    Reply(ToolReply),
    /// Opaque payload describing what is being asked of the human. The call
    /// is re-entered through [`Tool::resume`] once an answer arrives.
    Interrupt(Value),
}

/// A named capability the model may request be executed on its behalf.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema for the tool's arguments.
    fn parameters_schema(&self) -> Value;

    /// Whether this tool must always be approved by a human before running.
    fn requires_approval(&self) -> bool {
        false
    }

    async fn execute(&self, args: Value) -> anyhow::Result<ToolOutcome>;

    /// Finish a previously interrupted execution with the human's answer.
    ///
    /// Only tools that return [`ToolOutcome::Interrupt`] need to implement
    /// this; the original arguments are replayed alongside the answer.
    async fn resume(&self, _args: Value, _human_input: Value) -> anyhow::Result<ToolReply> {
        anyhow::bail!("tool '{}' does not accept resumed input", self.name())
    }
}

/// Name and description of a registered tool, for prompt building.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// Registry mapping tool names to capabilities, resolved once at setup.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool schemas in the function-calling format the model expects.
    pub fn schemas(&self) -> Vec<Value> {
        let mut schemas: Vec<Value> = self
            .tools
            .values()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": tool.parameters_schema(),
                    }
                })
            })
            .collect();
        // Stable ordering keeps prompts and request bodies reproducible.
        schemas.sort_by_key(|s| s["function"]["name"].as_str().unwrap_or("").to_string());
        schemas
    }

    pub fn list_tools(&self) -> Vec<ToolInfo> {
        let mut infos: Vec<ToolInfo> = self
            .tools
            .values()
            .map(|tool| ToolInfo {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy;

    #[async_trait]
    impl Tool for Dummy {
        fn name(&self) -> &str {
            "dummy"
        }

        fn description(&self) -> &str {
            "Does nothing"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        async fn execute(&self, _args: Value) -> anyhow::Result<ToolOutcome> {
            Ok(ToolOutcome::Reply(ToolReply::Text("ok".to_string())))
        }
    }

    #[test]
    fn registry_resolves_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Dummy));

        assert!(registry.get("dummy").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn schemas_use_function_calling_format() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Dummy));

        let schemas = registry.schemas();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0]["type"], "function");
        assert_eq!(schemas[0]["function"]["name"], "dummy");
    }

    #[tokio::test]
    async fn default_resume_is_rejected() {
        let err = Dummy
            .resume(Value::Null, Value::Null)
            .await
            .expect_err("dummy does not support resume");
        assert!(err.to_string().contains("dummy"));
    }
}
