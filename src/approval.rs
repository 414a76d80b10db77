//! Approval policy: decides whether a tool call may run unattended.
//!
//! Two gates compose: a per-tool set of names that always require a human,
//! and regex screening of the rendered arguments. The core only decides
//! whether approval is needed; asking the human is the caller's job.

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::tools::Tool;

/// Outcome of screening a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalVerdict {
    /// Safe to run without a human.
    Auto,
    /// Requires human approval before execution.
    RequiresApproval { reason: String },
    /// Never executed; the refusal is fed back to the model.
    Blocked { reason: String },
}

/// Policy evaluated against every tool call before execution.
pub struct ApprovalPolicy {
    require_approval: HashSet<String>,
    flagged_patterns: Vec<Regex>,
    blocked_patterns: Vec<Regex>,
}

impl ApprovalPolicy {
    /// A policy that defers entirely to each tool's own `requires_approval`.
    pub fn permissive() -> Self {
        Self {
            require_approval: HashSet::new(),
            flagged_patterns: Vec::new(),
            blocked_patterns: Vec::new(),
        }
    }

    /// Always require approval before running the named tool.
    pub fn require_tool(mut self, name: impl Into<String>) -> Self {
        self.require_approval.insert(name.into());
        self
    }

    /// Flag any call whose rendered arguments match `pattern`.
    pub fn flag_arguments(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.flagged_patterns.push(Regex::new(pattern)?);
        Ok(self)
    }

    /// Refuse outright any call whose rendered arguments match `pattern`.
    pub fn block_arguments(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.blocked_patterns.push(Regex::new(pattern)?);
        Ok(self)
    }

    /// Screen one tool call. `arguments` is the raw JSON-encoded argument
    /// string as the model sent it.
    pub fn evaluate(&self, tool: &dyn Tool, arguments: &str) -> ApprovalVerdict {
        for re in &self.blocked_patterns {
            if re.is_match(arguments) {
                tracing::warn!(tool = tool.name(), pattern = re.as_str(), "call blocked");
                return ApprovalVerdict::Blocked {
                    reason: format!("arguments matched blocked pattern: {}", re.as_str()),
                };
            }
        }

        for re in &self.flagged_patterns {
            if re.is_match(arguments) {
                return ApprovalVerdict::RequiresApproval {
                    reason: format!("arguments matched flagged pattern: {}", re.as_str()),
                };
            }
        }

        if tool.requires_approval() || self.require_approval.contains(tool.name()) {
            return ApprovalVerdict::RequiresApproval {
                reason: format!("tool '{}' requires approval", tool.name()),
            };
        }

        ApprovalVerdict::Auto
    }
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self::permissive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ToolOutcome, ToolReply};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct Fixture {
        approval: bool,
    }

    #[async_trait]
    impl Tool for Fixture {
        fn name(&self) -> &str {
            "fixture"
        }

        fn description(&self) -> &str {
            "Test fixture"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        fn requires_approval(&self) -> bool {
            self.approval
        }

        async fn execute(&self, _args: Value) -> anyhow::Result<ToolOutcome> {
            Ok(ToolOutcome::Reply(ToolReply::Text(String::new())))
        }
    }

    #[test]
    fn permissive_policy_defers_to_tool() {
        let policy = ApprovalPolicy::permissive();

        let auto = policy.evaluate(&Fixture { approval: false }, "{}");
        assert_eq!(auto, ApprovalVerdict::Auto);

        let gated = policy.evaluate(&Fixture { approval: true }, "{}");
        assert!(matches!(gated, ApprovalVerdict::RequiresApproval { .. }));
    }

    #[test]
    fn named_tool_requires_approval() {
        let policy = ApprovalPolicy::permissive().require_tool("fixture");
        let verdict = policy.evaluate(&Fixture { approval: false }, "{}");
        assert!(matches!(verdict, ApprovalVerdict::RequiresApproval { .. }));
    }

    #[test]
    fn flagged_pattern_overrides_auto() {
        let policy = ApprovalPolicy::permissive()
            .flag_arguments(r"(?i)delete|drop\s+table")
            .expect("valid pattern");

        let verdict = policy.evaluate(
            &Fixture { approval: false },
            r#"{"query":"DELETE the production database"}"#,
        );
        assert!(matches!(verdict, ApprovalVerdict::RequiresApproval { .. }));
    }

    #[test]
    fn blocked_pattern_wins_over_everything() {
        let policy = ApprovalPolicy::permissive()
            .block_arguments(r"rm\s+-rf")
            .expect("valid pattern");

        let verdict = policy.evaluate(&Fixture { approval: true }, r#"{"cmd":"rm -rf /"}"#);
        assert!(matches!(verdict, ApprovalVerdict::Blocked { .. }));
    }
}
