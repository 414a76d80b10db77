//! System prompt template for chat threads.

use crate::tools::ToolRegistry;

/// Build the system prompt with tool definitions.
pub fn build_system_prompt(tools: &ToolRegistry) -> String {
    let tool_descriptions = tools
        .list_tools()
        .iter()
        .map(|t| format!("- **{}**: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a helpful assistant in an ongoing conversation.

## Your Capabilities

You have access to the following tools:
{tool_descriptions}

## Rules and Guidelines

1. **Use tools for facts** - When a question concerns current events or details you are unsure about, search rather than guess.

2. **One tool at a time** - Request at most one tool call per response; wait for its result before deciding the next step.

3. **Involve a human when it matters** - For consequential decisions or facts that must be right, ask for human help or verification instead of assuming.

4. **React to tool errors** - If a tool fails, read the error and either retry differently or explain the problem to the user.

5. **Stay focused** - Answer what was asked; carry context from earlier in the conversation.

If you need to use a tool, respond with a tool call. The system will execute it and return the result."#,
        tool_descriptions = tool_descriptions
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::WebSearch;
    use std::sync::Arc;

    #[test]
    fn prompt_lists_registered_tools() {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(WebSearch::new(None)));

        let prompt = build_system_prompt(&tools);
        assert!(prompt.contains("**web_search**"));
    }
}
