//! Tools that hand control to a human mid-execution.
//!
//! Both tools suspend by returning [`ToolOutcome::Interrupt`]; the dispatch
//! loop persists the pending call and replays it through [`Tool::resume`]
//! once the human answers.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Tool, ToolOutcome, ToolReply};

/// Ask a human an open question and relay the answer back to the model.
pub struct HumanAssistance;

#[async_trait]
impl Tool for HumanAssistance {
    fn name(&self) -> &str {
        "human_assistance"
    }

    fn description(&self) -> &str {
        "Request guidance from a human. Use when you need expert help, a decision, or information only a person can provide."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The question to put to the human"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<ToolOutcome> {
        let query = args["query"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'query' argument"))?;

        Ok(ToolOutcome::Interrupt(json!({ "query": query })))
    }

    async fn resume(&self, _args: Value, human_input: Value) -> anyhow::Result<ToolReply> {
        let answer = match human_input {
            Value::String(s) => s,
            other => other["data"]
                .as_str()
                .map(|s| s.to_string())
                .ok_or_else(|| anyhow::anyhow!("human input carried no 'data' field"))?,
        };
        Ok(ToolReply::Text(answer))
    }
}

/// Ask a human to verify a name/birthday pair the model has looked up.
///
/// On confirmation the values are written into the conversation state fields;
/// on correction the human-supplied values win.
pub struct VerifyRecord;

#[async_trait]
impl Tool for VerifyRecord {
    fn name(&self) -> &str {
        "verify_record"
    }

    fn description(&self) -> &str {
        "Have a human verify a looked-up name and date before treating them as facts."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "The name to verify"
                },
                "birthday": {
                    "type": "string",
                    "description": "The date to verify"
                }
            },
            "required": ["name", "birthday"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<ToolOutcome> {
        let name = args["name"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'name' argument"))?;
        let birthday = args["birthday"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'birthday' argument"))?;

        Ok(ToolOutcome::Interrupt(json!({
            "question": "Is this correct?",
            "name": name,
            "birthday": birthday,
        })))
    }

    async fn resume(&self, args: Value, human_input: Value) -> anyhow::Result<ToolReply> {
        let proposed_name = args["name"].as_str().unwrap_or_default();
        let proposed_birthday = args["birthday"].as_str().unwrap_or_default();

        // Accept the confirmation under "correct" or, from plain console
        // input, under "data".
        let confirmed = human_input["correct"]
            .as_str()
            .or_else(|| human_input["data"].as_str())
            .map(|s| s.trim().to_lowercase().starts_with('y'))
            .unwrap_or(false);

        let (name, birthday, message) = if confirmed {
            (
                proposed_name.to_string(),
                proposed_birthday.to_string(),
                "Confirmed".to_string(),
            )
        } else {
            let name = human_input["name"]
                .as_str()
                .unwrap_or(proposed_name)
                .to_string();
            let birthday = human_input["birthday"]
                .as_str()
                .unwrap_or(proposed_birthday)
                .to_string();
            let message = format!("Corrected to name={}, birthday={}", name, birthday);
            (name, birthday, message)
        };

        Ok(ToolReply::Update {
            fields: HashMap::from([
                ("name".to_string(), json!(name)),
                ("birthday".to_string(), json!(birthday)),
            ]),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn human_assistance_suspends_with_query() {
        let outcome = HumanAssistance
            .execute(json!({"query": "Which database should I use?"}))
            .await
            .expect("execute");

        match outcome {
            ToolOutcome::Interrupt(payload) => {
                assert_eq!(payload["query"], "Which database should I use?");
            }
            ToolOutcome::Reply(_) => panic!("expected interrupt"),
        }
    }

    #[tokio::test]
    async fn human_assistance_resumes_with_answer() {
        let reply = HumanAssistance
            .resume(json!({"query": "q"}), json!({"data": "Use sqlite"}))
            .await
            .expect("resume");

        match reply {
            ToolReply::Text(text) => assert_eq!(text, "Use sqlite"),
            ToolReply::Update { .. } => panic!("expected text"),
        }
    }

    #[tokio::test]
    async fn verify_record_confirmation_keeps_proposed_values() {
        let args = json!({"name": "Ada Lovelace", "birthday": "Dec 10, 1815"});
        let reply = VerifyRecord
            .resume(args, json!({"correct": "yes"}))
            .await
            .expect("resume");

        match reply {
            ToolReply::Update { fields, message } => {
                assert_eq!(fields["name"], "Ada Lovelace");
                assert_eq!(fields["birthday"], "Dec 10, 1815");
                assert_eq!(message, "Confirmed");
            }
            ToolReply::Text(_) => panic!("expected update"),
        }
    }

    #[tokio::test]
    async fn verify_record_correction_takes_human_values() {
        let args = json!({"name": "Ada Lovelace", "birthday": "Dec 10, 1820"});
        let reply = VerifyRecord
            .resume(args, json!({"name": "Ada Lovelace", "birthday": "Dec 10, 1815"}))
            .await
            .expect("resume");

        match reply {
            ToolReply::Update { fields, message } => {
                assert_eq!(fields["birthday"], "Dec 10, 1815");
                assert!(message.starts_with("Corrected"));
            }
            ToolReply::Text(_) => panic!("expected update"),
        }
    }
}
