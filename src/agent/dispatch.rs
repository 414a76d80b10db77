//! The dispatch loop: one user-message-in, one reply-or-interrupt-out.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::approval::{ApprovalPolicy, ApprovalVerdict};
use crate::checkpoint::{
    Checkpoint, CheckpointStore, InterruptReason, PendingInterrupt,
};
use crate::config::Config;
use crate::llm::{ChatMessage, LlmClient, LlmError, ToolCall};
use crate::state::ConversationState;
use crate::tools::{ToolOutcome, ToolRegistry, ToolReply};

/// Why a model invocation was rejected.
#[derive(Debug, Error)]
pub enum ModelInvocationError {
    #[error("request failed: {0}")]
    Request(#[from] LlmError),

    #[error("no response within {0} seconds")]
    Timeout(u64),

    #[error("{0} simultaneous tool calls requested; at most one is allowed")]
    MultipleToolCalls(usize),

    #[error("response carried neither content nor a tool call")]
    EmptyResponse,
}

/// Terminal dispatch failures. Tool execution errors are not here: they are
/// fed back into the conversation so the model can react to them.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("model invocation failed: {0}")]
    ModelInvocation(#[from] ModelInvocationError),

    #[error("tool loop exceeded the per-turn bound of {0} iterations")]
    ToolLoopExceeded(usize),

    #[error("no pending interrupt for thread '{0}'")]
    UnknownThread(String),

    #[error("thread '{0}' has a pending interrupt; resume or discard it first")]
    InterruptPending(String),

    #[error("checkpoint store: {0}")]
    Checkpoint(String),
}

/// The assistant's final message for a completed turn.
#[derive(Debug, Clone)]
pub struct FinalReply {
    pub content: String,
}

/// A suspended turn, returned to the caller for human handling.
#[derive(Debug, Clone)]
pub struct Interrupt {
    /// Resumption token; also stored in the pending checkpoint.
    pub token: Uuid,
    pub reason: InterruptReason,
    /// What is being asked: tool/arguments for approvals, the tool's own
    /// payload for human-input requests.
    pub payload: Value,
}

/// Result of one turn.
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    Reply(FinalReply),
    Interrupted(Interrupt),
}

/// The dispatch loop context: model, tools, approval policy and checkpoint
/// store, explicitly constructed and owned by the caller.
pub struct Dispatcher {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    policy: ApprovalPolicy,
    store: Arc<dyn CheckpointStore>,
    model: String,
    model_timeout: Duration,
    max_tool_iterations: usize,
    system_prompt: Option<String>,
    tool_schemas: Vec<Value>,
    // One lock per thread id: turns on the same thread are strictly
    // serialized, distinct threads run concurrently. The map lock is held
    // only long enough to fetch the per-thread lock.
    thread_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Dispatcher {
    pub fn new(
        config: &Config,
        llm: Arc<dyn LlmClient>,
        tools: ToolRegistry,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        let tool_schemas = tools.schemas();
        let mut policy = ApprovalPolicy::permissive();
        for name in &config.approve_tools {
            policy = policy.require_tool(name.clone());
        }

        Self {
            llm,
            tools,
            policy,
            store,
            model: config.default_model.clone(),
            model_timeout: Duration::from_secs(config.model_timeout_secs),
            max_tool_iterations: config.max_tool_iterations,
            system_prompt: None,
            tool_schemas,
            thread_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the approval policy.
    pub fn with_policy(mut self, policy: ApprovalPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Seed every fresh thread with this system message.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Run one turn for `thread_id`.
    ///
    /// Loads the thread's checkpoint (fresh state if none), appends the user
    /// message and drives the model/tool loop until it produces a final reply
    /// or suspends on an interrupt. Fails with [`DispatchError::InterruptPending`]
    /// if the thread is already suspended; the caller must resume or discard
    /// first.
    pub async fn run_turn(
        &self,
        thread_id: &str,
        user_message: &str,
    ) -> Result<TurnOutcome, DispatchError> {
        let lock = self.thread_lock(thread_id).await;
        let _guard = lock.lock().await;

        let mut checkpoint = self.load(thread_id).await?.unwrap_or_else(|| {
            let mut checkpoint = Checkpoint::new(thread_id);
            if let Some(prompt) = &self.system_prompt {
                checkpoint
                    .state
                    .messages
                    .push(ChatMessage::system(prompt.clone()));
            }
            checkpoint
        });

        if checkpoint.pending.is_some() {
            return Err(DispatchError::InterruptPending(thread_id.to_string()));
        }

        checkpoint
            .state
            .messages
            .push(ChatMessage::user(user_message));

        self.drive(checkpoint, 0).await
    }

    /// Resume a suspended turn with the human's answer.
    ///
    /// For approval interrupts the input is the verdict (`true`/`false` or
    /// `{"approved": bool}`); for human-input interrupts it is handed to the
    /// suspended tool's `resume`. Fails with [`DispatchError::UnknownThread`]
    /// when nothing is pending.
    pub async fn resume_turn(
        &self,
        thread_id: &str,
        human_input: Value,
    ) -> Result<TurnOutcome, DispatchError> {
        let lock = self.thread_lock(thread_id).await;
        let _guard = lock.lock().await;

        let mut checkpoint = self
            .load(thread_id)
            .await?
            .ok_or_else(|| DispatchError::UnknownThread(thread_id.to_string()))?;
        let pending = checkpoint
            .pending
            .take()
            .ok_or_else(|| DispatchError::UnknownThread(thread_id.to_string()))?;

        let iterations = pending.iterations_used;
        let call = pending.tool_call;

        match pending.reason {
            InterruptReason::Approval => {
                let approved = human_input
                    .as_bool()
                    .or_else(|| human_input["approved"].as_bool())
                    .unwrap_or(false);

                if approved {
                    if let Some(outcome) =
                        self.execute_call(&mut checkpoint, &call, iterations).await?
                    {
                        return Ok(outcome);
                    }
                } else {
                    tracing::info!(tool = %call.function.name, "tool call denied");
                    checkpoint.state.messages.push(ChatMessage::tool_result(
                        &call.id,
                        "Tool call denied by the user.",
                    ));
                }
            }
            InterruptReason::HumanInput => {
                let resumed = match self.tools.get(&call.function.name) {
                    Some(tool) => tool.resume(call.parsed_arguments(), human_input).await,
                    None => Err(anyhow::anyhow!(
                        "unknown tool '{}'",
                        call.function.name
                    )),
                };
                match resumed {
                    Ok(reply) => apply_reply(&mut checkpoint.state, &call.id, reply),
                    Err(e) => {
                        tracing::warn!(tool = %call.function.name, error = %e, "tool resume failed");
                        checkpoint
                            .state
                            .messages
                            .push(ChatMessage::tool_result(&call.id, format!("Error: {}", e)));
                    }
                }
            }
        }

        self.drive(checkpoint, iterations).await
    }

    /// Abandon a pending interrupt without executing its tool call.
    ///
    /// Appends a cancellation tool-result so the history stays well-formed
    /// relative to the already-recorded assistant tool-call message.
    pub async fn discard_interrupt(&self, thread_id: &str) -> Result<(), DispatchError> {
        let lock = self.thread_lock(thread_id).await;
        let _guard = lock.lock().await;

        let mut checkpoint = self
            .load(thread_id)
            .await?
            .ok_or_else(|| DispatchError::UnknownThread(thread_id.to_string()))?;
        let pending = checkpoint
            .pending
            .take()
            .ok_or_else(|| DispatchError::UnknownThread(thread_id.to_string()))?;

        checkpoint.state.messages.push(ChatMessage::tool_result(
            &pending.tool_call.id,
            "Tool call cancelled by the user.",
        ));
        self.persist(&checkpoint).await
    }

    /// The loop proper. `iterations` counts tool executions spent so far in
    /// this turn, carried across suspensions.
    async fn drive(
        &self,
        mut checkpoint: Checkpoint,
        mut iterations: usize,
    ) -> Result<TurnOutcome, DispatchError> {
        loop {
            tracing::debug!(
                thread = %checkpoint.thread_id,
                iteration = iterations,
                "invoking model"
            );
            let response = self.invoke_model(&checkpoint.state.messages).await?;

            let tool_calls = response.tool_calls.clone().unwrap_or_default();
            if tool_calls.len() > 1 {
                return Err(ModelInvocationError::MultipleToolCalls(tool_calls.len()).into());
            }

            if let Some(call) = tool_calls.into_iter().next() {
                checkpoint.state.messages.push(response);

                if iterations >= self.max_tool_iterations {
                    return Err(DispatchError::ToolLoopExceeded(self.max_tool_iterations));
                }
                iterations += 1;

                if let Some(tool) = self.tools.get(&call.function.name) {
                    match self.policy.evaluate(tool.as_ref(), &call.function.arguments) {
                        ApprovalVerdict::Auto => {}
                        ApprovalVerdict::RequiresApproval { reason } => {
                            return self
                                .suspend(
                                    &mut checkpoint,
                                    &call,
                                    InterruptReason::Approval,
                                    json!({
                                        "tool": call.function.name,
                                        "arguments": call.parsed_arguments(),
                                        "reason": reason,
                                    }),
                                    iterations,
                                )
                                .await;
                        }
                        ApprovalVerdict::Blocked { reason } => {
                            checkpoint.state.messages.push(ChatMessage::tool_result(
                                &call.id,
                                format!("Error: tool call refused: {}", reason),
                            ));
                            continue;
                        }
                    }
                }

                if let Some(outcome) =
                    self.execute_call(&mut checkpoint, &call, iterations).await?
                {
                    return Ok(outcome);
                }
                continue;
            }

            // No tool call: this is the final reply for the turn.
            let content = response
                .content
                .clone()
                .filter(|c| !c.is_empty())
                .ok_or(ModelInvocationError::EmptyResponse)?;
            checkpoint.state.messages.push(response);
            self.persist(&checkpoint).await?;
            return Ok(TurnOutcome::Reply(FinalReply { content }));
        }
    }

    /// Execute one tool call. Returns `Some` when the turn suspended (already
    /// persisted), `None` when the loop should re-invoke the model.
    async fn execute_call(
        &self,
        checkpoint: &mut Checkpoint,
        call: &ToolCall,
        iterations: usize,
    ) -> Result<Option<TurnOutcome>, DispatchError> {
        let Some(tool) = self.tools.get(&call.function.name) else {
            checkpoint.state.messages.push(ChatMessage::tool_result(
                &call.id,
                format!("Error: unknown tool '{}'", call.function.name),
            ));
            return Ok(None);
        };

        match tool.execute(call.parsed_arguments()).await {
            Ok(ToolOutcome::Reply(reply)) => {
                apply_reply(&mut checkpoint.state, &call.id, reply);
                Ok(None)
            }
            Ok(ToolOutcome::Interrupt(payload)) => self
                .suspend(checkpoint, call, InterruptReason::HumanInput, payload, iterations)
                .await
                .map(Some),
            Err(e) => {
                tracing::warn!(tool = %call.function.name, error = %e, "tool execution failed");
                checkpoint
                    .state
                    .messages
                    .push(ChatMessage::tool_result(&call.id, format!("Error: {}", e)));
                Ok(None)
            }
        }
    }

    /// Persist the checkpoint with a pending interrupt and hand control back.
    async fn suspend(
        &self,
        checkpoint: &mut Checkpoint,
        call: &ToolCall,
        reason: InterruptReason,
        payload: Value,
        iterations: usize,
    ) -> Result<TurnOutcome, DispatchError> {
        let pending = PendingInterrupt {
            token: Uuid::new_v4(),
            tool_call: call.clone(),
            reason,
            payload: payload.clone(),
            iterations_used: iterations,
        };
        let interrupt = Interrupt {
            token: pending.token,
            reason,
            payload,
        };
        tracing::info!(
            thread = %checkpoint.thread_id,
            tool = %call.function.name,
            reason = ?reason,
            "turn suspended"
        );
        checkpoint.pending = Some(pending);
        self.persist(checkpoint).await?;
        Ok(TurnOutcome::Interrupted(interrupt))
    }

    async fn invoke_model(&self, messages: &[ChatMessage]) -> Result<ChatMessage, DispatchError> {
        let tools = (!self.tool_schemas.is_empty()).then_some(self.tool_schemas.as_slice());
        match tokio::time::timeout(
            self.model_timeout,
            self.llm.chat_completion(&self.model, messages, tools),
        )
        .await
        {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(ModelInvocationError::Request(e).into()),
            Err(_) => Err(ModelInvocationError::Timeout(self.model_timeout.as_secs()).into()),
        }
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, DispatchError> {
        self.store
            .load(thread_id)
            .await
            .map_err(DispatchError::Checkpoint)
    }

    async fn persist(&self, checkpoint: &Checkpoint) -> Result<(), DispatchError> {
        self.store
            .save(checkpoint)
            .await
            .map_err(DispatchError::Checkpoint)
    }

    async fn thread_lock(&self, thread_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.thread_locks.lock().await;
        locks.entry(thread_id.to_string()).or_default().clone()
    }
}

fn apply_reply(state: &mut ConversationState, tool_call_id: &str, reply: ToolReply) {
    match reply {
        ToolReply::Text(text) => {
            state.messages.push(ChatMessage::tool_result(tool_call_id, text));
        }
        ToolReply::Update { fields, message } => {
            state.merge_fields(fields);
            state
                .messages
                .push(ChatMessage::tool_result(tool_call_id, message));
        }
    }
}
