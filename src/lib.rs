//! # turnloop
//!
//! A checkpointed chat-agent dispatch loop with tool calling and
//! human-in-the-loop interrupts.
//!
//! This library provides:
//! - A per-thread dispatch loop: model in, tool calls out, results fed back
//! - An approval gate that can suspend a turn before a tool runs
//! - Tools that can themselves suspend mid-execution to ask a human
//! - Checkpoint stores (in-memory and sqlite) keyed by thread id
//!
//! ## Architecture
//!
//! Each turn follows the "tools in a loop" pattern:
//! 1. Load the thread's checkpoint, append the user message
//! 2. Call the model with the history and tool schemas
//! 3. Execute the requested tool call (at most one per response), or suspend
//!    as an [`agent::Interrupt`] when a human must approve or answer first
//! 4. Repeat until the model replies in plain text; persist and return
//!
//! A suspended turn is resumed with [`agent::Dispatcher::resume_turn`], which
//! feeds the human's answer to the held tool call and re-enters the loop.
//!
//! ## Example
//!
//! ```rust,ignore
//! use turnloop::{agent::Dispatcher, config::Config};
//!
//! let config = Config::from_env()?;
//! let dispatcher = Dispatcher::new(&config, llm, tools, store);
//! match dispatcher.run_turn("thread-1", "hello").await? {
//!     TurnOutcome::Reply(reply) => println!("{}", reply.content),
//!     TurnOutcome::Interrupted(interrupt) => { /* ask the human, resume */ }
//! }
//! ```

pub mod agent;
pub mod approval;
pub mod checkpoint;
pub mod config;
pub mod llm;
pub mod state;
pub mod tools;

pub use config::Config;
