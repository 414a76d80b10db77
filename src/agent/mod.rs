//! Agent module - the dispatch loop.
//!
//! One turn works as follows:
//! 1. Load the thread's checkpoint and append the user message
//! 2. Call the model with the history and available tools
//! 3. If the model requests a tool call, gate it on the approval policy,
//!    execute it and feed the result back
//! 4. Repeat until the model produces a plain reply, a human is needed
//!    (the turn suspends as an Interrupt), or the iteration bound is hit

mod dispatch;
mod prompt;

pub use dispatch::{
    DispatchError, Dispatcher, FinalReply, Interrupt, ModelInvocationError, TurnOutcome,
};
pub use prompt::build_system_prompt;
