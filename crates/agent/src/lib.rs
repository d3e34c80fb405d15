//! The agent loop for Scribe.
//!
//! One run follows a **Complete → Act → Observe** cycle:
//!
//! 1. **Parse** the document into a session
//! 2. **Send to the backend** with the tool catalog
//! 3. **If tool calls**: execute them concurrently, append the results, loop back to step 2
//! 4. **If text**: render the answer back into the document
//!
//! The loop ends when the backend answers with text, or fails once the
//! tool-call depth ceiling is exceeded.

pub mod loop_runner;
pub mod run;

pub use loop_runner::{AgentLoop, DEFAULT_MAX_DEPTH};
pub use run::{run_chat, run_chat_with_cancel, ChatRunOptions};
