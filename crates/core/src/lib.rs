//! # Scribe Core
//!
//! Domain types, traits, and error definitions for Scribe, a runtime that
//! keeps a whole LLM conversation in one plain-text document.
//! This crate does **no I/O**: it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Turns, sessions and tool calls are plain values defined here. Backends
//! implement the [`Provider`] trait in their own crate, so the agent loop can
//! be tested against scripted providers.

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{ContentError, Error, ProviderError, Result, ToolError};
pub use message::{argument_to_string, AudioFormat, Content, ContentPart, Role, Session, ToolCall, Turn};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ReasoningEffort, ToolDefinition, Usage};
pub use tool::ToolResult;
