//! The document codec for Scribe.
//!
//! A conversation lives in one plain-text document:
//!
//! ```text
//! anything here is kept as is
//! __START__
//! You answer in one sentence.
//!
//! Q>>
//!
//! What is [txt[notes.md]] about?
//!
//! A>>
//! ...
//! __END__
//! and so is anything here
//! ```
//!
//! This crate splits the envelope, parses headers into a [`Session`],
//! expands inline references, and renders the answer (plus optional
//! tool-activity and reasoning blocks) back into the document.
//!
//! [`Session`]: scribe_core::Session

pub mod codec;
pub mod envelope;
pub mod interpolate;
pub mod recombine;
pub mod toolblock;

pub use codec::{include_preamble, parse, serialize};
pub use envelope::{rebuild, split, Envelope};
pub use interpolate::{interpolate, InterpolationContext};
pub use recombine::{recombine, RecombineOptions};
pub use toolblock::{
    extract_last_phase, insert_tools_block, render, BlockLimits, IncludeToolMode, ToolCallEntry, ToolsPlacement,
};
