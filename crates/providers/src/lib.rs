//! Completion backends for Scribe.
//!
//! All providers implement the `scribe_core::Provider` trait. Every
//! gateway in the catalog speaks the OpenAI chat-completions dialect, so
//! one provider type covers them all.

pub mod gateways;
pub mod openai_compat;

pub use gateways::{build_provider, build_provider_with, Gateway};
pub use openai_compat::OpenAiCompatProvider;
