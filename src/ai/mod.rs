//! All AI/LLM functionality

pub mod client;
pub mod facts;
pub mod prompt_builder;
pub mod sse;

// Re-export main types for convenience
pub use client::{CompletionStream, CompletionStreamClient};
pub use facts::{AuxiliaryFacts, BudgetPlanner, FactProviders, WeatherLookup};
pub use prompt_builder::{Conversation, PromptBuilder, PromptMessage, Role};
pub use sse::{MalformedFrame, StreamChunk};
