//! Language model clients and the model-backed understanding, generation and
//! narration steps.

pub mod claude_api_agent;
pub mod factory;
mod http;
pub mod intent_parser;
pub mod narrator;
pub mod openai_api_agent;
pub mod prompts;
pub mod query_generator;
mod text;

#[cfg(test)]
pub(crate) mod test_support;

pub use claude_api_agent::ClaudeApiAgent;
pub use factory::build_language_model;
pub use intent_parser::LlmIntentParser;
pub use narrator::LlmNarrator;
pub use openai_api_agent::OpenAIApiAgent;
pub use prompts::PromptLibrary;
pub use query_generator::LlmQueryGenerator;
