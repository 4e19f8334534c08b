pub mod client;
pub mod config;
pub mod openai;

pub use client::{ChatMessage, LlmClient, LlmRequest, LlmResponse, Role, TokenUsage};
pub use config::{LlmConfig, ModelCatalog, ModelProvider, ModelSlot, OpenAiProvider};
pub use openai::OpenAiClient;
