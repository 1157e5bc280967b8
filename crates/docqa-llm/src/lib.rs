//! Chat and embedding provider abstraction and backend implementations.

pub mod any;
pub mod claude;
pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod provider;

pub use error::LlmError;
pub use provider::{GenerationParams, LlmProvider, Message, Role};
