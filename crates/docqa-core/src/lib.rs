//! Configuration, model selection and the rebuild/ask pipeline.

pub mod answer;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod secret;

pub use answer::{Answer, Answerer};
pub use config::Config;
pub use error::PipelineError;
pub use pipeline::{Pipeline, RebuildReport};
pub use registry::ModelRegistry;
