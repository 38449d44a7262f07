//! Completion backends: messages, streaming and the provider contract

pub mod completion;
pub mod message;
pub mod provider;
pub mod streaming;

pub use completion::{ChatCompletion, CompletionOptions, ProviderBackend, TextCompletion};
pub use message::{Message, Role};
pub use provider::{ChatRequest, Provider};
pub use streaming::{MockStreamBuilder, StreamingChoice, StreamingResponse};
