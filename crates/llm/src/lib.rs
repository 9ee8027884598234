pub mod provider;
pub mod providers;
pub mod registry;

pub use provider::{LlmError, LlmProvider, Message, Role};
pub use providers::{create_provider, create_providers};
pub use registry::{BackendHandle, BackendRegistry};
