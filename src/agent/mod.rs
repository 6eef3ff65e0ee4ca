pub mod context;
pub mod core;
pub mod llm;
pub mod step;

pub use context::Context;
pub use self::core::Agent;
pub use llm::{ChatModel, LlmClient};
pub use step::{StreamItem, ToolAction};
