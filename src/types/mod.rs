mod function;
mod ollama;

pub use function::{FunctionCall, FunctionDefinition, Tool, ToolCall};
pub use ollama::{ChatRequest, ChatResponse, Message};
