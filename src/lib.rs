pub mod agent;
pub mod cli;
pub mod config;
pub mod tools;
pub mod types;

pub use agent::{Agent, ChatModel, Context, LlmClient, StreamItem, ToolAction};
pub use cli::{read_prompt, run_cli, run_session, truncate, LineSource, ReaderLines};
pub use config::{AgentConfig, McpConfig, ServerConfig, SessionConfig};
pub use tools::{McpClient, ToolHost, ToolRegistry};
