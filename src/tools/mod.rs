pub mod mcp;
pub mod registry;

pub use mcp::McpClient;
pub use registry::{ToolHost, ToolRegistry};
