use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::McpConfig;
use crate::types::Tool;

use super::mcp::McpClient;

/// 工具宿主：向 agent 提供工具列表并执行调用
#[async_trait]
pub trait ToolHost: Send + Sync {
    fn tools(&self) -> &[Tool];

    async fn call(&self, name: &str, arguments: Value) -> Result<String>;
}

/// 汇总所有 MCP 服务器的工具，按名称路由调用
#[derive(Default)]
pub struct ToolRegistry {
    servers: Vec<McpClient>,
    tools: Vec<Tool>,
    routes: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 启动并连接配置中的所有 stdio 服务器
    pub async fn connect(config: &McpConfig, timeout: Duration) -> Result<Self> {
        let mut registry = ToolRegistry::new();

        for (id, server) in config.stdio_servers() {
            let client = McpClient::spawn(id, server, timeout).await?;
            registry
                .add_server(client)
                .await
                .with_context(|| format!("连接 MCP 服务器失败：{}", id))?;
        }

        Ok(registry)
    }

    /// 注册一个已完成握手的服务器的工具
    pub async fn add_server(&mut self, client: McpClient) -> Result<()> {
        let tools = client.list_tools().await?;

        let index = self.servers.len();
        let mut registered = 0;

        for mcp_tool in tools {
            if let Some(owner) = self.routes.get(mcp_tool.name.as_ref()) {
                warn!(
                    tool = %mcp_tool.name,
                    server = %client.id(),
                    owner = %self.servers[*owner].id(),
                    "duplicate tool name, keeping the first registration"
                );
                continue;
            }

            self.routes.insert(mcp_tool.name.to_string(), index);
            self.tools.push(convert_tool(&mcp_tool));
            registered += 1;
        }

        info!(server = %client.id(), tools = registered, "MCP server connected");
        self.servers.push(client);
        Ok(())
    }

    pub fn server_ids(&self) -> Vec<&str> {
        self.servers.iter().map(McpClient::id).collect()
    }

    /// 工具所属的服务器 id
    pub fn owner_of(&self, tool: &str) -> Option<&str> {
        self.routes.get(tool).map(|&index| self.servers[index].id())
    }
}

#[async_trait]
impl ToolHost for ToolRegistry {
    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn call(&self, name: &str, arguments: Value) -> Result<String> {
        let index = self
            .routes
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("未知工具：{}", name))?;

        self.servers[index].call_tool(name, arguments).await
    }
}

/// MCP 工具定义转换为函数调用工具
fn convert_tool(tool: &rmcp::model::Tool) -> Tool {
    let parameters = if tool.input_schema.is_empty() {
        json!({ "type": "object", "properties": {} })
    } else {
        Value::Object(tool.input_schema.as_ref().clone())
    };

    Tool::function(
        &tool.name,
        tool.description.as_deref().unwrap_or_default(),
        parameters,
    )
}
