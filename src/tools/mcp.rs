//! 与单个 MCP 服务器的连接，基于 rmcp 客户端
//!
//! 握手、分页、ping 由 rmcp 处理；这里只负责启动、超时和结果渲染。

use anyhow::{anyhow, bail, Context, Result};
use rmcp::model::{CallToolRequestParams, CallToolResult, RawContent, ResourceContents};
use rmcp::service::{RoleClient, RunningService};
use rmcp::transport::TokioChildProcess;
use rmcp::ServiceExt;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::config::ServerConfig;

pub struct McpClient {
    id: String,
    // drop 时关闭连接并终止子进程
    service: RunningService<RoleClient, ()>,
    timeout: Duration,
}

impl McpClient {
    /// 启动 stdio MCP 服务器子进程并完成握手
    pub async fn spawn(id: &str, server: &ServerConfig, timeout: Duration) -> Result<Self> {
        let program = server
            .command
            .as_deref()
            .with_context(|| format!("MCP 服务器 {} 缺少 command", id))?;

        let mut command = Command::new(program);
        command.args(&server.args).envs(&server.env);

        let transport = TokioChildProcess::new(command)
            .with_context(|| format!("启动 MCP 服务器失败：{} ({})", id, program))?;

        let service = with_timeout(id, "initialize", timeout, async {
            ().serve(transport).await.map_err(anyhow::Error::from)
        })
        .await?;

        Ok(Self::from_service(id, service, timeout))
    }

    /// 在任意读写流上建立连接，测试中配合 `tokio::io::duplex` 使用
    #[cfg(test)]
    pub(crate) async fn connect_io<R, W>(
        id: &str,
        reader: R,
        writer: W,
        timeout: Duration,
    ) -> Result<Self>
    where
        R: tokio::io::AsyncRead + Send + Unpin + 'static,
        W: tokio::io::AsyncWrite + Send + Unpin + 'static,
    {
        let service = with_timeout(id, "initialize", timeout, async {
            ().serve((reader, writer)).await.map_err(anyhow::Error::from)
        })
        .await?;

        Ok(Self::from_service(id, service, timeout))
    }

    fn from_service(id: &str, service: RunningService<RoleClient, ()>, timeout: Duration) -> Self {
        if let Some(info) = service.peer_info() {
            debug!(server = %id, name = %info.server_info.name, "MCP server initialized");
        }

        McpClient {
            id: id.to_string(),
            service,
            timeout,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// 列出全部工具，分页由 rmcp 处理
    pub async fn list_tools(&self) -> Result<Vec<rmcp::model::Tool>> {
        with_timeout(&self.id, "tools/list", self.timeout, async {
            self.service
                .list_all_tools()
                .await
                .map_err(anyhow::Error::from)
        })
        .await
    }

    /// 调用工具并把结果渲染为 observation 文本
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<String> {
        debug!(server = %self.id, tool = %name, "calling MCP tool");

        let arguments = match arguments {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => bail!("工具参数必须是 JSON 对象：{}", other),
        };

        let mut params = CallToolRequestParams::new(name.to_string());
        params.arguments = arguments;

        let result = with_timeout(&self.id, "tools/call", self.timeout, async {
            self.service
                .call_tool(params)
                .await
                .map_err(anyhow::Error::from)
        })
        .await?;

        Ok(to_observation(&result))
    }
}

async fn with_timeout<T, F>(id: &str, method: &str, timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.with_context(|| format!("MCP 请求失败：{} ({})", method, id)),
        Err(_) => Err(anyhow!("MCP 请求超时：{} ({}, {:?})", method, id, timeout)),
    }
}

/// 各内容块按行拼接；`isError` 时加 `Error: ` 前缀
pub fn to_observation(result: &CallToolResult) -> String {
    let text = result
        .content
        .iter()
        .map(|content| match &content.raw {
            RawContent::Text(text) => text.text.clone(),
            RawContent::Image(image) => format!("[image: {}]", image.mime_type),
            RawContent::Audio(audio) => format!("[audio: {}]", audio.mime_type),
            RawContent::Resource(embedded) => match &embedded.resource {
                ResourceContents::TextResourceContents { text, .. } => text.clone(),
                ResourceContents::BlobResourceContents { uri, .. } => uri.clone(),
            },
            RawContent::ResourceLink(link) => link.uri.clone(),
            #[allow(unreachable_patterns)]
            _ => "[unsupported content]".to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n");

    if result.is_error.unwrap_or(false) {
        format!("Error: {}", text)
    } else {
        text
    }
}
