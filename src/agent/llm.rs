use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::AgentConfig;
use crate::types::{ChatRequest, ChatResponse, Message, Tool};

/// 对话模型：给定历史与工具，返回下一条助手消息
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, messages: &[Message], tools: &[Tool]) -> Result<Message>;
}

/// Ollama `/api/chat` 客户端
pub struct LlmClient {
    client: Client,
    config: AgentConfig,
}

impl LlmClient {
    pub fn new(config: AgentConfig) -> Self {
        LlmClient {
            client: Client::new(),
            config,
        }
    }
}

/// 单次调用，失败直接返回给调用方
#[async_trait]
impl ChatModel for LlmClient {
    async fn chat(&self, messages: &[Message], tools: &[Tool]) -> Result<Message> {
        let request = ChatRequest {
            model: &self.config.model,
            messages,
            tools: if tools.is_empty() { None } else { Some(tools) },
            stream: false,
        };

        let url = format!("{}/api/chat", self.config.base_url.trim_end_matches('/'));
        debug!(%url, messages = messages.len(), tools = tools.len(), "sending chat request");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("调用 Ollama API 失败")?;

        let status = response.status();
        let text = response.text().await.context("读取响应失败")?;

        if !status.is_success() {
            return Err(anyhow!("Ollama API 错误：{} - {}", status, text));
        }

        parse_response(&text)
    }
}

fn parse_response(text: &str) -> Result<Message> {
    let response: ChatResponse = serde_json::from_str(text)
        .with_context(|| format!("解析 Ollama 响应失败，原始内容：{}", text))?;

    if let Some(err) = response.error {
        return Err(anyhow!("Ollama 错误：{}", err));
    }

    if !response.done {
        debug!("Ollama response not marked as done");
    }

    response
        .message
        .ok_or_else(|| anyhow!("Ollama 响应缺少 message 字段：{}", text))
}
