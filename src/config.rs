use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_MODEL: &str = "qwen3:4b-instruct-2507-q4_K_M";
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_TRUNCATE_LENGTH: usize = 100;
pub const DEFAULT_MAX_STEPS: usize = 30;

/// 用户配置目录下的应用子目录名
pub const APP_DIR: &str = "mcp-chat";
pub const CONFIG_FILE: &str = "config.json";

/// Agent 配置
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub model: String,
    pub base_url: String,
    pub max_steps: usize,
    pub request_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_steps: DEFAULT_MAX_STEPS,
            request_timeout: Duration::from_secs(180),
        }
    }
}

/// 会话配置，进程启动时解析一次，之后只读
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub agent: AgentConfig,
    pub config_path: PathBuf,
    pub truncate_length: usize,
}

impl SessionConfig {
    /// 从进程环境变量和用户配置目录解析
    pub fn from_env() -> Result<Self> {
        Self::resolve(|key| std::env::var(key).ok(), dirs::config_dir())
    }

    pub fn resolve<F>(lookup: F, user_config_dir: Option<PathBuf>) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AgentConfig::default();

        let agent = AgentConfig {
            model: lookup("OLLAMA_MODEL").unwrap_or(defaults.model),
            base_url: lookup("OLLAMA_URL").unwrap_or(defaults.base_url),
            max_steps: parse_number(&lookup, "AGENT_MAX_STEPS")?.unwrap_or(defaults.max_steps),
            ..defaults
        };

        let truncate_length =
            parse_number(&lookup, "RESULT_TRUNCATE_LENGTH")?.unwrap_or(DEFAULT_TRUNCATE_LENGTH);

        let config_path = resolve_config_path(
            lookup("MCP_CONFIG_PATH").map(PathBuf::from),
            user_config_dir,
        );

        Ok(SessionConfig {
            agent,
            config_path,
            truncate_length,
        })
    }
}

fn parse_number<F>(lookup: &F, key: &str) -> Result<Option<usize>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<usize>()
                .with_context(|| format!("环境变量 {} 不是合法的非负整数：{}", key, raw))
        })
        .transpose()
}

/// 显式路径优先，其次是用户配置目录下已存在的文件，最后回退到工作目录
pub fn resolve_config_path(explicit: Option<PathBuf>, user_config_dir: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }

    if let Some(dir) = user_config_dir {
        let candidate = dir.join(APP_DIR).join(CONFIG_FILE);
        if candidate.exists() {
            return candidate;
        }
    }

    PathBuf::from(CONFIG_FILE)
}

/// 单个 MCP 服务器条目
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

/// MCP 服务器配置文件（config.json）
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct McpConfig {
    #[serde(rename = "mcpServers", default)]
    pub servers: BTreeMap<String, ServerConfig>,
}

impl McpConfig {
    /// 从文件加载配置，文件不存在时返回空配置
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "MCP config file not found, running without tools");
            return Ok(McpConfig::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败：{}", path.display()))?;
        Self::parse(&content).with_context(|| format!("解析配置文件失败：{}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// 启用且可通过 stdio 启动的服务器，按 id 排序
    pub fn stdio_servers(&self) -> Vec<(&str, &ServerConfig)> {
        let mut servers = Vec::new();

        for (id, server) in &self.servers {
            if !server.enabled {
                continue;
            }
            if server.command.is_none() {
                if server.url.is_some() {
                    warn!(server = %id, "remote MCP servers are not supported, skipping");
                } else {
                    warn!(server = %id, "MCP server has no command, skipping");
                }
                continue;
            }
            servers.push((id.as_str(), server));
        }

        servers
    }
}
