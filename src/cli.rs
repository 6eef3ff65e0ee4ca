use anyhow::{bail, Context, Result};
use futures::{pin_mut, StreamExt};
use std::borrow::Cow;
use std::io::{self, BufRead, IsTerminal, Write};
use tracing::{debug, info};

use reedline::{Prompt, PromptEditMode, PromptHistorySearch, Reedline, Signal};

use crate::agent::{Agent, LlmClient, StreamItem};
use crate::config::{McpConfig, SessionConfig};
use crate::tools::{ToolHost, ToolRegistry};

pub const PROMPT_BANNER: &str = "Enter your prompt (or press Enter to exit):";
pub const ELLIPSIS: &str = "...";

/// 输入来源：逐行读取，`None` 表示输入结束
pub trait LineSource {
    fn next_line(&mut self) -> Result<Option<String>>;
}

/// 基于任意 `BufRead` 的输入（管道或测试）
pub struct ReaderLines<R> {
    reader: R,
}

impl<R: BufRead> ReaderLines<R> {
    pub fn new(reader: R) -> Self {
        ReaderLines { reader }
    }
}

impl<R: BufRead> LineSource for ReaderLines<R> {
    fn next_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line).context("读取输入失败")?;
        if read == 0 {
            return Ok(None);
        }

        let trimmed_len = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed_len);
        Ok(Some(line))
    }
}

/// 不绘制任何提示符，输入行与管道模式的转录保持一致
pub struct BarePrompt;

impl Prompt for BarePrompt {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_right(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _edit_mode: PromptEditMode) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_history_search_indicator(
        &self,
        _history_search: PromptHistorySearch,
    ) -> Cow<'_, str> {
        Cow::Borrowed("")
    }
}

/// 终端输入，使用 reedline 支持 UTF-8 和行编辑
pub struct EditorLines {
    editor: Reedline,
    prompt: BarePrompt,
}

impl EditorLines {
    pub fn new() -> Self {
        EditorLines {
            editor: Reedline::create(),
            prompt: BarePrompt,
        }
    }
}

impl Default for EditorLines {
    fn default() -> Self {
        Self::new()
    }
}

impl LineSource for EditorLines {
    fn next_line(&mut self) -> Result<Option<String>> {
        match self.editor.read_line(&self.prompt)? {
            Signal::Success(buffer) => Ok(Some(buffer)),
            // Ctrl-C / Ctrl-D 视为输入结束
            Signal::CtrlC | Signal::CtrlD => Ok(None),
        }
    }
}

/// 读取一条提示：累积到空行或输入结束，合并后去除首尾空白
///
/// 没有任何内容时返回 `None`，调用方据此结束会话。
pub fn read_prompt(lines: &mut dyn LineSource) -> Result<Option<String>> {
    let mut buffer: Vec<String> = Vec::new();

    while let Some(line) = lines.next_line()? {
        if line.is_empty() {
            break;
        }
        buffer.push(line);
    }

    let prompt = buffer.join("\n").trim().to_string();
    if prompt.is_empty() {
        Ok(None)
    } else {
        Ok(Some(prompt))
    }
}

/// 超过 `limit` 个字符时截断并追加省略号
pub fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}{}", &text[..cut], ELLIPSIS),
        None => text.to_string(),
    }
}

/// 交互循环：读取提示、流式输出 agent 的工具步骤和最终回答
pub async fn run_session<W: Write>(
    agent: &mut Agent,
    lines: &mut dyn LineSource,
    out: &mut W,
    truncate_len: usize,
) -> Result<()> {
    loop {
        writeln!(out, "{}", PROMPT_BANNER)?;
        out.flush()?;

        let Some(prompt) = read_prompt(lines)? else {
            break;
        };
        debug!(chars = prompt.chars().count(), "submitting prompt");

        let stream = agent.stream(&prompt);
        pin_mut!(stream);

        while let Some(item) = stream.next().await {
            match item? {
                StreamItem::ToolStep(action, observation) => {
                    writeln!(out, "\n🔧 Tool: {}", action.tool)?;
                    writeln!(out, "📝 Input: {}", action.input_display())?;
                    writeln!(out, "📄 Result: {}", truncate(&observation, truncate_len))?;
                }
                StreamItem::FinalAnswer(text) => {
                    writeln!(out, "\n✅ Final Result:\n{}", text)?;
                }
            }
            out.flush()?;
        }
    }

    writeln!(out, "\n🎉 Done!")?;
    out.flush()?;
    Ok(())
}

/// 按配置连接 MCP 服务器并构造 agent
pub async fn build_agent(config: &SessionConfig) -> Result<Agent> {
    let mcp_config = McpConfig::load(&config.config_path)?;
    let registry = ToolRegistry::connect(&mcp_config, config.agent.request_timeout).await?;

    info!(
        config = %config.config_path.display(),
        servers = registry.server_ids().len(),
        tools = registry.tools().len(),
        model = %config.agent.model,
        "agent ready"
    );

    let model = LlmClient::new(config.agent.clone());
    Ok(Agent::new(config.agent.clone(), Box::new(model), Box::new(registry)))
}

/// 打印帮助信息
fn print_help() {
    println!("mcp-chat - 基于 MCP 工具的交互式 agent");
    println!();
    println!("用法：mcp-chat [命令]");
    println!();
    println!("命令:");
    println!("  agent    进入交互模式（默认）");
    println!("  tools    列出已配置 MCP 服务器提供的工具");
    println!("  help     显示此帮助信息");
    println!();
    println!("输入多行提示后以空行提交，直接输入空行退出。");
    println!();
    println!("环境变量:");
    println!("  OLLAMA_MODEL            模型名称");
    println!("  OLLAMA_URL              Ollama 地址");
    println!("  RESULT_TRUNCATE_LENGTH  工具结果显示长度（默认 100）");
    println!("  AGENT_MAX_STEPS         每轮最大步骤数（默认 30）");
    println!("  MCP_CONFIG_PATH         MCP 配置文件路径");
}

/// Agent 命令 - 交互式对话
async fn run_agent(config: SessionConfig) -> Result<()> {
    let mut agent = build_agent(&config).await?;

    let mut lines: Box<dyn LineSource> = if io::stdin().is_terminal() {
        Box::new(EditorLines::new())
    } else {
        Box::new(ReaderLines::new(io::stdin().lock()))
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_session(&mut agent, lines.as_mut(), &mut out, config.truncate_length).await
}

/// Tools 命令 - 列出可用工具
async fn run_tools(config: SessionConfig) -> Result<()> {
    let mcp_config = McpConfig::load(&config.config_path)?;
    let registry = ToolRegistry::connect(&mcp_config, config.agent.request_timeout).await?;

    println!("📁 配置文件：{}", config.config_path.display());

    if registry.tools().is_empty() {
        println!("📭 暂无可用工具");
        return Ok(());
    }

    for tool in registry.tools() {
        let server = registry.owner_of(tool.name()).unwrap_or("?");
        println!("🔧 {} [{}]", tool.name(), server);
        let description = tool.function.description.trim();
        if !description.is_empty() {
            println!("   {}", truncate(description, config.truncate_length));
        }
    }

    Ok(())
}

/// 主入口函数
pub async fn run_cli() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.to_lowercase());

    match command.as_deref() {
        None | Some("agent") | Some("a") => run_agent(SessionConfig::from_env()?).await,
        Some("tools") | Some("t") => run_tools(SessionConfig::from_env()?).await,
        Some("help") | Some("-h") | Some("--help") | Some("h") => {
            print_help();
            Ok(())
        }
        Some(other) => bail!("未知命令：{}，运行 'mcp-chat help' 查看帮助信息", other),
    }
}
