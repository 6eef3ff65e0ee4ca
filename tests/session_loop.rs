use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use mcp_chat::types::{FunctionCall, Message, Tool, ToolCall};
use mcp_chat::{run_session, Agent, AgentConfig, ChatModel, ReaderLines, ToolHost};

struct ScriptedModel {
    replies: Mutex<VecDeque<Message>>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn chat(&self, _messages: &[Message], _tools: &[Tool]) -> Result<Message> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted reply left"))
    }
}

/// `search` 返回固定长度的结果
struct SearchTool {
    tools: Vec<Tool>,
    observation: String,
}

#[async_trait]
impl ToolHost for SearchTool {
    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn call(&self, name: &str, _arguments: Value) -> Result<String> {
        match name {
            "search" => Ok(self.observation.clone()),
            _ => Err(anyhow!("unknown tool {}", name)),
        }
    }
}

fn search_call(input: Value) -> Message {
    let mut message = Message::assistant("");
    message.tool_calls = Some(vec![ToolCall {
        id: String::new(),
        tool_type: None,
        function: FunctionCall {
            name: "search".to_string(),
            index: None,
            arguments: input,
        },
    }]);
    message
}

fn agent_with(replies: Vec<Message>, observation: &str) -> (Agent, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let model = ScriptedModel {
        replies: Mutex::new(replies.into()),
        calls: calls.clone(),
    };
    let tools = SearchTool {
        tools: vec![Tool::function("search", "Search the web", json!({"type": "object"}))],
        observation: observation.to_string(),
    };
    (
        Agent::new(AgentConfig::default(), Box::new(model), Box::new(tools)),
        calls,
    )
}

async fn run(agent: &mut Agent, input: &str, truncate_len: usize) -> String {
    let mut lines = ReaderLines::new(Cursor::new(input.as_bytes().to_vec()));
    let mut out = Vec::new();
    run_session(agent, &mut lines, &mut out, truncate_len).await.unwrap();
    String::from_utf8(out).unwrap()
}

#[tokio::test]
async fn blank_line_exits_without_calling_agent() {
    let (mut agent, calls) = agent_with(Vec::new(), "");

    let output = run(&mut agent, "\n", 100).await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        output,
        "Enter your prompt (or press Enter to exit):\n\n🎉 Done!\n"
    );
}

#[tokio::test]
async fn tool_step_then_final_answer() {
    let observation = "r".repeat(250);
    let (mut agent, calls) = agent_with(
        vec![search_call(json!("hello")), Message::assistant("done")],
        &observation,
    );

    let output = run(&mut agent, "hello\n\n", 100).await;

    let expected = format!(
        "Enter your prompt (or press Enter to exit):\n\
         \n🔧 Tool: search\n\
         📝 Input: hello\n\
         📄 Result: {}...\n\
         \n✅ Final Result:\ndone\n\
         Enter your prompt (or press Enter to exit):\n\
         \n🎉 Done!\n",
        "r".repeat(100)
    );
    assert_eq!(output, expected);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn short_observation_is_shown_in_full() {
    let (mut agent, _) = agent_with(
        vec![search_call(json!({"query": "rust"})), Message::assistant("ok")],
        "three results",
    );

    let output = run(&mut agent, "find\nrust news\n\n\n", 100).await;

    assert!(output.contains("📝 Input: {\"query\":\"rust\"}\n"));
    assert!(output.contains("📄 Result: three results\n"));
    assert!(!output.contains("three results..."));
    assert_eq!(agent.context().raw_messages()[0].content, "find\nrust news");
}

#[tokio::test]
async fn custom_threshold_is_applied() {
    let (mut agent, _) = agent_with(
        vec![search_call(json!("q")), Message::assistant("fin")],
        "0123456789",
    );

    let output = run(&mut agent, "q\n\n", 4).await;
    assert!(output.contains("📄 Result: 0123...\n"));
}

#[tokio::test]
async fn agent_failure_propagates() {
    let (mut agent, _) = agent_with(Vec::new(), "");

    let mut lines = ReaderLines::new(Cursor::new(b"hi\n\n".to_vec()));
    let mut out = Vec::new();
    let err = run_session(&mut agent, &mut lines, &mut out, 100)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("no scripted reply left"));
    assert!(!String::from_utf8(out).unwrap().contains("Done"));
}
