use anyhow::Result;
use async_stream::try_stream;
use futures::Stream;
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::tools::ToolHost;
use crate::types::ToolCall;

use super::context::Context;
use super::llm::ChatModel;
use super::step::{StreamItem, ToolAction};

pub struct Agent {
    context: Context,
    model: Box<dyn ChatModel>,
    tools: Box<dyn ToolHost>,
    config: AgentConfig,
}

impl Agent {
    pub fn new(config: AgentConfig, model: Box<dyn ChatModel>, tools: Box<dyn ToolHost>) -> Self {
        let context = Context::with_tools(tools.tools());
        Agent {
            context,
            model,
            tools,
            config,
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// 处理一条提示，依次产出工具步骤，最后产出最终回答
    ///
    /// LLM 调用失败时产出 `Err` 并结束；工具失败只作为 observation 返回给模型。
    pub fn stream<'a>(&'a mut self, prompt: &'a str) -> impl Stream<Item = Result<StreamItem>> + 'a {
        try_stream! {
            self.context.add_user(prompt);

            let max_steps = self.config.max_steps;
            let mut answer = None;

            for step in 1..=max_steps {
                debug!(step, max_steps, "agent step");

                let messages = self.context.messages();
                let response = self.model.chat(&messages, self.tools.tools()).await?;

                if !response.has_tool_calls() {
                    self.context.add_assistant(&response.content, None);
                    answer = Some(response.content);
                    break;
                }

                let mut tool_calls = response.tool_calls.unwrap_or_default();
                assign_call_ids(&mut tool_calls, step);
                self.context.add_assistant(&response.content, Some(tool_calls.clone()));

                for call in &tool_calls {
                    let action = ToolAction::from_call(call);
                    let observation = self.run_tool(&action).await;
                    self.context.add_tool_result(&action.call_id, &action.tool, &observation);
                    yield StreamItem::ToolStep(action, observation);
                }
            }

            let answer = match answer {
                Some(answer) => answer,
                None => {
                    warn!(max_steps, "agent reached the step limit");
                    let message = format!(
                        "Agent stopped after reaching the maximum number of steps ({}).",
                        max_steps
                    );
                    self.context.add_assistant(&message, None);
                    message
                }
            };

            info!("agent produced final answer");
            yield StreamItem::FinalAnswer(answer);
        }
    }

    async fn run_tool(&self, action: &ToolAction) -> String {
        debug!(tool = %action.tool, input = %action.tool_input, "executing tool");

        match self.tools.call(&action.tool, action.tool_input.clone()).await {
            Ok(output) => output,
            Err(e) => {
                warn!(tool = %action.tool, error = %e, "tool execution failed");
                format!("Tool execution failed: {:#}", e)
            }
        }
    }
}

/// Ollama 不一定返回调用 id，按步骤和序号补齐
fn assign_call_ids(calls: &mut [ToolCall], step: usize) {
    for (index, call) in calls.iter_mut().enumerate() {
        if call.id.is_empty() {
            call.id = format!("call_{}_{}", step, index);
        }
    }
}
