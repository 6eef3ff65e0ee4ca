use serde_json::Value;

use crate::types::ToolCall;

/// 一次工具调用：工具名与输入
#[derive(Debug, Clone, PartialEq)]
pub struct ToolAction {
    pub tool: String,
    pub tool_input: Value,
    pub call_id: String,
}

impl ToolAction {
    /// 从 LLM 返回的工具调用构造，字符串形式的参数尽量解码为 JSON
    pub fn from_call(call: &ToolCall) -> Self {
        let tool_input = match &call.function.arguments {
            Value::String(raw) => {
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
            }
            other => other.clone(),
        };

        ToolAction {
            tool: call.function.name.clone(),
            tool_input,
            call_id: call.id.clone(),
        }
    }

    /// 字符串输入原样显示，其余 JSON 紧凑显示
    pub fn input_display(&self) -> String {
        match &self.tool_input {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// agent 在一轮对话中产出的流元素
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    /// 中间步骤：工具调用及其结果
    ToolStep(ToolAction, String),
    /// 最终回答，结束本轮
    FinalAnswer(String),
}
