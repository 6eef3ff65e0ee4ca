use crate::types::{Message, Tool, ToolCall};

const BASE_PROMPT: &str = "You are a helpful assistant with access to tools provided by MCP servers.\n\
Call a tool whenever it helps answer the user's request, and base your answer on the tool results.\n\
Do not invent tool results. When you have enough information, reply with the final answer only.";

/// 上下文 - 管理对话历史和系统提示
pub struct Context {
    system_prompt: String,
    messages: Vec<Message>,
}

impl Context {
    pub fn new(system_prompt: String) -> Self {
        Context {
            system_prompt,
            messages: Vec::new(),
        }
    }

    /// 根据可用工具生成系统提示
    pub fn with_tools(tools: &[Tool]) -> Self {
        Self::new(build_system_prompt(tools))
    }

    /// 添加用户消息
    pub fn add_user(&mut self, content: &str) {
        self.messages.push(Message::user(content));
    }

    /// 添加助手消息
    pub fn add_assistant(&mut self, content: &str, tool_calls: Option<Vec<ToolCall>>) {
        let mut message = Message::assistant(content);
        message.tool_calls = tool_calls;
        self.messages.push(message);
    }

    /// 添加工具结果
    pub fn add_tool_result(&mut self, tool_call_id: &str, tool_name: &str, content: &str) {
        let mut message = Message::new("tool", content);
        message.tool_call_id = Some(tool_call_id.to_string());
        message.tool_name = Some(tool_name.to_string());
        self.messages.push(message);
    }

    /// 获取所有消息（包含系统提示）
    pub fn messages(&self) -> Vec<Message> {
        let mut all = Vec::with_capacity(self.messages.len() + 1);
        all.push(Message::system(&self.system_prompt));
        all.extend(self.messages.iter().cloned());
        all
    }

    /// 获取原始消息（不含系统提示）
    pub fn raw_messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

fn build_system_prompt(tools: &[Tool]) -> String {
    if tools.is_empty() {
        return format!("{}\n\nNo tools are currently available.", BASE_PROMPT);
    }

    let mut prompt = format!("{}\n\nAvailable tools:\n", BASE_PROMPT);
    for tool in tools {
        let description = tool.function.description.trim();
        if description.is_empty() {
            prompt.push_str(&format!("- {}\n", tool.name()));
        } else {
            prompt.push_str(&format!("- {}: {}\n", tool.name(), description));
        }
    }

    prompt.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn system_prompt_lists_tools() {
        let tools = vec![
            Tool::function("fill_field", "Fill a form field in an image", json!({})),
            Tool::function("ping", "", json!({})),
        ];
        let context = Context::with_tools(&tools);

        assert!(context
            .system_prompt()
            .ends_with("- fill_field: Fill a form field in an image\n- ping"));
    }

    #[test]
    fn messages_start_with_system_prompt() {
        let mut context = Context::new("be brief".to_string());
        context.add_user("hi");
        context.add_assistant("", None);
        context.add_tool_result("call_1", "search", "result");

        let messages = context.messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content, "be brief");
        assert_eq!(messages[3].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(messages[3].tool_name.as_deref(), Some("search"));
        assert_eq!(context.len(), 3);
    }
}
