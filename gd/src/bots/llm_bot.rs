//! Bot backed by a remote LLM

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{Bot, BotError, BotSession, BotTurn, SessionUsage, ToolOutcome};
use crate::llm::{
    CompletionRequest, CompletionResponse, ContentBlock, LlmClient, Message, StopReason, TokenUsage, ToolDefinition,
};

/// Truncated replies in a row before the session gives up asking for more
const MAX_CONTINUATIONS: u32 = 3;

const SYSTEM_PROMPT: &str = "You are an AI assistant editing files in a git repository on behalf of a developer.\n\
     Use the read_file and write_file tools to inspect and change files. Paths are relative to the repository root.\n\
     When the task is complete, stop calling tools and reply with a single short line summarizing the change.";

pub struct LlmBot {
    name: String,
    client: Arc<dyn LlmClient>,
    max_tokens: u32,
}

impl LlmBot {
    pub fn new(name: impl Into<String>, client: Arc<dyn LlmClient>, max_tokens: u32) -> Self {
        let name = name.into();
        debug!(%name, max_tokens, "LlmBot::new: called");
        Self {
            name,
            client,
            max_tokens,
        }
    }
}

impl Bot for LlmBot {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self, goal: &str, manifest: &[ToolDefinition]) -> Box<dyn BotSession> {
        debug!(bot = %self.name, tool_count = manifest.len(), "LlmBot::start: called");
        Box::new(LlmSession {
            client: self.client.clone(),
            max_tokens: self.max_tokens,
            tools: manifest.to_vec(),
            messages: vec![Message::user(goal)],
            request_count: 0,
            tokens: TokenUsage::default(),
        })
    }
}

/// One conversation; holds every message exchanged so far
struct LlmSession {
    client: Arc<dyn LlmClient>,
    max_tokens: u32,
    tools: Vec<ToolDefinition>,
    messages: Vec<Message>,
    request_count: u32,
    tokens: TokenUsage,
}

impl LlmSession {
    async fn complete(&mut self) -> Result<CompletionResponse, BotError> {
        let request = CompletionRequest {
            system_prompt: SYSTEM_PROMPT.to_string(),
            messages: self.messages.clone(),
            tools: self.tools.clone(),
            max_tokens: self.max_tokens,
        };
        let response = self.client.complete(request).await?;
        self.request_count += 1;
        self.tokens.add(response.usage);
        debug!(
            stop_reason = ?response.stop_reason,
            tool_calls = response.tool_calls.len(),
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "LlmSession::complete: response"
        );
        self.messages.push(build_assistant_message(&response));
        Ok(response)
    }
}

#[async_trait]
impl BotSession for LlmSession {
    async fn next(&mut self, results: Vec<ToolOutcome>) -> Result<BotTurn, BotError> {
        debug!(result_count = results.len(), "LlmSession::next: called");
        if !results.is_empty() {
            self.messages.push(build_tool_result_message(&results));
        }

        let mut continuations = 0;
        loop {
            let response = self.complete().await?;
            match response.stop_reason {
                StopReason::ToolUse if !response.tool_calls.is_empty() => {
                    return Ok(BotTurn::ToolCalls(response.tool_calls));
                }
                StopReason::MaxTokens if continuations < MAX_CONTINUATIONS => {
                    continuations += 1;
                    debug!(continuations, "LlmSession::next: output truncated, asking to continue");
                    self.messages.push(Message::user(
                        "Continue from where you left off. Your previous response was truncated.",
                    ));
                }
                StopReason::MaxTokens => {
                    warn!("LlmSession::next: output still truncated, treating reply as final");
                    return Ok(BotTurn::Done {
                        summary: response.content,
                    });
                }
                _ => {
                    return Ok(BotTurn::Done {
                        summary: response.content,
                    });
                }
            }
        }
    }

    fn usage(&self) -> SessionUsage {
        SessionUsage {
            request_count: self.request_count,
            token_count: self.tokens.input_tokens + self.tokens.output_tokens,
        }
    }
}

/// Assistant message echoing the response, tool calls included
fn build_assistant_message(response: &CompletionResponse) -> Message {
    let mut blocks = Vec::new();

    if let Some(text) = &response.content {
        blocks.push(ContentBlock::text(text));
    }

    for call in &response.tool_calls {
        blocks.push(ContentBlock::ToolUse {
            id: call.id.clone(),
            name: call.name.clone(),
            input: call.input.clone(),
        });
    }

    Message::assistant_blocks(blocks)
}

fn build_tool_result_message(results: &[ToolOutcome]) -> Message {
    let blocks: Vec<ContentBlock> = results
        .iter()
        .map(|r| ContentBlock::tool_result(&r.call_id, &r.content, r.is_error))
        .collect();

    Message::user_blocks(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::MockLlmClient;
    use crate::llm::{MessageContent, TokenUsage, ToolCall};

    fn response(content: Option<&str>, tool_calls: Vec<ToolCall>, stop_reason: StopReason) -> CompletionResponse {
        CompletionResponse {
            content: content.map(str::to_string),
            tool_calls,
            stop_reason,
            usage: TokenUsage::default(),
        }
    }

    fn read_call(id: &str, path: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: "read_file".to_string(),
            input: serde_json::json!({"path": path}),
        }
    }

    #[tokio::test]
    async fn test_tool_use_then_done() {
        let client = Arc::new(MockLlmClient::new(vec![
            response(Some("Looking"), vec![read_call("toolu_1", "a.txt")], StopReason::ToolUse),
            response(Some("Read a.txt"), vec![], StopReason::EndTurn),
        ]));
        let bot = LlmBot::new("claude", client.clone(), 1024);
        let mut session = bot.start("Read a.txt", &[]);

        let turn = session.next(vec![]).await.unwrap();
        assert_eq!(turn, BotTurn::ToolCalls(vec![read_call("toolu_1", "a.txt")]));

        let turn = session
            .next(vec![ToolOutcome {
                call_id: "toolu_1".to_string(),
                content: "hello".to_string(),
                is_error: false,
            }])
            .await
            .unwrap();
        assert_eq!(
            turn,
            BotTurn::Done {
                summary: Some("Read a.txt".to_string())
            }
        );

        // goal, assistant tool_use, tool_result
        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].messages.len(), 3);
        match &requests[1].messages[2].content {
            MessageContent::Blocks(blocks) => {
                assert!(matches!(&blocks[0], ContentBlock::ToolResult { tool_use_id, .. } if tool_use_id == "toolu_1"));
            }
            other => panic!("expected blocks, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_max_tokens_asks_to_continue() {
        let client = Arc::new(MockLlmClient::new(vec![
            response(Some("partial"), vec![], StopReason::MaxTokens),
            response(Some("Done"), vec![], StopReason::EndTurn),
        ]));
        let bot = LlmBot::new("claude", client.clone(), 1024);
        let mut session = bot.start("Summarize", &[]);

        let turn = session.next(vec![]).await.unwrap();
        assert_eq!(
            turn,
            BotTurn::Done {
                summary: Some("Done".to_string())
            }
        );
        assert_eq!(client.call_count(), 2);
        let last = client.requests().pop().unwrap();
        assert!(matches!(&last.messages[2].content, MessageContent::Text(t) if t.contains("Continue")));
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let client = Arc::new(MockLlmClient::new(vec![
            response(Some("one"), vec![], StopReason::EndTurn),
            response(Some("two"), vec![], StopReason::EndTurn),
        ]));
        let bot = LlmBot::new("claude", client.clone(), 1024);

        let mut first = bot.start("first goal", &[]);
        first.next(vec![]).await.unwrap();
        drop(first);

        let mut second = bot.start("second goal", &[]);
        second.next(vec![]).await.unwrap();

        let requests = client.requests();
        assert_eq!(requests[1].messages.len(), 1);
        assert!(matches!(&requests[1].messages[0].content, MessageContent::Text(t) if t == "second goal"));
    }

    #[tokio::test]
    async fn test_usage_accumulates_across_turns() {
        let mut first = response(Some("Looking"), vec![read_call("toolu_1", "a.txt")], StopReason::ToolUse);
        first.usage = TokenUsage {
            input_tokens: 100,
            output_tokens: 20,
        };
        let mut second = response(Some("Done"), vec![], StopReason::EndTurn);
        second.usage = TokenUsage {
            input_tokens: 150,
            output_tokens: 5,
        };
        let client = Arc::new(MockLlmClient::new(vec![first, second]));
        let bot = LlmBot::new("claude", client, 1024);
        let mut session = bot.start("Read a.txt", &[]);
        assert_eq!(session.usage(), SessionUsage::default());

        session.next(vec![]).await.unwrap();
        session
            .next(vec![ToolOutcome {
                call_id: "toolu_1".to_string(),
                content: "hello".to_string(),
                is_error: false,
            }])
            .await
            .unwrap();

        assert_eq!(
            session.usage(),
            SessionUsage {
                request_count: 2,
                token_count: 275,
            }
        );
    }

    #[tokio::test]
    async fn test_client_error_surfaces() {
        let client = Arc::new(MockLlmClient::new(vec![]));
        let bot = LlmBot::new("claude", client, 1024);
        let mut session = bot.start("anything", &[]);
        assert!(matches!(session.next(vec![]).await, Err(BotError::Llm(_))));
    }
}
