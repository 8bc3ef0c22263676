//! Agent runner with tool calling loop.

use super::tools::{parse_tool_call, tool_definitions, ToolContext};
use crate::config::AgentSettings;
use crate::error::{FinragError, Result};
use crate::gemini::GeminiClient;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Question-answering agent over the indexed documents.
pub struct Agent {
    client: GeminiClient,
    model: String,
    tools: ToolContext,
    max_iterations: usize,
    temperature: f32,
    system_prompt: String,
}

impl Agent {
    /// Create a new agent with the given tools and system prompt.
    pub fn new(
        client: GeminiClient,
        tools: ToolContext,
        settings: &AgentSettings,
        system_prompt: &str,
    ) -> Self {
        Self {
            client,
            model: settings.model.clone(),
            tools,
            max_iterations: settings.max_iterations,
            temperature: settings.temperature,
            system_prompt: system_prompt.to_string(),
        }
    }

    /// Set maximum iterations for the agent loop.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn web_enabled(&self) -> bool {
        self.tools.web_enabled()
    }

    /// Answer a question, calling tools as the model requests.
    #[instrument(skip(self), fields(model = %self.model))]
    pub async fn run(&self, question: &str) -> Result<AgentResponse> {
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.system_prompt.clone())
                .build()
                .map_err(|e| FinragError::Agent(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(question.to_string())
                .build()
                .map_err(|e| FinragError::Agent(e.to_string()))?
                .into(),
        ];

        let mut transcript = vec![AgentMessage::human(question)];
        let mut tool_calls_made = Vec::new();
        let tools = tool_definitions(self.tools.web_enabled());
        let mut iterations = 0;

        loop {
            iterations += 1;
            if iterations > self.max_iterations {
                return Err(FinragError::Agent(format!(
                    "Agent exceeded maximum iterations ({})",
                    self.max_iterations
                )));
            }

            debug!("Agent iteration {}", iterations);

            let request = CreateChatCompletionRequestArgs::default()
                .model(&self.model)
                .messages(messages.clone())
                .tools(tools.clone())
                .temperature(self.temperature)
                .build()
                .map_err(|e| FinragError::Agent(e.to_string()))?;

            let response = self
                .client
                .chat()
                .create(request)
                .await
                .map_err(|e| FinragError::Gemini(format!("Agent API error: {}", e)))?;

            let choice = response
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| FinragError::Agent("No response from model".to_string()))?;

            let content = choice.message.content.unwrap_or_default();
            let tool_calls = choice.message.tool_calls.unwrap_or_default();

            if tool_calls.is_empty() {
                transcript.push(AgentMessage::ai(&content, None));
                info!(
                    "Agent answered after {} iterations and {} tool calls",
                    iterations,
                    tool_calls_made.len()
                );
                return Ok(AgentResponse {
                    answer: content,
                    messages: transcript,
                    tool_calls: tool_calls_made,
                    iterations,
                });
            }

            let mut assistant_msg = ChatCompletionRequestAssistantMessageArgs::default();
            assistant_msg.tool_calls(tool_calls.clone());
            if !content.is_empty() {
                assistant_msg.content(content.clone());
            }
            messages.push(
                assistant_msg
                    .build()
                    .map_err(|e| FinragError::Agent(e.to_string()))?
                    .into(),
            );
            transcript.push(AgentMessage::ai(
                &content,
                Some(tool_calls.iter().map(RequestedToolCall::from).collect()),
            ));

            for tool_call in &tool_calls {
                let record = self.execute_tool_call(tool_call).await;

                let tool_msg = ChatCompletionRequestToolMessageArgs::default()
                    .tool_call_id(&tool_call.id)
                    .content(record.result.clone())
                    .build()
                    .map_err(|e| FinragError::Agent(e.to_string()))?;
                messages.push(tool_msg.into());
                transcript.push(AgentMessage::tool(&record, &tool_call.id));

                tool_calls_made.push(record);
            }
        }
    }

    /// Execute a single tool call and return a record of it.
    async fn execute_tool_call(&self, tool_call: &ChatCompletionMessageToolCall) -> ToolCallRecord {
        let name = &tool_call.function.name;
        let arguments = &tool_call.function.arguments;

        info!("Agent calling tool: {} with args: {}", name, arguments);

        let result = match parse_tool_call(name, arguments) {
            Ok(tool) => match self.tools.execute(&tool).await {
                Ok(output) => output,
                Err(e) => format!("Tool error: {}", e),
            },
            Err(e) => format!("Failed to parse tool call: {}", e),
        };

        ToolCallRecord {
            name: name.clone(),
            arguments: arguments.clone(),
            result,
        }
    }
}

/// Response from an agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    /// The final answer.
    pub answer: String,
    /// The conversation, ending with the final answer.
    pub messages: Vec<AgentMessage>,
    /// Record of all tool calls made during execution.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Number of model calls used.
    pub iterations: usize,
}

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Human,
    Ai,
    Tool,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestedToolCall {
    pub id: String,
    pub name: String,
    /// Parsed arguments, or the raw string when they are not valid JSON.
    pub args: serde_json::Value,
}

impl From<&ChatCompletionMessageToolCall> for RequestedToolCall {
    fn from(call: &ChatCompletionMessageToolCall) -> Self {
        Self {
            id: call.id.clone(),
            name: call.function.name.clone(),
            args: serde_json::from_str(&call.function.arguments)
                .unwrap_or_else(|_| serde_json::Value::String(call.function.arguments.clone())),
        }
    }
}

/// One step of the conversation, shaped for the chat frontend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    /// Tool name, for tool messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<RequestedToolCall>>,
}

impl AgentMessage {
    fn base(kind: MessageKind, content: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            content: content.to_string(),
            name: None,
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn human(content: &str) -> Self {
        Self::base(MessageKind::Human, content)
    }

    pub fn ai(content: &str, tool_calls: Option<Vec<RequestedToolCall>>) -> Self {
        Self {
            tool_calls,
            ..Self::base(MessageKind::Ai, content)
        }
    }

    pub fn tool(record: &ToolCallRecord, tool_call_id: &str) -> Self {
        Self {
            name: Some(record.name.clone()),
            tool_call_id: Some(tool_call_id.to_string()),
            ..Self::base(MessageKind::Tool, &record.result)
        }
    }
}

/// Record of a tool call made by the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Name of the tool called.
    pub name: String,
    /// JSON arguments passed to the tool.
    pub arguments: String,
    /// Result returned by the tool.
    pub result: String,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeminiSettings;
    use crate::embedding::Embedder;
    use crate::gemini::create_client_with_key;
    use crate::rag::Retriever;
    use crate::testing::KeywordEmbedder;
    use crate::vector_store::{Document, MemoryVectorStore, VectorStore};
    use axum::extract::State;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    /// Chat completions endpoint that asks for one document search, then answers.
    async fn fake_completions(
        State(requests): State<Arc<Mutex<Vec<Value>>>>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        requests.lock().unwrap().push(body.clone());
        let last = body["messages"].as_array().and_then(|m| m.last()).cloned().unwrap_or_default();

        let message = if last["role"] == "tool" {
            json!({
                "role": "assistant",
                "content": format!("According to the report: {}", last["content"].as_str().unwrap_or(""))
            })
        } else {
            json!({
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": { "name": "rag_search_tool", "arguments": "{\"query\": \"total income\"}" }
                }]
            })
        };

        Json(json!({
            "id": "chatcmpl-test",
            "object": "chat.completion",
            "created": 0,
            "model": body["model"],
            "choices": [{ "index": 0, "message": message, "finish_reason": "stop" }]
        }))
    }

    async fn agent() -> (Agent, Arc<Mutex<Vec<Value>>>) {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/chat/completions", post(fake_completions))
            .with_state(requests.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let settings = GeminiSettings {
            api_base: format!("http://{}", addr),
            ..Default::default()
        };
        let client = create_client_with_key(&settings, "test-key").unwrap();

        let store = Arc::new(MemoryVectorStore::new());
        let content = "Total income 1,250 Cr";
        store
            .upsert(&Document::new(
                "q1.pdf".to_string(),
                1,
                0,
                content.to_string(),
                "Income statement".to_string(),
                KeywordEmbedder.embed(content).await.unwrap(),
            ))
            .await
            .unwrap();
        let tools = ToolContext::new(Retriever::new(store, Arc::new(KeywordEmbedder)), 2);

        let agent = Agent::new(client, tools, &AgentSettings::default(), "You answer questions.");
        (agent, requests)
    }

    #[tokio::test]
    async fn test_run_calls_rag_tool_then_answers() {
        let (agent, requests) = agent().await;
        let response = agent.run("What was total income?").await.unwrap();

        assert_eq!(response.answer, "According to the report: Total income 1,250 Cr");
        assert_eq!(response.iterations, 2);
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "rag_search_tool");

        let kinds: Vec<_> = response.messages.iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![MessageKind::Human, MessageKind::Ai, MessageKind::Tool, MessageKind::Ai]
        );
        let requested = response.messages[1].tool_calls.as_ref().unwrap();
        assert_eq!(requested[0].args["query"], "total income");
        assert_eq!(response.messages[2].name.as_deref(), Some("rag_search_tool"));

        let requests = requests.lock().unwrap();
        assert_eq!(requests[0]["model"], "gemini-2.0-flash");
        assert_eq!(requests[0]["messages"][0]["role"], "system");
        assert_eq!(requests[0]["tools"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_at_max_iterations() {
        let (agent, _) = agent().await;
        let agent = agent.with_max_iterations(1);
        let err = agent.run("What was total income?").await.unwrap_err();
        assert!(matches!(err, FinragError::Agent(msg) if msg.contains("maximum iterations")));
    }

    #[test]
    fn test_message_serialization() {
        let record = ToolCallRecord {
            name: "rag_search_tool".to_string(),
            arguments: r#"{"query": "test"}"#.to_string(),
            result: "Found results".to_string(),
        };
        assert_eq!(format!("{}", record), r#"rag_search_tool({"query": "test"})"#);

        let value = serde_json::to_value(AgentMessage::tool(&record, "call_1")).unwrap();
        assert_eq!(value["type"], "tool");
        assert_eq!(value["name"], "rag_search_tool");
        assert!(value.get("tool_calls").is_none());
    }
}
