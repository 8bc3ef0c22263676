//! Tool definitions and implementations for the agent.

use crate::error::{FinragError, Result};
use crate::rag::Retriever;
use crate::web_search::{format_results, WebSearch};
use async_openai::types::{ChatCompletionTool, ChatCompletionToolType, FunctionObject};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Name of the document retrieval tool.
pub const RAG_TOOL: &str = "rag_search_tool";
/// Name of the web search tool.
pub const WEB_TOOL: &str = "web_search";

/// Available tools for the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum ToolCall {
    /// Search the indexed financial documents.
    #[serde(rename = "rag_search_tool")]
    RagSearch { query: String },

    /// Search the web.
    WebSearch {
        query: String,
        #[serde(default = "default_max_results")]
        max_results: u32,
    },
}

fn default_max_results() -> u32 {
    5
}

/// Tool execution context.
pub struct ToolContext {
    retriever: Retriever,
    rag_k: usize,
    web: Option<Arc<dyn WebSearch>>,
}

impl ToolContext {
    /// Create a tool context that retrieves `rag_k` passages per search.
    pub fn new(retriever: Retriever, rag_k: usize) -> Self {
        Self {
            retriever,
            rag_k,
            web: None,
        }
    }

    /// Enable the web search tool.
    pub fn with_web_search(mut self, web: Arc<dyn WebSearch>) -> Self {
        self.web = Some(web);
        self
    }

    pub fn web_enabled(&self) -> bool {
        self.web.is_some()
    }

    /// Execute a tool call and return the result as a string.
    pub async fn execute(&self, tool: &ToolCall) -> Result<String> {
        match tool {
            ToolCall::RagSearch { query } => {
                let text = self.retriever.search_documents(query, self.rag_k).await?;
                if text.is_empty() {
                    return Ok("No relevant passages found in the uploaded documents.".to_string());
                }
                debug!("rag_search_tool returned {} chars", text.len());
                Ok(text)
            }
            ToolCall::WebSearch { query, max_results } => {
                let web = self.web.as_ref().ok_or_else(|| {
                    FinragError::Agent("Web search is not configured".to_string())
                })?;
                let results = web.search(query, *max_results).await?;
                Ok(format_results(&results))
            }
        }
    }
}

/// Tool definitions advertised to the model.
pub fn tool_definitions(web_enabled: bool) -> Vec<ChatCompletionTool> {
    let mut tools = vec![ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObject {
            name: RAG_TOOL.to_string(),
            description: Some(
                "Useful for answering questions about financial documents based on their content."
                    .to_string(),
            ),
            parameters: Some(serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query"
                    }
                },
                "required": ["query"]
            })),
            strict: None,
        },
    }];

    if web_enabled {
        tools.push(ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: WEB_TOOL.to_string(),
                description: Some(
                    "Search the web for current information such as share prices or recent news. \
                    Use this only when the uploaded documents do not answer the question."
                        .to_string(),
                ),
                parameters: Some(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "The search query"
                        },
                        "max_results": {
                            "type": "integer",
                            "description": "Maximum number of results (default: 5)",
                            "default": 5
                        }
                    },
                    "required": ["query"]
                })),
                strict: None,
            },
        });
    }

    tools
}

/// Parse a tool call from the model's function name and JSON arguments.
pub fn parse_tool_call(name: &str, arguments: &str) -> Result<ToolCall> {
    let args: serde_json::Value = serde_json::from_str(arguments)
        .map_err(|e| FinragError::Agent(format!("Invalid tool arguments: {}", e)))?;

    let query = || {
        args["query"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| FinragError::Agent("Missing 'query' argument".to_string()))
    };

    match name {
        RAG_TOOL => Ok(ToolCall::RagSearch { query: query()? }),
        WEB_TOOL => Ok(ToolCall::WebSearch {
            query: query()?,
            max_results: args["max_results"]
                .as_u64()
                .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
                .unwrap_or_else(default_max_results),
        }),
        _ => Err(FinragError::Agent(format!("Unknown tool: {}", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::Embedder;
    use crate::testing::KeywordEmbedder;
    use crate::vector_store::{Document, MemoryVectorStore, VectorStore};
    use crate::web_search::WebResult;
    use async_trait::async_trait;

    struct StaticWeb;

    #[async_trait]
    impl WebSearch for StaticWeb {
        async fn search(&self, query: &str, max_results: u32) -> Result<Vec<WebResult>> {
            Ok(vec![WebResult {
                title: format!("{} ({})", query, max_results),
                url: "https://example.com".to_string(),
                content: "snippet".to_string(),
                score: 1.0,
            }])
        }
    }

    async fn context() -> ToolContext {
        let store = Arc::new(MemoryVectorStore::new());
        for (page, content) in [(1, "Total income 1,250 Cr"), (2, "Profit after tax 300 Cr")] {
            store
                .upsert(&Document::new(
                    "q1.pdf".to_string(),
                    page,
                    0,
                    content.to_string(),
                    String::new(),
                    KeywordEmbedder.embed(content).await.unwrap(),
                ))
                .await
                .unwrap();
        }
        ToolContext::new(Retriever::new(store, Arc::new(KeywordEmbedder)), 1)
    }

    #[test]
    fn test_parse_rag_tool() {
        let tool = parse_tool_call(RAG_TOOL, r#"{"query": "total income"}"#).unwrap();
        assert_eq!(tool, ToolCall::RagSearch { query: "total income".into() });
    }

    #[test]
    fn test_parse_web_tool_defaults() {
        let tool = parse_tool_call(WEB_TOOL, r#"{"query": "share price"}"#).unwrap();
        assert_eq!(
            tool,
            ToolCall::WebSearch { query: "share price".into(), max_results: 5 }
        );
    }

    #[test]
    fn test_parse_web_tool_saturates_huge_max_results() {
        let tool = parse_tool_call(WEB_TOOL, r#"{"query": "news", "max_results": 4294967297}"#).unwrap();
        assert_eq!(
            tool,
            ToolCall::WebSearch { query: "news".into(), max_results: u32::MAX }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_tool_call(RAG_TOOL, "{}"), Err(FinragError::Agent(_))));
        assert!(parse_tool_call(RAG_TOOL, "not json").is_err());
        assert!(matches!(
            parse_tool_call("get_transcript", r#"{"query": "x"}"#),
            Err(FinragError::Agent(msg)) if msg.contains("Unknown tool")
        ));
    }

    #[test]
    fn test_web_tool_only_advertised_when_enabled() {
        let names = |tools: Vec<ChatCompletionTool>| {
            tools.into_iter().map(|t| t.function.name).collect::<Vec<_>>()
        };
        assert_eq!(names(tool_definitions(false)), vec![RAG_TOOL]);
        assert_eq!(names(tool_definitions(true)), vec![RAG_TOOL, WEB_TOOL]);
    }

    #[tokio::test]
    async fn test_execute_rag_search() {
        let ctx = context().await;
        let out = ctx
            .execute(&ToolCall::RagSearch { query: "net profit".into() })
            .await
            .unwrap();
        assert_eq!(out, "Profit after tax 300 Cr");
    }

    #[tokio::test]
    async fn test_execute_web_search() {
        let ctx = context().await;
        let call = ToolCall::WebSearch { query: "news".into(), max_results: 3 };
        assert!(ctx.execute(&call).await.is_err());

        let ctx = ctx.with_web_search(Arc::new(StaticWeb));
        assert!(ctx.web_enabled());
        let out = ctx.execute(&call).await.unwrap();
        assert!(out.starts_with("1. news (3)"));
    }
}
