//! Question-answering agent with tool calling.
//!
//! The model decides when to search the indexed documents and, when a web
//! search key is configured, when to look things up online. Every step of
//! the exchange is recorded so the frontend can show how an answer was
//! reached.

mod runner;
mod tools;

pub use runner::{
    Agent, AgentMessage, AgentResponse, MessageKind, RequestedToolCall, ToolCallRecord,
};
pub use tools::{parse_tool_call, tool_definitions, ToolCall, ToolContext, RAG_TOOL, WEB_TOOL};
