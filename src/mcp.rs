//! MCP (Model Context Protocol) server exposing the query engine as tools
//! over stdio.

use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
    },
    tool, tool_handler, tool_router,
    transport::stdio,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::{DEFAULT_RECENT_LIMIT, QueryEngine};

// ============================================================================
// Tool Input Schemas
// ============================================================================

/// Parameters for answering a free-text query.
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct AskParams {
    /// What the user wants, e.g. "find the biology notecard pdf" or
    /// "summarize my conversation with Jane last month".
    pub query: String,
}

/// Parameters for listing recent conversations.
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct RecentParams {
    /// Maximum number of conversations (default: 20).
    pub limit: Option<usize>,
    /// Case-insensitive substring matched against contact and last message.
    pub filter: Option<String>,
}

/// Parameters for listing a contact's summarizable months.
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct PeriodsParams {
    /// Contact name, phone number or email (fuzzy matched).
    pub contact: String,
}

/// Parameters for a contact's message frequency counts.
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct StatsParams {
    /// Contact name, phone number or email (fuzzy matched).
    pub contact: String,
}

// ============================================================================
// MCP Server
// ============================================================================

/// MCP server answering archive queries.
#[derive(Clone)]
pub struct ArchiveServer {
    engine: Arc<QueryEngine>,
    tool_router: ToolRouter<Self>,
}

impl ArchiveServer {
    pub fn new(engine: QueryEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            tool_router: Self::tool_router(),
        }
    }
}

fn err(msg: impl Into<String>) -> McpError {
    McpError::internal_error(msg.into(), None)
}

/// Wrap a payload with the response timestamp.
fn respond(mut payload: Value) -> Result<CallToolResult, McpError> {
    payload["timestamp"] = Value::String(chrono::Utc::now().to_rfc3339());
    let text = serde_json::to_string_pretty(&payload).map_err(|e| err(e.to_string()))?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for ArchiveServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "archive-query".into(),
                title: Some("Message Archive Query".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Ask about a personal message archive: find PDF attachments, \
                 summarize a month of conversation with a contact, or search messages."
                    .into(),
            ),
        }
    }
}

#[tool_router(router = tool_router)]
impl ArchiveServer {
    /// Answer a free-text query.
    #[tool(
        name = "ask",
        description = "Find a PDF, summarize a conversation with a contact, or search messages"
    )]
    async fn ask(
        &self,
        Parameters(params): Parameters<AskParams>,
    ) -> Result<CallToolResult, McpError> {
        let outcome = self.engine.handle(&params.query).await;
        let mut payload = serde_json::to_value(&outcome).map_err(|e| err(e.to_string()))?;
        payload["content"] = Value::String(outcome.content());
        respond(payload)
    }

    /// List the latest message per contact.
    #[tool(
        name = "recent_conversations",
        description = "List the most recent message with each contact, newest first"
    )]
    async fn recent_conversations(
        &self,
        Parameters(params): Parameters<RecentParams>,
    ) -> Result<CallToolResult, McpError> {
        let limit = params.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
        let contacts = self
            .engine
            .recent_conversations(limit, params.filter.as_deref())
            .await
            .map_err(|e| err(e.to_string()))?;

        respond(serde_json::json!({
            "count": contacts.len(),
            "contacts": contacts,
        }))
    }

    /// List the months that can be summarized for a contact.
    #[tool(
        name = "conversation_periods",
        description = "List the months with enough conversation to summarize for a contact"
    )]
    async fn conversation_periods(
        &self,
        Parameters(params): Parameters<PeriodsParams>,
    ) -> Result<CallToolResult, McpError> {
        let listing = self
            .engine
            .conversation_periods(&params.contact)
            .await
            .map_err(|e| err(e.to_string()))?;

        match listing {
            Some(listing) => {
                respond(serde_json::to_value(&listing).map_err(|e| err(e.to_string()))?)
            }
            None => respond(serde_json::json!({ "error": "contact_not_found" })),
        }
    }

    /// Count a contact's messages by year, month and hour of day.
    #[tool(
        name = "message_stats",
        description = "Count messages with a contact per year, per month and per hour of day"
    )]
    async fn message_stats(
        &self,
        Parameters(params): Parameters<StatsParams>,
    ) -> Result<CallToolResult, McpError> {
        let listing = self
            .engine
            .message_stats(&params.contact)
            .await
            .map_err(|e| err(e.to_string()))?;

        match listing {
            Some(listing) => {
                respond(serde_json::to_value(&listing).map_err(|e| err(e.to_string()))?)
            }
            None => respond(serde_json::json!({ "error": "contact_not_found" })),
        }
    }
}

// ============================================================================
// Entry Point
// ============================================================================

/// Run the MCP server on stdio transport.
pub async fn run_mcp_server(engine: QueryEngine) -> Result<(), Box<dyn std::error::Error>> {
    let server = ArchiveServer::new(engine);
    let service = server.serve(stdio()).await.map_err(|e| e.to_string())?;
    service.waiting().await.map_err(|e| e.to_string())?;
    Ok(())
}
