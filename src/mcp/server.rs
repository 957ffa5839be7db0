

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    service::RequestContext,
    tool, tool_handler, tool_router,
    transport::stdio,
    ErrorData as McpError, RoleServer, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::agent::MovieAgent;
use crate::core::config::MovieAgentConfig;
use crate::core::error::MovieAgentError;

const DEFAULT_HISTORY_LIMIT: usize = 10;


#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
pub struct GenerateCypherParams {
    #[schemars(description = "Question about movies, actors, directors or genres")]
    pub question: String,
}

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
pub struct AskParams {
    #[schemars(description = "Conversation identifier; follow-up questions are resolved against it")]
    pub session_id: String,
    #[schemars(description = "The user's question as typed")]
    pub question: String,
}

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
pub struct SessionHistoryParams {
    #[schemars(description = "Conversation identifier")]
    pub session_id: String,
    #[schemars(description = "Max turns, most recent last (default: 10)")]
    pub limit: Option<u32>,
}


#[derive(Clone)]
pub struct MovieAgentMcpServer {
    agent: Arc<MovieAgent>,
    tool_router: ToolRouter<Self>,
}

impl MovieAgentMcpServer {

    pub fn new(agent: MovieAgent) -> Self {
        Self {
            agent: Arc::new(agent),
            tool_router: Self::tool_router(),
        }
    }


    fn convert_error(err: MovieAgentError) -> McpError {
        if err.is_client_error() {
            warn!("Rejected request: {}", err);
            McpError::invalid_params(err.to_string(), None)
        } else {
            warn!("Request failed: {}", err);
            McpError::internal_error(err.to_string(), None)
        }
    }


    fn result_to_json<T: Serialize>(result: T) -> Result<String, McpError> {
        serde_json::to_string_pretty(&result)
            .map_err(|e| McpError::internal_error(e.to_string(), None))
    }
}

#[tool_router]
impl MovieAgentMcpServer {

    #[tool(description = "Translate a movie question into Cypher using the live graph schema. The statement is returned exactly as the model wrote it: it is not checked for writes and not executed.")]
    async fn generate_cypher(
        &self,
        Parameters(params): Parameters<GenerateCypherParams>,
    ) -> Result<CallToolResult, McpError> {
        info!(
            "🧾 Generating Cypher: '{}'",
            crate::safe_truncate_ellipsis(&params.question, 50)
        );

        let cypher = self
            .agent
            .generate_cypher(&params.question)
            .await
            .map_err(Self::convert_error)?;

        Ok(CallToolResult::success(vec![Content::text(cypher)]))
    }


    #[tool(description = "Answer a movie question from the plots most similar to it (vector search). The turn is saved to the session history.")]
    async fn ask_movies(
        &self,
        Parameters(params): Parameters<AskParams>,
    ) -> Result<CallToolResult, McpError> {
        info!(
            "🔍 Vector question [session={}]: '{}'",
            params.session_id,
            crate::safe_truncate_ellipsis(&params.question, 50)
        );

        let answer = self
            .agent
            .ask_vector(&params.session_id, &params.question)
            .await
            .map_err(Self::convert_error)?;

        Ok(CallToolResult::success(vec![Content::text(answer)]))
    }


    #[tool(description = "Answer a factual movie question by generating and running a read-only Cypher query against the graph. The turn and the executed statement are saved to the session history.")]
    async fn query_movie_graph(
        &self,
        Parameters(params): Parameters<AskParams>,
    ) -> Result<CallToolResult, McpError> {
        info!(
            "🕸️ Graph question [session={}]: '{}'",
            params.session_id,
            crate::safe_truncate_ellipsis(&params.question, 50)
        );

        let answer = self
            .agent
            .ask_graph(&params.session_id, &params.question)
            .await
            .map_err(Self::convert_error)?;

        Ok(CallToolResult::success(vec![Content::text(answer)]))
    }


    #[tool(description = "Previous turns of a session, oldest first. Returns: [{id, input, output}]")]
    async fn session_history(
        &self,
        Parameters(params): Parameters<SessionHistoryParams>,
    ) -> Result<CallToolResult, McpError> {
        let limit = params
            .limit
            .map(|l| l as usize)
            .unwrap_or(DEFAULT_HISTORY_LIMIT);

        let turns = self
            .agent
            .history(&params.session_id, limit)
            .await
            .map_err(Self::convert_error)?;

        let json = Self::result_to_json(&turns)?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }
}

#[tool_handler]
impl ServerHandler for MovieAgentMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: "movie-agent".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "Movie question answering over a Neo4j graph. Use ask_movies for plot and \
                 recommendation questions, query_movie_graph for facts such as cast, crew and \
                 ratings, and generate_cypher to see the unchecked query a question would produce."
                    .to_string(),
            ),
        }
    }


    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            resources: vec![
                RawResource::new("config://movie-agent", "movie-agent-config".to_string())
                    .no_annotation(),
                RawResource::new("schema://neo4j", "neo4j-schema".to_string()).no_annotation(),
            ],
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        ReadResourceRequestParam { uri }: ReadResourceRequestParam,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        match uri.as_str() {
            "config://movie-agent" => {
                let content = Self::result_to_json(self.agent.config())?;
                Ok(ReadResourceResult {
                    contents: vec![ResourceContents::text(content, uri)],
                })
            }
            "schema://neo4j" => {
                let schema = self.agent.schema().await.map_err(Self::convert_error)?;
                Ok(ReadResourceResult {
                    contents: vec![ResourceContents::text(schema, uri)],
                })
            }
            _ => Err(McpError::resource_not_found(
                format!("Unknown resource: {}", uri),
                Some(json!({ "uri": uri })),
            )),
        }
    }
}


pub async fn run_server() -> anyhow::Result<()> {
    info!("🚀 Initializing Movie Agent MCP Server...");

    let config = MovieAgentConfig::from_env();
    let agent = MovieAgent::new(config).await?;

    info!("✅ Movie Agent MCP Server ready");
    info!(
        "   📍 Neo4j: {} (db={})",
        agent.config().neo4j_uri,
        agent.config().neo4j_database
    );
    info!(
        "   🤖 LLM: {}/{}",
        agent.config().llm_provider,
        agent.config().llm_model
    );
    info!("   🎬 Vector index: {}", agent.config().vector_index);

    let server = MovieAgentMcpServer::new(agent);
    let service = server.serve(stdio()).await?;
    service.waiting().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::UnsafeCypher;

    #[test]
    fn test_client_errors_map_to_invalid_params() {
        let config = MovieAgentError::Config("top_k must be greater than 0".to_string());
        assert_eq!(
            MovieAgentMcpServer::convert_error(config).code,
            ErrorCode::INVALID_PARAMS
        );

        let unsafe_cypher: MovieAgentError = UnsafeCypher::MultipleStatements.into();
        assert_eq!(
            MovieAgentMcpServer::convert_error(unsafe_cypher).code,
            ErrorCode::INVALID_PARAMS
        );
    }

    #[test]
    fn test_collaborator_errors_map_to_internal_error() {
        let err = MovieAgentError::History("write rejected".to_string());
        let mcp = MovieAgentMcpServer::convert_error(err);
        assert_eq!(mcp.code, ErrorCode::INTERNAL_ERROR);
        assert!(mcp.message.contains("write rejected"));
    }

    #[test]
    fn test_generate_cypher_is_described_as_unchecked() {
        let tools = MovieAgentMcpServer::tool_router().list_all();
        let tool = tools.iter().find(|t| t.name == "generate_cypher").unwrap();
        let description = tool.description.as_deref().unwrap();
        assert!(description.contains("not checked"));
        assert!(description.contains("not executed"));
        assert!(!description.contains("read-only"));
    }

    #[test]
    fn test_history_limit_is_optional() {
        let params: SessionHistoryParams =
            serde_json::from_value(json!({"session_id": "s-1"})).unwrap();
        assert_eq!(params.session_id, "s-1");
        assert_eq!(params.limit, None);
    }
}
