use rmcp::{
    model::{CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    schemars::{self, JsonSchema},
    tool, Error as McpError, ServerHandler,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::application::query_service::QueryService;
use crate::domain::rows::Row;
use crate::error::InsightError;

const DEFAULT_SIMILAR_LIMIT: usize = 5;

/// MCP front end over the query pipeline.
#[derive(Clone)]
pub struct QueryHandler {
    query_service: Arc<QueryService>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct UploadRowsArgs {
    #[schemars(description = "Table rows as JSON objects; replaces the previously uploaded table")]
    rows: Vec<Row>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct QueryDataArgs {
    #[schemars(description = "Natural language question about the uploaded sales data")]
    question: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SimilarQuestionsArgs {
    #[schemars(description = "Question to compare against previously answered ones")]
    question: String,
    #[schemars(description = "Optional maximum number of matches (default 5)")]
    limit: Option<usize>,
}

fn json_result<T: Serialize>(value: &T) -> CallToolResult {
    match serde_json::to_string(value) {
        Ok(text) => CallToolResult::success(vec![Content::text(text)]),
        Err(e) => {
            log::error!("Failed to serialize tool output: {}", e);
            CallToolResult::error(vec![Content::text(format!("Failed to serialize response: {}", e))])
        }
    }
}

fn error_result(tool: &str, error: InsightError) -> CallToolResult {
    match &error {
        InsightError::NoData | InsightError::EmptyUpload => log::warn!("{} rejected: {}", tool, error),
        _ => log::error!("{} failed: {}", tool, error),
    }
    CallToolResult::error(vec![Content::text(error.user_message())])
}

#[tool(tool_box)]
impl QueryHandler {
    pub fn new(query_service: Arc<QueryService>) -> Self {
        Self { query_service }
    }

    #[tool(description = "Upload a sales table. Replaces any previously uploaded rows.")]
    async fn upload_rows(&self, #[tool(aggr)] args: UploadRowsArgs) -> Result<CallToolResult, McpError> {
        log::info!("Executing upload_rows with {} rows", args.rows.len());
        Ok(match self.query_service.upload(args.rows).await {
            Ok(inserted) => json_result(&json!({ "rows_inserted": inserted })),
            Err(e) => error_result("upload_rows", e),
        })
    }

    /// Answers a question from the yearly sales aggregates, a data sample and similar past questions.
    #[tool(description = "Ask a natural language question about the uploaded sales data.")]
    async fn query_data(&self, #[tool(aggr)] args: QueryDataArgs) -> Result<CallToolResult, McpError> {
        log::info!("Executing query_data with question: '{}'", args.question);
        Ok(match self.query_service.answer(&args.question).await {
            Ok(answer) => json_result(&json!({ "answer": answer })),
            Err(e) => error_result("query_data", e),
        })
    }

    #[tool(description = "Total sales and share of the grand total per release year.")]
    async fn sales_stats_by_year(&self) -> Result<CallToolResult, McpError> {
        log::info!("Executing sales_stats_by_year");
        Ok(match self.query_service.sales_stats().await {
            Ok(stats) => json_result(&json!({ "stats": stats })),
            Err(e) => error_result("sales_stats_by_year", e),
        })
    }

    #[tool(description = "Previously answered questions most similar to the given one, with scores.")]
    async fn similar_questions(
        &self,
        #[tool(aggr)] args: SimilarQuestionsArgs,
    ) -> Result<CallToolResult, McpError> {
        let limit = args.limit.unwrap_or(DEFAULT_SIMILAR_LIMIT);
        log::info!(
            "Executing similar_questions with question: '{}', limit: {}",
            args.question,
            limit
        );
        Ok(match self.query_service.similar_questions(&args.question, limit).await {
            Ok(matches) => json_result(&matches),
            Err(e) => error_result("similar_questions", e),
        })
    }
}

#[tool(tool_box)]
impl ServerHandler for QueryHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Upload a sales table with upload_rows, then ask questions about it with query_data. \
                 sales_stats_by_year returns the yearly aggregates directly."
                    .into(),
            ),
        }
    }
}
