use std::{sync::Arc, time::Duration};

use rmcp::{
    ServerHandler,
    ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult,
        Content,
        Implementation,
        ServerCapabilities,
        ServerInfo,
    },
    tool,
    tool_handler,
    tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::{
    engine::{SearchEngine, SearchResponse},
    error::{self, Error},
    query::{DEFAULT_LIMIT, Query, ScoredResult, SearchType},
    refresher::spawn_refresher,
};

#[derive(Clone)]
pub struct DocsiftMcpServer {
    engine: Arc<SearchEngine>,
    tool_router: ToolRouter<Self>,
}

impl DocsiftMcpServer {
    pub fn new(engine: Arc<SearchEngine>) -> Self {
        Self {
            engine,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router(router = tool_router)]
impl DocsiftMcpServer {
    /// Keyword and fuzzy search over the documentation tree.
    #[tool(
        name = "docsift_search",
        description = "Search the documentation tree by file content, file name, or both. Tolerates typos and acronyms when fuzzy matching is on."
    )]
    pub async fn docsift_search(
        &self,
        params: Parameters<SearchParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;
        let limit = match params.limit {
            Some(limit) => usize::try_from(limit).map_err(|_| {
                rmcp::ErrorData::invalid_params("limit must be positive", None)
            })?,
            None => DEFAULT_LIMIT,
        };

        let mut query = Query::new(params.query)
            .search_type(params.search_type.unwrap_or_default())
            .extensions(params.extensions.unwrap_or_default())
            .path_prefix(params.path)
            .limit(limit)
            .fuzzy(params.fuzzy.unwrap_or(true));
        if let Some(threshold) = params.fuzzy_threshold {
            query = query.fuzzy_threshold(threshold);
        }

        let engine = Arc::clone(&self.engine);
        let text = query.text.clone();
        let response =
            tokio::task::spawn_blocking(move || engine.search(&query))
                .await
                .map_err(|e| mcp_error("search task failed", e))?
                .map_err(|e| match e {
                    Error::InvalidQuery(message) => {
                        rmcp::ErrorData::invalid_params(message, None)
                    }
                    other => mcp_error("search failed", other),
                })?;

        let summary = format_search_summary(&response, &text);
        let structured = serde_json::to_value(SearchToolResponse {
            query: text,
            result_count: response.results.len(),
            took_ms: response.took_ms,
            generation: response.generation,
            results: response.results,
        })
        .map_err(|e| mcp_error("failed to serialize search results", e))?;

        Ok(tool_result(summary, Some(structured), false))
    }

    /// Rebuild the index from disk.
    #[tool(
        name = "docsift_rebuild",
        description = "Re-read every indexable file under the documentation root and rebuild the index."
    )]
    pub async fn docsift_rebuild(
        &self,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let engine = Arc::clone(&self.engine);
        let outcome =
            tokio::task::spawn_blocking(move || engine.rebuild_index())
                .await
                .map_err(|e| mcp_error("rebuild task failed", e))?;

        match outcome {
            Ok(stats) => {
                let summary = format!(
                    "Indexed {} files ({} tokens) in {} ms; {} failed",
                    stats.total_files,
                    stats.total_tokens,
                    stats.elapsed_ms,
                    stats.failed_files
                );
                let structured = serde_json::to_value(stats).map_err(|e| {
                    mcp_error("failed to serialize rebuild stats", e)
                })?;
                Ok(tool_result(summary, Some(structured), false))
            }
            Err(Error::RebuildInProgress) => Ok(tool_result(
                "A rebuild is already in progress; try again later.".to_string(),
                None,
                true,
            )),
            Err(e) => Err(mcp_error("rebuild failed", e)),
        }
    }

    /// Report index size and freshness.
    #[tool(
        name = "docsift_status",
        description = "Show whether the index is built, how many files and tokens it holds, and when it was last built."
    )]
    pub async fn docsift_status(
        &self,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let status = self.engine.index_status();
        let summary = format!(
            "{} files, {} tokens, generation {}{}",
            status.total_files,
            status.total_tokens,
            status.generation,
            if status.rebuilding { " (rebuilding)" } else { "" }
        );
        let structured = serde_json::to_value(&status)
            .map_err(|e| mcp_error("failed to serialize status", e))?;
        Ok(tool_result(summary, Some(structured), false))
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for DocsiftMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(ServerCapabilities::builder().enable_tools().build())
            .with_server_info(
                Implementation::new("docsift", env!("CARGO_PKG_VERSION")).with_title("docsift MCP"),
            )
            .with_instructions(
                "Use docsift_search to find documentation files by content or name. Narrow with extensions or a path prefix when possible.",
            )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    /// Search query string.
    pub query: String,
    /// Match against file content, file names, or both (default: both).
    pub search_type: Option<SearchType>,
    /// Only return files with these extensions (e.g. ["md", "txt"]).
    pub extensions: Option<Vec<String>>,
    /// Only return files below this directory, relative to the root.
    pub path: Option<String>,
    /// Maximum number of results (default: 50, at most 200).
    pub limit: Option<i64>,
    /// Enable typo-tolerant matching (default: true).
    pub fuzzy: Option<bool>,
    /// Minimum similarity for fuzzy matches, between 0 and 1 (default: 0.7).
    pub fuzzy_threshold: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchToolResponse {
    query: String,
    result_count: usize,
    took_ms: u64,
    generation: u64,
    results: Vec<ScoredResult>,
}

fn tool_result(
    summary: String,
    structured: Option<serde_json::Value>,
    is_error: bool,
) -> CallToolResult {
    let mut result = CallToolResult::success(vec![Content::text(summary)]);
    result.structured_content = structured;
    result.is_error = Some(is_error);
    result.meta = None;
    result
}

fn format_search_summary(response: &SearchResponse, query: &str) -> String {
    let results = &response.results;
    if results.is_empty() {
        return format!("No results found for \"{query}\"");
    }

    let mut lines = Vec::with_capacity(results.len() + 1);
    let suffix = if results.len() == 1 { "" } else { "s" };
    lines.push(format!(
        "Found {} result{} for \"{query}\" in {} ms:",
        results.len(),
        suffix,
        response.took_ms
    ));

    for item in results {
        lines.push(format!(
            "{} {:.3} {} ({})",
            item.file_id, item.score, item.path, item.match_kind
        ));
    }

    lines.join("\n")
}

fn mcp_error(message: &str, error: impl std::fmt::Display) -> rmcp::ErrorData {
    rmcp::ErrorData::internal_error(
        message.to_string(),
        Some(json!({ "error": error.to_string() })),
    )
}

/// Build the index, then serve MCP over stdio until the client disconnects.
///
/// With `refresh_every`, a background task keeps the index in sync with the
/// tree while serving.
pub fn run_mcp(
    engine: Arc<SearchEngine>,
    refresh_every: Option<Duration>,
) -> error::Result<()> {
    let stats = engine.rebuild_index()?;
    info!(
        files = stats.total_files,
        elapsed_ms = stats.elapsed_ms,
        "initial index built"
    );

    let server = DocsiftMcpServer::new(Arc::clone(&engine));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            Error::Config(format!("failed to start tokio runtime: {e}"))
        })?;

    runtime.block_on(async move {
        let refresher =
            refresh_every.map(|every| spawn_refresher(engine, every));

        let transport = rmcp::transport::stdio();
        let running = server.serve(transport).await.map_err(|e| {
            Error::Config(format!("MCP server initialization failed: {e}"))
        })?;
        let waited = running
            .waiting()
            .await
            .map_err(|e| Error::Config(format!("MCP server error: {e}")));

        if let Some(handle) = refresher {
            handle.abort();
        }
        waited.map(|_| ())
    })
}
