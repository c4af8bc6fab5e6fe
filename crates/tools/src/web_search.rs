//! Web search tool — queries the Brave Search API.

use async_trait::async_trait;
use patchwright_core::{JsonObject, Tool, ToolContext, ToolError, ToolOutput};
use serde::Deserialize;
use std::fmt::Write as _;
use std::time::Duration;
use tracing::debug;

use crate::args;

const BRAVE_SEARCH_URL: &str = "https://api.search.brave.com/res/v1/web/search";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RESULTS: u32 = 5;
const MAX_RESULTS: u32 = 10;
const EXAMPLE: &str = r#"{"query": "tokio select cancellation", "num_results": 5}"#;

#[derive(Debug, Deserialize)]
struct WebSearchArgs {
    query: String,
    #[serde(default)]
    num_results: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    web: WebResults,
}

#[derive(Debug, Default, Deserialize)]
struct WebResults {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
}

pub struct WebSearchTool {
    api_key: Option<String>,
    endpoint: String,
    client: reqwest::Client,
}

impl WebSearchTool {
    /// A search tool using `api_key`; without one every call explains how to
    /// get a key.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.is_empty()),
            endpoint: BRAVE_SEARCH_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn status_error(&self, status: u16, body: &str) -> ToolError {
        let reason = match status {
            401 => "search API authentication failed (401)\n\nYour API key may be invalid:\n  \
                    - Verify BRAVE_SEARCH_API_KEY in your environment or .env file\n  \
                    - Try generating a new key at https://brave.com/search/api/"
                .to_string(),
            429 => "search rate limit exceeded (429)\n\nYou've reached your search quota.\n  \
                    - Wait for the limit to reset\n  \
                    - Or upgrade your plan at https://brave.com/search/api/"
                .to_string(),
            400 => format!("invalid search query (400): {body}\n\nCheck your query syntax"),
            _ => format!("search API error (status {status}): {body}"),
        };
        ToolError::failed(self.name(), reason)
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the internet using Brave Search API. Returns titles, URLs, and snippets for search results. Use \
         for finding current documentation, error solutions, package versions, recent news, or any information \
         beyond your training data."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query to execute"
                },
                "num_results": {
                    "type": "integer",
                    "description": "Number of results to return (1-10, default 5)",
                    "default": DEFAULT_RESULTS
                }
            },
            "required": ["query"]
        })
    }

    fn display(&self, input: &JsonObject) -> String {
        format!("→ Searching web: \"{}\"", args::truncate(args::str_field(input, "query"), 50))
    }

    async fn execute(&self, input: &JsonObject, _ctx: &ToolContext<'_>) -> Result<ToolOutput, ToolError> {
        let params: WebSearchArgs = args::parse(self.name(), input, EXAMPLE)?;
        args::require_non_empty(self.name(), "query", &params.query, EXAMPLE)?;
        let count = params.num_results.unwrap_or(DEFAULT_RESULTS).clamp(1, MAX_RESULTS);

        let Some(api_key) = self.api_key.as_deref() else {
            return Err(ToolError::failed(
                self.name(),
                "BRAVE_SEARCH_API_KEY is not set.\n\nTo fix this:\n  \
                 1. Sign up for a free API key at https://brave.com/search/api/\n  \
                 2. Add to your .env file: BRAVE_SEARCH_API_KEY=your-key-here",
            ));
        };

        debug!(query = %params.query, count, "Searching the web");
        let count_param = count.to_string();

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", params.query.as_str()), ("count", count_param.as_str())])
            .header("Accept", "application/json")
            .header("X-Subscription-Token", api_key)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                ToolError::failed(self.name(), format!("search request failed: {e}\n\nCheck your internet connection"))
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ToolError::failed(self.name(), format!("failed to read search response: {e}")))?;
        if !status.is_success() {
            return Err(self.status_error(status.as_u16(), &body));
        }

        let parsed: SearchResponse = serde_json::from_str(&body).map_err(|e| {
            ToolError::failed(self.name(), format!("failed to parse search results: {e}\n\nResponse: {body}"))
        })?;
        let results = parsed.web.results;

        if results.is_empty() {
            return Ok(ToolOutput::Text(format!(
                "No results found for '{}'.\n\nSuggestions:\n  - Try different keywords\n  - Check spelling\n  \
                 - Use more general terms\n  - Try removing quotes or special characters",
                params.query
            )));
        }

        let mut out = format!("Found {} results for \"{}\":\n\n", results.len(), params.query);
        for (i, result) in results.iter().enumerate() {
            let _ = writeln!(out, "{}. [{}] - {}", i + 1, result.title, result.url);
            if !result.description.is_empty() {
                let _ = writeln!(out, "   {}", args::truncate(&result.description, 200));
            }
            out.push('\n');
        }
        Ok(ToolOutput::Text(out))
    }
}
