//! Browse tool — fetch a web page and turn it into readable text.
//!
//! With a `prompt`, the page text is handed to the model in a separate,
//! tool-less request and only the extracted answer is returned.

use async_trait::async_trait;
use patchwright_core::{JsonObject, Message, ProviderRequest, Tool, ToolContext, ToolError, ToolOutput};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::args;
use crate::html::HtmlText;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_REDIRECTS: usize = 10;
const DEFAULT_MAX_KB: u64 = 500;
const MAX_KB: u64 = 1000;
/// Extraction prompts above this many bytes have the page cut to
/// `EXTRACTION_PAGE_LIMIT`.
const EXTRACTION_PROMPT_LIMIT: usize = 100_000;
const EXTRACTION_PAGE_LIMIT: usize = 90_000;
const EXTRACTION_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant. Extract the requested information from the webpage content provided.";
const USER_AGENT: &str = concat!("patchwright/", env!("CARGO_PKG_VERSION"));
const EXAMPLE: &str = r#"{"url": "https://docs.rs/tokio", "prompt": "What are the main modules?"}"#;

#[derive(Debug, Deserialize)]
struct BrowseArgs {
    url: String,
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    max_length: Option<u64>,
}

pub struct BrowseTool {
    client: reqwest::Client,
    html: HtmlText,
}

impl BrowseTool {
    pub fn new() -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ToolError::failed("browse", format!("failed to create HTTP client: {e}")))?;
        let html = HtmlText::new().map_err(|e| ToolError::failed("browse", format!("bad HTML selector: {e}")))?;
        Ok(Self { client, html })
    }

    async fn fetch(&self, url: &reqwest::Url, max_kb: u64) -> Result<String, ToolError> {
        let host = url.host_str().unwrap_or_default().to_string();
        let mut response = self
            .client
            .get(url.clone())
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    format!(
                        "request timed out after {} seconds. The server may be slow or unreachable.\n\nURL: {url}",
                        REQUEST_TIMEOUT.as_secs()
                    )
                } else if e.is_redirect() {
                    format!("stopped after {MAX_REDIRECTS} redirects.\n\nURL: {url}")
                } else if e.is_connect() {
                    format!("could not connect to '{host}'. Check the URL.\n\nError: {e}")
                } else {
                    format!("network error: {e}\n\nCheck your internet connection")
                };
                ToolError::failed(self.name(), reason)
            })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Err(ToolError::failed(self.name(), status_guidance(status, url.as_str())));
        }

        let max_bytes = max_kb * 1024;
        if let Some(length) = response.content_length()
            && length > max_bytes
        {
            return Err(ToolError::failed(
                self.name(),
                format!(
                    "page too large ({} KB). Max allowed: {max_kb} KB.\n\nIncrease max_length or try a different page.\n\nURL: {url}",
                    length / 1024
                ),
            ));
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_none_or(|ct| ct.contains("html") || ct.contains("xml"));

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ToolError::failed(self.name(), format!("failed to read page content: {e}")))?
        {
            body.extend_from_slice(&chunk);
            if body.len() as u64 > max_bytes {
                return Err(ToolError::failed(
                    self.name(),
                    format!(
                        "page content exceeds {max_kb} KB. Increase max_length or try a different page.\n\nURL: {url}"
                    ),
                ));
            }
        }

        let raw = String::from_utf8_lossy(&body);
        let text = if is_html { self.html.convert(&raw) } else { raw.trim().to_string() };
        if text.is_empty() {
            return Err(ToolError::failed(
                self.name(),
                format!(
                    "page returned no readable content. It may be:\n  - A JavaScript-heavy page (requires browser rendering)\n  \
                     - An empty page\n  - A redirect page\n\nURL: {url}"
                ),
            ));
        }
        Ok(text)
    }
}

fn status_guidance(status: u16, url: &str) -> String {
    match status {
        404 => format!("page not found (404): {url}\n\nThe URL may be incorrect or the page may have been removed"),
        403 => format!("access denied (403). The page may require authentication or permissions.\n\nURL: {url}"),
        401 => format!("authentication required (401). The page requires login credentials.\n\nURL: {url}"),
        429 => format!("rate limit exceeded (429). The server is throttling requests.\n\nURL: {url}\n\nTry again later"),
        500..=599 => format!("server error ({status}). The server is experiencing problems.\n\nURL: {url}\n\nTry again later"),
        _ => format!("HTTP error {status}\n\nURL: {url}"),
    }
}

/// The extraction request text, shortening the page if the whole prompt
/// would be too long.
fn extraction_prompt(page: &str, request: &str) -> String {
    let prompt = format!("Given this webpage content:\n\n{page}\n\nUser request: {request}");
    if prompt.len() <= EXTRACTION_PROMPT_LIMIT {
        return prompt;
    }
    let mut cut = EXTRACTION_PAGE_LIMIT.min(page.len());
    while !page.is_char_boundary(cut) {
        cut -= 1;
    }
    format!(
        "Given this webpage content:\n\n{}\n\n[Content truncated to fit context]\n\nUser request: {request}",
        &page[..cut]
    )
}

#[async_trait]
impl Tool for BrowseTool {
    fn name(&self) -> &str {
        "browse"
    }

    fn description(&self) -> &str {
        "Fetch a URL and convert HTML to readable text. Optionally extract specific information using AI \
         processing. Use for reading documentation pages, following up on search results, or extracting specific \
         information from web pages."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to fetch (HTTP/HTTPS)"
                },
                "prompt": {
                    "type": "string",
                    "description": "Optional: What to extract/summarize from the page. If not provided, returns the full converted text. Example: 'List all tutorial sections' or 'What are the main features?'"
                },
                "max_length": {
                    "type": "integer",
                    "description": "Maximum content length in KB (default 500, max 1000)",
                    "default": DEFAULT_MAX_KB
                }
            },
            "required": ["url"]
        })
    }

    fn display(&self, input: &JsonObject) -> String {
        let url = args::str_field(input, "url");
        match args::str_field(input, "prompt") {
            "" => format!("→ Browsing: {url}"),
            prompt => format!("→ Browsing: {url} (extract: \"{}\")", args::truncate(prompt, 40)),
        }
    }

    async fn execute(&self, input: &JsonObject, ctx: &ToolContext<'_>) -> Result<ToolOutput, ToolError> {
        let params: BrowseArgs = args::parse(self.name(), input, EXAMPLE)?;
        args::require_non_empty(self.name(), "url", &params.url, EXAMPLE)?;
        let max_kb = params.max_length.unwrap_or(DEFAULT_MAX_KB).clamp(1, MAX_KB);

        let url = reqwest::Url::parse(&params.url)
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .ok_or_else(|| ToolError::InvalidArguments {
                tool_name: self.name().to_string(),
                reason: format!("invalid URL format. Must start with http:// or https://. Provided: {}", params.url),
                example: EXAMPLE.to_string(),
            })?;

        debug!(url = %url, max_kb, "Fetching page");
        let page = self.fetch(&url, max_kb).await?;

        let Some(request) = params.prompt.filter(|p| !p.is_empty()) else {
            return Ok(ToolOutput::Text(page));
        };

        let extraction = ProviderRequest::new(
            EXTRACTION_SYSTEM_PROMPT,
            vec![Message::user(extraction_prompt(&page, &request))],
            Vec::new(),
        );
        let response = ctx
            .provider
            .complete(extraction)
            .await
            .map_err(|e| ToolError::failed(self.name(), format!("failed to process page with AI: {e}")))?;

        let answer = Message::assistant(response.content).joined_text();
        if answer.is_empty() {
            return Ok(ToolOutput::Text(page));
        }
        Ok(ToolOutput::Text(answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{TestContext, input};
    use patchwright_core::ContentBlock;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Tokio &amp; Friends</title><style>body { color: red; }</style></head>
<body>
<script>console.log("hidden");</script>
<h1>Getting started</h1>
<p>Tokio is an <b>asynchronous</b> runtime.</p>
<ul><li>Fast</li><li>Reliable</li></ul>
<p>Read the <a href="https://tokio.rs/tokio/tutorial">tutorial</a>.</p>
<!-- a comment -->
</body>
</html>"#;

    async fn serve(server: &MockServer, route: &str, template: ResponseTemplate) {
        Mock::given(method("GET")).and(path(route)).respond_with(template).mount(server).await;
    }

    fn html(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html; charset=utf-8")
    }

    #[test]
    fn html_conversion_keeps_structure() {
        let text = HtmlText::new().unwrap().convert(PAGE);
        assert!(text.starts_with("Title: Tokio & Friends"), "{text}");
        assert!(text.contains("# Getting started"));
        assert!(text.contains("Tokio is an asynchronous runtime."));
        assert!(text.contains("- Fast\n- Reliable"));
        assert!(text.contains("[tutorial](https://tokio.rs/tokio/tutorial)"));
        assert!(!text.contains("console.log"));
        assert!(!text.contains("color: red"));
        assert!(!text.contains("a comment"));
        assert!(!text.contains("\n\n\n"));
    }

    #[tokio::test]
    async fn returns_page_text_without_prompt() {
        let server = MockServer::start().await;
        serve(&server, "/docs", html(PAGE)).await;

        let harness = TestContext::new();
        let output = BrowseTool::new()
            .unwrap()
            .execute(&input(serde_json::json!({"url": format!("{}/docs", server.uri())})), &harness.ctx())
            .await
            .unwrap();
        assert!(output.as_text().unwrap().contains("# Getting started"));
        assert!(harness.provider.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn prompt_asks_the_model_without_tools() {
        let server = MockServer::start().await;
        serve(&server, "/docs", html(PAGE)).await;

        let harness = TestContext::with_reply("Two features: fast and reliable.");
        let output = BrowseTool::new()
            .unwrap()
            .execute(
                &input(serde_json::json!({
                    "url": format!("{}/docs", server.uri()),
                    "prompt": "List the features"
                })),
                &harness.ctx(),
            )
            .await
            .unwrap();
        assert_eq!(output.as_text(), Some("Two features: fast and reliable."));

        let requests = harness.provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].system, EXTRACTION_SYSTEM_PROMPT);
        assert!(requests[0].tools.is_empty());
        let ContentBlock::Text { text } = &requests[0].messages[0].content[0] else {
            panic!("expected a text block");
        };
        assert!(text.starts_with("Given this webpage content:"));
        assert!(text.ends_with("User request: List the features"));
    }

    #[tokio::test]
    async fn empty_model_answer_falls_back_to_page() {
        let server = MockServer::start().await;
        serve(&server, "/docs", html(PAGE)).await;

        let harness = TestContext::new();
        let output = BrowseTool::new()
            .unwrap()
            .execute(
                &input(serde_json::json!({"url": format!("{}/docs", server.uri()), "prompt": "anything"})),
                &harness.ctx(),
            )
            .await
            .unwrap();
        assert!(output.as_text().unwrap().contains("# Getting started"));
    }

    #[tokio::test]
    async fn not_found_guidance() {
        let server = MockServer::start().await;
        serve(&server, "/gone", ResponseTemplate::new(404)).await;

        let harness = TestContext::new();
        let err = BrowseTool::new()
            .unwrap()
            .execute(&input(serde_json::json!({"url": format!("{}/gone", server.uri())})), &harness.ctx())
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("page not found (404)"));
    }

    #[tokio::test]
    async fn oversized_page_is_refused() {
        let server = MockServer::start().await;
        serve(&server, "/big", html(&"a".repeat(4096))).await;

        let harness = TestContext::new();
        let err = BrowseTool::new()
            .unwrap()
            .execute(
                &input(serde_json::json!({"url": format!("{}/big", server.uri()), "max_length": 1})),
                &harness.ctx(),
            )
            .await
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("page too large") || text.contains("exceeds 1 KB"), "{text}");
    }

    #[tokio::test]
    async fn page_of_exactly_the_limit_is_accepted() {
        let server = MockServer::start().await;
        let body = "b".repeat(1024);
        serve(&server, "/edge", ResponseTemplate::new(200).set_body_raw(body.clone(), "text/plain")).await;

        let harness = TestContext::new();
        let output = BrowseTool::new()
            .unwrap()
            .execute(
                &input(serde_json::json!({"url": format!("{}/edge", server.uri()), "max_length": 1})),
                &harness.ctx(),
            )
            .await
            .unwrap();
        assert_eq!(output.as_text(), Some(body.as_str()));
    }

    #[tokio::test]
    async fn empty_page_is_an_error() {
        let server = MockServer::start().await;
        serve(&server, "/blank", html("<html><head><title>x</title></head><body><script>app()</script></body></html>")).await;

        let harness = TestContext::new();
        let err = BrowseTool::new()
            .unwrap()
            .execute(&input(serde_json::json!({"url": format!("{}/blank", server.uri())})), &harness.ctx())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no readable content"));
    }

    #[tokio::test]
    async fn rejects_non_http_urls() {
        let harness = TestContext::new();
        let result = BrowseTool::new()
            .unwrap()
            .execute(&input(serde_json::json!({"url": "file:///etc/passwd"})), &harness.ctx())
            .await;
        assert!(matches!(result, Err(ToolError::InvalidArguments { .. })));
    }

    #[test]
    fn long_pages_are_cut_for_extraction() {
        let page = "é".repeat(60_000);
        let prompt = extraction_prompt(&page, "summarize");
        assert!(prompt.contains("[Content truncated to fit context]"));
        assert!(prompt.len() < EXTRACTION_PROMPT_LIMIT);
        assert!(prompt.ends_with("User request: summarize"));
    }

    #[test]
    fn display_with_prompt() {
        let tool = BrowseTool::new().unwrap();
        assert_eq!(
            tool.display(&input(serde_json::json!({"url": "https://a.dev", "prompt": "p".repeat(50)}))),
            format!("→ Browsing: https://a.dev (extract: \"{}...\")", "p".repeat(37))
        );
    }
}
