//! Multimodal loader — bring an image into the conversation.
//!
//! Local files are typed by extension, remote files by the response
//! `Content-Type`. The agent embeds the bytes as a base64 image block.

use async_trait::async_trait;
use patchwright_core::{JsonObject, Tool, ToolContext, ToolError, ToolOutput};
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::args;

/// Largest image the Messages API accepts.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const SUPPORTED_MEDIA_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/webp", "image/gif"];
const EXAMPLE: &str = r#"{"path": "./screenshot.png"}"#;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("only image files are currently supported (.jpg, .jpeg, .png, .gif, .webp). Got: '{extension}'")]
    UnsupportedType { extension: String },

    #[error(
        "image too large ({:.1} MB, {size_bytes} bytes). Maximum is 5MB. Try resizing the image or using a different file",
        megabytes(.size_bytes)
    )]
    TooLarge { size_bytes: usize },

    #[error("failed to fetch image from URL '{url}': {reason}\nCheck your internet connection and the URL")]
    Fetch { url: String, reason: String },

    #[error("URL returned status {status}. Check if the URL is correct and accessible: {url}")]
    HttpStatus { url: String, status: u16 },

    #[error(
        "unsupported image type from URL: '{content_type}'. Supported types: image/jpeg, image/png, image/webp, image/gif"
    )]
    UnsupportedContentType { content_type: String },

    #[error("file '{path}' not found. Use list_files or glob to find available files")]
    NotFound { path: String },

    #[error("permission denied reading '{path}'. Check file permissions")]
    PermissionDenied { path: String },

    #[error("failed to read file '{path}': {reason}")]
    Io { path: String, reason: String },
}

fn megabytes(bytes: &usize) -> f64 {
    *bytes as f64 / (1024.0 * 1024.0)
}

/// A validated image ready to embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    pub source: String,
    pub media_type: String,
    pub data: Vec<u8>,
}

impl LoadedImage {
    pub fn size_kb(&self) -> f64 {
        self.data.len() as f64 / 1024.0
    }

    /// Self-describing summary, e.g. `Loaded image ./a.png (image/png, 12.5 KB)`.
    /// This is the tool_result text the model sees next to the image.
    pub fn marker(&self) -> String {
        format!("Loaded image {} ({}, {:.1} KB)", self.source, self.media_type, self.size_kb())
    }
}

impl From<LoadedImage> for ToolOutput {
    fn from(image: LoadedImage) -> Self {
        ToolOutput::Image {
            source: image.source,
            media_type: image.media_type,
            data: image.data,
        }
    }
}

fn is_url(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

/// Media type for a local file extension.
pub fn media_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Load an image from a local path or an http(s) URL.
pub async fn load_image(path: &str) -> Result<LoadedImage, LoadError> {
    if is_url(path) {
        load_remote(path).await
    } else {
        load_local(path).await
    }
}

async fn load_local(path: &str) -> Result<LoadedImage, LoadError> {
    let file = Path::new(path);
    let media_type = media_type_for(file).ok_or_else(|| LoadError::UnsupportedType {
        extension: file
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default(),
    })?;

    let io_error = |e: std::io::Error| match e.kind() {
        ErrorKind::NotFound => LoadError::NotFound { path: path.to_string() },
        ErrorKind::PermissionDenied => LoadError::PermissionDenied { path: path.to_string() },
        _ => LoadError::Io {
            path: path.to_string(),
            reason: e.to_string(),
        },
    };

    let metadata = tokio::fs::metadata(file).await.map_err(io_error)?;
    if metadata.len() > MAX_IMAGE_BYTES as u64 {
        return Err(LoadError::TooLarge {
            size_bytes: metadata.len() as usize,
        });
    }

    let data = tokio::fs::read(file).await.map_err(io_error)?;
    check_size(&data)?;

    Ok(LoadedImage {
        source: path.to_string(),
        media_type: media_type.to_string(),
        data,
    })
}

async fn load_remote(url: &str) -> Result<LoadedImage, LoadError> {
    let fetch_error = |reason: String| LoadError::Fetch {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|e| fetch_error(e.to_string()))?;
    let mut response = client.get(url).send().await.map_err(|e| fetch_error(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(LoadError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let media_type = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    if !SUPPORTED_MEDIA_TYPES.contains(&media_type.as_str()) {
        return Err(LoadError::UnsupportedContentType { content_type });
    }

    if let Some(declared) = response.content_length()
        && declared > MAX_IMAGE_BYTES as u64
    {
        return Err(LoadError::TooLarge {
            size_bytes: declared as usize,
        });
    }

    // Chunked responses carry no length, so the cap is enforced while reading.
    let mut data = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(|e| fetch_error(e.to_string()))? {
        data.extend_from_slice(&chunk);
        check_size(&data)?;
    }
    debug!(url, bytes = data.len(), "Fetched remote image");

    Ok(LoadedImage {
        source: url.to_string(),
        media_type,
        data,
    })
}

fn check_size(data: &[u8]) -> Result<(), LoadError> {
    if data.len() > MAX_IMAGE_BYTES {
        return Err(LoadError::TooLarge { size_bytes: data.len() });
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct IncludeFileArgs {
    path: String,
}

pub struct IncludeFileTool;

#[async_trait]
impl Tool for IncludeFileTool {
    fn name(&self) -> &str {
        "include_file"
    }

    fn description(&self) -> &str {
        "Include a file's contents in the conversation. For images (jpg, png, gif, webp), this sends the image to \
         the model for vision analysis. Can load from local filesystem or remote URLs. Use this tool when the user \
         asks you to look at, analyze, or work with a specific image."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path (local or URL). Examples: './screenshot.png', '/tmp/diagram.jpg', 'https://example.com/image.png'"
                }
            },
            "required": ["path"]
        })
    }

    fn display(&self, input: &JsonObject) -> String {
        format!("→ Including file: {}", args::str_field(input, "path"))
    }

    async fn execute(&self, input: &JsonObject, _ctx: &ToolContext<'_>) -> Result<ToolOutput, ToolError> {
        let params: IncludeFileArgs = args::parse(self.name(), input, EXAMPLE)?;
        args::require_non_empty(self.name(), "path", &params.path, EXAMPLE)?;

        let image = load_image(&params.path)
            .await
            .map_err(|e| ToolError::failed(self.name(), e.to_string()))?;
        info!("{}", image.marker());
        Ok(image.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{TestContext, input};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    #[tokio::test]
    async fn loads_local_png() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("shot.PNG");
        std::fs::write(&file, PNG_HEADER).unwrap();

        let image = load_image(file.to_str().unwrap()).await.unwrap();
        assert_eq!(image.media_type, "image/png");
        assert_eq!(image.data, PNG_HEADER);
        assert!(image.marker().contains("image/png"));
    }

    #[tokio::test]
    async fn accepts_four_mib_and_rejects_six() {
        let dir = tempfile::tempdir().unwrap();
        let ok = dir.path().join("ok.jpg");
        std::fs::write(&ok, vec![7u8; 4 * 1024 * 1024]).unwrap();
        assert_eq!(load_image(ok.to_str().unwrap()).await.unwrap().data.len(), 4 * 1024 * 1024);

        let big = dir.path().join("big.jpg");
        std::fs::write(&big, vec![7u8; 6 * 1024 * 1024]).unwrap();
        match load_image(big.to_str().unwrap()).await {
            Err(LoadError::TooLarge { size_bytes }) => assert_eq!(size_bytes, 6 * 1024 * 1024),
            other => panic!("expected TooLarge, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejects_non_images_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("notes.txt");
        std::fs::write(&text, "hello").unwrap();
        assert!(matches!(
            load_image(text.to_str().unwrap()).await,
            Err(LoadError::UnsupportedType { ref extension }) if extension == ".txt"
        ));

        let missing = dir.path().join("gone.png");
        assert!(matches!(
            load_image(missing.to_str().unwrap()).await,
            Err(LoadError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn remote_image_uses_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/diagram"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/webp")
                    .set_body_bytes(vec![1u8, 2, 3]),
            )
            .mount(&server)
            .await;

        let image = load_image(&format!("{}/diagram", server.uri())).await.unwrap();
        assert_eq!(image.media_type, "image/webp");
        assert_eq!(image.data, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn remote_errors_are_distinct() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .set_body_string("<html></html>"),
            )
            .mount(&server)
            .await;

        assert!(matches!(
            load_image(&format!("{}/missing.png", server.uri())).await,
            Err(LoadError::HttpStatus { status: 404, .. })
        ));
        assert!(matches!(
            load_image(&format!("{}/page.png", server.uri())).await,
            Err(LoadError::UnsupportedContentType { .. })
        ));
        assert!(matches!(
            load_image("http://127.0.0.1:9/unreachable.png").await,
            Err(LoadError::Fetch { .. })
        ));
    }

    #[tokio::test]
    async fn chunked_remote_image_stops_at_the_cap() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // wiremock always sends Content-Length, so serve a chunked body by hand.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            let head = "HTTP/1.1 200 OK\r\ncontent-type: image/png\r\ntransfer-encoding: chunked\r\n\r\n";
            if socket.write_all(head.as_bytes()).await.is_err() {
                return 0;
            }
            let chunk = vec![0u8; 1024 * 1024];
            let mut sent = 0;
            for _ in 0..40 {
                let frame_head = format!("{:x}\r\n", chunk.len());
                if socket.write_all(frame_head.as_bytes()).await.is_err()
                    || socket.write_all(&chunk).await.is_err()
                    || socket.write_all(b"\r\n").await.is_err()
                {
                    break;
                }
                sent += 1;
            }
            let _ = socket.write_all(b"0\r\n\r\n").await;
            sent
        });

        match load_image(&format!("http://{addr}/huge.png")).await {
            Err(LoadError::TooLarge { size_bytes }) => {
                assert!(size_bytes > MAX_IMAGE_BYTES);
                assert!(size_bytes <= MAX_IMAGE_BYTES + 1024 * 1024, "read {size_bytes} bytes");
            }
            other => panic!("expected TooLarge, got {other:?}"),
        }
        server.abort();
    }

    #[tokio::test]
    async fn tool_result_text_is_the_marker() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("b.png");
        std::fs::write(&file, PNG_HEADER).unwrap();
        let path = file.to_str().unwrap();

        let marker = load_image(path).await.unwrap().marker();
        let harness = TestContext::new();
        let output = IncludeFileTool
            .execute(&input(serde_json::json!({"path": path})), &harness.ctx())
            .await
            .unwrap();
        assert_eq!(output.summary(), marker);
        assert!(marker.contains(path));
    }

    #[tokio::test]
    async fn tool_returns_image_output() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.gif");
        std::fs::write(&file, b"GIF89a").unwrap();

        let harness = TestContext::new();
        let output = IncludeFileTool
            .execute(&input(serde_json::json!({"path": file.to_str().unwrap()})), &harness.ctx())
            .await
            .unwrap();
        assert_eq!(
            output,
            ToolOutput::Image {
                source: file.to_str().unwrap().to_string(),
                media_type: "image/gif".into(),
                data: b"GIF89a".to_vec()
            }
        );
        assert_eq!(
            IncludeFileTool.display(&input(serde_json::json!({"path": "x.png"}))),
            "→ Including file: x.png"
        );
    }
}
