//! Request dispatch and the framed stdio loop

use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::backend::ScrapeBackend;
use super::framing::{FramingError, read_message, write_message};
use super::protocol::{
    CallToolParams, McpError, McpMethod, McpRequest, McpResponse, McpToolResult, PROTOCOL_VERSION,
    RequestId,
};
use super::tools::{
    BATCH_TOOL, BatchToolArgs, EXTRACT_TOOL, ExtractToolArgs, SCRAPE_TOOL, ScrapeToolArgs,
    render_batch, render_extract, render_scrape, tool_definitions,
};
use crate::actions::validate_actions;

/// Tool server over any backend
pub struct McpServer<B> {
    backend: B,
}

impl<B: ScrapeBackend> McpServer<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Serve framed messages until EOF or cancellation
    pub async fn serve<R, W>(
        &self,
        mut reader: R,
        mut writer: W,
        cancel: CancellationToken,
    ) -> Result<(), FramingError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("Tool server ready");

        loop {
            let body = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Tool server cancelled");
                    break;
                }
                message = read_message(&mut reader) => match message? {
                    Some(body) => body,
                    None => {
                        info!("Input closed, stopping tool server");
                        break;
                    }
                },
            };

            let response = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Tool server cancelled during a request");
                    break;
                }
                response = self.handle_bytes(&body) => response,
            };

            if let Some(response) = response {
                let encoded = serde_json::to_vec(&response)
                    .map_err(|e| FramingError::Io(std::io::Error::other(e)))?;
                write_message(&mut writer, &encoded).await?;
            }
        }

        Ok(())
    }

    /// Handle one raw message; notifications produce no response
    pub async fn handle_bytes(&self, body: &[u8]) -> Option<McpResponse> {
        let value: Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(e) => {
                warn!("Unparseable message: {}", e);
                return Some(McpResponse::error(None, McpError::parse_error(e)));
            }
        };

        let id = value
            .get("id")
            .cloned()
            .and_then(|id| serde_json::from_value::<RequestId>(id).ok());

        match serde_json::from_value::<McpRequest>(value) {
            Ok(request) => self.handle(request).await,
            Err(e) => Some(McpResponse::error(id, McpError::invalid_request(e))),
        }
    }

    pub async fn handle(&self, request: McpRequest) -> Option<McpResponse> {
        let method = McpMethod::parse(&request.method);

        if request.is_notification() || method == Some(McpMethod::Initialized) {
            debug!("Notification {}", request.method);
            return None;
        }

        debug!("Request {}", request.method);
        let id = request.id.clone();
        let outcome = match method {
            Some(McpMethod::Initialize) => Ok(initialize_result(self.backend.server_name())),
            Some(McpMethod::ListTools) => Ok(json!({ "tools": tool_definitions() })),
            Some(McpMethod::CallTool) => self.call_tool(request.params).await,
            Some(McpMethod::Ping) => Ok(json!({})),
            Some(McpMethod::Initialized) | None => Err(McpError::method_not_found(&request.method)),
        };

        Some(match outcome {
            Ok(result) => McpResponse::success(id, result),
            Err(error) => McpResponse::error(id, error),
        })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, McpError> {
        let params: CallToolParams =
            serde_json::from_value(params.unwrap_or_else(|| json!({})))
                .map_err(McpError::invalid_params)?;
        let arguments = params.arguments.unwrap_or_else(|| json!({}));

        let result = match params.name.as_str() {
            SCRAPE_TOOL => {
                let args: ScrapeToolArgs =
                    serde_json::from_value(arguments).map_err(McpError::invalid_params)?;
                validate_actions(&args.actions).map_err(McpError::invalid_params)?;
                info!("{} {}", SCRAPE_TOOL, args.url);
                match self.backend.scrape(args.clone()).await {
                    Ok(result) => render_scrape(&result),
                    Err(e) => McpToolResult::error(format!("Error scraping {}: {}", args.url, e)),
                }
            }
            BATCH_TOOL => {
                let args: BatchToolArgs =
                    serde_json::from_value(arguments).map_err(McpError::invalid_params)?;
                info!("{} of {} URLs", BATCH_TOOL, args.urls.len());
                let urls = args.urls.clone();
                match self.backend.batch(args).await {
                    Ok(results) => render_batch(&urls, &results),
                    Err(e) => McpToolResult::error(format!("Error: {e}")),
                }
            }
            EXTRACT_TOOL => {
                let args: ExtractToolArgs =
                    serde_json::from_value(arguments).map_err(McpError::invalid_params)?;
                info!("{} {}", EXTRACT_TOOL, args.url);
                match self.backend.scrape(args.to_scrape_args()).await {
                    Ok(result) => render_extract(&result),
                    Err(e) => McpToolResult::error(format!("Error: {e}")),
                }
            }
            other => return Err(McpError::unknown_tool(other)),
        };

        serde_json::to_value(result).map_err(|e| McpError::new(McpError::INTERNAL_ERROR, e.to_string()))
    }
}

fn initialize_result(server_name: &str) -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": server_name,
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}
