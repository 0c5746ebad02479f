use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use firescrape::mcp::protocol::McpRequest;
use firescrape::mcp::tools::{BatchToolArgs, ScrapeToolArgs};
use firescrape::mcp::{
    BackendError, McpServer, REMOTE_SERVER_NAME, RemoteBackend, SERVER_NAME, ScrapeBackend,
};

fn backend(server: &MockServer) -> RemoteBackend {
    RemoteBackend::new(format!("{}/", server.uri()), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn scrape_posts_tool_arguments_and_parses_the_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/scrape"))
        .and(body_partial_json(json!({ "url": "https://example.com", "onlyMainContent": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "url": "https://example.com",
            "metadata": { "title": "Example", "statusCode": 200 },
            "markdown": "# Example\n\nBody"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = backend(&server)
        .scrape(ScrapeToolArgs::new("https://example.com"))
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.title(), Some("Example"));
    assert_eq!(result.metadata.status_code, Some(200));
    assert_eq!(result.markdown.as_deref(), Some("# Example\n\nBody"));
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/scrape"))
        .respond_with(ResponseTemplate::new(502).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let err = backend(&server)
        .scrape(ScrapeToolArgs::new("https://example.com"))
        .await
        .unwrap_err();

    match err {
        BackendError::Status { status, body } => {
            assert_eq!(status, 502);
            assert_eq!(body, "upstream down");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn short_batch_response_is_padded_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                { "success": true, "url": "https://a.dev", "markdown": "A" }
            ]
        })))
        .mount(&server)
        .await;

    let args: BatchToolArgs = serde_json::from_value(json!({
        "urls": ["https://a.dev", "https://b.dev", "https://c.dev"]
    }))
    .unwrap();
    let results = backend(&server).batch(args).await.unwrap();

    assert_eq!(results.len(), 3);
    assert!(results[0].success);
    assert!(!results[1].success);
    assert_eq!(results[1].url, "https://b.dev");
    assert_eq!(results[2].url, "https://c.dev");
}

#[tokio::test]
async fn unreadable_body_is_an_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/batch"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let args: BatchToolArgs = serde_json::from_value(json!({ "urls": ["https://a.dev"] })).unwrap();
    let err = backend(&server).batch(args).await.unwrap_err();

    assert!(matches!(err, BackendError::InvalidResponse(_)));
}

#[tokio::test]
async fn transport_failures_surface_as_tool_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/scrape"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let tool_server = McpServer::new(backend(&server));
    let request = McpRequest::new(1, "tools/call").with_params(json!({
        "name": "firescrape_scrape",
        "arguments": { "url": "https://example.com" }
    }));
    let response = tool_server.handle(request).await.unwrap();

    assert!(response.error.is_none());
    let result = response.result.unwrap();
    assert_eq!(result["isError"], true);
    let text = result["content"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("Error scraping https://example.com:"), "{text}");
    assert!(text.contains("500"));
}

#[tokio::test]
async fn forwarding_server_identifies_itself_as_remote() {
    let server = MockServer::start().await;
    let tool_server = McpServer::new(backend(&server));

    let response = tool_server
        .handle(McpRequest::new(1, "initialize").with_params(json!({})))
        .await
        .unwrap();

    let result = response.result.unwrap();
    assert_eq!(result["serverInfo"]["name"], REMOTE_SERVER_NAME);
    assert_ne!(REMOTE_SERVER_NAME, SERVER_NAME);
}
