//! Stdio tool server
//!
//! JSON-RPC 2.0 over `Content-Length` framed stdin/stdout. The same front end
//! runs over the in-process scraper or a remote scrape API.

mod backend;
pub mod framing;
pub mod protocol;
mod server;
pub mod tools;

pub use backend::{BackendError, LocalBackend, RemoteBackend, ScrapeBackend};
pub use server::McpServer;

/// `serverInfo.name` of the in-process server
pub const SERVER_NAME: &str = "firescrape";

/// `serverInfo.name` when forwarding to a scrape API
pub const REMOTE_SERVER_NAME: &str = "firescrape-remote";

use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

/// Serve on stdin/stdout until stdin closes or `cancel` fires
pub async fn serve_stdio<B: ScrapeBackend>(
    backend: B,
    cancel: CancellationToken,
) -> Result<(), framing::FramingError> {
    let reader = BufReader::new(tokio::io::stdin());
    let writer = tokio::io::stdout();
    McpServer::new(backend).serve(reader, writer, cancel).await
}
