//! Stdio serve loop: reads one JSON-RPC request per line from stdin,
//! dispatches it, writes one response per line to stdout. All diagnostic
//! logging goes to stderr so it never interleaves with the protocol stream.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, warn};

use crate::broker::BrokerSession;
use crate::jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, error_codes};
use crate::session::SessionState;

/// Runs until stdin closes (EOF) or the session is explicitly closed.
/// Blocks the calling task; callers typically `tokio::spawn` this.
pub async fn serve_stdio(session: Arc<BrokerSession>) -> std::io::Result<()> {
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(stdin).lines();

    loop {
        if session.state() == SessionState::Closed {
            break;
        }

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = handle_line(&session, trimmed).await;
        if let Some(response) = response {
            let serialized = serde_json::to_string(&response).expect("JsonRpcResponse always serializes");
            stdout.write_all(serialized.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
    }

    debug!("stdio serve loop exiting");
    Ok(())
}

/// Parses and dispatches a single line; returns `None` for a client
/// notification (no `id`), which per JSON-RPC expects no response.
async fn handle_line(session: &Arc<BrokerSession>, line: &str) -> Option<JsonRpcResponse> {
    let request: JsonRpcRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "received malformed JSON-RPC line");
            return Some(JsonRpcResponse::failure(
                None,
                JsonRpcError::new(error_codes::PARSE_ERROR, e.to_string()),
            ));
        }
    };

    let id = request.id.clone();
    let is_notification = request.is_notification();

    let result = session.dispatch(&request.method, request.params).await;

    if is_notification {
        if let Err(e) = result {
            error!(method = %request.method, error = %e.message, "notification handling failed");
        }
        return None;
    }

    Some(match result {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(error) => JsonRpcResponse::failure(id, error),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::BrokerConfig;
    use crate::resources::InMemoryResourceProvider;
    use sf_adapters::registry::Registry;
    use serde_json::json;

    fn session() -> Arc<BrokerSession> {
        Arc::new(BrokerSession::new(
            Arc::new(Registry::new()),
            Arc::new(InMemoryResourceProvider::new()),
            BrokerConfig::default(),
        ))
    }

    #[tokio::test]
    async fn malformed_json_yields_parse_error_response() {
        let session = session();
        let response = handle_line(&session, "not json").await.unwrap();
        assert_eq!(response.error.unwrap().code, error_codes::PARSE_ERROR);
    }

    #[tokio::test]
    async fn notification_produces_no_response() {
        let session = session();
        let line = json!({"jsonrpc": "2.0", "method": "initialize"}).to_string();
        assert!(handle_line(&session, &line).await.is_none());
    }

    #[tokio::test]
    async fn request_with_id_produces_a_response() {
        let session = session();
        let line = json!({"jsonrpc": "2.0", "method": "initialize", "id": 1}).to_string();
        let response = handle_line(&session, &line).await.unwrap();
        assert!(response.result.is_some());
    }
}
