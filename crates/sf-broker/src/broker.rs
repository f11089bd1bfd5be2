//! The broker session: owns the state machine, the registry handle, the
//! per-session concurrency bound on `tools/call`, and the method dispatch
//! table.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use tokio::sync::{Mutex, Semaphore};
use tracing::{info, warn};

use sf_adapter_api::{AdapterError, CancellationToken, ExecutionContext};
use sf_adapters::registry::Registry;
use sf_core::types::ToolId;
use sf_schema::request::ScanRequest;

use crate::jsonrpc::{JsonRpcError, JsonRpcNotification, error_codes};
use crate::methods::{
    ClientInfo, ContentBlock, InitializeParams, InitializeResult, ResourceContents,
    ResourcesListResult, ResourcesReadParams, ResourcesReadResult, ResourceSummary, ScanDiagnostics,
    ScanResponse, ServerCapabilities, ServerInfo, ToolSummary, ToolsCallParams,
    ToolsCallResult, ToolsListResult,
};
use crate::resources::ResourceProvider;
use crate::session::{SessionAdmissionError, SessionState, SessionStateCell};

/// How a session behaves when `tools/call` concurrency is already at
/// `max_parallel`: reject new calls immediately, or queue them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackpressurePolicy {
    Reject,
    Queue,
}

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Default = scheduler `max_parallel`.
    pub max_parallel_calls: usize,
    pub backpressure: BackpressurePolicy,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            max_parallel_calls: 4,
            backpressure: BackpressurePolicy::Reject,
        }
    }
}

pub struct BrokerSession {
    registry: Arc<Registry>,
    resources: Arc<dyn ResourceProvider>,
    state: SessionStateCell,
    client_info: Mutex<Option<ClientInfo>>,
    call_semaphore: Arc<Semaphore>,
    config: BrokerConfig,
    notifier: Option<tokio::sync::mpsc::UnboundedSender<JsonRpcNotification>>,
}

impl BrokerSession {
    #[must_use]
    pub fn new(registry: Arc<Registry>, resources: Arc<dyn ResourceProvider>, config: BrokerConfig) -> Self {
        Self {
            call_semaphore: Arc::new(Semaphore::new(config.max_parallel_calls)),
            registry,
            resources,
            state: SessionStateCell::new(),
            client_info: Mutex::new(None),
            config,
            notifier: None,
        }
    }

    /// Attach a channel progress notifications are pushed onto; the serve
    /// loop drains it and writes each as a line alongside responses.
    #[must_use]
    pub fn with_notifier(mut self, tx: tokio::sync::mpsc::UnboundedSender<JsonRpcNotification>) -> Self {
        self.notifier = Some(tx);
        self
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    pub fn begin_closing(&self) {
        self.state.set(SessionState::Closing);
    }

    pub fn close(&self) {
        self.state.set(SessionState::Closed);
    }

    /// Dispatch one method call. The caller is responsible for turning this
    /// into a response line (or suppressing it, for notifications).
    pub async fn dispatch(&self, method: &str, params: Option<Value>) -> Result<Value, JsonRpcError> {
        if let Err(admission) = self.state.admits(method) {
            return Err(match admission {
                SessionAdmissionError::NotInitialized => {
                    JsonRpcError::new(error_codes::NOT_INITIALIZED, admission.to_string())
                }
                SessionAdmissionError::ShuttingDown => {
                    JsonRpcError::new(error_codes::SHUTTING_DOWN, admission.to_string())
                }
            });
        }

        match method {
            "initialize" => self.handle_initialize(params).await,
            "tools/list" => self.handle_tools_list().await,
            "tools/call" => self.handle_tools_call(params).await,
            "resources/list" => self.handle_resources_list().await,
            "resources/read" => self.handle_resources_read(params).await,
            other => Err(JsonRpcError::new(
                error_codes::METHOD_NOT_FOUND,
                format!("method not found: {other}"),
            )),
        }
    }

    async fn handle_initialize(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: InitializeParams = match params {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| JsonRpcError::new(error_codes::INVALID_PARAMS, e.to_string()))?,
            None => InitializeParams {
                protocol_version: None,
                capabilities: None,
                client_info: None,
            },
        };
        *self.client_info.lock().await = params.client_info;
        self.state.set(SessionState::Initialized);
        self.state.set(SessionState::Serving);
        info!("broker session initialized");

        let result = InitializeResult {
            server_info: ServerInfo {
                name: "scanforge-broker".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            capabilities: ServerCapabilities {
                tools: true,
                resources: true,
            },
        };
        serde_json::to_value(result).map_err(internal_error)
    }

    async fn handle_tools_list(&self) -> Result<Value, JsonRpcError> {
        let tools = self
            .registry
            .list()
            .into_iter()
            .map(|adapter| {
                let capability = adapter.describe();
                ToolSummary {
                    name: capability.tool_id.as_str().to_string(),
                    description: capability.description.clone(),
                    input_schema: json!({
                        "type": "object",
                        "properties": {
                            "scan_id": {"type": "string"},
                            "target": {"type": "object"},
                        },
                        "required": ["target"],
                    }),
                    category: capability.category.to_string(),
                    available: true,
                    capability,
                }
            })
            .collect();
        serde_json::to_value(ToolsListResult { tools }).map_err(internal_error)
    }

    async fn handle_tools_call(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: ToolsCallParams = params
            .ok_or_else(|| JsonRpcError::new(error_codes::INVALID_PARAMS, "missing params"))
            .and_then(|value| {
                serde_json::from_value(value)
                    .map_err(|e| JsonRpcError::new(error_codes::INVALID_PARAMS, e.to_string()))
            })?;

        let tool_id = ToolId::new(params.name.clone());
        let adapter = self
            .registry
            .get(&tool_id)
            .ok_or_else(|| JsonRpcError::new(error_codes::TOOL_MISSING, format!("tool not found: {}", params.name)))?;

        let permit = self.acquire_call_permit().await?;
        let guard = self.registry.begin_execution(&tool_id);

        let request: ScanRequest = serde_json::from_value(params.arguments).map_err(|e| {
            JsonRpcError::new(error_codes::INVALID_SCAN_INPUT, format!("invalid scan request: {e}"))
        })?;

        let descriptor = adapter.describe();
        let ceiling = request
            .limits
            .timeout_secs
            .min(descriptor.execution.default_timeout_secs);
        let deadline = Duration::from_secs(ceiling);

        let ctx = ExecutionContext::new(
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            deadline,
            request.network_allowed,
            CancellationToken::new(),
        );

        let started = Instant::now();
        let notifier = self.notifier.clone();
        let tool_name = params.name.clone();
        let on_event = move |event: sf_adapter_api::AdapterEvent| {
            if let (Some(tx), sf_adapter_api::AdapterEvent::Executed { duration, partial }) =
                (&notifier, event)
            {
                let _ = tx.send(JsonRpcNotification::new(
                    "scan.progress",
                    json!({
                        "tool_name": tool_name,
                        "stage": "executed",
                        "duration_ms": duration.as_millis() as u64,
                        "partial": partial,
                    }),
                ));
            }
        };

        let outcome = tokio::time::timeout(deadline, adapter.run(&request, &ctx, &on_event)).await;
        drop(guard);
        drop(permit);

        let execution_time_seconds = started.elapsed().as_secs_f64();
        match outcome {
            Err(_elapsed) => Err(JsonRpcError::new(
                error_codes::TIMEOUT,
                format!("tools/call exceeded its {ceiling}s deadline"),
            )),
            Ok(Err(adapter_error)) => Err(map_adapter_error(&adapter_error)),
            Ok(Ok(findings)) => {
                let response = ScanResponse {
                    success: true,
                    tool_name: params.name,
                    execution_time_seconds,
                    findings,
                    diagnostics: ScanDiagnostics::default(),
                    error: None,
                };
                let text = serde_json::to_string(&response).map_err(internal_error)?;
                serde_json::to_value(ToolsCallResult {
                    content: vec![ContentBlock::text(text)],
                })
                .map_err(internal_error)
            }
        }
    }

    async fn acquire_call_permit(&self) -> Result<tokio::sync::OwnedSemaphorePermit, JsonRpcError> {
        match self.config.backpressure {
            BackpressurePolicy::Reject => Arc::clone(&self.call_semaphore)
                .try_acquire_owned()
                .map_err(|_| JsonRpcError::new(error_codes::BUSY, "too many concurrent tools/call in flight")),
            BackpressurePolicy::Queue => Arc::clone(&self.call_semaphore)
                .acquire_owned()
                .await
                .map_err(internal_error),
        }
    }

    async fn handle_resources_list(&self) -> Result<Value, JsonRpcError> {
        let result = ResourcesListResult {
            resources: vec![
                ResourceSummary {
                    uri: "scan://history".to_string(),
                    name: "scan history".to_string(),
                    description: "ids of every scan this broker has recorded a result for".to_string(),
                },
                ResourceSummary {
                    uri: "scan://results/{scan_id}".to_string(),
                    name: "scan result".to_string(),
                    description: "the recorded ScanResponse for one scan id".to_string(),
                },
            ],
        };
        serde_json::to_value(result).map_err(internal_error)
    }

    async fn handle_resources_read(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: ResourcesReadParams = params
            .ok_or_else(|| JsonRpcError::new(error_codes::INVALID_PARAMS, "missing params"))
            .and_then(|value| {
                serde_json::from_value(value)
                    .map_err(|e| JsonRpcError::new(error_codes::INVALID_PARAMS, e.to_string()))
            })?;

        let contents = if params.uri == "scan://history" {
            let history = self.resources.history().await;
            vec![ResourceContents {
                uri: params.uri,
                mime_type: "application/json".to_string(),
                text: history.to_string(),
            }]
        } else if let Some(scan_id) = params.uri.strip_prefix("scan://results/") {
            let result = self.resources.scan_result(scan_id).await.ok_or_else(|| {
                JsonRpcError::new(
                    error_codes::INVALID_SCAN_INPUT,
                    format!("no recorded result for scan id {scan_id}"),
                )
            })?;
            vec![ResourceContents {
                uri: params.uri,
                mime_type: "application/json".to_string(),
                text: result.to_string(),
            }]
        } else {
            return Err(JsonRpcError::new(
                error_codes::INVALID_PARAMS,
                format!("unrecognized resource uri: {}", params.uri),
            ));
        };

        serde_json::to_value(ResourcesReadResult { contents }).map_err(internal_error)
    }
}

fn map_adapter_error(error: &AdapterError) -> JsonRpcError {
    match error {
        AdapterError::InvalidInput { reason, field_path } => JsonRpcError::with_data(
            error_codes::INVALID_SCAN_INPUT,
            reason.clone(),
            json!({"field_path": field_path}),
        ),
        AdapterError::ToolMissing(detail) => {
            JsonRpcError::new(error_codes::TOOL_MISSING, detail.clone())
        }
        AdapterError::ExecutionFailed { exit_code, stderr_tail } => JsonRpcError::with_data(
            error_codes::EXECUTION_FAILED,
            "adapter execution failed",
            json!({"exit_code": exit_code, "stderr_tail": stderr_tail}),
        ),
        AdapterError::Timeout { .. } => {
            JsonRpcError::new(error_codes::TIMEOUT, "adapter execution timed out")
        }
        AdapterError::ParseError(detail) => {
            JsonRpcError::new(error_codes::ADAPTER_PARSE_ERROR, detail.clone())
        }
        AdapterError::Canceled => {
            warn!("tools/call canceled mid-execution");
            JsonRpcError::new(error_codes::INTERNAL_ERROR, "execution was canceled")
        }
    }
}

fn internal_error(error: impl std::fmt::Display) -> JsonRpcError {
    JsonRpcError::new(error_codes::INTERNAL_ERROR, error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::InMemoryResourceProvider;
    use sf_adapters::semgrep::SemgrepAdapter;

    fn session() -> BrokerSession {
        let registry = Arc::new(Registry::new());
        registry.register(Arc::new(SemgrepAdapter::default())).unwrap();
        BrokerSession::new(registry, Arc::new(InMemoryResourceProvider::new()), BrokerConfig::default())
    }

    #[tokio::test]
    async fn calls_before_initialize_are_rejected() {
        let session = session();
        let err = session.dispatch("tools/list", None).await.unwrap_err();
        assert_eq!(err.code, error_codes::NOT_INITIALIZED);
    }

    #[tokio::test]
    async fn initialize_transitions_to_serving() {
        let session = session();
        session.dispatch("initialize", None).await.unwrap();
        assert_eq!(session.state(), SessionState::Serving);
    }

    #[tokio::test]
    async fn tools_list_reports_registered_adapters() {
        let session = session();
        session.dispatch("initialize", None).await.unwrap();
        let result = session.dispatch("tools/list", None).await.unwrap();
        let tools = result["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], "semgrep");
    }

    #[tokio::test]
    async fn tools_call_with_unknown_name_is_tool_missing() {
        let session = session();
        session.dispatch("initialize", None).await.unwrap();
        let params = json!({"name": "nonexistent", "arguments": {}});
        let err = session.dispatch("tools/call", Some(params)).await.unwrap_err();
        assert_eq!(err.code, error_codes::TOOL_MISSING);
    }

    #[tokio::test]
    async fn closing_session_rejects_new_calls() {
        let session = session();
        session.dispatch("initialize", None).await.unwrap();
        session.begin_closing();
        let err = session.dispatch("tools/list", None).await.unwrap_err();
        assert_eq!(err.code, error_codes::SHUTTING_DOWN);
    }

    #[tokio::test]
    async fn resources_read_unknown_uri_is_rejected() {
        let session = session();
        session.dispatch("initialize", None).await.unwrap();
        let params = json!({"uri": "scan://bogus"});
        let err = session.dispatch("resources/read", Some(params)).await.unwrap_err();
        assert_eq!(err.code, error_codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn resources_read_history_is_empty_array_initially() {
        let session = session();
        session.dispatch("initialize", None).await.unwrap();
        let params = json!({"uri": "scan://history"});
        let result = session.dispatch("resources/read", Some(params)).await.unwrap();
        let text = result["contents"][0]["text"].as_str().unwrap();
        assert_eq!(text, "[]");
    }
}
