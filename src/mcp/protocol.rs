//! MCP JSON-RPC message handling.
//!
//! Both transports hand raw JSON-RPC text to [`McpHandler::handle_message`]
//! and ship back whatever it returns, so the tool surface is identical
//! regardless of how clients connect.

use crate::compare::RegionComparator;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// MCP protocol revision implemented by this server.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Name of the single exposed tool.
pub const TOOL_NAME: &str = "compare_regions";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

/// Incoming JSON-RPC message (request or notification).
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    /// Absent for notifications. An explicit `null` id is still a request.
    #[serde(default, deserialize_with = "present_id")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Maps any present `id`, `null` included, to `Some`.
fn present_id<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Outgoing JSON-RPC response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Arguments of the `compare_regions` tool.
#[derive(Debug, Deserialize)]
struct CompareArgs {
    a: String,
    b: String,
}

/// Transport-independent MCP request handler.
#[derive(Debug, Clone)]
pub struct McpHandler {
    comparator: Arc<RegionComparator>,
    server_name: String,
}

impl McpHandler {
    pub fn new(comparator: RegionComparator, server_name: impl Into<String>) -> Self {
        Self {
            comparator: Arc::new(comparator),
            server_name: server_name.into(),
        }
    }

    /// Handle one raw message. Returns the serialized response, or `None`
    /// for notifications.
    pub async fn handle_message(&self, raw: &str) -> Option<String> {
        let response = match serde_json::from_str::<Value>(raw) {
            Err(e) => Some(JsonRpcResponse::error(
                Value::Null,
                PARSE_ERROR,
                format!("Parse error: {}", e),
            )),
            Ok(value) => match serde_json::from_value::<JsonRpcRequest>(value) {
                Err(e) => Some(JsonRpcResponse::error(
                    Value::Null,
                    INVALID_REQUEST,
                    format!("Invalid request: {}", e),
                )),
                Ok(request) => self.handle_request(request).await,
            },
        };

        response.and_then(|r| match serde_json::to_string(&r) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("Failed to serialize response: {}", e);
                None
            }
        })
    }

    /// Dispatch a parsed request.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!("Received {} (id: {:?})", request.method, request.id);

        if request.jsonrpc != "2.0" {
            warn!("Message without jsonrpc 2.0 marker: {}", request.method);
        }

        let Some(id) = request.id else {
            debug!("Notification {} acknowledged", request.method);
            return None;
        };

        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(id, self.initialize_result()),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, json!({ "tools": [tool_definition()] })),
            "tools/call" => self.call_tool(id, &request.params).await,
            other => JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {}", other)),
        };

        Some(response)
    }

    fn initialize_result(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": self.server_name,
                "version": env!("CARGO_PKG_VERSION"),
            }
        })
    }

    async fn call_tool(&self, id: Value, params: &Value) -> JsonRpcResponse {
        let name = params.get("name").and_then(Value::as_str).unwrap_or("");
        if name != TOOL_NAME {
            return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Unknown tool: {}", name));
        }

        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
        let args: CompareArgs = match serde_json::from_value(arguments) {
            Ok(args) => args,
            Err(e) => {
                return JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    format!("Invalid arguments for {}: {}", TOOL_NAME, e),
                )
            }
        };

        info!("Tool call: {}({}, {})", TOOL_NAME, args.a, args.b);
        let report = self.comparator.compare_regions(&args.a, &args.b).await;

        JsonRpcResponse::success(
            id,
            json!({
                "content": [{ "type": "text", "text": report }],
                "isError": false,
            }),
        )
    }
}

/// Tool descriptor advertised by `tools/list`.
pub fn tool_definition() -> Value {
    json!({
        "name": TOOL_NAME,
        "description": "Compare the household demographics (age, gender, ethnicity) of two zip codes and report groups whose counts differ significantly (|z| > 2).",
        "inputSchema": {
            "type": "object",
            "properties": {
                "a": { "type": "string", "description": "First zip code" },
                "b": { "type": "string", "description": "Second zip code" }
            },
            "required": ["a", "b"]
        }
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::Config;

    /// Handler whose collaborators point at an unreachable host.
    pub(crate) fn offline_handler() -> McpHandler {
        let mut config = Config::default();
        config.lookup.url = "http://127.0.0.1:9/v1/zipcode".to_string();
        config.dataset.base_url = "http://127.0.0.1:9/household".to_string();
        McpHandler::new(RegionComparator::from_config(&config).unwrap(), "test-server")
    }

    async fn roundtrip(handler: &McpHandler, message: Value) -> Value {
        let raw = handler.handle_message(&message.to_string()).await.unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[tokio::test]
    async fn test_initialize() {
        let handler = offline_handler();
        let response = roundtrip(
            &handler,
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
        )
        .await;

        assert_eq!(response["id"], 1);
        assert_eq!(response["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(response["result"]["serverInfo"]["name"], "test-server");
        assert!(response["result"]["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_tools_list() {
        let handler = offline_handler();
        let response = roundtrip(
            &handler,
            json!({"jsonrpc": "2.0", "id": "abc", "method": "tools/list"}),
        )
        .await;

        let tools = response["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], TOOL_NAME);
        assert_eq!(tools[0]["inputSchema"]["required"], json!(["a", "b"]));
    }

    #[tokio::test]
    async fn test_notification_has_no_response() {
        let handler = offline_handler();
        let response = handler
            .handle_message(r#"{"jsonrpc": "2.0", "method": "notifications/initialized"}"#)
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_null_id_is_answered() {
        let handler = offline_handler();
        let response = roundtrip(&handler, json!({"jsonrpc": "2.0", "id": null, "method": "ping"})).await;

        assert!(response["id"].is_null());
        assert_eq!(response["result"], json!({}));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let handler = offline_handler();
        let response = roundtrip(
            &handler,
            json!({"jsonrpc": "2.0", "id": 7, "method": "resources/list"}),
        )
        .await;
        assert_eq!(response["error"]["code"], METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_parse_error() {
        let handler = offline_handler();
        let raw = handler.handle_message("{not json").await.unwrap();
        let response: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(response["error"]["code"], PARSE_ERROR);
        assert!(response["id"].is_null());
    }

    #[tokio::test]
    async fn test_call_tool_invalid_params() {
        let handler = offline_handler();

        let response = roundtrip(
            &handler,
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call",
                   "params": {"name": "other_tool", "arguments": {}}}),
        )
        .await;
        assert_eq!(response["error"]["code"], INVALID_PARAMS);

        let response = roundtrip(
            &handler,
            json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call",
                   "params": {"name": TOOL_NAME, "arguments": {"a": "02139"}}}),
        )
        .await;
        assert_eq!(response["error"]["code"], INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_call_tool_returns_text_report() {
        let handler = offline_handler();
        let response = roundtrip(
            &handler,
            json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call",
                   "params": {"name": TOOL_NAME, "arguments": {"a": "02139", "b": "94110"}}}),
        )
        .await;

        assert_eq!(response["result"]["isError"], false);
        assert_eq!(response["result"]["content"][0]["type"], "text");
        assert_eq!(
            response["result"]["content"][0]["text"],
            crate::compare::LOAD_ERROR_MESSAGE
        );
    }
}
