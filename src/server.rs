//! Line-delimited JSON-RPC 2.0 over stdio, the protocol the orchestrator speaks.

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::dispatcher::Dispatcher;
use crate::resources;

const PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
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

#[derive(Debug, Deserialize)]
struct ToolsCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct ResourceReadParams {
    uri: String,
}

pub struct Server {
    dispatcher: Dispatcher,
}

impl Server {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Answer one request. Notifications get no reply.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id else {
            log::debug!("Notification {}", request.method);
            return None;
        };

        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(id, INVALID_REQUEST, "invalid jsonrpc version"));
        }

        let response = match request.method.as_str() {
            "initialize" => {
                let protocol_version = request
                    .params
                    .get("protocolVersion")
                    .and_then(Value::as_str)
                    .unwrap_or(PROTOCOL_VERSION);
                JsonRpcResponse::success(
                    id,
                    json!({
                        "protocolVersion": protocol_version,
                        "serverInfo": {
                            "name": env!("CARGO_PKG_NAME"),
                            "version": env!("CARGO_PKG_VERSION"),
                        },
                        "capabilities": {
                            "tools": { "listChanged": false },
                            "resources": { "subscribe": false, "listChanged": false },
                        },
                    }),
                )
            }
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, json!({ "tools": self.dispatcher.specs() })),
            "tools/call" => self.handle_tools_call(id, request.params).await,
            "resources/list" => self.handle_resources_list(id).await,
            "resources/read" => self.handle_resources_read(id, request.params).await,
            other => {
                log::warn!("Unknown method {}", other);
                JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("method not found: {}", other))
            }
        };

        Some(response)
    }

    async fn handle_tools_call(&self, id: Value, params: Value) -> JsonRpcResponse {
        let call: ToolsCallParams = match serde_json::from_value(params) {
            Ok(call) => call,
            Err(e) => return JsonRpcResponse::error(id, INVALID_PARAMS, format!("invalid params: {}", e)),
        };

        log::info!("Tool call: {}", call.name);
        let response = self.dispatcher.dispatch(&call.name, call.arguments).await;
        log::debug!("{} replied with {} chars", call.name, response.first_text().len());
        match serde_json::to_value(response) {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => JsonRpcResponse::error(id, INVALID_PARAMS, e.to_string()),
        }
    }

    async fn handle_resources_list(&self, id: Value) -> JsonRpcResponse {
        match resources::list_decks(self.dispatcher.client()).await {
            Ok(list) => JsonRpcResponse::success(id, json!({ "resources": list })),
            Err(e) => {
                log::error!("Error listing resources: {}", e);
                JsonRpcResponse::error(id, INTERNAL_ERROR, format!("Failed to list decks: {}", e))
            }
        }
    }

    async fn handle_resources_read(&self, id: Value, params: Value) -> JsonRpcResponse {
        let params: ResourceReadParams = match serde_json::from_value(params) {
            Ok(params) => params,
            Err(e) => return JsonRpcResponse::error(id, INVALID_PARAMS, format!("invalid params: {}", e)),
        };
        let Some(deck_name) = resources::deck_from_uri(&params.uri) else {
            return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Invalid resource URI: {}", params.uri));
        };

        log::info!("Reading deck resource {}", deck_name);
        match resources::read_deck(self.dispatcher.client(), &params.uri, &deck_name).await {
            Ok(content) => JsonRpcResponse::success(id, json!({ "contents": [content] })),
            Err(e) => {
                log::error!("Error reading deck {}: {}", deck_name, e);
                JsonRpcResponse::error(
                    id,
                    INTERNAL_ERROR,
                    format!(
                        "Failed to read deck: {}. Make sure Anki is running and AnkiConnect plugin is installed.",
                        e
                    ),
                )
            }
        }
    }

    /// Read requests line by line until EOF. Each request runs on its own task; replies go
    /// through a single writer so lines never interleave.
    pub async fn serve<R, W>(self: Arc<Self>, reader: R, writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<JsonRpcResponse>();

        let writer_task = tokio::spawn(async move {
            let mut writer = writer;
            while let Some(response) = rx.recv().await {
                let mut line = serde_json::to_string(&response)?;
                line.push('\n');
                writer.write_all(line.as_bytes()).await?;
                writer.flush().await?;
            }
            Ok::<(), anyhow::Error>(())
        });

        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(line) {
                Ok(request) => request,
                Err(e) => {
                    log::warn!("Unparsable request: {}", e);
                    let reply = JsonRpcResponse::error(Value::Null, PARSE_ERROR, format!("parse error: {}", e));
                    if let Err(e) = tx.send(reply) {
                        log::warn!("Dropping parse error reply: {}", e);
                    }
                    continue;
                }
            };

            let server = self.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Some(response) = server.handle_request(request).await {
                    if let Err(e) = tx.send(response) {
                        log::warn!("Dropping reply, writer has stopped: {}", e);
                    }
                }
            });
        }

        log::info!("Input closed, waiting for in-flight calls");
        drop(tx);
        writer_task.await??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anki::fake::FakeAnki;
    use tokio::io::AsyncReadExt;

    fn server() -> Server {
        Server::new(Dispatcher::new(FakeAnki::new().client()))
    }

    fn request(raw: Value) -> JsonRpcRequest {
        serde_json::from_value(raw).unwrap()
    }

    #[tokio::test]
    async fn test_initialize_and_ping() {
        let server = server();
        let init = server
            .handle_request(request(json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} })))
            .await
            .unwrap();
        let result = init.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "anki-gateway");

        let ping = server
            .handle_request(request(json!({ "jsonrpc": "2.0", "id": 2, "method": "ping" })))
            .await
            .unwrap();
        assert_eq!(ping.result, Some(json!({})));
    }

    #[tokio::test]
    async fn test_notifications_get_no_reply() {
        let reply = server()
            .handle_request(request(json!({ "jsonrpc": "2.0", "method": "notifications/initialized" })))
            .await;
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let reply = server()
            .handle_request(request(json!({ "jsonrpc": "2.0", "id": 3, "method": "resources/list" })))
            .await
            .unwrap();
        assert_eq!(reply.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_tools_list_and_call() {
        let server = server();
        let list = server
            .handle_request(request(json!({ "jsonrpc": "2.0", "id": 4, "method": "tools/list" })))
            .await
            .unwrap();
        let tools = list.result.unwrap()["tools"].as_array().unwrap().clone();
        assert!(tools.iter().any(|t| t["name"] == "create-deck" && t["inputSchema"]["type"] == "object"));

        let call = server
            .handle_request(request(json!({
                "jsonrpc": "2.0", "id": 5, "method": "tools/call",
                "params": { "name": "create-deck", "arguments": { "name": "Spanish" } }
            })))
            .await
            .unwrap();
        assert_eq!(
            call.result.unwrap(),
            json!({ "content": [{ "type": "text", "text": "Successfully created new deck \"Spanish\"" }] })
        );
    }

    #[tokio::test]
    async fn test_resources_list_and_read() {
        let anki = FakeAnki::new();
        let client = anki.client();
        client.create_deck("Spanish::Vocab").await.unwrap();
        let server = Server::new(Dispatcher::new(client));

        let init = server
            .handle_request(request(json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize" })))
            .await
            .unwrap();
        assert!(init.result.unwrap()["capabilities"]["resources"].is_object());

        let list = server
            .handle_request(request(json!({ "jsonrpc": "2.0", "id": 2, "method": "resources/list" })))
            .await
            .unwrap();
        let resources = list.result.unwrap()["resources"].clone();
        assert_eq!(resources[1]["uri"], "anki://deck/Spanish%3A%3AVocab");
        assert_eq!(resources[1]["name"], "Spanish::Vocab");
        assert_eq!(resources[1]["mimeType"], "text/plain");

        let read = server
            .handle_request(request(json!({
                "jsonrpc": "2.0", "id": 3, "method": "resources/read",
                "params": { "uri": "anki://deck/Spanish%3A%3AVocab" }
            })))
            .await
            .unwrap();
        let contents = read.result.unwrap()["contents"].clone();
        assert_eq!(contents[0]["uri"], "anki://deck/Spanish%3A%3AVocab");
        assert_eq!(contents[0]["text"], "Deck: Spanish::Vocab\n\nNo notes found in this deck.");
    }

    #[tokio::test]
    async fn test_resources_read_rejects_foreign_uri() {
        let reply = server()
            .handle_request(request(json!({
                "jsonrpc": "2.0", "id": 4, "method": "resources/read",
                "params": { "uri": "file:///etc/hosts" }
            })))
            .await
            .unwrap();
        let error = reply.error.unwrap();
        assert_eq!(error.code, INVALID_PARAMS);
        assert_eq!(error.message, "Invalid resource URI: file:///etc/hosts");
    }

    #[tokio::test]
    async fn test_serve_over_streams() {
        let server = Arc::new(server());
        let input = concat!(
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n",
            "this is not json\n",
            "\n",
            "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n",
        );
        let (writer, mut output) = tokio::io::duplex(1 << 20);

        server.serve(input.as_bytes(), writer).await.unwrap();

        let mut written = String::new();
        output.read_to_string(&mut written).await.unwrap();
        let replies: Vec<Value> = written
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(replies.len(), 2);
        assert!(replies.iter().any(|r| r["id"] == 1 && r["result"] == json!({})));
        assert!(replies.iter().any(|r| r["error"]["code"] == PARSE_ERROR));
    }
}
