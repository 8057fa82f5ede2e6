//! MCP request dispatch.
//!
//! Stateless: every request is answered from the static widget table plus one
//! HTML fetch for `resources/read`. No authentication happens here.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;
use url::Url;

use crate::mcp::protocol::{
    CallToolParams, INTERNAL_ERROR, INVALID_PARAMS, InitializeParams, JsonRpcRequest,
    JsonRpcResponse, METHOD_NOT_FOUND, RESOURCE_NOT_FOUND, ReadResourceParams, negotiate_version,
};
use crate::mcp::widgets::{self, WIDGET_MIME_TYPE, WIDGETS};

const SERVER_NAME: &str = env!("CARGO_PKG_NAME");
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Error)]
pub enum WidgetHtmlError {
    #[error("invalid widget url: {0}")]
    Url(#[from] url::ParseError),
    #[error("widget host request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct McpServer {
    http: Client,
    widget_base_url: Url,
}

impl McpServer {
    pub fn new(http: Client, widget_base_url: Url) -> Self {
        Self {
            http,
            widget_base_url,
        }
    }

    /// `None` for notifications, which get no JSON-RPC response.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            tracing::debug!(method = %request.method, "mcp notification");
            return None;
        }

        let id = request.id.clone();
        tracing::debug!(method = %request.method, "mcp request");

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(id, request.params),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => self.handle_list_tools(id),
            "tools/call" => self.handle_call_tool(id, request.params),
            "resources/list" => self.handle_list_resources(id),
            "resources/templates/list" => {
                JsonRpcResponse::success(id, json!({ "resourceTemplates": [] }))
            }
            "resources/read" => self.handle_read_resource(id, request.params).await,
            _ => JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            ),
        };

        Some(response)
    }

    fn handle_initialize(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: InitializeParams = params
            .and_then(|p| serde_json::from_value(p).ok())
            .unwrap_or_default();

        JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": negotiate_version(params.protocol_version.as_deref()),
                "serverInfo": { "name": SERVER_NAME, "version": SERVER_VERSION },
                "capabilities": {
                    "tools": { "listChanged": false },
                    "resources": { "listChanged": false }
                }
            }),
        )
    }

    fn handle_list_tools(&self, id: Option<Value>) -> JsonRpcResponse {
        let tools: Vec<Value> = WIDGETS
            .iter()
            .map(|w| {
                json!({
                    "name": w.id,
                    "title": w.title,
                    "description": w.tool_description,
                    "inputSchema": w.input_schema(),
                    "_meta": w.tool_meta(),
                })
            })
            .collect();

        JsonRpcResponse::success(id, json!({ "tools": tools }))
    }

    fn handle_call_tool(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: CallToolParams = match require_params(params) {
            Ok(params) => params,
            Err(message) => return JsonRpcResponse::error(id, INVALID_PARAMS, message),
        };

        let Some(widget) = widgets::by_tool(&params.name) else {
            return JsonRpcResponse::error(
                id,
                INVALID_PARAMS,
                format!("Tool not found: {}", params.name),
            );
        };

        match widget.call(&params.arguments) {
            Ok(output) => JsonRpcResponse::success(
                id,
                json!({
                    "content": [{ "type": "text", "text": output.text }],
                    "structuredContent": output.structured,
                    "_meta": widget.tool_meta(),
                }),
            ),
            Err(err) => JsonRpcResponse::error(
                id,
                INVALID_PARAMS,
                format!("Invalid arguments for tool {}: {err}", widget.id),
            ),
        }
    }

    fn handle_list_resources(&self, id: Option<Value>) -> JsonRpcResponse {
        let resources: Vec<Value> = WIDGETS
            .iter()
            .map(|w| {
                json!({
                    "uri": w.template_uri,
                    "name": w.resource,
                    "title": w.title,
                    "description": w.description,
                    "mimeType": WIDGET_MIME_TYPE,
                    "_meta": w.resource_meta(),
                })
            })
            .collect();

        JsonRpcResponse::success(id, json!({ "resources": resources }))
    }

    async fn handle_read_resource(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: ReadResourceParams = match require_params(params) {
            Ok(params) => params,
            Err(message) => return JsonRpcResponse::error(id, INVALID_PARAMS, message),
        };

        let Some(widget) = widgets::by_template(&params.uri) else {
            return JsonRpcResponse::error(
                id,
                RESOURCE_NOT_FOUND,
                format!("Resource not found: {}", params.uri),
            );
        };

        let html = match self.fetch_html(widget.path).await {
            Ok(html) => html,
            Err(err) => {
                tracing::error!(error = %err, widget = widget.id, "failed to load widget html");
                return JsonRpcResponse::error(id, INTERNAL_ERROR, "Failed to load widget HTML");
            }
        };

        let mut meta = widget.resource_meta();
        meta["openai/widgetDomain"] = json!(self.widget_domain());

        JsonRpcResponse::success(
            id,
            json!({
                "contents": [{
                    "uri": params.uri,
                    "mimeType": WIDGET_MIME_TYPE,
                    "text": format!("<html>{html}</html>"),
                    "_meta": meta,
                }]
            }),
        )
    }

    /// Page URL is the base URL with `path` appended, keeping any base path.
    pub fn widget_url(&self, path: &str) -> Result<Url, url::ParseError> {
        let base = self.widget_base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}{path}"))
    }

    fn widget_domain(&self) -> String {
        self.widget_base_url.as_str().trim_end_matches('/').to_string()
    }

    async fn fetch_html(&self, path: &str) -> Result<String, WidgetHtmlError> {
        let url = self.widget_url(path)?;
        let html = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(html)
    }
}

fn require_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, String> {
    let params = params.ok_or_else(|| "Missing params".to_string())?;
    serde_json::from_value(params).map_err(|e| format!("Invalid params: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".into(),
            id: Some(json!(7)),
            method: method.into(),
            params: (!params.is_null()).then_some(params),
        }
    }

    fn server_at(base: &str) -> McpServer {
        McpServer::new(Client::new(), Url::parse(base).unwrap())
    }

    async fn result_of(server: &McpServer, method: &str, params: Value) -> Value {
        let response = server.handle_request(request(method, params)).await.unwrap();
        assert!(response.error.is_none(), "unexpected error: {:?}", response.error);
        response.result.unwrap()
    }

    #[tokio::test]
    async fn initialize_advertises_tools_and_resources() {
        let server = server_at("http://widgets.invalid");
        let result = result_of(&server, "initialize", json!({ "protocolVersion": "2025-03-26" })).await;

        assert_eq!(result["protocolVersion"], "2025-03-26");
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
        assert!(result["capabilities"]["resources"].is_object());
    }

    #[tokio::test]
    async fn notifications_get_no_response() {
        let server = server_at("http://widgets.invalid");
        let mut notification = request("notifications/initialized", Value::Null);
        notification.id = None;

        assert!(server.handle_request(notification).await.is_none());
    }

    #[tokio::test]
    async fn lists_every_widget_as_tool_and_resource() {
        let server = server_at("http://widgets.invalid");

        let tools = result_of(&server, "tools/list", Value::Null).await;
        let names: Vec<&str> = tools["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["show_content", "pizza_list", "project_list", "project_viewer"]);

        let resources = result_of(&server, "resources/list", Value::Null).await;
        let first = &resources["resources"][0];
        assert_eq!(first["uri"], "ui://widget/content-template.html");
        assert_eq!(first["mimeType"], "text/html+skybridge");
        assert_eq!(first["_meta"]["openai/widgetPrefersBorder"], true);
    }

    #[tokio::test]
    async fn call_tool_returns_structured_content_and_meta() {
        let server = server_at("http://widgets.invalid");
        let result = result_of(
            &server,
            "tools/call",
            json!({ "name": "show_content", "arguments": { "name": "Ada" } }),
        )
        .await;

        assert_eq!(result["content"][0], json!({ "type": "text", "text": "Ada" }));
        assert_eq!(result["structuredContent"]["name"], "Ada");
        assert_eq!(
            result["_meta"]["openai/outputTemplate"],
            "ui://widget/content-template.html"
        );
    }

    #[tokio::test]
    async fn call_tool_rejects_bad_input() {
        let server = server_at("http://widgets.invalid");

        let unknown = server
            .handle_request(request("tools/call", json!({ "name": "rm_rf" })))
            .await
            .unwrap();
        assert_eq!(unknown.error_code(), Some(INVALID_PARAMS));

        let missing = server
            .handle_request(request("tools/call", Value::Null))
            .await
            .unwrap();
        assert_eq!(missing.error_code(), Some(INVALID_PARAMS));

        let bad_args = server
            .handle_request(request(
                "tools/call",
                json!({ "name": "project_viewer", "arguments": { "urn": "x" } }),
            ))
            .await
            .unwrap();
        assert_eq!(bad_args.error_code(), Some(INVALID_PARAMS));
    }

    #[tokio::test]
    async fn unknown_method_is_not_found() {
        let server = server_at("http://widgets.invalid");
        let response = server
            .handle_request(request("sampling/createMessage", Value::Null))
            .await
            .unwrap();
        assert_eq!(response.error_code(), Some(METHOD_NOT_FOUND));
    }

    #[tokio::test]
    async fn read_resource_wraps_page_html() {
        let host = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/app/pizza-list"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<body>pizza</body>"))
            .mount(&host)
            .await;

        let server = server_at(&format!("{}/app/", host.uri()));
        let result = result_of(
            &server,
            "resources/read",
            json!({ "uri": "ui://widget/pizza-list-template.html" }),
        )
        .await;

        let content = &result["contents"][0];
        assert_eq!(content["text"], "<html><body>pizza</body></html>");
        assert_eq!(content["mimeType"], "text/html+skybridge");
        assert_eq!(content["_meta"]["openai/widgetDomain"], format!("{}/app", host.uri()));
    }

    #[tokio::test]
    async fn read_resource_errors() {
        let host = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&host)
            .await;
        let server = server_at(&host.uri());

        let unknown = server
            .handle_request(request("resources/read", json!({ "uri": "ui://widget/nope.html" })))
            .await
            .unwrap();
        assert_eq!(unknown.error_code(), Some(RESOURCE_NOT_FOUND));

        let failed = server
            .handle_request(request(
                "resources/read",
                json!({ "uri": "ui://widget/content-template.html" }),
            ))
            .await
            .unwrap();
        assert_eq!(failed.error_code(), Some(INTERNAL_ERROR));
    }

    #[test]
    fn widget_url_appends_path_to_base() {
        let server = server_at("https://example.com/widgets/");
        assert_eq!(
            server.widget_url("/").unwrap().as_str(),
            "https://example.com/widgets/"
        );
        assert_eq!(
            server.widget_url("/pizza-list").unwrap().as_str(),
            "https://example.com/widgets/pizza-list"
        );
    }
}
