/*
 * Responsibility
 * - assistant-protocol (MCP) endpoint の公開インターフェース
 * - protocol: JSON-RPC 型 / widgets: widget 定義 / server: dispatch / transport: axum routes
 */
pub mod protocol;
pub mod server;
pub mod transport;
pub mod widgets;

pub use server::McpServer;
pub use transport::routes;
