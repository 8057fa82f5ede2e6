/*
 * Responsibility
 * - middleware の公開インターフェース
 * - http: transport 系 / security_headers: response header / route_gate: 経路分類と session 必須化
 */
pub mod http;
pub mod route_gate;
pub mod security_headers;
