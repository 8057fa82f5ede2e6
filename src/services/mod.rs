/*
 * Responsibility
 * - service 層 (外部 backend 呼び出し・ドメインロジック)
 * - handler / middleware からはここ経由で使う
 */
pub mod auth;
pub mod consent;
pub mod identity;
pub mod projects;
pub mod viewer;
