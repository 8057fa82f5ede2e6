/*
 * Responsibility
 * - GET /health (疎通用)
 * - route gate の allow-list に入っているので session 不要
 */
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[cfg(test)]
mod tests {
    use crate::test_support::TestFixture;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn health_is_public() {
        let fixture = TestFixture::new().await;
        let response = fixture.get("/health").await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.json(), json!({ "status": "ok" }));
        assert!(response.header("x-request-id").is_some());
        assert_eq!(response.header("x-content-type-options"), Some("nosniff"));
    }
}
