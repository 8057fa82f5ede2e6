/*
 * Responsibility
 * - `Authorization: Bearer <token>` から token 文字列を取り出す
 * - ヘッダ欠落 / 形式不正は 401 (token の検証自体は handler → TokenVerifier)
 */
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::error::AppError;

const BEARER_PREFIX: &str = "Bearer ";

/// Raw bearer token. May be empty (`"Bearer "`); the verifier treats that as invalid.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix(BEARER_PREFIX))
            .map(|token| BearerToken(token.to_string()))
            .ok_or(AppError::Unauthorized(
                "Missing or invalid authorization header",
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(value: Option<&str>) -> Result<BearerToken, AppError> {
        let mut builder = Request::builder().uri("/api/user");
        if let Some(value) = value {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        BearerToken::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn extracts_token_after_prefix() {
        assert_eq!(extract(Some("Bearer abc.def")).await.unwrap().0, "abc.def");
        assert_eq!(extract(Some("Bearer ")).await.unwrap().0, "");
    }

    #[tokio::test]
    async fn rejects_missing_or_other_schemes() {
        for value in [None, Some("Basic dXNlcjpwYXNz"), Some("bearer abc"), Some("Bearer")] {
            let err = extract(value).await.unwrap_err();
            assert!(matches!(err, AppError::Unauthorized(_)), "{value:?}");
        }
    }
}
