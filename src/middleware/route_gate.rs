//! Route gate: classifies every request before any handler runs.
//!
//! Classes are checked in order, first match wins:
//! 1. preflight (`OPTIONS`): answered here with 204 and CORS headers
//! 2. protocol (`/mcp*`): forwarded, CORS headers attached
//! 3. public prefixes and endpoints: forwarded, CORS headers attached
//! 4. everything else: needs a cookie session, otherwise 307 to the login page
//!
//! Session lookup failures are treated as "no session". Cookie mutations made by the
//! lookup (refresh, clearing) are written to the response either way.

use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderName, HeaderValue, Method, StatusCode, Uri, header},
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use url::form_urlencoded;

use crate::api::extractors::SessionCtx;
use crate::state::AppState;

pub const LOGIN_PATH: &str = "/auth/login";
pub const PROTOCOL_PREFIX: &str = "/mcp";
pub const AUTHORIZATION_ID_PARAM: &str = "authorization_id";

/// Prefix matches, so `/public/...` and `/_next/...` are covered.
pub const PUBLIC_PREFIXES: &[&str] = &[
    "/auth/login",
    "/auth/register",
    "/auth/callback",
    "/oauth/consent",
    "/_next",
    "/favicon.ico",
    "/public",
];

/// Matched on a path-segment boundary: `/api/user` but not `/api/users`.
pub const PUBLIC_ENDPOINTS: &[&str] = &["/api/user", "/health"];

const ALLOW_METHODS: &str = "GET,POST,PUT,DELETE,OPTIONS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Preflight,
    Protocol,
    Public,
    Protected,
}

pub fn classify(method: &Method, path: &str) -> RouteClass {
    if method == Method::OPTIONS {
        RouteClass::Preflight
    } else if path.starts_with(PROTOCOL_PREFIX) {
        RouteClass::Protocol
    } else if PUBLIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
        || PUBLIC_ENDPOINTS.iter().any(|endpoint| is_endpoint(path, endpoint))
    {
        RouteClass::Public
    } else {
        RouteClass::Protected
    }
}

fn is_endpoint(path: &str, endpoint: &str) -> bool {
    path.strip_prefix(endpoint)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(state, route_gate))
}

async fn route_gate(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    match classify(req.method(), req.uri().path()) {
        RouteClass::Preflight => with_cors(StatusCode::NO_CONTENT.into_response()),
        RouteClass::Protocol | RouteClass::Public => with_cors(next.run(req).await),
        RouteClass::Protected => {
            let lookup = match state.sessions.get_session(jar).await {
                Ok(lookup) => lookup,
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        path = %req.uri().path(),
                        "session lookup failed; redirecting to login"
                    );
                    return login_redirect(req.uri()).into_response();
                }
            };

            let Some(session) = lookup.session else {
                tracing::debug!(path = %req.uri().path(), "no session; redirecting to login");
                return (lookup.jar, login_redirect(req.uri())).into_response();
            };

            req.extensions_mut().insert(SessionCtx::from(&session));
            let response = next.run(req).await;
            with_cors((lookup.jar, response).into_response())
        }
    }
}

fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-headers"),
        HeaderValue::from_static("*"),
    );
    response
}

/// `/auth/login`, keeping a non-empty `authorization_id` from the original query.
pub fn login_location(uri: &Uri) -> String {
    let authorization_id = uri
        .query()
        .and_then(|query| {
            form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == AUTHORIZATION_ID_PARAM)
                .map(|(_, value)| value.into_owned())
        })
        .filter(|value| !value.is_empty());

    match authorization_id {
        Some(id) => {
            let query = form_urlencoded::Serializer::new(String::new())
                .append_pair(AUTHORIZATION_ID_PARAM, &id)
                .finish();
            format!("{LOGIN_PATH}?{query}")
        }
        None => LOGIN_PATH.to_string(),
    }
}

fn login_redirect(uri: &Uri) -> Redirect {
    Redirect::temporary(&login_location(uri))
}
