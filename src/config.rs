/*
 * Responsibility
 * - 環境変数や設定の読み込み (DATABASE_URL, identity backend, 公開 URL など)
 * - 設定値のバリデーション (不足なら起動失敗)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

pub const DEFAULT_VIEWER_API_ENDPOINT: &str = "https://developer.api.autodesk.com";
pub const DEFAULT_VIEWER_SCRIPT_URL: &str =
    "https://developer.api.autodesk.com/modelderivative/v2/viewers/7.*/viewer3D.min.js";
pub const DEFAULT_VIEWER_STYLE_URL: &str =
    "https://developer.api.autodesk.com/modelderivative/v2/viewers/7.*/style.min.css";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        match std::env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Identity backend (Supabase auth) connection settings.
///
/// Keys are not printable via Debug.
#[derive(Clone)]
pub struct IdentityConfig {
    pub url: Url,
    pub anon_key: String,
    pub service_role_key: String,
}

impl fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("url", &self.url.as_str())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub credentials_url: Option<Url>,
    pub api_endpoint: Url,
    pub script_url: Url,
    pub style_url: Url,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub database_url: String,

    pub identity: IdentityConfig,

    pub public_app_url: Url,
    pub widget_base_url: Url,
    pub projects_api_url: Option<Url>,

    pub viewer: ViewerConfig,

    pub upstream_timeout: Duration,
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn optional(key: &'static str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_url(key: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|_| ConfigError::Invalid(key))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid(key));
    }
    Ok(url)
}

fn optional_url(key: &'static str) -> Result<Option<Url>, ConfigError> {
    optional(key).map(|raw| parse_url(key, &raw)).transpose()
}

fn url_or_default(key: &'static str, default: &str) -> Result<Url, ConfigError> {
    parse_url(key, &optional(key).unwrap_or_else(|| default.to_string()))
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::from_env();

        let database_url = required("DATABASE_URL")?;

        let identity = IdentityConfig {
            url: parse_url("SUPABASE_URL", &required("SUPABASE_URL")?)?,
            anon_key: required("SUPABASE_ANON_KEY")?,
            service_role_key: required("SUPABASE_SERVICE_ROLE_KEY")?,
        };

        let public_app_url = parse_url("PUBLIC_APP_URL", &required("PUBLIC_APP_URL")?)?;

        // Widget pages usually live on the same front end as the consent flow.
        let widget_base_url =
            optional_url("WIDGET_BASE_URL")?.unwrap_or_else(|| public_app_url.clone());

        let projects_api_url = optional_url("PROJECTS_API_URL")?;

        let viewer = ViewerConfig {
            credentials_url: optional_url("VIEWER_CREDENTIALS_URL")?,
            api_endpoint: url_or_default("VIEWER_API_ENDPOINT", DEFAULT_VIEWER_API_ENDPOINT)?,
            script_url: url_or_default("VIEWER_SCRIPT_URL", DEFAULT_VIEWER_SCRIPT_URL)?,
            style_url: url_or_default("VIEWER_STYLE_URL", DEFAULT_VIEWER_STYLE_URL)?,
        };

        let upstream_timeout_seconds = std::env::var("UPSTREAM_TIMEOUT_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(10);

        Ok(Self {
            addr,
            app_env,
            database_url,
            identity,
            public_app_url,
            widget_base_url,
            projects_api_url,
            viewer,
            upstream_timeout: Duration::from_secs(upstream_timeout_seconds),
        })
    }
}

#[cfg(test)]
impl Config {
    /// Settings where every upstream points at `identity` / `upstream` mock servers.
    pub fn for_test(identity: &str, upstream: &str) -> Self {
        let upstream = Url::parse(upstream).expect("upstream url");
        let join = |path: &str| upstream.join(path).expect("join upstream url");

        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            app_env: AppEnv::Development,
            database_url: "postgres://localhost/unused".to_string(),
            identity: IdentityConfig {
                url: Url::parse(identity).expect("identity url"),
                anon_key: "anon-key".to_string(),
                service_role_key: "service-role-key".to_string(),
            },
            public_app_url: Url::parse("https://app.example.com").expect("app url"),
            widget_base_url: upstream.clone(),
            projects_api_url: Some(join("/api/aps/model-names")),
            viewer: ViewerConfig {
                credentials_url: Some(join("/api/auth/aps-token")),
                api_endpoint: upstream.clone(),
                script_url: join("/viewer/viewer3D.min.js"),
                style_url: join("/viewer/style.min.css"),
            },
            upstream_timeout: Duration::from_secs(5),
        }
    }
}
