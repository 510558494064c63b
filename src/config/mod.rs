use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::middleware::origin::OriginMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub security: SecurityConfig,
    pub static_files: StaticConfig,
    pub auth_service: AuthServiceConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Only production enforces the origin allow-list.
    pub fn origin_mode(self) -> OriginMode {
        match self {
            Environment::Production => OriginMode::Strict,
            Environment::Staging | Environment::Development => OriginMode::Permissive,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    pub cookie_secure: bool,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticConfig {
    pub base_dir: String,
    pub url_prefix: String,
    pub protected_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthServiceConfig {
    pub url: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

impl AuthServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl SecurityConfig {
    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.token_ttl_minutes)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("TOKEN_TTL_MINUTES") {
            self.security.token_ttl_minutes = v.parse().unwrap_or(self.security.token_ttl_minutes);
        }
        if let Ok(v) = env::var("COOKIE_SECURE") {
            self.security.cookie_secure = v.parse().unwrap_or(self.security.cookie_secure);
        }
        if let Ok(v) = env::var("ALLOWED_ORIGINS") {
            self.security.allowed_origins = parse_list(&v);
        }

        // Static overrides
        if let Ok(v) = env::var("STATIC_BASE_DIR") {
            self.static_files.base_dir = v;
        }
        if let Ok(v) = env::var("STATIC_PROTECTED_PREFIX") {
            self.static_files.protected_prefix = v;
        }

        // Auth service overrides
        if let Ok(v) = env::var("AUTH_SERVICE_URL") {
            self.auth_service.url = v;
        }
        if let Ok(v) = env::var("AUTH_SERVICE_TIMEOUT_MS") {
            self.auth_service.timeout_ms = v.parse().unwrap_or(self.auth_service.timeout_ms);
        }

        if let Ok(v) = env::var("PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            security: SecurityConfig {
                jwt_secret: String::new(),
                token_ttl_minutes: 15,
                cookie_secure: false,
                allowed_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
            static_files: StaticConfig::default(),
            auth_service: AuthServiceConfig {
                url: "http://localhost:8081/permissions/image".to_string(),
                timeout_ms: 2000,
            },
            server: ServerConfig { port: 8080 },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            security: SecurityConfig {
                jwt_secret: String::new(),
                token_ttl_minutes: 15,
                cookie_secure: true,
                allowed_origins: vec!["https://staging.example.com".to_string()],
            },
            static_files: StaticConfig::default(),
            auth_service: AuthServiceConfig {
                url: "http://auth:8081/permissions/image".to_string(),
                timeout_ms: 1000,
            },
            server: ServerConfig { port: 8080 },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            security: SecurityConfig {
                jwt_secret: String::new(),
                token_ttl_minutes: 15,
                cookie_secure: true,
                allowed_origins: vec!["https://app.example.com".to_string()],
            },
            static_files: StaticConfig::default(),
            auth_service: AuthServiceConfig {
                url: "http://auth:8081/permissions/image".to_string(),
                timeout_ms: 500,
            },
            server: ServerConfig { port: 8080 },
        }
    }
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            base_dir: "./static".to_string(),
            url_prefix: "/static".to_string(),
            protected_prefix: "/static/img/".to_string(),
        }
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
