//! Application configuration read from the environment.
//!
//! `.env` is loaded by [`crate::run`] before anything reads these values.

use std::net::SocketAddr;
use std::time::Duration;

use crate::sections::session::{DEFAULT_IDLE_TTL, DEFAULT_MAX_SESSIONS};

pub const DEFAULT_JWT_SECRET: &str = "default-jwt-secret-change-in-production";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub jwt_secret: String,
    pub admin_email: String,
    pub database_configured: bool,
    /// Idle time after which an editor session is dropped.
    pub session_idle_ttl: Duration,
    pub max_editor_sessions: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3001),
            environment: std::env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            jwt_secret: std::env::var("JWT_SECRET").unwrap_or_default(),
            admin_email: std::env::var("ADMIN_EMAIL").unwrap_or_default(),
            database_configured: std::env::var("DATABASE_URL").is_ok(),
            session_idle_ttl: std::env::var("EDITOR_SESSION_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_IDLE_TTL),
            max_editor_sessions: std::env::var("EDITOR_SESSION_MAX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_SESSIONS),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    /// Problems that must stop a production start.
    pub fn production_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !self.is_production() {
            return errors;
        }
        if self.jwt_secret.is_empty() || self.jwt_secret == DEFAULT_JWT_SECRET {
            errors.push(
                "JWT_SECRET must be set to a secure, unique value in production".to_string(),
            );
        }
        errors
    }
}
