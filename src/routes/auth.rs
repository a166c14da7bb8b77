/**
 * Authentication Routes
 * JWT access tokens for the admin editor: login, verify, logout
 */
use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::Arc,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::DEFAULT_JWT_SECRET;
use crate::routes::sections::editor_session;
use crate::routes::{AppState, ErrorResponse};

// ============================================================================
// Configuration
// ============================================================================

lazy_static::lazy_static! {
    pub static ref JWT_SECRET: String = std::env::var("JWT_SECRET")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_JWT_SECRET.to_string());

    pub static ref ADMIN_EMAIL: String = std::env::var("ADMIN_EMAIL")
        .unwrap_or_else(|_| "admin@example.com".to_string());

    /// ADMIN_HASH_PASSWORD (bcrypt) wins over ADMIN_PASSWORD (plain).
    pub static ref ADMIN_PASSWORD_HASH: String = {
        if let Ok(hashed) = std::env::var("ADMIN_HASH_PASSWORD") {
            hashed
        } else {
            let plain = std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string());
            hash(plain, DEFAULT_COST).unwrap_or_default()
        }
    };

    /// Token ids revoked by logout, until they expire.
    static ref REVOKED_TOKENS: Arc<RwLock<HashMap<String, i64>>> =
        Arc::new(RwLock::new(HashMap::new()));

    /// Login attempts per IP inside the current window.
    static ref LOGIN_ATTEMPTS: Arc<RwLock<HashMap<String, Vec<i64>>>> =
        Arc::new(RwLock::new(HashMap::new()));
}

const ACCESS_TOKEN_EXPIRY_MINUTES: i64 = 60;

const LOGIN_WINDOW_SECS: i64 = 60;
const LOGIN_MAX_ATTEMPTS: usize = 5;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub user_id: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub user: Option<UserInfo>,
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LoginResponse {
    fn failure(error: &str) -> Self {
        Self {
            success: false,
            user: None,
            access_token: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub success: bool,
    pub is_valid: bool,
    pub user: Option<UserInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

// ============================================================================
// Helper Functions
// ============================================================================

fn create_access_token(
    user_id: &str,
    email: &str,
    role: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role: role.to_string(),
        jti: Uuid::new_v4().to_string(),
        exp: (now + Duration::minutes(ACCESS_TOKEN_EXPIRY_MINUTES)).timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
}

/// Decode an access token; signature and expiry only.
pub fn verify_access_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(JWT_SECRET.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

async fn is_revoked(jti: &str) -> bool {
    REVOKED_TOKENS.read().await.contains_key(jti)
}

/// Gate for admin endpoints: a valid, unrevoked bearer token.
pub async fn require_admin(
    headers: &HeaderMap,
) -> Result<Claims, (StatusCode, Json<ErrorResponse>)> {
    let Some(token) = extract_bearer_token(headers) else {
        return Err(ErrorResponse::reply(
            StatusCode::UNAUTHORIZED,
            "Authorization required",
        ));
    };

    match verify_access_token(token) {
        Ok(claims) => {
            if is_revoked(&claims.jti).await {
                return Err(ErrorResponse::reply(
                    StatusCode::UNAUTHORIZED,
                    "Token has been revoked",
                ));
            }
            Ok(claims)
        }
        Err(_) => Err(ErrorResponse::reply(
            StatusCode::UNAUTHORIZED,
            "Invalid or expired token",
        )),
    }
}

/// Sliding-window login limit per IP.
async fn check_rate_limit(ip: &str) -> bool {
    let now = Utc::now().timestamp();
    let mut attempts = LOGIN_ATTEMPTS.write().await;

    attempts.retain(|_, times| {
        times.retain(|t| now - *t < LOGIN_WINDOW_SECS);
        !times.is_empty()
    });

    let times = attempts.entry(ip.to_string()).or_default();
    if times.len() >= LOGIN_MAX_ATTEMPTS {
        return false;
    }
    times.push(now);
    true
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/auth/login
pub async fn login(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<LoginRequest>,
) -> impl IntoResponse {
    if payload.email.is_empty() || payload.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(LoginResponse::failure("Email and password are required")),
        );
    }

    if !payload.email.contains('@') {
        return (
            StatusCode::BAD_REQUEST,
            Json(LoginResponse::failure("Invalid email format")),
        );
    }

    if !check_rate_limit(&addr.ip().to_string()).await {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(LoginResponse::failure(
                "Too many requests. Please try again later.",
            )),
        );
    }

    let email_matches = payload.email.eq_ignore_ascii_case(&ADMIN_EMAIL);
    let password = payload.password.clone();
    // bcrypt is CPU-bound; keep it off the async executor.
    let password_matches = tokio::task::spawn_blocking(move || {
        verify(&password, &ADMIN_PASSWORD_HASH).unwrap_or(false)
    })
    .await
    .unwrap_or(false);

    if !email_matches || !password_matches {
        tracing::warn!(email = %payload.email, "failed login attempt");
        return (
            StatusCode::UNAUTHORIZED,
            Json(LoginResponse::failure("Invalid credentials")),
        );
    }

    let user_id = "admin".to_string();
    let role = "ADMIN".to_string();

    match create_access_token(&user_id, &payload.email, &role) {
        Ok(token) => {
            tracing::info!(email = %payload.email, "admin logged in");
            (
                StatusCode::OK,
                Json(LoginResponse {
                    success: true,
                    user: Some(UserInfo {
                        user_id,
                        email: payload.email,
                        role,
                    }),
                    access_token: Some(token),
                    error: None,
                }),
            )
        }
        Err(e) => {
            tracing::error!("Failed to create access token: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(LoginResponse::failure("Failed to create token")),
            )
        }
    }
}

/// POST /api/auth/verify
pub async fn verify_token(headers: HeaderMap) -> impl IntoResponse {
    let invalid = |error: &str| VerifyResponse {
        success: false,
        is_valid: false,
        user: None,
        error: Some(error.to_string()),
    };

    let Some(token) = extract_bearer_token(&headers) else {
        return Json(invalid("No authorization token provided"));
    };

    match verify_access_token(token) {
        Ok(claims) => {
            if is_revoked(&claims.jti).await {
                return Json(invalid("Token has been revoked"));
            }
            Json(VerifyResponse {
                success: true,
                is_valid: true,
                user: Some(UserInfo {
                    user_id: claims.sub,
                    email: claims.email,
                    role: claims.role,
                }),
                error: None,
            })
        }
        Err(e) => {
            tracing::debug!("Token verification failed: {}", e);
            Json(invalid("Invalid or expired token"))
        }
    }
}

/// POST /api/auth/logout
/// Revokes the presented token and ends the editor session it names.
/// Always succeeds.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(claims) = extract_bearer_token(&headers).and_then(|t| verify_access_token(t).ok()) {
        let now = Utc::now().timestamp();
        {
            let mut revoked = REVOKED_TOKENS.write().await;
            revoked.retain(|_, exp| *exp > now);
            revoked.insert(claims.jti, claims.exp);
        }

        if let Some(session_id) = editor_session(&headers) {
            if state.sessions.end(session_id) {
                tracing::info!("editor session ended on logout");
            }
        }
    }

    (StatusCode::OK, Json(LogoutResponse { success: true }))
}

/// Issue a token without the login round trip.
#[cfg(test)]
pub fn test_token() -> String {
    create_access_token("admin", "admin@example.com", "ADMIN").expect("token")
}
