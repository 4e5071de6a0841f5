/**
 * Authentication Routes
 * Registration, login, refresh-token rotation, logout and the caller's profile
 */
use axum::{
    body::Bytes,
    extract::ConnectInfo,
    http::{HeaderMap, StatusCode},
};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::distr::{Alphanumeric, SampleString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::{collections::HashMap, net::SocketAddr, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;
use validator::Validate;

use crate::db::{
    self,
    models::{NewUser, Role, User, UserPreferences},
};
use crate::routes::{pool, ApiError, ApiResult, Json, MessageResponse};

// ============================================================================
// Configuration
// ============================================================================

pub const DEFAULT_JWT_SECRET: &str = "default-jwt-secret-change-in-production";

lazy_static::lazy_static! {
    /// JWT secret key from environment
    pub static ref JWT_SECRET: String = std::env::var("JWT_SECRET")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_JWT_SECRET.to_string());

    /// Recent attempt timestamps per client IP
    static ref RATE_LIMIT: Arc<RwLock<HashMap<String, Vec<i64>>>> =
        Arc::new(RwLock::new(HashMap::new()));
}

/// Access token expiry in minutes
const ACCESS_TOKEN_EXPIRY_MINUTES: i64 = 15;

/// Refresh token expiry in days
const REFRESH_TOKEN_EXPIRY_DAYS: i64 = 7;

/// Attempts allowed per IP inside one window
#[allow(dead_code)]
const RATE_LIMIT_MAX_ATTEMPTS: usize = 5;

#[allow(dead_code)]
const RATE_LIMIT_WINDOW_SECS: i64 = 60;

const INVALID_CREDENTIALS: &str = "The provided credentials are incorrect.";
const UNAUTHENTICATED: &str = "Unauthenticated.";

// ============================================================================
// Types
// ============================================================================

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,   // User ID
    pub email: String, // User email
    pub role: String,  // User role
    pub exp: i64,      // Expiry timestamp
    pub iat: i64,      // Issued at timestamp
}

impl Claims {
    pub fn user_id(&self) -> ApiResult<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|_| ApiError::Unauthenticated(UNAUTHENTICATED.into()))
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin.as_str()
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 255, message = "The name field is required (max 255 characters)."))]
    pub name: String,
    #[validate(email(message = "The email must be a valid email address."))]
    pub email: String,
    #[validate(length(min = 8, message = "The password must be at least 8 characters."))]
    pub password: String,
    #[validate(must_match(other = "password", message = "The password confirmation does not match."))]
    pub password_confirmation: String,
    #[serde(default)]
    pub preferences: Option<UserPreferences>,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "The email must be a valid email address."))]
    pub email: String,
    #[validate(length(min = 1, message = "The password field is required."))]
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "The refresh token field is required."))]
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PreferencesRequest {
    pub preferences: UserPreferences,
}

/// Issued credentials plus the user they belong to
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct PreferencesResponse {
    pub message: String,
    pub preferences: UserPreferences,
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Generate a random refresh token
fn generate_refresh_token() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), 64)
}

/// SHA-256 hex digest of a refresh token; only the digest is stored.
fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Create access token
pub(crate) fn create_access_token(
    user_id: &str,
    email: &str,
    role: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let exp = now + Duration::minutes(ACCESS_TOKEN_EXPIRY_MINUTES);

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role: role.to_string(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
}

/// Verify and decode access token
pub fn verify_access_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(JWT_SECRET.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Extract bearer token from Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Claims of the caller, or 401.
pub fn require_user(headers: &HeaderMap) -> ApiResult<Claims> {
    let token = extract_bearer_token(headers)
        .ok_or_else(|| ApiError::Unauthenticated(UNAUTHENTICATED.into()))?;
    verify_access_token(token).map_err(|e| {
        tracing::debug!(error = %e, "rejected access token");
        ApiError::Unauthenticated(UNAUTHENTICATED.into())
    })
}

/// Claims of an admin caller; 401 without a token, 403 for other roles.
pub fn require_admin(headers: &HeaderMap) -> ApiResult<Claims> {
    let claims = require_user(headers)?;
    if !claims.is_admin() {
        return Err(ApiError::Forbidden);
    }
    Ok(claims)
}

/// Check rate limit for an IP.
///
/// Attempts older than the window are dropped on every write so the map only
/// holds recently active IPs.
async fn check_rate_limit(ip: &str) -> bool {
    #[cfg(test)]
    {
        let _ = ip;
        return true; // Bypass in tests so validation and credentials are exercised
    }

    #[cfg(not(test))]
    {
        let now = Utc::now().timestamp();
        let mut limits = RATE_LIMIT.write().await;

        limits.retain(|_, attempts| {
            attempts.retain(|t| now - *t < RATE_LIMIT_WINDOW_SECS);
            !attempts.is_empty()
        });

        let attempts = limits.entry(ip.to_string()).or_default();
        if attempts.len() >= RATE_LIMIT_MAX_ATTEMPTS {
            return false;
        }
        attempts.push(now);
        true
    }
}

async fn hash_password(password: String) -> ApiResult<String> {
    // bcrypt is CPU-bound; keep it off the async workers.
    tokio::task::spawn_blocking(move || hash(password, DEFAULT_COST))
        .await
        .map_err(|e| ApiError::Internal(format!("password hashing task failed: {}", e)))?
        .map_err(|e| ApiError::Internal(format!("failed to hash password: {}", e)))
}

async fn verify_password(password: String, password_hash: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || verify(password, &password_hash))
        .await
        .map_err(|e| ApiError::Internal(format!("password verification task failed: {}", e)))?
        .or_else(|e| {
            tracing::warn!(error = %e, "stored password hash could not be verified");
            Ok(false)
        })
}

/// Mint an access token and a stored refresh token for `user`.
async fn issue_tokens(pool: &PgPool, user: &User) -> ApiResult<TokenResponse> {
    let token = create_access_token(&user.id.to_string(), &user.email, &user.role)
        .map_err(|e| ApiError::Internal(format!("failed to create access token: {}", e)))?;

    let refresh_token = generate_refresh_token();
    let expires_at = Utc::now() + Duration::days(REFRESH_TOKEN_EXPIRY_DAYS);
    db::tokens::insert(pool, user.id, &hash_refresh_token(&refresh_token), expires_at).await?;

    Ok(TokenResponse {
        token,
        refresh_token,
    })
}

/// Create the configured admin account when no admin exists yet.
///
/// Reads `ADMIN_EMAIL` plus either `ADMIN_HASH_PASSWORD` (a bcrypt hash) or
/// `ADMIN_PASSWORD` (plain text, hashed here).
pub async fn seed_admin(pool: &PgPool) -> Result<(), sqlx::Error> {
    let Ok(email) = std::env::var("ADMIN_EMAIL") else {
        return Ok(());
    };

    let password_hash = match (
        std::env::var("ADMIN_HASH_PASSWORD"),
        std::env::var("ADMIN_PASSWORD"),
    ) {
        (Ok(h), _) if !h.is_empty() => h,
        (_, Ok(plain)) if !plain.is_empty() => match hash_password(plain).await {
            Ok(h) => h,
            Err(e) => {
                tracing::error!(error = %e, "could not hash ADMIN_PASSWORD, skipping admin seed");
                return Ok(());
            }
        },
        _ => {
            tracing::warn!("ADMIN_EMAIL set without ADMIN_HASH_PASSWORD or ADMIN_PASSWORD");
            return Ok(());
        }
    };

    if db::users::admin_exists(pool).await? {
        tracing::debug!("admin account already present, skipping seed");
        return Ok(());
    }
    if db::users::find_by_email(pool, &email).await?.is_some() {
        tracing::warn!(email = %email, "ADMIN_EMAIL belongs to an existing non-admin account");
        return Ok(());
    }

    let user = db::users::create(
        pool,
        NewUser {
            name: "Administrator".to_string(),
            email,
            password_hash,
            role: Role::Admin,
            preferences: UserPreferences::default(),
        },
    )
    .await?;
    tracing::info!(user_id = %user.id, email = %user.email, "seeded admin account");
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/register
pub async fn register(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    if !check_rate_limit(&addr.ip().to_string()).await {
        return Err(ApiError::TooManyRequests);
    }
    payload.validate()?;

    let pool = pool()?;
    let email = payload.email.trim().to_string();
    if db::users::find_by_email(&pool, &email).await?.is_some() {
        return Err(ApiError::field("email", "The email has already been taken."));
    }

    let password_hash = hash_password(payload.password).await?;
    let user = db::users::create(
        &pool,
        NewUser {
            name: payload.name.trim().to_string(),
            email,
            password_hash,
            role: Role::Writer,
            preferences: payload.preferences.unwrap_or_default(),
        },
    )
    .await
    .map_err(|e| {
        if db::is_unique_violation(&e) {
            ApiError::field("email", "The email has already been taken.")
        } else {
            ApiError::Database(e)
        }
    })?;

    let tokens = issue_tokens(&pool, &user).await?;
    tracing::info!(user_id = %user.id, role = %user.role, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user,
            token: tokens.token,
            refresh_token: tokens.refresh_token,
        }),
    ))
}

/// POST /api/login
pub async fn login(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let ip = addr.ip().to_string();
    if !check_rate_limit(&ip).await {
        tracing::warn!(ip = %ip, "login rate limited");
        return Err(ApiError::TooManyRequests);
    }
    payload.validate()?;

    let pool = pool()?;
    let Some(user) = db::users::find_by_email(&pool, payload.email.trim()).await? else {
        tracing::warn!(ip = %ip, "login attempt for unknown email");
        return Err(ApiError::Unauthenticated(INVALID_CREDENTIALS.into()));
    };

    if !verify_password(payload.password, user.password_hash.clone()).await? {
        tracing::warn!(ip = %ip, user_id = %user.id, "login attempt with wrong password");
        return Err(ApiError::Unauthenticated(INVALID_CREDENTIALS.into()));
    }

    let tokens = issue_tokens(&pool, &user).await?;
    tracing::info!(user_id = %user.id, "user logged in");

    Ok(Json(AuthResponse {
        user,
        token: tokens.token,
        refresh_token: tokens.refresh_token,
    }))
}

/// POST /api/refresh
///
/// The presented token is revoked and a new pair is issued. A token that was
/// already revoked, expired or unknown yields 401.
pub async fn refresh(Json(payload): Json<RefreshRequest>) -> ApiResult<Json<TokenResponse>> {
    payload.validate()?;

    let pool = pool()?;
    let invalid = || ApiError::Unauthenticated("Invalid or expired refresh token".into());
    let token_hash = hash_refresh_token(&payload.refresh_token);

    let stored = db::tokens::find(&pool, &token_hash)
        .await?
        .ok_or_else(invalid)?;
    if stored.revoked || stored.expires_at <= Utc::now() {
        return Err(invalid());
    }

    // Only the request that flips `revoked` may rotate.
    if !db::tokens::revoke(&pool, &token_hash).await? {
        return Err(invalid());
    }

    let user = db::users::find_by_id(&pool, stored.user_id)
        .await?
        .ok_or_else(invalid)?;
    let tokens = issue_tokens(&pool, &user).await?;
    tracing::debug!(user_id = %user.id, "refresh token rotated");

    Ok(Json(tokens))
}

/// POST /api/logout
pub async fn logout(
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<MessageResponse>> {
    let claims = require_user(&headers)?;
    let user_id = claims.user_id()?;
    let pool = pool()?;

    // The body is optional; anything unparsable is treated as empty.
    let payload: LogoutRequest = serde_json::from_slice(&body).unwrap_or_default();
    if let Some(token) = payload.refresh_token.filter(|t| !t.is_empty()) {
        db::tokens::revoke(&pool, &hash_refresh_token(&token)).await?;
    }
    let revoked = db::tokens::revoke_all_for_user(&pool, user_id).await?;
    tracing::info!(user_id = %user_id, revoked, "user logged out");

    Ok(MessageResponse::new("Logged out successfully"))
}

/// GET /api/user
pub async fn me(headers: HeaderMap) -> ApiResult<Json<UserResponse>> {
    let claims = require_user(&headers)?;
    let pool = pool()?;
    let user = db::users::find_by_id(&pool, claims.user_id()?)
        .await?
        .ok_or_else(|| ApiError::Unauthenticated(UNAUTHENTICATED.into()))?;
    Ok(Json(UserResponse { user }))
}

/// PUT /api/user/preferences
pub async fn update_preferences(
    headers: HeaderMap,
    Json(payload): Json<PreferencesRequest>,
) -> ApiResult<Json<PreferencesResponse>> {
    let claims = require_user(&headers)?;
    let pool = pool()?;
    let user = db::users::update_preferences(&pool, claims.user_id()?, &payload.preferences)
        .await?
        .ok_or_else(|| ApiError::Unauthenticated(UNAUTHENTICATED.into()))?;

    Ok(Json(PreferencesResponse {
        message: "Preferences updated successfully".to_string(),
        preferences: user.preferences.0,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::{get, post, put};
    use axum::Router;
    use tower::ServiceExt;

    fn auth_router() -> Router {
        use axum::extract::connect_info::MockConnectInfo;
        Router::new()
            .route("/api/register", post(register))
            .route("/api/login", post(login))
            .route("/api/refresh", post(refresh))
            .route("/api/logout", post(logout))
            .route("/api/user", get(me))
            .route("/api/user/preferences", put(update_preferences))
            .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 12345))))
    }

    async fn send(
        app: Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        json: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header("authorization", format!("Bearer {}", token));
        }
        let body = match json {
            Some(json) => {
                req = req.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).unwrap())
            }
            None => Body::empty(),
        };
        let res = app.oneshot(req.body(body).unwrap()).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    fn writer_token() -> String {
        create_access_token(&Uuid::new_v4().to_string(), "writer@example.com", "writer").unwrap()
    }

    #[test]
    fn test_verify_access_token_invalid_returns_err() {
        let result = verify_access_token("invalid.jwt.token");
        assert!(result.is_err());
    }

    #[test]
    fn test_access_token_round_trip_keeps_claims() {
        let id = Uuid::new_v4();
        let token = create_access_token(&id.to_string(), "a@b.co", "admin").unwrap();
        let claims = verify_access_token(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), id);
        assert!(claims.is_admin());
        assert_eq!(claims.exp - claims.iat, ACCESS_TOKEN_EXPIRY_MINUTES * 60);
    }

    #[test]
    fn test_refresh_token_shape_and_hash() {
        let token = generate_refresh_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));

        let digest = hash_refresh_token(&token);
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, hash_refresh_token(&token));
        assert_ne!(digest, hash_refresh_token("other"));
    }

    #[test]
    fn test_require_admin_rejects_writer() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            require_admin(&headers),
            Err(ApiError::Unauthenticated(_))
        ));

        headers.insert(
            "authorization",
            format!("Bearer {}", writer_token()).parse().unwrap(),
        );
        assert!(require_user(&headers).is_ok());
        assert!(matches!(require_admin(&headers), Err(ApiError::Forbidden)));
    }

    #[tokio::test]
    async fn test_register_validation_errors_are_listed() {
        let (status, body) = send(
            auth_router(),
            "POST",
            "/api/register",
            None,
            Some(serde_json::json!({
                "name": "",
                "email": "not-an-email",
                "password": "short",
                "password_confirmation": "different"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let errors = body["errors"].as_object().unwrap();
        for field in ["name", "email", "password", "password_confirmation"] {
            assert!(errors.contains_key(field), "missing error for {}", field);
        }
    }

    #[tokio::test]
    async fn test_register_missing_field_is_listed() {
        let (status, body) = send(
            auth_router(),
            "POST",
            "/api/register",
            None,
            Some(serde_json::json!({
                "name": "Ada",
                "email": "ada@example.com",
                "password": "correct-horse"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["message"], "The given data was invalid.");
        assert_eq!(
            body["errors"]["password_confirmation"][0],
            "The password_confirmation field is required."
        );
    }

    #[tokio::test]
    async fn test_register_without_database_is_unavailable() {
        let (status, _) = send(
            auth_router(),
            "POST",
            "/api/register",
            None,
            Some(serde_json::json!({
                "name": "Ada",
                "email": "ada@example.com",
                "password": "correct-horse",
                "password_confirmation": "correct-horse"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_login_invalid_email_format_is_unprocessable() {
        let (status, body) = send(
            auth_router(),
            "POST",
            "/api/login",
            None,
            Some(serde_json::json!({"email": "no-at-sign", "password": "secret123"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["errors"]["email"].is_array());
    }

    #[tokio::test]
    async fn test_refresh_empty_token_is_unprocessable() {
        let (status, _) = send(
            auth_router(),
            "POST",
            "/api/refresh",
            None,
            Some(serde_json::json!({"refresh_token": ""})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        let (status, body) = send(auth_router(), "GET", "/api/user", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Unauthenticated.");

        let (status, _) = send(auth_router(), "POST", "/api/logout", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_preferences_reject_unknown_tone() {
        let (status, body) = send(
            auth_router(),
            "PUT",
            "/api/user/preferences",
            Some(&writer_token()),
            Some(serde_json::json!({"preferences": {"tone": "angry"}})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body["errors"]["preferences.tone"][0],
            "The preferences.tone field is invalid."
        );
    }

    #[tokio::test]
    async fn test_logout_with_token_but_no_database() {
        let (status, _) = send(
            auth_router(),
            "POST",
            "/api/logout",
            Some(&writer_token()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
