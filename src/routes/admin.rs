/**
 * Admin Routes
 * Dashboard statistics, user management and AI usage reporting
 */
use axum::{
    extract::{Path, Query},
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{
    self,
    models::{
        page_offset, ActionUsage, Blog, DailyUsage, Paginated, RecentBlog, RecentUser, Role,
        TopUser, User, UserWithCounts,
    },
    users::AdminGuarded,
};
use crate::routes::{
    auth::require_admin, pool, ApiError, ApiResult, Json, MessageResponse, PageQuery,
};

const USERS_PER_PAGE: i64 = 20;
const RECENT_LIMIT: i64 = 5;
const USER_BLOG_LIMIT: i64 = 10;
const USAGE_WINDOW_DAYS: i32 = 30;
const TOP_USERS_LIMIT: i64 = 10;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub total_users: i64,
    pub total_blogs: i64,
    pub published_blogs: i64,
    pub total_tokens_used: i64,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub stats: DashboardStats,
    pub recent_blogs: Vec<RecentBlog>,
    pub recent_users: Vec<RecentUser>,
}

/// User with counts and their latest blogs
#[derive(Debug, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: UserWithCounts,
    pub blogs: Vec<Blog>,
}

#[derive(Debug, Serialize)]
pub struct UserDetailResponse {
    pub user: UserDetail,
    pub total_tokens_used: i64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct UpdateRoleResponse {
    pub message: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct AiUsageResponse {
    pub total_requests: i64,
    pub total_tokens: i64,
    pub usage_by_action: Vec<ActionUsage>,
    pub daily_usage: Vec<DailyUsage>,
    pub top_users: Vec<TopUser>,
}

fn parse_id(id: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| ApiError::NotFound)
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/admin/dashboard
pub async fn dashboard(headers: HeaderMap) -> ApiResult<Json<DashboardResponse>> {
    require_admin(&headers)?;
    let pool = pool()?;

    let (total_users, total_blogs, published_blogs, total_tokens_used) = tokio::try_join!(
        db::users::count(&pool),
        db::blogs::count(&pool),
        db::blogs::count_published(&pool),
        db::ai_logs::total_tokens(&pool),
    )?;
    let (recent_blogs, recent_users) = tokio::try_join!(
        db::blogs::recent_with_author(&pool, RECENT_LIMIT),
        db::users::recent(&pool, RECENT_LIMIT),
    )?;

    Ok(Json(DashboardResponse {
        stats: DashboardStats {
            total_users,
            total_blogs,
            published_blogs,
            total_tokens_used,
        },
        recent_blogs,
        recent_users,
    }))
}

/// GET /api/admin/users
pub async fn list_users(
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Paginated<UserWithCounts>>> {
    require_admin(&headers)?;
    let pool = pool()?;

    let (page, offset) = page_offset(query.page, USERS_PER_PAGE);
    let (users, total) = db::users::list_with_counts(&pool, USERS_PER_PAGE, offset).await?;

    Ok(Json(Paginated::new(users, page, USERS_PER_PAGE, total)))
}

/// GET /api/admin/users/{id}
pub async fn user_details(
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<UserDetailResponse>> {
    require_admin(&headers)?;
    let id = parse_id(&id)?;
    let pool = pool()?;

    let user = db::users::find_with_counts(&pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let (blogs, total_tokens_used) = tokio::try_join!(
        db::blogs::latest_for_user(&pool, id, USER_BLOG_LIMIT),
        db::ai_logs::tokens_for_user(&pool, id),
    )?;

    Ok(Json(UserDetailResponse {
        user: UserDetail { user, blogs },
        total_tokens_used,
    }))
}

/// PUT /api/admin/users/{id}/role
pub async fn update_user_role(
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<UpdateRoleRequest>,
) -> ApiResult<Json<UpdateRoleResponse>> {
    let claims = require_admin(&headers)?;
    let id = parse_id(&id)?;
    let pool = pool()?;

    match db::users::update_role(&pool, id, payload.role).await? {
        AdminGuarded::Done(user) => {
            tracing::info!(admin = %claims.sub, user_id = %user.id, role = %user.role, "user role updated");
            Ok(Json(UpdateRoleResponse {
                message: "User role updated successfully".to_string(),
                user,
            }))
        }
        AdminGuarded::NotFound => Err(ApiError::NotFound),
        AdminGuarded::LastAdmin => Err(ApiError::BadRequest(
            "Cannot remove the last admin user".to_string(),
        )),
    }
}

/// DELETE /api/admin/users/{id}
pub async fn delete_user(
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let claims = require_admin(&headers)?;
    let id = parse_id(&id)?;
    if claims.user_id()? == id {
        return Err(ApiError::BadRequest(
            "Cannot delete your own account".to_string(),
        ));
    }
    let pool = pool()?;

    match db::users::delete(&pool, id).await? {
        AdminGuarded::Done(()) => {
            tracing::info!(admin = %claims.sub, user_id = %id, "user deleted");
            Ok(MessageResponse::new("User deleted successfully"))
        }
        AdminGuarded::NotFound => Err(ApiError::NotFound),
        AdminGuarded::LastAdmin => Err(ApiError::BadRequest(
            "Cannot delete the last admin user".to_string(),
        )),
    }
}

/// GET /api/admin/ai-usage
pub async fn ai_usage(headers: HeaderMap) -> ApiResult<Json<AiUsageResponse>> {
    require_admin(&headers)?;
    let pool = pool()?;

    let (total_requests, total_tokens, usage_by_action, daily_usage, top_users) = tokio::try_join!(
        db::ai_logs::count(&pool),
        db::ai_logs::total_tokens(&pool),
        db::ai_logs::usage_by_action(&pool),
        db::ai_logs::daily_usage(&pool, USAGE_WINDOW_DAYS),
        db::ai_logs::top_users(&pool, TOP_USERS_LIMIT),
    )?;

    Ok(Json(AiUsageResponse {
        total_requests,
        total_tokens,
        usage_by_action,
        daily_usage,
        top_users,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::auth::create_access_token;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::{get, put};
    use axum::Router;
    use tower::ServiceExt;

    fn admin_router() -> Router {
        Router::new()
            .route("/api/admin/dashboard", get(dashboard))
            .route("/api/admin/users", get(list_users))
            .route("/api/admin/users/{id}", get(user_details).delete(delete_user))
            .route("/api/admin/users/{id}/role", put(update_user_role))
            .route("/api/admin/ai-usage", get(ai_usage))
    }

    async fn send(
        method: &str,
        uri: &str,
        token: &str,
        json: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", token));
        let body = match json {
            Some(json) => {
                req = req.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).unwrap())
            }
            None => Body::empty(),
        };
        let res = admin_router().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    fn token_for(id: Uuid, role: &str) -> String {
        create_access_token(&id.to_string(), "someone@example.com", role).unwrap()
    }

    #[tokio::test]
    async fn test_writers_are_forbidden() {
        let token = token_for(Uuid::new_v4(), "writer");
        for uri in ["/api/admin/dashboard", "/api/admin/users", "/api/admin/ai-usage"] {
            let (status, body) = send("GET", uri, &token, None).await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
            assert_eq!(body["message"], "Unauthorized");
        }
    }

    #[tokio::test]
    async fn test_admin_without_database_is_unavailable() {
        let token = token_for(Uuid::new_v4(), "admin");
        let (status, _) = send("GET", "/api/admin/dashboard", &token, None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_admin_cannot_delete_self() {
        let id = Uuid::new_v4();
        let (status, body) = send(
            "DELETE",
            &format!("/api/admin/users/{}", id),
            &token_for(id, "admin"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Cannot delete your own account");
    }

    #[tokio::test]
    async fn test_unknown_role_is_rejected() {
        let (status, _) = send(
            "PUT",
            &format!("/api/admin/users/{}/role", Uuid::new_v4()),
            &token_for(Uuid::new_v4(), "admin"),
            Some(serde_json::json!({"role": "owner"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_malformed_user_id_is_not_found() {
        let (status, _) = send(
            "GET",
            "/api/admin/users/42",
            &token_for(Uuid::new_v4(), "admin"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
