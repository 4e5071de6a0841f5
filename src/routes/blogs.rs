/**
 * Blog Routes
 * CRUD for the caller's blogs, SEO metadata and export
 */
use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::content::{reading_time, sanitize_html};
use crate::db::{
    self,
    models::{
        page_offset, BlogChanges, BlogStatus, BlogWithSeo, NewBlog, Paginated, SeoMetadataInput,
    },
};
use crate::export::{export, ExportFormat};
use crate::routes::{
    auth::{require_user, Claims},
    pool, ApiError, ApiResult, Json, MessageResponse, PageQuery,
};

const BLOGS_PER_PAGE: i64 = 10;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct SeoMetadataRequest {
    #[validate(length(max = 60, message = "The meta title may not be greater than 60 characters."))]
    pub meta_title: Option<String>,
    #[validate(length(
        max = 155,
        message = "The meta description may not be greater than 155 characters."
    ))]
    pub meta_description: Option<String>,
    pub keywords: Option<Vec<String>>,
}

impl From<SeoMetadataRequest> for SeoMetadataInput {
    fn from(req: SeoMetadataRequest) -> Self {
        Self {
            meta_title: req.meta_title,
            meta_description: req.meta_description,
            keywords: req.keywords,
            keyword_density: None,
            readability_score: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CreateBlogRequest {
    #[validate(length(min = 1, max = 255, message = "The title field is required (max 255 characters)."))]
    pub title: String,
    pub content: Option<String>,
    pub status: Option<BlogStatus>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[validate(length(max = 100, message = "The category may not be greater than 100 characters."))]
    pub category: Option<String>,
    #[validate(nested)]
    pub seo_metadata: Option<SeoMetadataRequest>,
}

#[derive(Debug, Default, Deserialize, Serialize, Validate)]
pub struct UpdateBlogRequest {
    #[validate(length(min = 1, max = 255, message = "The title must be between 1 and 255 characters."))]
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: Option<BlogStatus>,
    pub tags: Option<Vec<String>>,
    #[validate(length(max = 100, message = "The category may not be greater than 100 characters."))]
    pub category: Option<String>,
    #[validate(range(min = 0, max = 100, message = "The seo score must be between 0 and 100."))]
    pub seo_score: Option<i32>,
    #[validate(nested)]
    pub seo_metadata: Option<SeoMetadataRequest>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ExportRequest {
    pub format: ExportFormat,
}

#[derive(Debug, Serialize)]
pub struct BlogResponse {
    pub blog: BlogWithSeo,
}

#[derive(Debug, Serialize)]
pub struct BlogMessageResponse {
    pub message: String,
    pub blog: BlogWithSeo,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExportResponse {
    pub format: ExportFormat,
    pub content: String,
}

// ============================================================================
// Helpers
// ============================================================================

/// Unknown or malformed ids are both reported as 404.
fn parse_id(id: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| ApiError::NotFound)
}

/// Owners and admins may act on a blog; everyone else gets 403.
pub(crate) fn ensure_can_access(claims: &Claims, owner_id: Uuid) -> ApiResult<()> {
    if claims.is_admin() || claims.user_id()? == owner_id {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// Load a blog the caller may access.
async fn load_accessible(claims: &Claims, id: &str) -> ApiResult<BlogWithSeo> {
    let id = parse_id(id)?;
    let pool = pool()?;
    let blog = db::blogs::find(&pool, id).await?.ok_or(ApiError::NotFound)?;
    ensure_can_access(claims, blog.blog.user_id)?;
    Ok(blog)
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/blogs
pub async fn list_blogs(
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Paginated<BlogWithSeo>>> {
    let claims = require_user(&headers)?;
    let pool = pool()?;

    let (page, offset) = page_offset(query.page, BLOGS_PER_PAGE);
    let (blogs, total) =
        db::blogs::list_for_user(&pool, claims.user_id()?, BLOGS_PER_PAGE, offset).await?;

    Ok(Json(Paginated::new(blogs, page, BLOGS_PER_PAGE, total)))
}

/// POST /api/blogs
pub async fn create_blog(
    headers: HeaderMap,
    Json(payload): Json<CreateBlogRequest>,
) -> ApiResult<(StatusCode, Json<BlogMessageResponse>)> {
    let claims = require_user(&headers)?;
    payload.validate()?;
    let pool = pool()?;

    let content = sanitize_html(payload.content.as_deref().unwrap_or_default());
    let minutes = reading_time(&content);
    let blog = db::blogs::create(
        &pool,
        NewBlog {
            user_id: claims.user_id()?,
            title: payload.title,
            content,
            status: payload.status.unwrap_or_default(),
            tags: payload.tags,
            category: payload.category,
        },
        minutes,
    )
    .await?;

    let seo_metadata = match payload.seo_metadata.map(SeoMetadataInput::from) {
        Some(input) if !input.is_empty() => Some(db::blogs::upsert_seo(&pool, blog.id, &input).await?),
        _ => None,
    };

    tracing::info!(blog_id = %blog.id, user_id = %blog.user_id, "blog created");

    Ok((
        StatusCode::CREATED,
        Json(BlogMessageResponse {
            message: "Blog created successfully".to_string(),
            blog: BlogWithSeo { blog, seo_metadata },
        }),
    ))
}

/// GET /api/blogs/{id}
pub async fn get_blog(headers: HeaderMap, Path(id): Path<String>) -> ApiResult<Json<BlogResponse>> {
    let claims = require_user(&headers)?;
    let blog = load_accessible(&claims, &id).await?;
    Ok(Json(BlogResponse { blog }))
}

/// PUT /api/blogs/{id}
pub async fn update_blog(
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<UpdateBlogRequest>,
) -> ApiResult<Json<BlogMessageResponse>> {
    let claims = require_user(&headers)?;
    payload.validate()?;
    let existing = load_accessible(&claims, &id).await?;
    let pool = pool()?;
    let blog_id = existing.blog.id;

    let content = payload.content.as_deref().map(sanitize_html);
    let minutes = content.as_deref().map(reading_time);
    let changes = BlogChanges {
        title: payload.title,
        content,
        status: payload.status,
        tags: payload.tags,
        category: payload.category,
        seo_score: payload.seo_score,
    };
    db::blogs::update(&pool, blog_id, changes, minutes)
        .await?
        .ok_or(ApiError::NotFound)?;

    if let Some(input) = payload.seo_metadata.map(SeoMetadataInput::from) {
        if !input.is_empty() {
            db::blogs::upsert_seo(&pool, blog_id, &input).await?;
        }
    }

    let blog = db::blogs::find(&pool, blog_id).await?.ok_or(ApiError::NotFound)?;
    tracing::info!(blog_id = %blog_id, "blog updated");

    Ok(Json(BlogMessageResponse {
        message: "Blog updated successfully".to_string(),
        blog,
    }))
}

/// DELETE /api/blogs/{id}
pub async fn delete_blog(
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let claims = require_user(&headers)?;
    let existing = load_accessible(&claims, &id).await?;
    let pool = pool()?;

    if !db::blogs::delete(&pool, existing.blog.id).await? {
        return Err(ApiError::NotFound);
    }
    tracing::info!(blog_id = %existing.blog.id, "blog deleted");

    Ok(MessageResponse::new("Blog deleted successfully"))
}

/// POST /api/blogs/{id}/export
pub async fn export_blog(
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<ExportRequest>,
) -> ApiResult<Json<ExportResponse>> {
    let claims = require_user(&headers)?;
    let blog = load_accessible(&claims, &id).await?;

    Ok(Json(ExportResponse {
        format: payload.format,
        content: export(&blog, payload.format),
    }))
}
