//! Database Models - structs representing database tables (used by sqlx/serde).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use uuid::Uuid;

// ============================================================================
// Enumerations (stored as TEXT)
// ============================================================================

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Writer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Writer => "writer",
            Role::Admin => "admin",
        }
    }
}

/// Publication status of a blog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlogStatus {
    #[default]
    Draft,
    Published,
}

impl BlogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlogStatus::Draft => "draft",
            BlogStatus::Published => "published",
        }
    }
}

/// Writing tone used for generation prompts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Professional,
    Casual,
    Technical,
    Storytelling,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Professional => "professional",
            Tone::Casual => "casual",
            Tone::Technical => "technical",
            Tone::Storytelling => "storytelling",
        }
    }
}

impl std::fmt::Display for Tone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Users
// ============================================================================

/// Free-form writing preferences collected during onboarding
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(default)]
    pub niches: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<Tone>,
}

/// User model
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub preferences: Json<UserPreferences>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin.as_str()
    }
}

/// New user for insertion
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub preferences: UserPreferences,
}

/// User row with relationship counts (admin listing)
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserWithCounts {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub preferences: Json<UserPreferences>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub blogs_count: i64,
    pub ai_logs_count: i64,
}

/// Refresh token model
#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Blogs
// ============================================================================

/// Blog model
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Blog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub status: String,
    pub seo_score: i32,
    pub reading_time: i32,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// SEO metadata model (one-to-one with a blog)
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SeoMetadata {
    pub id: Uuid,
    pub blog_id: Uuid,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub keywords: Vec<String>,
    pub keyword_density: Option<f64>,
    pub readability_score: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Blog together with its SEO metadata, as returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct BlogWithSeo {
    #[serde(flatten)]
    pub blog: Blog,
    pub seo_metadata: Option<SeoMetadata>,
}

/// New blog for insertion. `content` must already be sanitized.
#[derive(Debug, Clone)]
pub struct NewBlog {
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub status: BlogStatus,
    pub tags: Vec<String>,
    pub category: Option<String>,
}

/// Partial blog update. `None` leaves a column unchanged.
#[derive(Debug, Clone, Default)]
pub struct BlogChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: Option<BlogStatus>,
    pub tags: Option<Vec<String>>,
    pub category: Option<String>,
    pub seo_score: Option<i32>,
}

/// SEO metadata fields to insert or merge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeoMetadataInput {
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub keyword_density: Option<f64>,
    pub readability_score: Option<i32>,
}

impl SeoMetadataInput {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Recent signup row for the admin dashboard
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RecentUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// Recent blog row for the admin dashboard
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RecentBlog {
    pub id: Uuid,
    pub title: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub author: String,
}

// ============================================================================
// AI usage logs
// ============================================================================

/// AI usage log model
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AiLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub action: String,
    pub tokens_used: i32,
    pub request_data: Option<serde_json::Value>,
    pub response_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// New AI usage log for insertion
#[derive(Debug, Clone)]
pub struct NewAiLog {
    pub user_id: Uuid,
    pub action: String,
    pub tokens_used: i32,
    pub request_data: serde_json::Value,
    pub response_data: serde_json::Value,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ActionUsage {
    pub action: String,
    pub count: i64,
    pub total_tokens: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DailyUsage {
    pub date: chrono::NaiveDate,
    pub requests: i64,
    pub tokens: i64,
}

/// Minimal user reference embedded in usage reports
#[derive(Debug, Clone, Serialize)]
pub struct UserRef {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct TopUserRow {
    pub user_id: Uuid,
    pub total_tokens: i64,
    pub request_count: i64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopUser {
    pub user_id: Uuid,
    pub total_tokens: i64,
    pub request_count: i64,
    pub user: UserRef,
}

impl From<TopUserRow> for TopUser {
    fn from(row: TopUserRow) -> Self {
        Self {
            user_id: row.user_id,
            total_tokens: row.total_tokens,
            request_count: row.request_count,
            user: UserRef {
                id: row.user_id,
                name: row.name,
                email: row.email,
            },
        }
    }
}

// ============================================================================
// Pagination
// ============================================================================

/// Paginated list envelope
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub current_page: i64,
    pub last_page: i64,
    pub per_page: i64,
    pub total: i64,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, page: i64, per_page: i64, total: i64) -> Self {
        let last_page = ((total + per_page - 1) / per_page).max(1);
        Self {
            data,
            current_page: page,
            last_page,
            per_page,
            total,
        }
    }
}

/// Clamp a requested 1-based page number and return `(page, offset)`.
pub fn page_offset(page: Option<i64>, per_page: i64) -> (i64, i64) {
    let page = page.unwrap_or(1).max(1);
    (page, (page - 1) * per_page)
}
