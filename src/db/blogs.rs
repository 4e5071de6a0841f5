//! Blog and SEO metadata queries.

use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use super::models::{
    Blog, BlogChanges, BlogWithSeo, NewBlog, RecentBlog, SeoMetadata, SeoMetadataInput,
};

const BLOG_COLUMNS: &str = "id, user_id, title, content, status, seo_score, reading_time, \
                            tags, category, created_at, updated_at";

const SEO_COLUMNS: &str = "id, blog_id, meta_title, meta_description, keywords, \
                           keyword_density, readability_score, created_at, updated_at";

async fn seo_for_blogs(
    pool: &PgPool,
    blog_ids: &[Uuid],
) -> Result<HashMap<Uuid, SeoMetadata>, sqlx::Error> {
    if blog_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query_as::<_, SeoMetadata>(&format!(
        "SELECT {SEO_COLUMNS} FROM seo_metadata WHERE blog_id = ANY($1)"
    ))
    .bind(blog_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|m| (m.blog_id, m)).collect())
}

async fn attach_seo(pool: &PgPool, blogs: Vec<Blog>) -> Result<Vec<BlogWithSeo>, sqlx::Error> {
    let ids: Vec<Uuid> = blogs.iter().map(|b| b.id).collect();
    let mut seo = seo_for_blogs(pool, &ids).await?;

    Ok(blogs
        .into_iter()
        .map(|blog| {
            let seo_metadata = seo.remove(&blog.id);
            BlogWithSeo { blog, seo_metadata }
        })
        .collect())
}

/// A user's blogs, most recently updated first.
pub async fn list_for_user(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<(Vec<BlogWithSeo>, i64), sqlx::Error> {
    let blogs = sqlx::query_as::<_, Blog>(&format!(
        r#"
        SELECT {BLOG_COLUMNS} FROM blogs
        WHERE user_id = $1
        ORDER BY updated_at DESC
        LIMIT $2 OFFSET $3
        "#
    ))
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM blogs WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    Ok((attach_seo(pool, blogs).await?, total))
}

/// A user's latest blogs by creation date.
pub async fn latest_for_user(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
) -> Result<Vec<Blog>, sqlx::Error> {
    sqlx::query_as::<_, Blog>(&format!(
        "SELECT {BLOG_COLUMNS} FROM blogs WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2"
    ))
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<BlogWithSeo>, sqlx::Error> {
    let blog = sqlx::query_as::<_, Blog>(&format!("SELECT {BLOG_COLUMNS} FROM blogs WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match blog {
        Some(blog) => {
            let seo_metadata = sqlx::query_as::<_, SeoMetadata>(&format!(
                "SELECT {SEO_COLUMNS} FROM seo_metadata WHERE blog_id = $1"
            ))
            .bind(blog.id)
            .fetch_optional(pool)
            .await?;
            Ok(Some(BlogWithSeo { blog, seo_metadata }))
        }
        None => Ok(None),
    }
}

pub async fn create(pool: &PgPool, new_blog: NewBlog, reading_time: i32) -> Result<Blog, sqlx::Error> {
    sqlx::query_as::<_, Blog>(&format!(
        r#"
        INSERT INTO blogs (user_id, title, content, status, seo_score, reading_time, tags, category)
        VALUES ($1, $2, $3, $4, 0, $5, $6, $7)
        RETURNING {BLOG_COLUMNS}
        "#
    ))
    .bind(new_blog.user_id)
    .bind(&new_blog.title)
    .bind(&new_blog.content)
    .bind(new_blog.status.as_str())
    .bind(reading_time)
    .bind(&new_blog.tags)
    .bind(&new_blog.category)
    .fetch_one(pool)
    .await
}

/// Apply a partial update; `reading_time` is only written when given.
pub async fn update(
    pool: &PgPool,
    id: Uuid,
    changes: BlogChanges,
    reading_time: Option<i32>,
) -> Result<Option<Blog>, sqlx::Error> {
    sqlx::query_as::<_, Blog>(&format!(
        r#"
        UPDATE blogs SET
            title = COALESCE($1, title),
            content = COALESCE($2, content),
            status = COALESCE($3, status),
            tags = COALESCE($4, tags),
            category = COALESCE($5, category),
            seo_score = COALESCE($6, seo_score),
            reading_time = COALESCE($7, reading_time),
            updated_at = now()
        WHERE id = $8
        RETURNING {BLOG_COLUMNS}
        "#
    ))
    .bind(&changes.title)
    .bind(&changes.content)
    .bind(changes.status.map(|s| s.as_str()))
    .bind(&changes.tags)
    .bind(&changes.category)
    .bind(changes.seo_score)
    .bind(reading_time)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn set_seo_score(pool: &PgPool, id: Uuid, seo_score: i32) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE blogs SET seo_score = $1, updated_at = now() WHERE id = $2")
        .bind(seo_score)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM blogs WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Insert SEO metadata for a blog or merge the given fields into the
/// existing row. Fields left as `None` keep their stored value.
pub async fn upsert_seo(
    pool: &PgPool,
    blog_id: Uuid,
    input: &SeoMetadataInput,
) -> Result<SeoMetadata, sqlx::Error> {
    sqlx::query_as::<_, SeoMetadata>(&format!(
        r#"
        INSERT INTO seo_metadata
            (blog_id, meta_title, meta_description, keywords, keyword_density, readability_score)
        VALUES ($1, $2, $3, COALESCE($4, '{{}}'::TEXT[]), $5, $6)
        ON CONFLICT (blog_id) DO UPDATE SET
            meta_title = COALESCE($2, seo_metadata.meta_title),
            meta_description = COALESCE($3, seo_metadata.meta_description),
            keywords = COALESCE($4, seo_metadata.keywords),
            keyword_density = COALESCE($5, seo_metadata.keyword_density),
            readability_score = COALESCE($6, seo_metadata.readability_score),
            updated_at = now()
        RETURNING {SEO_COLUMNS}
        "#
    ))
    .bind(blog_id)
    .bind(&input.meta_title)
    .bind(&input.meta_description)
    .bind(&input.keywords)
    .bind(input.keyword_density)
    .bind(input.readability_score)
    .fetch_one(pool)
    .await
}

pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM blogs")
        .fetch_one(pool)
        .await?;
    Ok(total)
}

pub async fn count_published(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM blogs WHERE status = 'published'")
        .fetch_one(pool)
        .await?;
    Ok(total)
}

pub async fn recent_with_author(pool: &PgPool, limit: i64) -> Result<Vec<RecentBlog>, sqlx::Error> {
    sqlx::query_as::<_, RecentBlog>(
        r#"
        SELECT b.id, b.title, b.status, b.created_at, u.name AS author
        FROM blogs b
        JOIN users u ON u.id = b.user_id
        ORDER BY b.created_at DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}
