//! AI usage log queries (append-only).

use sqlx::PgPool;
use uuid::Uuid;

use super::models::{ActionUsage, AiLog, DailyUsage, NewAiLog, TopUser, TopUserRow};

pub async fn insert(pool: &PgPool, log: &NewAiLog) -> Result<AiLog, sqlx::Error> {
    sqlx::query_as::<_, AiLog>(
        r#"
        INSERT INTO ai_logs (user_id, action, tokens_used, request_data, response_data)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, user_id, action, tokens_used, request_data, response_data, created_at
        "#,
    )
    .bind(log.user_id)
    .bind(&log.action)
    .bind(log.tokens_used)
    .bind(&log.request_data)
    .bind(&log.response_data)
    .fetch_one(pool)
    .await
}

pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ai_logs")
        .fetch_one(pool)
        .await?;
    Ok(total)
}

pub async fn total_tokens(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let (total,): (i64,) =
        sqlx::query_as("SELECT COALESCE(SUM(tokens_used), 0)::BIGINT FROM ai_logs")
            .fetch_one(pool)
            .await?;
    Ok(total)
}

pub async fn tokens_for_user(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
    let (total,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(tokens_used), 0)::BIGINT FROM ai_logs WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(total)
}

pub async fn usage_by_action(pool: &PgPool) -> Result<Vec<ActionUsage>, sqlx::Error> {
    sqlx::query_as::<_, ActionUsage>(
        r#"
        SELECT action, COUNT(*) AS count, COALESCE(SUM(tokens_used), 0)::BIGINT AS total_tokens
        FROM ai_logs
        GROUP BY action
        ORDER BY action
        "#,
    )
    .fetch_all(pool)
    .await
}

/// Per-day request and token totals for the trailing `days` days, newest first.
pub async fn daily_usage(pool: &PgPool, days: i32) -> Result<Vec<DailyUsage>, sqlx::Error> {
    sqlx::query_as::<_, DailyUsage>(
        r#"
        SELECT DATE(created_at) AS date,
               COUNT(*) AS requests,
               COALESCE(SUM(tokens_used), 0)::BIGINT AS tokens
        FROM ai_logs
        WHERE created_at >= now() - make_interval(days => $1)
        GROUP BY DATE(created_at)
        ORDER BY date DESC
        "#,
    )
    .bind(days)
    .fetch_all(pool)
    .await
}

pub async fn top_users(pool: &PgPool, limit: i64) -> Result<Vec<TopUser>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TopUserRow>(
        r#"
        SELECT l.user_id,
               COALESCE(SUM(l.tokens_used), 0)::BIGINT AS total_tokens,
               COUNT(*) AS request_count,
               u.name,
               u.email
        FROM ai_logs l
        JOIN users u ON u.id = l.user_id
        GROUP BY l.user_id, u.name, u.email
        ORDER BY total_tokens DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(TopUser::from).collect())
}
