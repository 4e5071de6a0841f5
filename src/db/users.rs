//! User queries.

use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use super::models::{NewUser, RecentUser, Role, User, UserPreferences, UserWithCounts};

const USER_COLUMNS: &str =
    "id, name, email, password_hash, role, preferences, created_at, updated_at";

const USER_WITH_COUNTS: &str = r#"
    SELECT u.id, u.name, u.email, u.role, u.preferences, u.created_at, u.updated_at,
           (SELECT COUNT(*) FROM blogs b WHERE b.user_id = u.id) AS blogs_count,
           (SELECT COUNT(*) FROM ai_logs l WHERE l.user_id = u.id) AS ai_logs_count
    FROM users u
"#;

/// Outcome of an operation guarded by the "at least one admin" rule.
#[derive(Debug)]
pub enum AdminGuarded<T> {
    Done(T),
    NotFound,
    LastAdmin,
}

/// Insert a user. When no admin exists yet the new account is promoted to
/// admin so the installation always has one.
pub async fn create(pool: &PgPool, new_user: NewUser) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (name, email, password_hash, role, preferences)
        VALUES (
            $1, $2, $3,
            CASE WHEN EXISTS (SELECT 1 FROM users WHERE role = 'admin') THEN $4 ELSE 'admin' END,
            $5
        )
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(&new_user.name)
    .bind(&new_user.email)
    .bind(&new_user.password_hash)
    .bind(new_user.role.as_str())
    .bind(Json(&new_user.preferences))
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await
}

pub async fn admin_exists(pool: &PgPool) -> Result<bool, sqlx::Error> {
    let (exists,): (bool,) =
        sqlx::query_as("SELECT EXISTS (SELECT 1 FROM users WHERE role = 'admin')")
            .fetch_one(pool)
            .await?;
    Ok(exists)
}

pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    Ok(total)
}

pub async fn update_preferences(
    pool: &PgPool,
    id: Uuid,
    preferences: &UserPreferences,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        UPDATE users SET preferences = $1, updated_at = now()
        WHERE id = $2
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(Json(preferences))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Newest users first, with blog and AI-log counts.
pub async fn list_with_counts(
    pool: &PgPool,
    limit: i64,
    offset: i64,
) -> Result<(Vec<UserWithCounts>, i64), sqlx::Error> {
    let users = sqlx::query_as::<_, UserWithCounts>(&format!(
        "{USER_WITH_COUNTS} ORDER BY u.created_at DESC LIMIT $1 OFFSET $2"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok((users, count(pool).await?))
}

pub async fn find_with_counts(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<UserWithCounts>, sqlx::Error> {
    sqlx::query_as::<_, UserWithCounts>(&format!("{USER_WITH_COUNTS} WHERE u.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn recent(pool: &PgPool, limit: i64) -> Result<Vec<RecentUser>, sqlx::Error> {
    sqlx::query_as::<_, RecentUser>(
        "SELECT id, name, email, role, created_at FROM users ORDER BY created_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Lock the admin rows for the rest of the transaction and return how many
/// there are.
async fn lock_admin_count(tx: &mut sqlx::PgConnection) -> Result<i64, sqlx::Error> {
    let admins: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE role = 'admin' FOR UPDATE")
        .fetch_all(tx)
        .await?;
    Ok(admins.len() as i64)
}

/// Change a user's role, refusing to demote the last remaining admin.
pub async fn update_role(
    pool: &PgPool,
    id: Uuid,
    role: Role,
) -> Result<AdminGuarded<User>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let admin_count = lock_admin_count(&mut tx).await?;

    let Some(user) = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    else {
        return Ok(AdminGuarded::NotFound);
    };

    if user.is_admin() && role == Role::Writer && admin_count <= 1 {
        return Ok(AdminGuarded::LastAdmin);
    }

    let updated = sqlx::query_as::<_, User>(&format!(
        r#"
        UPDATE users SET role = $1, updated_at = now()
        WHERE id = $2
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(role.as_str())
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(AdminGuarded::Done(updated))
}

/// Delete a user (blogs, logs and tokens cascade), refusing to delete the
/// last remaining admin.
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<AdminGuarded<()>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let admin_count = lock_admin_count(&mut tx).await?;

    let role: Option<(String,)> = sqlx::query_as("SELECT role FROM users WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

    let Some((role,)) = role else {
        return Ok(AdminGuarded::NotFound);
    };

    if role == Role::Admin.as_str() && admin_count <= 1 {
        return Ok(AdminGuarded::LastAdmin);
    }

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(AdminGuarded::Done(()))
}
