use anyhow::Context;
use sqlx::{types::Json, PgExecutor, PgPool};
use uuid::Uuid;

use crate::users::repo_types::{Profile, Role, User, UserRow, UserStatus};

const USER_COLUMNS: &str =
    "id, email, role, status, approved, profile, created_at, updated_at";

impl User {
    /// Find a user by id.
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find user by id")?;
        row.map(User::try_from).transpose()
    }

    pub async fn find_many(db: &PgPool, ids: &[Uuid]) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(db)
        .await
        .context("find users by ids")?;
        rows.into_iter().map(User::try_from).collect()
    }

    /// Insert a user unless the email is already registered; returns the stored row either way.
    pub async fn create_if_absent<'e, E>(
        db: E,
        email: &str,
        role: Role,
        status: UserStatus,
    ) -> anyhow::Result<User>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (email, role, status)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(role.as_str())
        .bind(status.as_str())
        .fetch_one(db)
        .await
        .context("create user")?;
        User::try_from(row)
    }

    /// Conditional status change; `None` when the row is not in `expected`.
    pub async fn set_status_if(
        db: &PgPool,
        id: Uuid,
        expected: UserStatus,
        next: UserStatus,
    ) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users SET status = $3, updated_at = now()
             WHERE id = $1 AND status = $2
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(expected.as_str())
        .bind(next.as_str())
        .fetch_optional(db)
        .await
        .context("set user status")?;
        row.map(User::try_from).transpose()
    }

    pub async fn set_role(db: &PgPool, id: Uuid, role: Role) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET role = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(role.as_str())
            .execute(db)
            .await
            .context("set user role")?;
        Ok(())
    }

    pub async fn approve(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users SET approved = TRUE, updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("approve user")?;
        row.map(User::try_from).transpose()
    }

    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        profile: &Profile,
    ) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users SET profile = $2, updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(Json(profile))
        .fetch_optional(db)
        .await
        .context("update user profile")?;
        row.map(User::try_from).transpose()
    }
}
