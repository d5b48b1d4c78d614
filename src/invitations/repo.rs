use anyhow::Context;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::invitations::repo_types::{Invitation, PreapprovedEmail};

impl PreapprovedEmail {
    pub async fn upsert<'e, E>(db: E, email: &str, approved_by: Uuid) -> anyhow::Result<PreapprovedEmail>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query_as::<_, PreapprovedEmail>(
            r#"
            INSERT INTO preapproved_emails (email, approved_by)
            VALUES ($1, $2)
            ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
            RETURNING email, approved_by, created_at
            "#,
        )
        .bind(email)
        .bind(approved_by)
        .fetch_one(db)
        .await
        .context("upsert preapproved email")?;
        Ok(row)
    }

    pub async fn exists(db: &PgPool, email: &str) -> anyhow::Result<bool> {
        let found: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM preapproved_emails WHERE email = $1)")
                .bind(email)
                .fetch_one(db)
                .await
                .context("check preapproved email")?;
        Ok(found)
    }
}

impl Invitation {
    /// Create a pending invitation, or return the existing one for this email unchanged.
    pub async fn upsert_pending<'e, E>(
        db: E,
        email: &str,
        code: &str,
        invited_by: Uuid,
    ) -> anyhow::Result<Invitation>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query_as::<_, Invitation>(
            r#"
            INSERT INTO invitations (email, code, invited_by, status)
            VALUES ($1, $2, $3, 'pending')
            ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
            RETURNING id, email, code, invited_by, status, created_at, accepted_at
            "#,
        )
        .bind(email)
        .bind(code)
        .bind(invited_by)
        .fetch_one(db)
        .await
        .context("upsert invitation")?;
        Ok(row)
    }

    pub async fn exists_for(db: &PgPool, email: &str) -> anyhow::Result<bool> {
        let found: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM invitations WHERE email = $1)")
                .bind(email)
                .fetch_one(db)
                .await
                .context("check invitation")?;
        Ok(found)
    }

    pub async fn accept(db: &PgPool, email: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE invitations
               SET status = 'accepted', accepted_at = now()
             WHERE email = $1 AND status = 'pending'
            "#,
        )
        .bind(email)
        .execute(db)
        .await
        .context("accept invitation")?;
        Ok(())
    }
}
