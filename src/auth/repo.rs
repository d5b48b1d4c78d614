use anyhow::Context;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::auth::repo_types::OtpCode;

impl OtpCode {
    /// Store a fresh code for the email, replacing any previous one.
    pub async fn replace(
        db: &PgPool,
        email: &str,
        code_hash: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO otp_codes (email, code_hash, expires_at, attempts)
            VALUES ($1, $2, $3, 0)
            ON CONFLICT (email) DO UPDATE
               SET code_hash = EXCLUDED.code_hash,
                   expires_at = EXCLUDED.expires_at,
                   attempts = 0,
                   created_at = now()
            "#,
        )
        .bind(email)
        .bind(code_hash)
        .bind(expires_at)
        .execute(db)
        .await
        .context("store otp code")?;
        Ok(())
    }

    /// Count one attempt against a live, unexhausted code and return its hash.
    /// The check and the increment are one statement, so concurrent guesses
    /// cannot exceed `max_attempts` between them.
    pub async fn reserve_attempt(
        db: &PgPool,
        email: &str,
        max_attempts: i32,
    ) -> anyhow::Result<Option<String>> {
        let hash: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE otp_codes
               SET attempts = attempts + 1
             WHERE email = $1 AND attempts < $2 AND expires_at > now()
            RETURNING code_hash
            "#,
        )
        .bind(email)
        .bind(max_attempts)
        .fetch_optional(db)
        .await
        .context("reserve otp attempt")?;
        Ok(hash)
    }

    /// Remove the code; `true` only for the caller whose delete took it.
    pub async fn consume(db: &PgPool, email: &str) -> anyhow::Result<bool> {
        let removed: Option<String> =
            sqlx::query_scalar("DELETE FROM otp_codes WHERE email = $1 RETURNING email")
                .bind(email)
                .fetch_optional(db)
                .await
                .context("consume otp code")?;
        Ok(removed.is_some())
    }
}
