use sqlx::FromRow;
use time::OffsetDateTime;

/// Pending one-time login code. One live code per email.
#[derive(Debug, Clone, FromRow)]
pub struct OtpCode {
    pub email: String,
    pub code_hash: String, // Argon2 hash, the plain code is only ever emailed
    pub expires_at: OffsetDateTime,
    pub attempts: i32,
    pub created_at: OffsetDateTime,
}

impl OtpCode {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    pub fn is_exhausted(&self, max_attempts: i32) -> bool {
        self.attempts >= max_attempts
    }
}
