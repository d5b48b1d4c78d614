use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Allow-list entry; any email here may request a login code.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PreapprovedEmail {
    pub email: String,
    pub approved_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Invitation {
    pub id: Uuid,
    pub email: String,
    pub code: String,
    pub invited_by: Option<Uuid>,
    pub status: String, // pending | accepted
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub accepted_at: Option<OffsetDateTime>,
}

impl Invitation {
    pub fn is_pending(&self) -> bool {
        self.status == "pending"
    }
}
