use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct MutualMatchItem {
    pub connection_id: Uuid,
    pub user_id: Uuid,
    pub name: Option<String>,
    pub city: Option<String>,
    pub image: Option<String>,
    pub compatibility_score: Option<i16>,
    #[serde(with = "time::serde::rfc3339")]
    pub matched_at: OffsetDateTime,
    pub toast_pending: bool,
}
