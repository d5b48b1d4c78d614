use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::time_fmt::iso_date;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeAction {
    Like,
    Pass,
}

impl LikeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LikeAction::Like => "like",
            LikeAction::Pass => "pass",
        }
    }
}

impl fmt::Display for LikeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LikeAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(LikeAction::Like),
            "pass" => Ok(LikeAction::Pass),
            other => anyhow::bail!("unknown like action {other:?}"),
        }
    }
}

/// Directed swipe edge `user_id -> liked_profile_id`, unique per direction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyLike {
    pub id: Uuid,
    pub user_id: Uuid,
    pub liked_profile_id: Uuid,
    pub action: LikeAction,
    #[serde(with = "iso_date")]
    pub like_date: Date,
    pub is_mutual_match: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl DailyLike {
    pub fn is_like(&self) -> bool {
        self.action == LikeAction::Like
    }
}

#[derive(Debug, FromRow)]
pub struct DailyLikeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub liked_profile_id: Uuid,
    pub action: String,
    pub like_date: Date,
    pub is_mutual_match: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<DailyLikeRow> for DailyLike {
    type Error = anyhow::Error;

    fn try_from(r: DailyLikeRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            liked_profile_id: r.liked_profile_id,
            action: r.action.parse()?,
            like_date: r.like_date,
            is_mutual_match: r.is_mutual_match,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Result of an edge upsert.
#[derive(Debug, Clone)]
pub struct UpsertedLike {
    pub like: DailyLike,
    /// `false` when the edge already existed and was updated in place.
    pub inserted: bool,
}
