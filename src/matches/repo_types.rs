use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;

/// Namespace for deterministic connection ids.
const CONNECTION_NAMESPACE: Uuid = Uuid::from_u128(0x6c1f_2a8e_93d4_4b7a_8e5f_0d2c_4a61_b9e3);

/// Unordered user pair, stored sorted so `low < high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserPair {
    low: Uuid,
    high: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    A,
    B,
}

impl UserPair {
    pub fn new(a: Uuid, b: Uuid) -> Result<Self, AppError> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Ok(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Ok(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => {
                Err(AppError::BadRequest("a user cannot be paired with themselves".into()))
            }
        }
    }

    pub fn low(&self) -> Uuid {
        self.low
    }

    pub fn high(&self) -> Uuid {
        self.high
    }

    /// Stable id of the pair's connection, the same across deletion and re-creation.
    pub fn connection_id(&self) -> Uuid {
        let mut name = [0u8; 32];
        name[..16].copy_from_slice(self.low.as_bytes());
        name[16..].copy_from_slice(self.high.as_bytes());
        Uuid::new_v5(&CONNECTION_NAMESPACE, &name)
    }

    pub fn side(&self, user: Uuid) -> Option<Side> {
        if user == self.low {
            Some(Side::A)
        } else if user == self.high {
            Some(Side::B)
        } else {
            None
        }
    }

    pub fn other(&self, user: Uuid) -> Option<Uuid> {
        match self.side(user)? {
            Side::A => Some(self.high),
            Side::B => Some(self.low),
        }
    }
}

/// Accepted mutual match; one per unordered pair. `user_a < user_b`.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Connection {
    pub id: Uuid,
    pub user_a: Uuid,
    pub user_b: Uuid,
    pub status: String, // accepted
    pub initiated_by: Uuid,
    pub toast_seen_a: bool,
    pub toast_seen_b: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

pub const CONNECTION_ACCEPTED: &str = "accepted";

impl Connection {
    pub fn pair(&self) -> UserPair {
        UserPair {
            low: self.user_a,
            high: self.user_b,
        }
    }

    /// The user's toast flag, or `None` if they are not part of this connection.
    pub fn toast_seen_for(&self, user: Uuid) -> Option<bool> {
        match self.pair().side(user)? {
            Side::A => Some(self.toast_seen_a),
            Side::B => Some(self.toast_seen_b),
        }
    }
}

/// Directed record of a completed match, one per direction.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Match {
    pub id: Uuid,
    pub user_id: Uuid,
    pub liked_user_id: Uuid,
    pub action: String, // always "like"
    pub is_match: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub matched_at: OffsetDateTime,
    pub compatibility_score: Option<i16>,
}
