//! Persistence seams: [`MatchStore`] for the like / match / toast workflow and
//! [`AccountStore`] for users, invitations and login codes.
//!
//! Every method is a single atomic unit (one statement or one transaction in
//! [`PgStore`], one critical section in [`MemoryStore`]). Services compose them
//! so that each step is idempotent and a crash between steps is repaired by the
//! reconciliation pass.

use async_trait::async_trait;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::{
    invitations::repo_types::Invitation,
    likes::repo_types::{DailyLike, LikeAction, UpsertedLike},
    matches::repo_types::{Connection, Match, UserPair},
    users::repo_types::{Profile, Role, User, UserStatus},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Outcome of an atomic toast flag update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastMark {
    /// The caller's flag on the connection is now set.
    Marked,
    /// The connection exists but the user is not part of it.
    NotInPair,
    /// No such connection yet; nothing was written.
    NoConnection,
}

#[async_trait]
pub trait MatchStore: Send + Sync {
    async fn find_user(&self, id: Uuid) -> anyhow::Result<Option<User>>;

    async fn find_users(&self, ids: &[Uuid]) -> anyhow::Result<Vec<User>>;

    /// Insert or update the edge keyed by `(user_id, liked_profile_id)`.
    /// An existing edge keeps its id and mutuality. It keeps its `like_date`
    /// too, unless it turns from `pass` into `like`, which dates it `like_date`.
    async fn upsert_like(
        &self,
        user_id: Uuid,
        liked_profile_id: Uuid,
        action: LikeAction,
        like_date: Date,
    ) -> anyhow::Result<UpsertedLike>;

    async fn find_like(
        &self,
        user_id: Uuid,
        liked_profile_id: Uuid,
    ) -> anyhow::Result<Option<DailyLike>>;

    /// Derive mutuality from the current actions of both edges under a lock
    /// and store it on both. Returns the derived value.
    async fn sync_pair_mutual(&self, pair: &UserPair) -> anyhow::Result<bool>;

    /// Profiles the user currently has a `like` edge towards.
    async fn liked_profile_ids(&self, user_id: Uuid) -> anyhow::Result<Vec<Uuid>>;

    /// Number of `like` edges the user created on `day`.
    async fn count_likes_on(&self, user_id: Uuid, day: Date) -> anyhow::Result<i64>;

    /// Pairs whose stored mutuality differs from what their edges imply.
    async fn find_mutuality_drift(&self, limit: i64) -> anyhow::Result<Vec<UserPair>>;

    /// Pairs whose edges are mutual but that have no connection.
    async fn find_unmaterialized_pairs(&self, limit: i64) -> anyhow::Result<Vec<UserPair>>;

    /// Insert or refresh the pair's connection; folds pending toast fallbacks
    /// into the flags. An existing row keeps `initiated_by` and its flags.
    async fn upsert_connection(
        &self,
        pair: &UserPair,
        initiated_by: Uuid,
    ) -> anyhow::Result<Connection>;

    async fn find_connection(&self, id: Uuid) -> anyhow::Result<Option<Connection>>;

    async fn list_connections_for(&self, user_id: Uuid) -> anyhow::Result<Vec<Connection>>;

    async fn delete_connection(&self, id: Uuid) -> anyhow::Result<bool>;

    /// Insert or refresh the directed match row keyed by `(user_id, liked_user_id)`.
    async fn upsert_match(
        &self,
        user_id: Uuid,
        liked_user_id: Uuid,
        compatibility_score: Option<i16>,
    ) -> anyhow::Result<Match>;

    async fn list_matches_for(&self, user_id: Uuid) -> anyhow::Result<Vec<Match>>;

    /// Set the user's toast flag without reading it first. Writes nothing
    /// when the connection does not exist.
    async fn mark_toast_seen(&self, connection_id: Uuid, user_id: Uuid)
        -> anyhow::Result<ToastMark>;

    /// Record a fallback marker for a connection that does not exist yet.
    /// Returns `true` only for the call that created the marker.
    async fn claim_toast_fallback(&self, connection_id: Uuid, user_id: Uuid)
        -> anyhow::Result<bool>;

    /// Drop fallback markers created before `cutoff`. Returns how many went.
    async fn purge_toast_fallbacks(&self, cutoff: OffsetDateTime) -> anyhow::Result<u64>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_account(&self, id: Uuid) -> anyhow::Result<Option<User>>;

    /// Insert a user unless the email is registered; returns the stored row either way.
    async fn create_account_if_absent(
        &self,
        email: &str,
        role: Role,
        status: UserStatus,
    ) -> anyhow::Result<User>;

    /// Move the user from `expected` to `next`. `None` if the user is missing
    /// or no longer in `expected`.
    async fn transition_account_status(
        &self,
        id: Uuid,
        expected: UserStatus,
        next: UserStatus,
    ) -> anyhow::Result<Option<User>>;

    async fn set_account_role(&self, id: Uuid, role: Role) -> anyhow::Result<()>;

    async fn approve_account(&self, id: Uuid) -> anyhow::Result<Option<User>>;

    async fn update_account_profile(
        &self,
        id: Uuid,
        profile: &Profile,
    ) -> anyhow::Result<Option<User>>;

    /// Preapproved or invited.
    async fn is_allow_listed(&self, email: &str) -> anyhow::Result<bool>;

    /// Allow-list the email, upsert its pending invitation and create the
    /// invited user, all at once. An existing invitation is returned unchanged.
    async fn invite(
        &self,
        email: &str,
        code: &str,
        invited_by: Uuid,
    ) -> anyhow::Result<(Invitation, User)>;

    async fn accept_invitation(&self, email: &str) -> anyhow::Result<()>;

    /// Store a fresh login code for the email, replacing any previous one.
    async fn replace_otp(
        &self,
        email: &str,
        code_hash: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()>;

    /// Count one attempt against the live code and return its hash. `None`
    /// when there is no code, it expired, or `max_attempts` are used up.
    async fn reserve_otp_attempt(
        &self,
        email: &str,
        max_attempts: i32,
    ) -> anyhow::Result<Option<String>>;

    /// Delete the code. Only the call that removed it gets `true`.
    async fn consume_otp(&self, email: &str) -> anyhow::Result<bool>;
}
