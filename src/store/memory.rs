use std::{
    collections::{hash_map::Entry, HashMap, HashSet},
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::{
    auth::repo_types::OtpCode,
    invitations::repo_types::Invitation,
    likes::repo_types::{DailyLike, LikeAction, UpsertedLike},
    matches::repo_types::{Connection, Match, UserPair, CONNECTION_ACCEPTED},
    store::{AccountStore, MatchStore, ToastMark},
    users::repo_types::{Profile, Role, User, UserStatus},
};

/// In-process store with the same uniqueness rules as the SQL schema.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    likes: HashMap<(Uuid, Uuid), DailyLike>,
    connections: HashMap<Uuid, Connection>,
    matches: HashMap<(Uuid, Uuid), Match>,
    toast_fallbacks: HashMap<(Uuid, Uuid), OffsetDateTime>,
    preapproved: HashSet<String>,
    invitations: HashMap<String, Invitation>,
    otp_codes: HashMap<String, OtpCode>,
}

impl Inner {
    fn user_by_email(&self, email: &str) -> Option<&User> {
        self.users.values().find(|u| u.email == email)
    }

    fn insert_user(&mut self, email: &str, role: Role, status: UserStatus) -> User {
        if let Some(existing) = self.user_by_email(email) {
            return existing.clone();
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            role,
            status,
            approved: false,
            profile: Profile::default(),
            created_at: now,
            updated_at: now,
        };
        self.users.insert(user.id, user.clone());
        user
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))
    }

    /// Register an active user with the given profile.
    pub fn add_user(&self, profile: Profile) -> anyhow::Result<User> {
        let now = OffsetDateTime::now_utc();
        let id = Uuid::new_v4();
        let user = User {
            id,
            email: format!("{id}@example.test"),
            role: Role::User,
            status: UserStatus::Active,
            approved: true,
            profile,
            created_at: now,
            updated_at: now,
        };
        self.lock()?.users.insert(id, user.clone());
        Ok(user)
    }

    pub fn set_user_status(&self, id: Uuid, status: UserStatus) -> anyhow::Result<()> {
        if let Some(u) = self.lock()?.users.get_mut(&id) {
            u.status = status;
        }
        Ok(())
    }

    pub fn connection_count(&self) -> anyhow::Result<usize> {
        Ok(self.lock()?.connections.len())
    }

    pub fn match_count(&self) -> anyhow::Result<usize> {
        Ok(self.lock()?.matches.len())
    }

    pub fn like_count(&self) -> anyhow::Result<usize> {
        Ok(self.lock()?.likes.len())
    }

    pub fn fallback_count(&self) -> anyhow::Result<usize> {
        Ok(self.lock()?.toast_fallbacks.len())
    }

    pub fn otp_attempts(&self, email: &str) -> anyhow::Result<Option<i32>> {
        Ok(self.lock()?.otp_codes.get(email).map(|c| c.attempts))
    }

    pub fn invitation_for(&self, email: &str) -> anyhow::Result<Option<Invitation>> {
        Ok(self.lock()?.invitations.get(email).cloned())
    }

    pub fn account_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.lock()?.user_by_email(email).cloned())
    }

    /// Overwrite both edges' mutuality, bypassing derivation. Lets tests
    /// set up the drift a failed request leaves behind.
    pub fn force_pair_mutual(&self, pair: &UserPair, mutual: bool) -> anyhow::Result<()> {
        let mut inner = self.lock()?;
        for key in [(pair.low(), pair.high()), (pair.high(), pair.low())] {
            if let Some(like) = inner.likes.get_mut(&key) {
                like.is_mutual_match = mutual;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MatchStore for MemoryStore {
    async fn find_user(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn find_users(&self, ids: &[Uuid]) -> anyhow::Result<Vec<User>> {
        let inner = self.lock()?;
        Ok(ids.iter().filter_map(|id| inner.users.get(id).cloned()).collect())
    }

    async fn upsert_like(
        &self,
        user_id: Uuid,
        liked_profile_id: Uuid,
        action: LikeAction,
        like_date: Date,
    ) -> anyhow::Result<UpsertedLike> {
        let now = OffsetDateTime::now_utc();
        let mut inner = self.lock()?;
        match inner.likes.get_mut(&(user_id, liked_profile_id)) {
            Some(existing) => {
                if !existing.is_like() && action == LikeAction::Like {
                    existing.like_date = like_date;
                }
                existing.action = action;
                existing.updated_at = now;
                Ok(UpsertedLike {
                    like: existing.clone(),
                    inserted: false,
                })
            }
            None => {
                let like = DailyLike {
                    id: Uuid::new_v4(),
                    user_id,
                    liked_profile_id,
                    action,
                    like_date,
                    is_mutual_match: false,
                    created_at: now,
                    updated_at: now,
                };
                inner.likes.insert((user_id, liked_profile_id), like.clone());
                Ok(UpsertedLike {
                    like,
                    inserted: true,
                })
            }
        }
    }

    async fn find_like(
        &self,
        user_id: Uuid,
        liked_profile_id: Uuid,
    ) -> anyhow::Result<Option<DailyLike>> {
        Ok(self.lock()?.likes.get(&(user_id, liked_profile_id)).cloned())
    }

    async fn sync_pair_mutual(&self, pair: &UserPair) -> anyhow::Result<bool> {
        let now = OffsetDateTime::now_utc();
        let mut inner = self.lock()?;
        let keys = [(pair.low(), pair.high()), (pair.high(), pair.low())];
        let mutual = keys
            .iter()
            .all(|k| inner.likes.get(k).is_some_and(DailyLike::is_like));
        for key in keys {
            if let Some(like) = inner.likes.get_mut(&key) {
                if like.is_mutual_match != mutual {
                    like.is_mutual_match = mutual;
                    like.updated_at = now;
                }
            }
        }
        Ok(mutual)
    }

    async fn liked_profile_ids(&self, user_id: Uuid) -> anyhow::Result<Vec<Uuid>> {
        let inner = self.lock()?;
        Ok(inner
            .likes
            .values()
            .filter(|l| l.user_id == user_id && l.is_like())
            .map(|l| l.liked_profile_id)
            .collect())
    }

    async fn count_likes_on(&self, user_id: Uuid, day: Date) -> anyhow::Result<i64> {
        let inner = self.lock()?;
        Ok(inner
            .likes
            .values()
            .filter(|l| l.user_id == user_id && l.like_date == day && l.is_like())
            .count() as i64)
    }

    async fn find_mutuality_drift(&self, limit: i64) -> anyhow::Result<Vec<UserPair>> {
        let inner = self.lock()?;
        let mut out: Vec<UserPair> = Vec::new();
        for l in inner.likes.values() {
            let reverse = inner.likes.get(&(l.liked_profile_id, l.user_id));
            let expected = l.is_like() && reverse.is_some_and(DailyLike::is_like);
            if l.is_mutual_match == expected {
                continue;
            }
            let pair = UserPair::new(l.user_id, l.liked_profile_id)
                .map_err(|e| anyhow::anyhow!("self-like edge: {e}"))?;
            if !out.contains(&pair) {
                out.push(pair);
            }
            if out.len() as i64 >= limit {
                break;
            }
        }
        Ok(out)
    }

    async fn find_unmaterialized_pairs(&self, limit: i64) -> anyhow::Result<Vec<UserPair>> {
        let inner = self.lock()?;
        let mut out = Vec::new();
        for l in inner.likes.values() {
            if !l.is_mutual_match || l.user_id >= l.liked_profile_id {
                continue;
            }
            let pair = UserPair::new(l.user_id, l.liked_profile_id)
                .map_err(|e| anyhow::anyhow!("self-like edge: {e}"))?;
            if !inner.connections.contains_key(&pair.connection_id()) {
                out.push(pair);
            }
            if out.len() as i64 >= limit {
                break;
            }
        }
        Ok(out)
    }

    async fn upsert_connection(
        &self,
        pair: &UserPair,
        initiated_by: Uuid,
    ) -> anyhow::Result<Connection> {
        let now = OffsetDateTime::now_utc();
        let id = pair.connection_id();
        let mut inner = self.lock()?;

        let seen_a = inner.toast_fallbacks.remove(&(id, pair.low())).is_some();
        let seen_b = inner.toast_fallbacks.remove(&(id, pair.high())).is_some();

        let conn = inner.connections.entry(id).or_insert_with(|| Connection {
            id,
            user_a: pair.low(),
            user_b: pair.high(),
            status: CONNECTION_ACCEPTED.into(),
            initiated_by,
            toast_seen_a: false,
            toast_seen_b: false,
            created_at: now,
            updated_at: now,
        });
        conn.status = CONNECTION_ACCEPTED.into();
        conn.toast_seen_a |= seen_a;
        conn.toast_seen_b |= seen_b;
        conn.updated_at = now;
        Ok(conn.clone())
    }

    async fn find_connection(&self, id: Uuid) -> anyhow::Result<Option<Connection>> {
        Ok(self.lock()?.connections.get(&id).cloned())
    }

    async fn list_connections_for(&self, user_id: Uuid) -> anyhow::Result<Vec<Connection>> {
        let inner = self.lock()?;
        let mut rows: Vec<Connection> = inner
            .connections
            .values()
            .filter(|c| (c.user_a == user_id || c.user_b == user_id) && c.status == CONNECTION_ACCEPTED)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn delete_connection(&self, id: Uuid) -> anyhow::Result<bool> {
        Ok(self.lock()?.connections.remove(&id).is_some())
    }

    async fn upsert_match(
        &self,
        user_id: Uuid,
        liked_user_id: Uuid,
        compatibility_score: Option<i16>,
    ) -> anyhow::Result<Match> {
        let now = OffsetDateTime::now_utc();
        let mut inner = self.lock()?;
        let m = inner
            .matches
            .entry((user_id, liked_user_id))
            .or_insert_with(|| Match {
                id: Uuid::new_v4(),
                user_id,
                liked_user_id,
                action: LikeAction::Like.as_str().into(),
                is_match: true,
                matched_at: now,
                compatibility_score,
            });
        m.is_match = true;
        m.compatibility_score = compatibility_score;
        Ok(m.clone())
    }

    async fn list_matches_for(&self, user_id: Uuid) -> anyhow::Result<Vec<Match>> {
        let inner = self.lock()?;
        Ok(inner
            .matches
            .values()
            .filter(|m| m.user_id == user_id && m.is_match)
            .cloned()
            .collect())
    }

    async fn mark_toast_seen(
        &self,
        connection_id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<ToastMark> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        match inner.connections.get_mut(&connection_id) {
            Some(conn) if conn.user_a == user_id => {
                conn.toast_seen_a = true;
                Ok(ToastMark::Marked)
            }
            Some(conn) if conn.user_b == user_id => {
                conn.toast_seen_b = true;
                Ok(ToastMark::Marked)
            }
            Some(_) => Ok(ToastMark::NotInPair),
            None => Ok(ToastMark::NoConnection),
        }
    }

    async fn claim_toast_fallback(
        &self,
        connection_id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<bool> {
        let mut inner = self.lock()?;
        match inner.toast_fallbacks.entry((connection_id, user_id)) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(OffsetDateTime::now_utc());
                Ok(true)
            }
        }
    }

    async fn purge_toast_fallbacks(&self, cutoff: OffsetDateTime) -> anyhow::Result<u64> {
        let mut inner = self.lock()?;
        let before = inner.toast_fallbacks.len();
        inner.toast_fallbacks.retain(|_, created_at| *created_at >= cutoff);
        Ok((before - inner.toast_fallbacks.len()) as u64)
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_account(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn create_account_if_absent(
        &self,
        email: &str,
        role: Role,
        status: UserStatus,
    ) -> anyhow::Result<User> {
        Ok(self.lock()?.insert_user(email, role, status))
    }

    async fn transition_account_status(
        &self,
        id: Uuid,
        expected: UserStatus,
        next: UserStatus,
    ) -> anyhow::Result<Option<User>> {
        let mut inner = self.lock()?;
        Ok(match inner.users.get_mut(&id) {
            Some(u) if u.status == expected => {
                u.status = next;
                u.updated_at = OffsetDateTime::now_utc();
                Some(u.clone())
            }
            _ => None,
        })
    }

    async fn set_account_role(&self, id: Uuid, role: Role) -> anyhow::Result<()> {
        if let Some(u) = self.lock()?.users.get_mut(&id) {
            u.role = role;
        }
        Ok(())
    }

    async fn approve_account(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let mut inner = self.lock()?;
        Ok(inner.users.get_mut(&id).map(|u| {
            u.approved = true;
            u.clone()
        }))
    }

    async fn update_account_profile(
        &self,
        id: Uuid,
        profile: &Profile,
    ) -> anyhow::Result<Option<User>> {
        let mut inner = self.lock()?;
        Ok(inner.users.get_mut(&id).map(|u| {
            u.profile = profile.clone();
            u.clone()
        }))
    }

    async fn is_allow_listed(&self, email: &str) -> anyhow::Result<bool> {
        let inner = self.lock()?;
        Ok(inner.preapproved.contains(email) || inner.invitations.contains_key(email))
    }

    async fn invite(
        &self,
        email: &str,
        code: &str,
        invited_by: Uuid,
    ) -> anyhow::Result<(Invitation, User)> {
        let mut inner = self.lock()?;
        inner.preapproved.insert(email.to_string());
        let invitation = inner
            .invitations
            .entry(email.to_string())
            .or_insert_with(|| Invitation {
                id: Uuid::new_v4(),
                email: email.to_string(),
                code: code.to_string(),
                invited_by: Some(invited_by),
                status: "pending".into(),
                created_at: OffsetDateTime::now_utc(),
                accepted_at: None,
            })
            .clone();
        let user = inner.insert_user(email, Role::User, UserStatus::Invited);
        Ok((invitation, user))
    }

    async fn accept_invitation(&self, email: &str) -> anyhow::Result<()> {
        if let Some(inv) = self.lock()?.invitations.get_mut(email) {
            if inv.is_pending() {
                inv.status = "accepted".into();
                inv.accepted_at = Some(OffsetDateTime::now_utc());
            }
        }
        Ok(())
    }

    async fn replace_otp(
        &self,
        email: &str,
        code_hash: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        let code = OtpCode {
            email: email.to_string(),
            code_hash: code_hash.to_string(),
            expires_at,
            attempts: 0,
            created_at: OffsetDateTime::now_utc(),
        };
        self.lock()?.otp_codes.insert(email.to_string(), code);
        Ok(())
    }

    async fn reserve_otp_attempt(
        &self,
        email: &str,
        max_attempts: i32,
    ) -> anyhow::Result<Option<String>> {
        let now = OffsetDateTime::now_utc();
        let mut inner = self.lock()?;
        Ok(match inner.otp_codes.get_mut(email) {
            Some(code) if !code.is_expired(now) && !code.is_exhausted(max_attempts) => {
                code.attempts += 1;
                Some(code.code_hash.clone())
            }
            _ => None,
        })
    }

    async fn consume_otp(&self, email: &str) -> anyhow::Result<bool> {
        Ok(self.lock()?.otp_codes.remove(email).is_some())
    }
}
