use anyhow::Context;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::{
    auth::repo_types::OtpCode,
    invitations::repo_types::{Invitation, PreapprovedEmail},
    likes::repo_types::{DailyLike, DailyLikeRow, LikeAction, UpsertedLike},
    matches::repo_types::{Connection, Match, UserPair, CONNECTION_ACCEPTED},
    store::{AccountStore, MatchStore, ToastMark},
    users::repo_types::{Profile, Role, User, UserStatus},
};

const LIKE_COLUMNS: &str =
    "id, user_id, liked_profile_id, action, like_date, is_mutual_match, created_at, updated_at";
const CONNECTION_COLUMNS: &str =
    "id, user_a, user_b, status, initiated_by, toast_seen_a, toast_seen_b, created_at, updated_at";
const MATCH_COLUMNS: &str =
    "id, user_id, liked_user_id, action, is_match, matched_at, compatibility_score";

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(FromRow)]
struct UpsertedLikeRow {
    #[sqlx(flatten)]
    like: DailyLikeRow,
    inserted: bool,
}


#[async_trait]
impl MatchStore for PgStore {
    async fn find_user(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        User::find_by_id(&self.db, id).await
    }

    async fn find_users(&self, ids: &[Uuid]) -> anyhow::Result<Vec<User>> {
        User::find_many(&self.db, ids).await
    }

    async fn upsert_like(
        &self,
        user_id: Uuid,
        liked_profile_id: Uuid,
        action: LikeAction,
        like_date: Date,
    ) -> anyhow::Result<UpsertedLike> {
        // xmax is 0 only for a freshly inserted tuple.
        let row = sqlx::query_as::<_, UpsertedLikeRow>(&format!(
            r#"
            INSERT INTO daily_likes (user_id, liked_profile_id, action, like_date)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, liked_profile_id) DO UPDATE
               SET like_date = CASE
                       WHEN daily_likes.action <> 'like' AND EXCLUDED.action = 'like'
                       THEN EXCLUDED.like_date
                       ELSE daily_likes.like_date
                   END,
                   action = EXCLUDED.action,
                   updated_at = now()
            RETURNING {LIKE_COLUMNS}, (xmax = 0) AS inserted
            "#
        ))
        .bind(user_id)
        .bind(liked_profile_id)
        .bind(action.as_str())
        .bind(like_date)
        .fetch_one(&self.db)
        .await
        .context("upsert daily like")?;

        Ok(UpsertedLike {
            like: DailyLike::try_from(row.like)?,
            inserted: row.inserted,
        })
    }

    async fn find_like(
        &self,
        user_id: Uuid,
        liked_profile_id: Uuid,
    ) -> anyhow::Result<Option<DailyLike>> {
        let row = sqlx::query_as::<_, DailyLikeRow>(&format!(
            "SELECT {LIKE_COLUMNS} FROM daily_likes WHERE user_id = $1 AND liked_profile_id = $2"
        ))
        .bind(user_id)
        .bind(liked_profile_id)
        .fetch_optional(&self.db)
        .await
        .context("find daily like")?;
        row.map(DailyLike::try_from).transpose()
    }

    async fn sync_pair_mutual(&self, pair: &UserPair) -> anyhow::Result<bool> {
        // Rows are locked in a fixed order, and FOR UPDATE re-reads the latest
        // committed action, so the last writer stores a value derived from
        // both current edges.
        let mutual: bool = sqlx::query_scalar(
            r#"
            WITH locked AS (
                SELECT id, action FROM daily_likes
                 WHERE (user_id = $1 AND liked_profile_id = $2)
                    OR (user_id = $2 AND liked_profile_id = $1)
                 ORDER BY user_id
                   FOR UPDATE
            ),
            derived AS (
                SELECT COUNT(*) FILTER (WHERE action = 'like') = 2 AS mutual FROM locked
            ),
            updated AS (
                UPDATE daily_likes d
                   SET is_mutual_match = derived.mutual, updated_at = now()
                  FROM derived
                 WHERE d.id IN (SELECT id FROM locked)
                   AND d.is_mutual_match IS DISTINCT FROM derived.mutual
            )
            SELECT mutual FROM derived
            "#,
        )
        .bind(pair.low())
        .bind(pair.high())
        .fetch_one(&self.db)
        .await
        .context("sync pair mutuality")?;
        Ok(mutual)
    }

    async fn liked_profile_ids(&self, user_id: Uuid) -> anyhow::Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT liked_profile_id FROM daily_likes WHERE user_id = $1 AND action = 'like'",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("list liked profiles")?;
        Ok(ids)
    }

    async fn count_likes_on(&self, user_id: Uuid, day: Date) -> anyhow::Result<i64> {
        let n: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM daily_likes
             WHERE user_id = $1 AND like_date = $2 AND action = 'like'
            "#,
        )
        .bind(user_id)
        .bind(day)
        .fetch_one(&self.db)
        .await
        .context("count daily likes")?;
        Ok(n)
    }

    async fn find_mutuality_drift(&self, limit: i64) -> anyhow::Result<Vec<UserPair>> {
        let rows: Vec<(Uuid, Uuid)> = sqlx::query_as(
            r#"
            SELECT l.user_id, l.liked_profile_id
              FROM daily_likes l
              LEFT JOIN daily_likes r
                ON r.user_id = l.liked_profile_id AND r.liked_profile_id = l.user_id
             WHERE l.is_mutual_match
                   <> COALESCE(l.action = 'like' AND r.action = 'like', FALSE)
             ORDER BY l.updated_at
             LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .context("scan mutuality drift")?;

        let mut out: Vec<UserPair> = Vec::with_capacity(rows.len());
        for (a, b) in rows {
            let pair = UserPair::new(a, b)
                .map_err(|e| anyhow::anyhow!("self-like edge in daily_likes: {e}"))?;
            if !out.contains(&pair) {
                out.push(pair);
            }
        }
        Ok(out)
    }

    async fn find_unmaterialized_pairs(&self, limit: i64) -> anyhow::Result<Vec<UserPair>> {
        let rows: Vec<(Uuid, Uuid)> = sqlx::query_as(
            r#"
            SELECT l.user_id, l.liked_profile_id
              FROM daily_likes l
             WHERE l.is_mutual_match
               AND l.user_id < l.liked_profile_id
               AND NOT EXISTS (
                   SELECT 1 FROM connections c
                    WHERE c.user_a = l.user_id AND c.user_b = l.liked_profile_id
               )
             LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .context("scan unmaterialized pairs")?;

        rows.into_iter()
            .map(|(a, b)| {
                UserPair::new(a, b).map_err(|e| anyhow::anyhow!("self-like edge in daily_likes: {e}"))
            })
            .collect()
    }

    async fn upsert_connection(
        &self,
        pair: &UserPair,
        initiated_by: Uuid,
    ) -> anyhow::Result<Connection> {
        let id = pair.connection_id();
        let mut tx = self.db.begin().await.context("begin tx")?;

        sqlx::query(
            r#"
            INSERT INTO connections (id, user_a, user_b, status, initiated_by)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_a, user_b) DO UPDATE
               SET status = EXCLUDED.status,
                   updated_at = now()
            "#,
        )
        .bind(id)
        .bind(pair.low())
        .bind(pair.high())
        .bind(CONNECTION_ACCEPTED)
        .bind(initiated_by)
        .execute(&mut *tx)
        .await
        .context("upsert connection")?;

        let conn = sqlx::query_as::<_, Connection>(&format!(
            r#"
            UPDATE connections c
               SET toast_seen_a = c.toast_seen_a OR EXISTS (
                       SELECT 1 FROM toast_fallbacks f
                        WHERE f.connection_id = c.id AND f.user_id = c.user_a),
                   toast_seen_b = c.toast_seen_b OR EXISTS (
                       SELECT 1 FROM toast_fallbacks f
                        WHERE f.connection_id = c.id AND f.user_id = c.user_b)
             WHERE c.id = $1
            RETURNING {CONNECTION_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .context("fold toast fallbacks")?;

        sqlx::query("DELETE FROM toast_fallbacks WHERE connection_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("clear toast fallbacks")?;

        tx.commit().await.context("commit tx")?;
        Ok(conn)
    }

    async fn find_connection(&self, id: Uuid) -> anyhow::Result<Option<Connection>> {
        let row = sqlx::query_as::<_, Connection>(&format!(
            "SELECT {CONNECTION_COLUMNS} FROM connections WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find connection")?;
        Ok(row)
    }

    async fn list_connections_for(&self, user_id: Uuid) -> anyhow::Result<Vec<Connection>> {
        let rows = sqlx::query_as::<_, Connection>(&format!(
            r#"
            SELECT {CONNECTION_COLUMNS} FROM connections
             WHERE (user_a = $1 OR user_b = $1) AND status = $2
             ORDER BY created_at DESC
            "#
        ))
        .bind(user_id)
        .bind(CONNECTION_ACCEPTED)
        .fetch_all(&self.db)
        .await
        .context("list connections")?;
        Ok(rows)
    }

    async fn delete_connection(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM connections WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete connection")?;
        Ok(res.rows_affected() > 0)
    }

    async fn upsert_match(
        &self,
        user_id: Uuid,
        liked_user_id: Uuid,
        compatibility_score: Option<i16>,
    ) -> anyhow::Result<Match> {
        let row = sqlx::query_as::<_, Match>(&format!(
            r#"
            INSERT INTO matches (user_id, liked_user_id, action, is_match, compatibility_score)
            VALUES ($1, $2, 'like', TRUE, $3)
            ON CONFLICT (user_id, liked_user_id) DO UPDATE
               SET is_match = TRUE,
                   compatibility_score = EXCLUDED.compatibility_score
            RETURNING {MATCH_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(liked_user_id)
        .bind(compatibility_score)
        .fetch_one(&self.db)
        .await
        .context("upsert match")?;
        Ok(row)
    }

    async fn list_matches_for(&self, user_id: Uuid) -> anyhow::Result<Vec<Match>> {
        let rows = sqlx::query_as::<_, Match>(&format!(
            "SELECT {MATCH_COLUMNS} FROM matches WHERE user_id = $1 AND is_match"
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("list matches")?;
        Ok(rows)
    }

    async fn mark_toast_seen(
        &self,
        connection_id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<ToastMark> {
        let updated = sqlx::query(
            r#"
            UPDATE connections
               SET toast_seen_a = CASE WHEN user_a = $2 THEN TRUE ELSE toast_seen_a END,
                   toast_seen_b = CASE WHEN user_b = $2 THEN TRUE ELSE toast_seen_b END,
                   updated_at = now()
             WHERE id = $1 AND (user_a = $2 OR user_b = $2)
            "#,
        )
        .bind(connection_id)
        .bind(user_id)
        .execute(&self.db)
        .await
        .context("mark toast seen")?;
        if updated.rows_affected() > 0 {
            return Ok(ToastMark::Marked);
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM connections WHERE id = $1)")
            .bind(connection_id)
            .fetch_one(&self.db)
            .await
            .context("check connection")?;
        Ok(if exists {
            ToastMark::NotInPair
        } else {
            ToastMark::NoConnection
        })
    }

    async fn claim_toast_fallback(
        &self,
        connection_id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            INSERT INTO toast_fallbacks (connection_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (connection_id, user_id) DO NOTHING
            "#,
        )
        .bind(connection_id)
        .bind(user_id)
        .execute(&self.db)
        .await
        .context("claim toast fallback")?;
        Ok(res.rows_affected() == 1)
    }

    async fn purge_toast_fallbacks(&self, cutoff: OffsetDateTime) -> anyhow::Result<u64> {
        let res = sqlx::query("DELETE FROM toast_fallbacks WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.db)
            .await
            .context("purge toast fallbacks")?;
        Ok(res.rows_affected())
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn find_account(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        User::find_by_id(&self.db, id).await
    }

    async fn create_account_if_absent(
        &self,
        email: &str,
        role: Role,
        status: UserStatus,
    ) -> anyhow::Result<User> {
        User::create_if_absent(&self.db, email, role, status).await
    }

    async fn transition_account_status(
        &self,
        id: Uuid,
        expected: UserStatus,
        next: UserStatus,
    ) -> anyhow::Result<Option<User>> {
        User::set_status_if(&self.db, id, expected, next).await
    }

    async fn set_account_role(&self, id: Uuid, role: Role) -> anyhow::Result<()> {
        User::set_role(&self.db, id, role).await
    }

    async fn approve_account(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        User::approve(&self.db, id).await
    }

    async fn update_account_profile(
        &self,
        id: Uuid,
        profile: &Profile,
    ) -> anyhow::Result<Option<User>> {
        User::update_profile(&self.db, id, profile).await
    }

    async fn is_allow_listed(&self, email: &str) -> anyhow::Result<bool> {
        if PreapprovedEmail::exists(&self.db, email).await? {
            return Ok(true);
        }
        Invitation::exists_for(&self.db, email).await
    }

    async fn invite(
        &self,
        email: &str,
        code: &str,
        invited_by: Uuid,
    ) -> anyhow::Result<(Invitation, User)> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        PreapprovedEmail::upsert(&mut *tx, email, invited_by).await?;
        let invitation = Invitation::upsert_pending(&mut *tx, email, code, invited_by).await?;
        let user = User::create_if_absent(&mut *tx, email, Role::User, UserStatus::Invited).await?;
        tx.commit().await.context("commit tx")?;
        Ok((invitation, user))
    }

    async fn accept_invitation(&self, email: &str) -> anyhow::Result<()> {
        Invitation::accept(&self.db, email).await
    }

    async fn replace_otp(
        &self,
        email: &str,
        code_hash: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        OtpCode::replace(&self.db, email, code_hash, expires_at).await
    }

    async fn reserve_otp_attempt(
        &self,
        email: &str,
        max_attempts: i32,
    ) -> anyhow::Result<Option<String>> {
        OtpCode::reserve_attempt(&self.db, email, max_attempts).await
    }

    async fn consume_otp(&self, email: &str) -> anyhow::Result<bool> {
        OtpCode::consume(&self.db, email).await
    }
}
