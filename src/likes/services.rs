use std::sync::Arc;

use axum::extract::FromRef;
use time::{Date, OffsetDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    likes::{
        dto::LikeOutcome,
        repo_types::{DailyLike, LikeAction, UpsertedLike},
    },
    matches::{repo_types::UserPair, services::MatchMaterializer},
    state::AppState,
    store::MatchStore,
    users::repo_types::UserStatus,
};

/// Records directed likes and completes mutual matches.
#[derive(Clone)]
pub struct LikeRecorder {
    store: Arc<dyn MatchStore>,
    materializer: MatchMaterializer,
    daily_like_limit: u32,
}

impl FromRef<AppState> for LikeRecorder {
    fn from_ref(state: &AppState) -> Self {
        LikeRecorder::new(state.store.clone(), state.config.matching.daily_like_limit)
    }
}

impl LikeRecorder {
    pub fn new(store: Arc<dyn MatchStore>, daily_like_limit: u32) -> Self {
        Self {
            materializer: MatchMaterializer::new(store.clone()),
            store,
            daily_like_limit,
        }
    }

    pub async fn record(
        &self,
        acting: Uuid,
        target: Uuid,
        action: LikeAction,
    ) -> AppResult<LikeOutcome> {
        self.record_on(acting, target, action, OffsetDateTime::now_utc().date())
            .await
    }

    /// Record `acting -> target` as of `today` (UTC).
    ///
    /// The forward edge is written before the reverse edge is read, so of two
    /// racing opposite likes at least one observes the other and completes
    /// the match. If a later step fails, the reconciliation pass repairs it.
    #[instrument(skip(self))]
    pub async fn record_on(
        &self,
        acting: Uuid,
        target: Uuid,
        action: LikeAction,
        today: Date,
    ) -> AppResult<LikeOutcome> {
        let pair = UserPair::new(acting, target)?;

        let actor = self
            .store
            .find_user(acting)
            .await?
            .ok_or(AppError::NotFound("user"))?;
        if self.store.find_user(target).await?.is_none() {
            warn!(%target, "like for unknown profile");
            return Err(AppError::NotFound("profile"));
        }
        if actor.status == UserStatus::Paused {
            return Err(AppError::Forbidden("Paused accounts cannot like profiles".into()));
        }

        // A pass turned into a like is a new like for quota purposes.
        let already_liked = self
            .store
            .find_like(acting, target)
            .await?
            .as_ref()
            .is_some_and(DailyLike::is_like);
        if action == LikeAction::Like && !already_liked {
            self.check_quota(acting, today).await?;
        }

        let UpsertedLike { mut like, inserted } = self
            .store
            .upsert_like(acting, target, action, today)
            .await?;

        // Derived from both edges as stored now, not from what this request read.
        let mutual = self.store.sync_pair_mutual(&pair).await?;
        like.is_mutual_match = mutual;

        let connection_id = if mutual {
            // The reverse like came first.
            let connection = self.materializer.materialize(pair, target).await?;
            Some(connection.id)
        } else {
            None
        };

        info!(
            %acting,
            %target,
            %action,
            inserted,
            mutual,
            "like recorded"
        );
        Ok(LikeOutcome {
            like,
            is_mutual_match: mutual,
            connection_id,
        })
    }

    async fn check_quota(&self, acting: Uuid, today: Date) -> AppResult<()> {
        if self.daily_like_limit == 0 {
            return Ok(());
        }
        let used = self.store.count_likes_on(acting, today).await?;
        if used >= i64::from(self.daily_like_limit) {
            warn!(%acting, used, limit = self.daily_like_limit, "daily like quota reached");
            return Err(AppError::TooManyRequests(format!(
                "Daily limit of {} likes reached",
                self.daily_like_limit
            )));
        }
        Ok(())
    }
}
