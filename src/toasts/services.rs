use std::sync::Arc;

use axum::extract::FromRef;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    matches::repo_types::UserPair,
    state::AppState,
    store::{MatchStore, ToastMark},
};

/// Tracks whether each side of a connection has seen its match toast.
#[derive(Clone)]
pub struct ToastTracker {
    store: Arc<dyn MatchStore>,
}

impl FromRef<AppState> for ToastTracker {
    fn from_ref(state: &AppState) -> Self {
        ToastTracker::new(state.store.clone())
    }
}

impl ToastTracker {
    pub fn new(store: Arc<dyn MatchStore>) -> Self {
        Self { store }
    }

    /// Whether the toast for `connection_id` should still be shown to `user_id`.
    ///
    /// A connection that does not exist yet yields `true` once per user, as
    /// long as `connection_id` belongs to a pair the user has liked into. The
    /// claim is folded into the flags when the connection is materialized.
    #[instrument(skip(self))]
    pub async fn should_show(&self, connection_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        if let Some(conn) = self.store.find_connection(connection_id).await? {
            let seen = conn
                .toast_seen_for(user_id)
                .ok_or(AppError::NotFound("connection"))?;
            return Ok(!seen);
        }
        self.ensure_pending_pair(connection_id, user_id).await?;

        let claimed = self
            .store
            .claim_toast_fallback(connection_id, user_id)
            .await?;
        if claimed {
            debug!(%connection_id, %user_id, "toast fallback claimed");
            // the connection may have been created between the lookup and the
            // claim, after its fallbacks were already folded
            if self.store.find_connection(connection_id).await?.is_some() {
                self.mark_seen(connection_id, user_id).await?;
            }
        }
        Ok(claimed)
    }

    #[instrument(skip(self))]
    pub async fn mark_seen(&self, connection_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let mut mark = self.store.mark_toast_seen(connection_id, user_id).await?;
        if mark == ToastMark::NoConnection {
            self.ensure_pending_pair(connection_id, user_id).await?;
            self.store
                .claim_toast_fallback(connection_id, user_id)
                .await?;
            if self.store.find_connection(connection_id).await?.is_some() {
                // materialized after its fallbacks were folded
                mark = self.store.mark_toast_seen(connection_id, user_id).await?;
            }
        }
        match mark {
            ToastMark::Marked | ToastMark::NoConnection => Ok(()),
            ToastMark::NotInPair => {
                warn!(%connection_id, %user_id, "toast mark by user outside the pair");
                Err(AppError::NotFound("connection"))
            }
        }
    }

    /// `connection_id` must be the id of a pair `user_id` has a like edge in;
    /// anything else is treated as a connection that does not exist.
    async fn ensure_pending_pair(&self, connection_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let liked = self.store.liked_profile_ids(user_id).await?;
        let known = liked.into_iter().any(|other| {
            UserPair::new(user_id, other).is_ok_and(|p| p.connection_id() == connection_id)
        });
        if !known {
            debug!(%connection_id, %user_id, "toast lookup for unknown pair");
            return Err(AppError::NotFound("connection"));
        }
        Ok(())
    }
}
