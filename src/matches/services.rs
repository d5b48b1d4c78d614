use std::{collections::HashMap, sync::Arc};

use axum::extract::FromRef;
use time::OffsetDateTime;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    matches::{
        compatibility::compatibility,
        dto::MutualMatchItem,
        repo_types::{Connection, UserPair},
    },
    state::AppState,
    store::MatchStore,
};

/// Turns a detected mutual like into its durable records: one `Connection`
/// per pair and one `Match` per direction. Every write is an upsert, so
/// calling it again for the same pair changes nothing.
#[derive(Clone)]
pub struct MatchMaterializer {
    store: Arc<dyn MatchStore>,
}

impl FromRef<AppState> for MatchMaterializer {
    fn from_ref(state: &AppState) -> Self {
        MatchMaterializer::new(state.store.clone())
    }
}

impl MatchMaterializer {
    pub fn new(store: Arc<dyn MatchStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self), fields(low = %pair.low(), high = %pair.high()))]
    pub async fn materialize(&self, pair: UserPair, initiated_by: Uuid) -> AppResult<Connection> {
        let low = self
            .store
            .find_user(pair.low())
            .await?
            .ok_or(AppError::NotFound("user"))?;
        let high = self
            .store
            .find_user(pair.high())
            .await?
            .ok_or(AppError::NotFound("user"))?;

        let today = OffsetDateTime::now_utc().date();
        let score = compatibility(&low.profile, &high.profile, today);

        let connection = self.store.upsert_connection(&pair, initiated_by).await?;
        self.store.upsert_match(pair.low(), pair.high(), score).await?;
        self.store.upsert_match(pair.high(), pair.low(), score).await?;

        info!(connection_id = %connection.id, score = ?score, "match materialized");
        Ok(connection)
    }
}

/// The caller's accepted connections, newest first, with counterpart details.
#[instrument(skip(store))]
pub async fn list_mutual(store: &dyn MatchStore, user_id: Uuid) -> AppResult<Vec<MutualMatchItem>> {
    let connections = store.list_connections_for(user_id).await?;
    let counterpart_ids: Vec<Uuid> = connections
        .iter()
        .filter_map(|c| c.pair().other(user_id))
        .collect();

    let users: HashMap<Uuid, _> = store
        .find_users(&counterpart_ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();
    let scores: HashMap<Uuid, Option<i16>> = store
        .list_matches_for(user_id)
        .await?
        .into_iter()
        .map(|m| (m.liked_user_id, m.compatibility_score))
        .collect();

    let items: Vec<MutualMatchItem> = connections
        .into_iter()
        .filter_map(|c| {
            let other = c.pair().other(user_id)?;
            let user = users.get(&other)?;
            Some(MutualMatchItem {
                connection_id: c.id,
                user_id: other,
                name: user.profile.name.clone(),
                city: user.profile.city.clone(),
                image: user.profile.images.primary().map(str::to_string),
                compatibility_score: scores.get(&other).copied().flatten(),
                matched_at: c.created_at,
                toast_pending: !c.toast_seen_for(user_id).unwrap_or(true),
            })
        })
        .collect();

    debug!(count = items.len(), "mutual matches listed");
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::users::repo_types::Profile;

    fn setup() -> (Arc<MemoryStore>, MatchMaterializer) {
        let store = Arc::new(MemoryStore::new());
        let materializer = MatchMaterializer::new(store.clone());
        (store, materializer)
    }

    #[tokio::test]
    async fn materializing_twice_is_idempotent() {
        let (store, m) = setup();
        let a = store.add_user(Profile::default()).unwrap();
        let b = store.add_user(Profile::default()).unwrap();
        let pair = UserPair::new(a.id, b.id).unwrap();

        let first = m.materialize(pair, a.id).await.unwrap();
        let second = m.materialize(pair, b.id).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.initiated_by, a.id);
        assert_eq!(store.connection_count().unwrap(), 1);
        assert_eq!(store.match_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn deleted_connection_is_recreated_once_with_same_id() {
        let (store, m) = setup();
        let a = store.add_user(Profile::default()).unwrap();
        let b = store.add_user(Profile::default()).unwrap();
        let pair = UserPair::new(a.id, b.id).unwrap();

        let original = m.materialize(pair, a.id).await.unwrap();
        assert!(store.delete_connection(original.id).await.unwrap());
        assert_eq!(store.connection_count().unwrap(), 0);

        let recreated = m.materialize(pair, a.id).await.unwrap();
        m.materialize(pair, a.id).await.unwrap();
        assert_eq!(recreated.id, original.id);
        assert_eq!(store.connection_count().unwrap(), 1);
        assert_eq!(store.match_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn missing_user_aborts_before_any_write() {
        let (store, m) = setup();
        let a = store.add_user(Profile::default()).unwrap();
        let pair = UserPair::new(a.id, Uuid::new_v4()).unwrap();

        let err = m.materialize(pair, a.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("user")));
        assert_eq!(store.connection_count().unwrap(), 0);
        assert_eq!(store.match_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn mutual_list_shows_counterpart_and_pending_toast() {
        let (store, m) = setup();
        let a = store.add_user(Profile::default()).unwrap();
        let b = store
            .add_user(Profile {
                name: Some("Kavya".into()),
                city: Some("Jaipur".into()),
                ..Default::default()
            })
            .unwrap();
        let conn = m
            .materialize(UserPair::new(a.id, b.id).unwrap(), a.id)
            .await
            .unwrap();

        let items = list_mutual(store.as_ref(), a.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].connection_id, conn.id);
        assert_eq!(items[0].user_id, b.id);
        assert_eq!(items[0].name.as_deref(), Some("Kavya"));
        assert!(items[0].toast_pending);

        store.mark_toast_seen(conn.id, a.id).await.unwrap();
        let items = list_mutual(store.as_ref(), a.id).await.unwrap();
        assert!(!items[0].toast_pending);
    }
}
