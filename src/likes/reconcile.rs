use std::{sync::Arc, time::Duration};

use axum::extract::FromRef;
use time::OffsetDateTime;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    likes::dto::ReconcileReport,
    matches::{repo_types::UserPair, services::MatchMaterializer},
    state::AppState,
    store::MatchStore,
};

const BATCH: i64 = 500;

/// How long an unclaimed toast fallback row is kept. A connection normally
/// appears within one request of the claim, so anything older is orphaned.
pub const DEFAULT_FALLBACK_TTL: time::Duration = time::Duration::days(1);

/// Repairs like pairs left half-written by a failed request: re-derives
/// `is_mutual_match` from the edges and materializes mutual pairs that have
/// no connection. Also drops toast fallback rows that never got folded.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn MatchStore>,
    materializer: MatchMaterializer,
    fallback_ttl: time::Duration,
}

impl FromRef<AppState> for Reconciler {
    fn from_ref(state: &AppState) -> Self {
        Reconciler::new(state.store.clone())
    }
}

impl Reconciler {
    pub fn new(store: Arc<dyn MatchStore>) -> Self {
        Self {
            materializer: MatchMaterializer::new(store.clone()),
            store,
            fallback_ttl: DEFAULT_FALLBACK_TTL,
        }
    }

    pub fn with_fallback_ttl(mut self, ttl: time::Duration) -> Self {
        self.fallback_ttl = ttl;
        self
    }

    #[instrument(skip(self))]
    pub async fn run(&self) -> AppResult<ReconcileReport> {
        let mut report = ReconcileReport {
            pairs_fixed: 0,
            connections_created: 0,
            fallbacks_purged: 0,
        };

        loop {
            let drift = self.store.find_mutuality_drift(BATCH).await?;
            if drift.is_empty() {
                break;
            }
            for pair in &drift {
                self.store.sync_pair_mutual(pair).await?;
                report.pairs_fixed += 1;
            }
            if (drift.len() as i64) < BATCH {
                break;
            }
        }

        loop {
            let pairs = self.store.find_unmaterialized_pairs(BATCH).await?;
            if pairs.is_empty() {
                break;
            }
            let mut created = 0;
            for pair in &pairs {
                let initiated_by = self.first_liker(pair).await?;
                match self.materializer.materialize(*pair, initiated_by).await {
                    Ok(_) => created += 1,
                    // a user vanished from under the pair; nothing to build
                    Err(AppError::NotFound(what)) => {
                        warn!(low = %pair.low(), high = %pair.high(), what, "skipping pair");
                    }
                    Err(e) => return Err(e),
                }
            }
            report.connections_created += created;
            if created == 0 || (pairs.len() as i64) < BATCH {
                break;
            }
        }

        let cutoff = OffsetDateTime::now_utc() - self.fallback_ttl;
        report.fallbacks_purged = self.store.purge_toast_fallbacks(cutoff).await?;

        if report.pairs_fixed > 0 || report.connections_created > 0 || report.fallbacks_purged > 0 {
            info!(
                pairs_fixed = report.pairs_fixed,
                connections_created = report.connections_created,
                fallbacks_purged = report.fallbacks_purged,
                "reconciliation repaired data"
            );
        }
        Ok(report)
    }

    /// Owner of the older edge of the pair.
    async fn first_liker(&self, pair: &UserPair) -> AppResult<Uuid> {
        let forward = self.store.find_like(pair.low(), pair.high()).await?;
        let backward = self.store.find_like(pair.high(), pair.low()).await?;
        Ok(match (forward, backward) {
            (Some(f), Some(b)) if b.created_at < f.created_at => b.user_id,
            (None, Some(b)) => b.user_id,
            _ => pair.low(),
        })
    }

    /// Run [`Reconciler::run`] every `period` until the runtime shuts down.
    pub fn spawn_periodic(self, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick fires immediately; skip it so startup is not slowed
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = self.run().await {
                    error!(error = %e, "reconciliation pass failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::likes::repo_types::LikeAction;
    use crate::store::MemoryStore;
    use crate::users::repo_types::Profile;
    use time::macros::date;

    fn setup() -> (Arc<MemoryStore>, Reconciler) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), Reconciler::new(store))
    }

    #[tokio::test]
    async fn half_written_pair_is_repaired() {
        let (store, rec) = setup();
        let a = store.add_user(Profile::default()).unwrap().id;
        let b = store.add_user(Profile::default()).unwrap().id;
        let day = date!(2025 - 02 - 01);

        // both edges written, mutuality update never happened
        store.upsert_like(a, b, LikeAction::Like, day).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.upsert_like(b, a, LikeAction::Like, day).await.unwrap();

        let report = rec.run().await.unwrap();

        assert_eq!(report.pairs_fixed, 1);
        assert_eq!(report.connections_created, 1);
        assert!(store.find_like(a, b).await.unwrap().unwrap().is_mutual_match);
        assert!(store.find_like(b, a).await.unwrap().unwrap().is_mutual_match);
        assert_eq!(store.connection_count().unwrap(), 1);
        assert_eq!(store.match_count().unwrap(), 2);

        let conn = store
            .find_connection(UserPair::new(a, b).unwrap().connection_id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conn.initiated_by, a);
    }

    #[tokio::test]
    async fn one_sided_mutual_flag_is_cleared() {
        let (store, rec) = setup();
        let a = store.add_user(Profile::default()).unwrap().id;
        let b = store.add_user(Profile::default()).unwrap().id;
        let day = date!(2025 - 02 - 01);

        store.upsert_like(a, b, LikeAction::Like, day).await.unwrap();
        store.upsert_like(b, a, LikeAction::Pass, day).await.unwrap();
        store
            .force_pair_mutual(&UserPair::new(a, b).unwrap(), true)
            .unwrap();

        let report = rec.run().await.unwrap();

        assert_eq!(report.pairs_fixed, 1);
        assert_eq!(report.connections_created, 0);
        assert!(!store.find_like(a, b).await.unwrap().unwrap().is_mutual_match);
        assert!(!store.find_like(b, a).await.unwrap().unwrap().is_mutual_match);
    }

    #[tokio::test]
    async fn deleted_connection_is_rebuilt() {
        let (store, rec) = setup();
        let a = store.add_user(Profile::default()).unwrap().id;
        let b = store.add_user(Profile::default()).unwrap().id;
        let pair = UserPair::new(a, b).unwrap();
        let day = date!(2025 - 02 - 01);

        store.upsert_like(a, b, LikeAction::Like, day).await.unwrap();
        store.upsert_like(b, a, LikeAction::Like, day).await.unwrap();
        store.force_pair_mutual(&pair, true).unwrap();
        store.upsert_connection(&pair, a).await.unwrap();
        store.delete_connection(pair.connection_id()).await.unwrap();

        let report = rec.run().await.unwrap();
        assert_eq!(report.pairs_fixed, 0);
        assert_eq!(report.connections_created, 1);
        assert_eq!(store.connection_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn clean_data_is_left_alone() {
        let (store, rec) = setup();
        let a = store.add_user(Profile::default()).unwrap().id;
        let b = store.add_user(Profile::default()).unwrap().id;
        store
            .upsert_like(a, b, LikeAction::Like, date!(2025 - 02 - 01))
            .await
            .unwrap();

        let report = rec.run().await.unwrap();
        assert_eq!(report.pairs_fixed, 0);
        assert_eq!(report.connections_created, 0);
        assert_eq!(store.connection_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn stale_toast_fallbacks_are_purged() {
        let (store, rec) = setup();
        let pair = UserPair::new(Uuid::new_v4(), Uuid::new_v4()).unwrap();
        store
            .claim_toast_fallback(pair.connection_id(), pair.low())
            .await
            .unwrap();

        // fresh rows survive the default TTL
        let report = rec.run().await.unwrap();
        assert_eq!(report.fallbacks_purged, 0);
        assert_eq!(store.fallback_count().unwrap(), 1);

        tokio::time::sleep(Duration::from_millis(5)).await;
        let report = rec
            .with_fallback_ttl(time::Duration::ZERO)
            .run()
            .await
            .unwrap();
        assert_eq!(report.fallbacks_purged, 1);
        assert_eq!(store.fallback_count().unwrap(), 0);
    }
}
