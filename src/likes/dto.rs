use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::likes::repo_types::{DailyLike, LikeAction};

#[derive(Debug, Deserialize)]
pub struct LikeRequest {
    pub target_user_id: Uuid,
    #[serde(default = "default_action")]
    pub action: LikeAction,
}

fn default_action() -> LikeAction {
    LikeAction::Like
}

/// What recording a like produced.
#[derive(Debug, Serialize)]
pub struct LikeOutcome {
    pub like: DailyLike,
    pub is_mutual_match: bool,
    pub connection_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ReconcileReport {
    pub pairs_fixed: usize,
    pub connections_created: usize,
    pub fallbacks_purged: u64,
}
