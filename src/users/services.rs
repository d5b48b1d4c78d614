use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    store::AccountStore,
    users::repo_types::{Profile, User, UserStatus},
};

/// Admin lifecycle actions on a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    Pause,
    Resume,
}

pub fn next_status(current: UserStatus, action: AdminAction) -> Result<UserStatus, AppError> {
    match (current, action) {
        (UserStatus::Active, AdminAction::Pause) => Ok(UserStatus::Paused),
        (UserStatus::Paused, AdminAction::Resume) => Ok(UserStatus::Active),
        (status, action) => Err(AppError::BadRequest(format!(
            "cannot {} a user who is {}",
            match action {
                AdminAction::Pause => "pause",
                AdminAction::Resume => "resume",
            },
            status
        ))),
    }
}

/// Apply an admin action. The write only lands if the status is still the one
/// the action was validated against; a concurrent change yields `Conflict`.
pub async fn change_status(
    accounts: &dyn AccountStore,
    id: Uuid,
    action: AdminAction,
) -> AppResult<User> {
    let current = accounts
        .find_account(id)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    let next = next_status(current.status, action)?;
    match accounts
        .transition_account_status(id, current.status, next)
        .await?
    {
        Some(user) => {
            info!(user_id = %id, from = %current.status, to = %next, "user status changed");
            Ok(user)
        }
        None => {
            warn!(user_id = %id, expected = %current.status, "status changed concurrently");
            Err(AppError::Conflict("User status changed, retry".into()))
        }
    }
}

const NAME_WEIGHT: u8 = 20;
const FIELD_WEIGHT: u8 = 15;
const IMAGES_WEIGHT: u8 = 20;

pub fn completeness(p: &Profile) -> u8 {
    let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());

    let mut score = 0;
    if filled(&p.name) {
        score += NAME_WEIGHT;
    }
    if p.gender.is_some() {
        score += FIELD_WEIGHT;
    }
    if p.date_of_birth.is_some() {
        score += FIELD_WEIGHT;
    }
    if filled(&p.city) {
        score += FIELD_WEIGHT;
    }
    if filled(&p.about) {
        score += FIELD_WEIGHT;
    }
    if !p.images.is_empty() {
        score += IMAGES_WEIGHT;
    }
    score
}

/// Validate a profile coming from the API and stamp the computed completeness.
pub fn prepare_profile(mut profile: Profile) -> Result<Profile, AppError> {
    profile.images.validate().map_err(AppError::BadRequest)?;
    if let Some(about) = &profile.about {
        if about.chars().count() > 2000 {
            return Err(AppError::BadRequest("about is limited to 2000 characters".into()));
        }
    }
    profile.name = profile.name.map(|n| n.trim().to_string());
    profile.city = profile.city.map(|c| c.trim().to_string());
    profile.completeness = completeness(&profile);
    Ok(profile)
}
