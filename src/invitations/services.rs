use rand::{distributions::Alphanumeric, Rng};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{dto::PublicUser, services::normalize_email},
    config::AppConfig,
    error::AppResult,
    invitations::dto::InvitationResponse,
    mailer::{send_in_background, OutgoingEmail},
    state::AppState,
    store::AccountStore,
};

pub const INVITE_CODE_LEN: usize = 8;

pub fn generate_invite_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(INVITE_CODE_LEN)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect()
}

/// Whether the email may authenticate at all.
pub async fn is_allowed(
    accounts: &dyn AccountStore,
    config: &AppConfig,
    email: &str,
) -> anyhow::Result<bool> {
    if config.is_admin_email(email) {
        return Ok(true);
    }
    accounts.is_allow_listed(email).await
}

/// Allow-list the email, record the invitation and the invited user, then mail the code.
/// Re-inviting returns the existing invitation and sends the email again.
#[instrument(skip(state))]
pub async fn create_invitation(
    state: &AppState,
    admin_id: Uuid,
    raw_email: &str,
) -> AppResult<InvitationResponse> {
    let email = normalize_email(raw_email)?;

    let (invitation, user) = state
        .accounts
        .invite(&email, &generate_invite_code(), admin_id)
        .await?;

    send_in_background(
        state.mailer.clone(),
        OutgoingEmail {
            to: email.clone(),
            subject: "You're invited to Shaadi Mantrana".into(),
            body: format!(
                "You have been invited. Sign in with this email address; your invitation code is {}.",
                invitation.code
            ),
        },
    );
    info!(email = %email, invitation_id = %invitation.id, admin_id = %admin_id, "invitation sent");

    Ok(InvitationResponse {
        invitation,
        user: PublicUser::from(&user),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::users::repo_types::{Role, UserStatus};
    use std::sync::Arc;

    #[test]
    fn invite_codes_are_uppercase_alphanumeric() {
        let code = generate_invite_code();
        assert_eq!(code.len(), INVITE_CODE_LEN);
        assert!(code
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[tokio::test]
    async fn allow_list_covers_admins_and_invitees_only() {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::fake_with_config(store.clone(), |c| {
            c.admin_emails = vec!["root@example.com".into()];
        });
        let accounts = state.accounts.as_ref();

        assert!(is_allowed(accounts, &state.config, "root@example.com").await.unwrap());
        assert!(!is_allowed(accounts, &state.config, "meera@example.com").await.unwrap());

        create_invitation(&state, Uuid::new_v4(), "meera@example.com")
            .await
            .unwrap();
        assert!(is_allowed(accounts, &state.config, "meera@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn reinviting_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::fake_with_store(store.clone());
        let admin = Uuid::new_v4();

        let first = create_invitation(&state, admin, "Meera@Example.com").await.unwrap();
        let second = create_invitation(&state, admin, "meera@example.com").await.unwrap();

        assert_eq!(first.invitation.id, second.invitation.id);
        assert_eq!(first.invitation.code, second.invitation.code);
        assert_eq!(first.user.id, second.user.id);
        assert_eq!(second.user.status, UserStatus::Invited);
        assert_eq!(second.user.role, Role::User);
        assert!(second.invitation.is_pending());
    }

    #[tokio::test]
    async fn inviting_a_registered_user_keeps_their_account() {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::fake_with_store(store.clone());
        let existing = store
            .create_account_if_absent("meera@example.com", Role::User, UserStatus::Active)
            .await
            .unwrap();

        let resp = create_invitation(&state, Uuid::new_v4(), "meera@example.com")
            .await
            .unwrap();
        assert_eq!(resp.user.id, existing.id);
        assert_eq!(resp.user.status, UserStatus::Active);
    }

    #[tokio::test]
    async fn malformed_email_is_rejected() {
        let state = AppState::fake();
        assert!(matches!(
            create_invitation(&state, Uuid::new_v4(), "not-an-email").await,
            Err(crate::error::AppError::BadRequest(_))
        ));
    }
}
