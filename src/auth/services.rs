use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::{rngs::OsRng, Rng};
use regex::Regex;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{dto::AuthResponse, jwt::JwtKeys},
    error::{AppError, AppResult},
    invitations::services::is_allowed,
    mailer::{send_in_background, OutgoingEmail},
    state::AppState,
    users::repo_types::{Role, User, UserStatus},
};

pub const OTP_DIGITS: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trim, lowercase and validate an email from a request body.
pub(crate) fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::BadRequest("Invalid email".into()));
    }
    Ok(email)
}

pub fn generate_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{n:0width$}", width = OTP_DIGITS)
}

pub fn hash_code(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_code(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

pub fn issue_tokens(keys: &JwtKeys, user: &User) -> anyhow::Result<AuthResponse> {
    Ok(AuthResponse {
        access_token: keys.sign_access(user.id, user.role)?,
        refresh_token: keys.sign_refresh(user.id, user.role)?,
        user: user.into(),
    })
}

/// Issue a login code to an allow-listed email.
#[instrument(skip(state))]
pub async fn request_otp(state: &AppState, raw_email: &str) -> AppResult<()> {
    let email = normalize_email(raw_email)?;

    if !is_allowed(state.accounts.as_ref(), &state.config, &email).await? {
        warn!(email = %email, "otp requested for email outside allow-list");
        return Err(AppError::Forbidden("Email is not invited".into()));
    }

    let code = generate_code();
    let expires_at = OffsetDateTime::now_utc() + TimeDuration::minutes(state.config.otp.ttl_minutes);
    state
        .accounts
        .replace_otp(&email, &hash_code(&code)?, expires_at)
        .await?;

    send_in_background(
        state.mailer.clone(),
        OutgoingEmail {
            to: email.clone(),
            subject: "Your Shaadi Mantrana login code".into(),
            body: format!(
                "Your login code is {code}. It expires in {} minutes.",
                state.config.otp.ttl_minutes
            ),
        },
    );
    info!(email = %email, "otp issued");
    Ok(())
}

/// Redeem a login code; creates or activates the user on first login.
#[instrument(skip(state, code))]
pub async fn verify_otp(state: &AppState, raw_email: &str, code: &str) -> AppResult<AuthResponse> {
    let email = normalize_email(raw_email)?;
    let code = code.trim();
    if code.len() != OTP_DIGITS || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::BadRequest("Code must be 6 digits".into()));
    }

    let invalid = || AppError::Unauthorized("Invalid or expired code".into());
    let accounts = state.accounts.as_ref();

    // The attempt is counted before the code is checked, so parallel guesses
    // cannot get past the cap.
    let Some(code_hash) = accounts
        .reserve_otp_attempt(&email, state.config.otp.max_attempts)
        .await?
    else {
        warn!(email = %email, "no live otp or attempts exhausted");
        return Err(invalid());
    };
    if !verify_code(code, &code_hash)? {
        warn!(email = %email, "wrong otp");
        return Err(invalid());
    }
    if !accounts.consume_otp(&email).await? {
        warn!(email = %email, "otp already redeemed");
        return Err(invalid());
    }

    let is_admin = state.config.is_admin_email(&email);
    let role = if is_admin { Role::Admin } else { Role::User };
    let mut user = accounts
        .create_account_if_absent(&email, role, UserStatus::Active)
        .await?;

    if user.status == UserStatus::Invited {
        match accounts
            .transition_account_status(user.id, UserStatus::Invited, UserStatus::Active)
            .await?
        {
            Some(activated) => {
                info!(user_id = %activated.id, "invited user activated");
                user = activated;
            }
            // someone else moved it first; log in with whatever it is now
            None => {
                user = accounts
                    .find_account(user.id)
                    .await?
                    .ok_or(AppError::NotFound("user"))?;
            }
        }
    }
    if is_admin && user.role != Role::Admin {
        accounts.set_account_role(user.id, Role::Admin).await?;
        user.role = Role::Admin;
    }
    accounts.accept_invitation(&email).await?;

    let keys = JwtKeys::from(&state.config.jwt);
    let response = issue_tokens(&keys, &user)?;
    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::repo_types::OtpCode,
        invitations::services::create_invitation,
        store::{AccountStore, MemoryStore},
    };
    use std::sync::Arc;

    const CODE: &str = "482913";

    fn login_state(admins: &[&str]) -> (Arc<MemoryStore>, AppState) {
        let store = Arc::new(MemoryStore::new());
        let admins: Vec<String> = admins.iter().map(|e| e.to_string()).collect();
        let state = AppState::fake_with_config(store.clone(), |c| {
            c.admin_emails = admins;
            c.otp.max_attempts = 3;
        });
        (store, state)
    }

    async fn plant_code(store: &MemoryStore, email: &str) {
        let expires = OffsetDateTime::now_utc() + TimeDuration::minutes(10);
        store
            .replace_otp(email, &hash_code(CODE).unwrap(), expires)
            .await
            .unwrap();
    }

    fn is_unauthorized(r: AppResult<AuthResponse>) -> bool {
        matches!(r, Err(AppError::Unauthorized(_)))
    }

    #[test]
    fn email_validation_and_normalization() {
        assert!(is_valid_email("priya@example.com"));
        assert!(!is_valid_email("priya@"));
        assert!(!is_valid_email("no spaces@example.com"));
        assert_eq!(normalize_email("  Priya@Example.COM ").unwrap(), "priya@example.com");
        assert!(matches!(
            normalize_email("nope").unwrap_err(),
            AppError::BadRequest(_)
        ));
    }

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), OTP_DIGITS);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn hash_and_verify_roundtrip() {
        let hash = hash_code("042917").expect("hashing should succeed");
        assert!(verify_code("042917", &hash).expect("verify should succeed"));
        assert!(!verify_code("042918", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        assert!(verify_code("123456", "not-a-valid-hash").is_err());
    }

    #[test]
    fn otp_expiry_and_attempts() {
        let now = OffsetDateTime::now_utc();
        let otp = OtpCode {
            email: "a@b.co".into(),
            code_hash: String::new(),
            expires_at: now + TimeDuration::minutes(1),
            attempts: 4,
            created_at: now,
        };
        assert!(!otp.is_expired(now));
        assert!(otp.is_expired(now + TimeDuration::minutes(2)));
        assert!(!otp.is_exhausted(5));
        assert!(otp.is_exhausted(4));
    }

    #[tokio::test]
    async fn issued_tokens_carry_role() {
        let state = AppState::fake();
        let keys = JwtKeys::from(&state.config.jwt);
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: uuid::Uuid::new_v4(),
            email: "admin@example.com".into(),
            role: Role::Admin,
            status: UserStatus::Active,
            approved: true,
            profile: Default::default(),
            created_at: now,
            updated_at: now,
        };
        let resp = issue_tokens(&keys, &user).unwrap();
        let claims = keys.verify(&resp.access_token).unwrap();
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(resp.user.email, "admin@example.com");
        assert!(keys.verify_refresh(&resp.refresh_token).is_ok());
    }

    #[tokio::test]
    async fn otp_outside_allow_list_is_forbidden() {
        let (store, state) = login_state(&[]);

        let err = request_otp(&state, "stranger@example.com").await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(store.otp_attempts("stranger@example.com").unwrap(), None);
    }

    #[tokio::test]
    async fn invited_email_can_request_a_code() {
        let (store, state) = login_state(&[]);
        create_invitation(&state, uuid::Uuid::new_v4(), "meera@example.com")
            .await
            .unwrap();

        request_otp(&state, " Meera@Example.com ").await.unwrap();
        assert_eq!(store.otp_attempts("meera@example.com").unwrap(), Some(0));
    }

    #[tokio::test]
    async fn invited_user_becomes_active_on_first_login() {
        let (store, state) = login_state(&[]);
        let invited = create_invitation(&state, uuid::Uuid::new_v4(), "meera@example.com")
            .await
            .unwrap();
        assert_eq!(invited.user.status, UserStatus::Invited);
        assert!(store.invitation_for("meera@example.com").unwrap().unwrap().is_pending());

        plant_code(&store, "meera@example.com").await;
        let resp = verify_otp(&state, "meera@example.com", CODE).await.unwrap();

        assert_eq!(resp.user.id, invited.user.id);
        assert_eq!(resp.user.status, UserStatus::Active);
        assert_eq!(resp.user.role, Role::User);
        let stored = store.account_by_email("meera@example.com").unwrap().unwrap();
        assert_eq!(stored.status, UserStatus::Active);
        let invitation = store.invitation_for("meera@example.com").unwrap().unwrap();
        assert_eq!(invitation.status, "accepted");
        assert!(invitation.accepted_at.is_some());
    }

    #[tokio::test]
    async fn wrong_code_counts_an_attempt() {
        let (store, state) = login_state(&[]);
        create_invitation(&state, uuid::Uuid::new_v4(), "meera@example.com")
            .await
            .unwrap();
        plant_code(&store, "meera@example.com").await;

        assert!(is_unauthorized(verify_otp(&state, "meera@example.com", "000000").await));
        assert_eq!(store.otp_attempts("meera@example.com").unwrap(), Some(1));

        // still under the cap, the right code works
        verify_otp(&state, "meera@example.com", CODE).await.unwrap();
        assert_eq!(store.otp_attempts("meera@example.com").unwrap(), None);
    }

    #[tokio::test]
    async fn exhausted_code_rejects_even_the_right_guess() {
        let (store, state) = login_state(&[]);
        plant_code(&store, "meera@example.com").await;

        for _ in 0..3 {
            assert!(is_unauthorized(verify_otp(&state, "meera@example.com", "000000").await));
        }
        assert!(is_unauthorized(verify_otp(&state, "meera@example.com", CODE).await));
        assert_eq!(store.otp_attempts("meera@example.com").unwrap(), Some(3));
    }

    #[tokio::test]
    async fn parallel_guesses_cannot_exceed_the_cap() {
        let (store, state) = login_state(&[]);
        plant_code(&store, "meera@example.com").await;

        let guess = |code: &'static str| {
            let state = state.clone();
            tokio::spawn(async move { verify_otp(&state, "meera@example.com", code).await })
        };
        let handles = [
            guess("000001"),
            guess("000002"),
            guess("000003"),
            guess("000004"),
            guess("000005"),
        ];
        for h in handles {
            assert!(is_unauthorized(h.await.unwrap()));
        }
        assert_eq!(store.otp_attempts("meera@example.com").unwrap(), Some(3));
    }

    #[tokio::test]
    async fn code_cannot_be_redeemed_twice() {
        let (store, state) = login_state(&[]);
        plant_code(&store, "meera@example.com").await;

        verify_otp(&state, "meera@example.com", CODE).await.unwrap();
        assert!(is_unauthorized(verify_otp(&state, "meera@example.com", CODE).await));
    }

    #[tokio::test]
    async fn admin_email_logs_in_as_admin() {
        let (store, state) = login_state(&["root@example.com"]);
        store
            .create_account_if_absent("root@example.com", Role::User, UserStatus::Active)
            .await
            .unwrap();

        request_otp(&state, "root@example.com").await.unwrap();
        plant_code(&store, "root@example.com").await;
        let resp = verify_otp(&state, "root@example.com", CODE).await.unwrap();

        assert_eq!(resp.user.role, Role::Admin);
        let keys = JwtKeys::from(&state.config.jwt);
        assert_eq!(keys.verify(&resp.access_token).unwrap().role, Role::Admin);
    }
}
