use serde::{Deserialize, Serialize};

use crate::{
    auth::dto::PublicUser,
    users::repo_types::{Profile, User},
};

/// The caller's own account with its full profile.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: PublicUser,
    pub profile: Profile,
}

impl From<&User> for MeResponse {
    fn from(u: &User) -> Self {
        Self {
            user: PublicUser::from(u),
            profile: u.profile.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub profile: Profile,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo_types::{ProfileImages, Role, UserStatus};
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[test]
    fn me_response_flattens_account_fields() {
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email: "asha@example.com".into(),
            role: Role::User,
            status: UserStatus::Active,
            approved: true,
            profile: Profile {
                name: Some("Asha".into()),
                images: ProfileImages::Single {
                    url: "https://cdn.example.com/a.jpg".into(),
                },
                ..Profile::default()
            },
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(MeResponse::from(&user)).unwrap();
        assert_eq!(json["email"], "asha@example.com");
        assert_eq!(json["status"], "active");
        assert_eq!(json["profile"]["name"], "Asha");
        assert_eq!(json["profile"]["images"]["kind"], "single");
    }

    #[test]
    fn update_request_rejects_legacy_image_shape() {
        let body = r#"{"profile":{"name":"Ravi","images":"https://cdn.example.com/r.jpg"}}"#;
        assert!(serde_json::from_str::<UpdateProfileRequest>(body).is_err());

        let body = r#"{"profile":{"name":"Ravi","images":{"kind":"none"},"completeness":100}}"#;
        let req: UpdateProfileRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.profile.completeness, 100);
    }
}
