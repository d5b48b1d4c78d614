use serde::{Deserialize, Serialize};

use crate::{auth::dto::PublicUser, invitations::repo_types::Invitation};

#[derive(Debug, Deserialize)]
pub struct CreateInvitationRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct InvitationResponse {
    pub invitation: Invitation,
    pub user: PublicUser,
}
