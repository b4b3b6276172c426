use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// New customer account. Accounts registered here always get the `user` role.
#[derive(Deserialize, Debug, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
}

/// JWT payload for storefront sessions.
///
/// `sub` is the account's user id as a hyphenated UUID string, `role` is `user` or
/// `admin` and gates the admin routes, `exp` is the expiry in unix seconds.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

impl Claims {
    pub fn new(user_id: Uuid, role: &str, exp: usize) -> Self {
        Self {
            sub: user_id.to_string(),
            role: role.to_owned(),
            exp,
        }
    }

    /// `None` when `sub` is not a UUID.
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}
