use std::fmt;

use crate::api::v1::dto::token::TokenResponse;
use crate::error::ClientError;

/// The one active session credential.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: i64,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("user_id", &self.user_id)
            .finish()
    }
}

impl TryFrom<TokenResponse> for Credential {
    type Error = ClientError;

    fn try_from(resp: TokenResponse) -> Result<Self, Self::Error> {
        if resp.access_token.is_empty() || resp.refresh_token.is_empty() {
            return Err(ClientError::MalformedResponse(
                "token response carries an empty token".into(),
            ));
        }

        let user_id = resp.user_id.ok_or_else(|| {
            ClientError::MalformedResponse("token response is missing user_id".into())
        })?;

        Ok(Self {
            access_token: resp.access_token,
            refresh_token: resp.refresh_token,
            user_id,
        })
    }
}
