//! Token store interface: the persistent key-value home of the session credential.
use thiserror::Error;

use crate::services::auth::credential::Credential;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const USER_ID_KEY: &str = "user_id";

/// Every key the credential occupies. Clearing the session removes all of them.
pub const CREDENTIAL_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_ID_KEY];

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("token store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("token store is corrupt: {0}")]
    Corrupt(String),
    #[error("token store lock poisoned")]
    Poisoned,
}

/// String-keyed, string-valued storage.
///
/// Reads and writes are synchronous: the coordinator reads the current token
/// right before each send and must never await between the read and the
/// header merge.
///
/// Implementations must be cheap to clone or shared behind an `Arc`.
pub trait TokenStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    fn remove(&self, key: &str) -> StoreResult<()>;

    // Write several keys at once. Backends override this so a reader never
    // observes half of a new credential.
    fn set_many(&self, entries: &[(&str, &str)]) -> StoreResult<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> StoreResult<()> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }
}

/// Credential-level helpers shared by every [`TokenStore`].
pub trait CredentialStoreExt: TokenStore {
    fn access_token(&self) -> StoreResult<Option<String>> {
        Ok(self.get(ACCESS_TOKEN_KEY)?.filter(|t| !t.is_empty()))
    }

    fn refresh_token(&self) -> StoreResult<Option<String>> {
        Ok(self.get(REFRESH_TOKEN_KEY)?.filter(|t| !t.is_empty()))
    }

    fn user_id(&self) -> StoreResult<Option<i64>> {
        Ok(self.get(USER_ID_KEY)?.and_then(|v| v.trim().parse().ok()))
    }

    /// The stored credential, if all three parts are present and well formed.
    fn load_credential(&self) -> StoreResult<Option<Credential>> {
        let (Some(access_token), Some(refresh_token), Some(user_id)) =
            (self.access_token()?, self.refresh_token()?, self.user_id()?)
        else {
            return Ok(None);
        };

        Ok(Some(Credential {
            access_token,
            refresh_token,
            user_id,
        }))
    }

    /// Overwrite the active credential.
    fn save_credential(&self, credential: &Credential) -> StoreResult<()> {
        let user_id = credential.user_id.to_string();
        self.set_many(&[
            (ACCESS_TOKEN_KEY, credential.access_token.as_str()),
            (REFRESH_TOKEN_KEY, credential.refresh_token.as_str()),
            (USER_ID_KEY, user_id.as_str()),
        ])
    }

    fn clear_credential(&self) -> StoreResult<()> {
        self.remove_many(&CREDENTIAL_KEYS)
    }
}

impl<S: TokenStore + ?Sized> CredentialStoreExt for S {}
