//! Keychain-backed session storage, one entry per CLI profile.

use pixlink_core::auth::{AuthError, AuthResult, AuthSession, SessionPersistence};

const KEYRING_SERVICE_NAME: &str = "pixlink-cli";

#[derive(Debug, Clone)]
pub struct KeyringSessionStore {
    account: String,
}

impl KeyringSessionStore {
    pub fn new(profile_name: &str) -> Self {
        Self {
            account: format!("session:{profile_name}"),
        }
    }
}

impl SessionPersistence for KeyringSessionStore {
    /// An entry that no longer parses is dropped and reads as signed out.
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        let Some(raw) = secrets::read(&self.account).map_err(AuthError::SecureStorage)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(error) => {
                tracing::warn!("Discarding unreadable session for {}: {error}", self.account);
                secrets::delete(&self.account).map_err(AuthError::SecureStorage)?;
                Ok(None)
            }
        }
    }

    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        let raw = serde_json::to_string(session)?;
        secrets::write(&self.account, &raw).map_err(AuthError::SecureStorage)
    }

    fn clear_session(&self) -> AuthResult<()> {
        secrets::delete(&self.account).map_err(AuthError::SecureStorage)
    }
}

#[cfg(not(test))]
mod secrets {
    use keyring::Entry;

    use super::KEYRING_SERVICE_NAME;

    fn entry(account: &str) -> Result<Entry, String> {
        Entry::new(KEYRING_SERVICE_NAME, account).map_err(|error| error.to_string())
    }

    pub fn read(account: &str) -> Result<Option<String>, String> {
        match entry(account)?.get_password() {
            Ok(raw) => Ok(Some(raw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(error.to_string()),
        }
    }

    pub fn write(account: &str, raw: &str) -> Result<(), String> {
        entry(account)?
            .set_password(raw)
            .map_err(|error| error.to_string())
    }

    pub fn delete(account: &str) -> Result<(), String> {
        match entry(account)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(error.to_string()),
        }
    }
}
