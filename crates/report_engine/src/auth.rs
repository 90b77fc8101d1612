use std::collections::BTreeMap;

use models::UserCredential;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::warn;

/// Unknown users and wrong passwords are indistinguishable to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid username or password")]
pub struct AuthenticationFailure;

/// Proof that a login succeeded. Only [`CredentialStore::authenticate`] hands
/// these out, and a report session cannot be opened without one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    name: String,
}

impl AuthenticatedUser {
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    users: BTreeMap<String, UserCredential>,
}

impl CredentialStore {
    pub fn new(users: BTreeMap<String, UserCredential>) -> Self {
        Self { users }
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthenticatedUser, AuthenticationFailure> {
        let accepted = match self.users.get(username) {
            Some(UserCredential::Plain { password: expected }) => {
                digest(expected.as_bytes()) == digest(password.as_bytes())
            }
            Some(UserCredential::Sha256 { sha256 }) => {
                hex::decode(sha256.trim()).ok() == Some(digest(password.as_bytes()))
            }
            None => false,
        };

        if accepted {
            Ok(AuthenticatedUser {
                name: username.to_string(),
            })
        } else {
            warn!(user = %username, "authentication failed");
            Err(AuthenticationFailure)
        }
    }
}

/// Hex SHA-256 of a password, the form stored under `sha256` in the settings.
pub fn hash_password(password: &str) -> String {
    hex::encode(digest(password.as_bytes()))
}

fn digest(bytes: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CredentialStore {
        let mut users = BTreeMap::new();
        users.insert(
            "ana".to_string(),
            UserCredential::Plain { password: "cotas2024".to_string() },
        );
        users.insert(
            "ops".to_string(),
            UserCredential::Sha256 { sha256: hash_password("s3cret") },
        );
        CredentialStore::new(users)
    }

    #[test]
    fn test_plain_password_login() {
        let user = store().authenticate("ana", "cotas2024").unwrap();
        assert_eq!(user.name(), "ana");
    }

    #[test]
    fn test_hashed_password_login() {
        let user = store().authenticate("ops", "s3cret").unwrap();
        assert_eq!(user.name(), "ops");
    }

    #[test]
    fn test_hashed_password_accepts_uppercase_hex() {
        let mut users = BTreeMap::new();
        users.insert(
            "ops".to_string(),
            UserCredential::Sha256 { sha256: hash_password("s3cret").to_uppercase() },
        );
        assert!(CredentialStore::new(users).authenticate("ops", "s3cret").is_ok());
    }

    #[test]
    fn test_failures_look_the_same() {
        let s = store();
        assert_eq!(s.authenticate("ana", "wrong"), Err(AuthenticationFailure));
        assert_eq!(s.authenticate("ops", "cotas2024"), Err(AuthenticationFailure));
        assert_eq!(s.authenticate("nobody", "cotas2024"), Err(AuthenticationFailure));
        assert_eq!(s.authenticate("", ""), Err(AuthenticationFailure));
    }

    #[test]
    fn test_empty_store_rejects_everyone() {
        let s = CredentialStore::default();
        assert!(s.is_empty());
        assert!(s.authenticate("ana", "cotas2024").is_err());
    }

    #[test]
    fn test_hash_password_is_hex_sha256() {
        assert_eq!(
            hash_password("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
