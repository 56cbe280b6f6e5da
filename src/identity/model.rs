use serde::{Deserialize, Serialize};

/// A stored login: generated key, canonical RUT and Argon2 PHC hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub rut: String,
    pub password_hash: String,
}

/// What the session cookie carries. Never includes the password hash.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionUser {
    pub id: String,
    pub rut: String,
}

impl From<&Identity> for SessionUser {
    fn from(identity: &Identity) -> Self {
        Self { id: identity.id.clone(), rut: identity.rut.clone() }
    }
}
