use serde::Deserialize;
use tracing::{debug, info};

use super::model::Identity;
use super::password::verify_password;
use crate::error::AppError;
use crate::rut;
use crate::storage::{SharedStore, Store, StoreError, StoreResult};

pub const MISSING_FIELDS_MSG: &str = "RUT y contraseña son requeridos";
pub const INVALID_CREDENTIALS_MSG: &str = "Credenciales inválidas";

/// Login form body. Older clients send the identifier as `rut`; when both
/// keys are present `identifier` wins.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "LoginForm")]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

#[derive(Deserialize)]
struct LoginForm {
    #[serde(default)]
    identifier: Option<String>,
    #[serde(default)]
    rut: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

impl From<LoginForm> for LoginRequest {
    fn from(form: LoginForm) -> Self {
        Self {
            identifier: form.identifier.or(form.rut).unwrap_or_default(),
            password: form.password.unwrap_or_default(),
        }
    }
}

/// Identity lookups the verifier needs from durable storage.
pub trait CredentialStore {
    fn find_by_rut(&self, rut: &str) -> StoreResult<Option<Identity>>;
    fn update_rut(&self, id: &str, rut: &str) -> StoreResult<()>;
}

impl<T: CredentialStore + ?Sized> CredentialStore for &T {
    fn find_by_rut(&self, rut: &str) -> StoreResult<Option<Identity>> { (**self).find_by_rut(rut) }

    fn update_rut(&self, id: &str, rut: &str) -> StoreResult<()> { (**self).update_rut(id, rut) }
}

impl CredentialStore for Store {
    fn find_by_rut(&self, rut: &str) -> StoreResult<Option<Identity>> { self.find_user_by_rut(rut) }

    fn update_rut(&self, id: &str, rut: &str) -> StoreResult<()> {
        self.update_user_rut(id, rut).map(|_| ())
    }
}

impl CredentialStore for SharedStore {
    fn find_by_rut(&self, rut: &str) -> StoreResult<Option<Identity>> { self.lock().find_user_by_rut(rut) }

    fn update_rut(&self, id: &str, rut: &str) -> StoreResult<()> {
        self.lock().update_user_rut(id, rut).map(|_| ())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("{}", MISSING_FIELDS_MSG)]
    MissingFields,
    /// Unknown RUT and wrong password both land here.
    #[error("{}", INVALID_CREDENTIALS_MSG)]
    InvalidCredentials,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<VerifyError> for AppError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::MissingFields => AppError::user("missing_fields", MISSING_FIELDS_MSG),
            VerifyError::InvalidCredentials => AppError::auth("invalid_credentials", INVALID_CREDENTIALS_MSG),
            VerifyError::Store(e) => e.into(),
        }
    }
}

/// Checks a RUT + password pair against stored identities.
pub struct CredentialVerifier<S> {
    store: S,
}

impl<S: CredentialStore> CredentialVerifier<S> {
    pub fn new(store: S) -> Self { Self { store } }

    pub fn verify(&self, req: &LoginRequest) -> Result<Identity, VerifyError> {
        if req.identifier.trim().is_empty() || req.password.is_empty() {
            return Err(VerifyError::MissingFields);
        }
        let canonical = rut::canonicalize(&req.identifier);
        if canonical.is_empty() {
            return Err(VerifyError::InvalidCredentials);
        }

        let Some(mut identity) = self.lookup(&canonical)? else {
            info!(rut = %canonical, "login rejected: unknown rut");
            return Err(VerifyError::InvalidCredentials);
        };

        if !verify_password(&identity.password_hash, &req.password) {
            info!(rut = %canonical, "login rejected: bad password");
            return Err(VerifyError::InvalidCredentials);
        }

        if identity.rut != canonical {
            self.store.update_rut(&identity.id, &canonical)?;
            info!(id = %identity.id, from = %identity.rut, to = %canonical, "migrated stored rut to canonical form");
            identity.rut = canonical;
        }
        Ok(identity)
    }

    /// Canonical form first, then the dotted form older records were saved with.
    fn lookup(&self, canonical: &str) -> StoreResult<Option<Identity>> {
        if let Some(found) = self.store.find_by_rut(canonical)? {
            return Ok(Some(found));
        }
        let legacy = rut::format_legacy(canonical);
        debug!(rut = %canonical, legacy = %legacy, "canonical rut not found, trying legacy form");
        self.store.find_by_rut(&legacy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::hash_password;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Map-backed store that counts calls.
    #[derive(Default)]
    struct MemStore {
        rows: Mutex<HashMap<String, Identity>>,
        lookups: Mutex<usize>,
        fail: bool,
    }

    impl MemStore {
        fn with(rut: &str, password: &str) -> Self {
            let s = MemStore::default();
            s.rows.lock().insert(
                rut.to_string(),
                Identity { id: "user-1".into(), rut: rut.into(), password_hash: hash_password(password).unwrap() },
            );
            s
        }
    }

    impl CredentialStore for MemStore {
        fn find_by_rut(&self, rut: &str) -> StoreResult<Option<Identity>> {
            *self.lookups.lock() += 1;
            if self.fail {
                return Err(StoreError::Corrupt("down".into()));
            }
            Ok(self.rows.lock().get(rut).cloned())
        }

        fn update_rut(&self, id: &str, rut: &str) -> StoreResult<()> {
            let mut rows = self.rows.lock();
            let key = rows.iter().find(|(_, v)| v.id == id).map(|(k, _)| k.clone());
            if let Some(k) = key {
                let mut row = rows.remove(&k).unwrap();
                row.rut = rut.to_string();
                rows.insert(rut.to_string(), row);
            }
            Ok(())
        }
    }

    fn req(identifier: &str, password: &str) -> LoginRequest {
        LoginRequest { identifier: identifier.into(), password: password.into() }
    }

    #[test]
    fn missing_fields_skip_the_store() {
        let v = CredentialVerifier::new(MemStore::with("123456789", "correct"));
        assert!(matches!(v.verify(&req("", "correct")), Err(VerifyError::MissingFields)));
        assert!(matches!(v.verify(&req("   ", "correct")), Err(VerifyError::MissingFields)));
        assert!(matches!(v.verify(&req("123456789", "")), Err(VerifyError::MissingFields)));
        assert_eq!(*v.store.lookups.lock(), 0);
    }

    #[test]
    fn every_surface_form_yields_same_identity() {
        let v = CredentialVerifier::new(MemStore::with("123456789", "correct"));
        for form in ["12.345.678-9", "12345678-9", "123456789"] {
            let id = v.verify(&req(form, "correct")).unwrap();
            assert_eq!(id.id, "user-1");
            assert_eq!(id.rut, "123456789");
        }
    }

    #[test]
    fn check_character_case_is_ignored() {
        let v = CredentialVerifier::new(MemStore::with("7654321K", "pw"));
        assert_eq!(v.verify(&req("7.654.321-k", "pw")).unwrap().id, "user-1");
    }

    #[test]
    fn unknown_rut_and_bad_password_look_identical() {
        let v = CredentialVerifier::new(MemStore::with("123456789", "correct"));
        let unknown = v.verify(&req("111111111", "correct")).unwrap_err();
        let wrong = v.verify(&req("123456789", "wrong")).unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
        let (a, b): (AppError, AppError) = (unknown.into(), wrong.into());
        assert_eq!(a.http_status(), b.http_status());
        assert_eq!(a.message(), INVALID_CREDENTIALS_MSG);
    }

    #[test]
    fn legacy_record_is_found_and_migrated_after_success() {
        let v = CredentialVerifier::new(MemStore::with("12.345.678-9", "correct"));
        let id = v.verify(&req("123456789", "correct")).unwrap();
        assert_eq!(id.rut, "123456789");
        let rows = v.store.rows.lock();
        assert!(rows.contains_key("123456789"));
        assert!(!rows.contains_key("12.345.678-9"));
    }

    #[test]
    fn legacy_record_untouched_on_bad_password() {
        let v = CredentialVerifier::new(MemStore::with("12.345.678-9", "correct"));
        assert!(v.verify(&req("123456789", "nope")).is_err());
        assert!(v.store.rows.lock().contains_key("12.345.678-9"));
    }

    #[test]
    fn store_failure_is_not_a_rejection() {
        let store = MemStore { fail: true, ..MemStore::default() };
        let v = CredentialVerifier::new(store);
        assert!(matches!(v.verify(&req("123456789", "x")), Err(VerifyError::Store(_))));
    }

    #[test]
    fn works_against_sqlite_store() {
        let store = Store::open_in_memory().unwrap();
        store.insert_user("1.234.567-K", &hash_password("pw").unwrap()).unwrap();
        let v = CredentialVerifier::new(store);
        let id = v.verify(&req("1234567k", "pw")).unwrap();
        assert_eq!(id.rut, "1234567K");
        assert!(v.store.find_user_by_rut("1234567K").unwrap().is_some());
        assert!(v.store.find_user_by_rut("1.234.567-K").unwrap().is_none());
    }

    #[test]
    fn login_request_accepts_rut_alias() {
        let r: LoginRequest = serde_json::from_str(r#"{"rut":"12.345.678-9","password":"x"}"#).unwrap();
        assert_eq!(r.identifier, "12.345.678-9");
        let r: LoginRequest = serde_json::from_str(r#"{"identifier":"1-9"}"#).unwrap();
        assert_eq!(r.password, "");
    }

    #[test]
    fn identifier_wins_over_rut_when_both_are_sent() {
        let r: LoginRequest =
            serde_json::from_str(r#"{"identifier":"12.345.678-9","rut":"1-9","password":"x"}"#).unwrap();
        assert_eq!(r.identifier, "12.345.678-9");
        assert_eq!(r.password, "x");
        let r: LoginRequest = serde_json::from_str(r#"{"identifier":null,"rut":"1-9"}"#).unwrap();
        assert_eq!(r.identifier, "1-9");
    }
}
