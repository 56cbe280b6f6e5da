//! Login and session handling.
//! Keep the public surface thin and split implementation across sub-modules:
//! the verifier turns a RUT + password into an `Identity`, the session gate
//! seals that identity into a cookie and reads it back, and the request gate
//! keeps unauthenticated requests away from protected routes.

mod gate;
mod model;
mod password;
mod session;
mod verifier;

pub use gate::{decide, is_public, require_session, GateDecision, LOGIN_PATH, PUBLIC_PATHS};
pub use model::{Identity, SessionUser};
pub use password::{hash_password, verify_password};
pub use session::{SessionConfig, SessionError, SessionGate, DEFAULT_MAX_AGE, MAX_SESSION_TTL, MIN_SECRET_LEN, SESSION_COOKIE};
pub use verifier::{CredentialStore, CredentialVerifier, LoginRequest, VerifyError, INVALID_CREDENTIALS_MSG, MISSING_FIELDS_MSG};
