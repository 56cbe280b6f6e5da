//! Runtime configuration.
//!
//! Values come from environment variables; command-line flags override them.
//! Nothing here is global: `Config` is built once in `main` and handed to the
//! server, which builds the session gate from `Config::session`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::identity::{SessionConfig, MAX_SESSION_TTL, MIN_SECRET_LEN};

pub const DEFAULT_HTTP_PORT: u16 = 3000;
pub const DEFAULT_DB_PATH: &str = "financy.db";

pub const ENV_HTTP_PORT: &str = "FINANCY_HTTP_PORT";
pub const ENV_DB_PATH: &str = "FINANCY_DB_PATH";
pub const ENV_SESSION_PASSWORD: &str = "SESSION_PASSWORD";
pub const ENV_MODE: &str = "FINANCY_ENV";
pub const ENV_SESSION_TTL: &str = "FINANCY_SESSION_TTL_SECS";

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub db_path: PathBuf,
    pub production: bool,
    pub session: SessionConfig,
}

impl Config {
    /// Read the process environment and `std::env::args()`.
    pub fn from_env_and_args() -> Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        Self::from_sources(&args, |name| std::env::var(name).ok())
    }

    pub fn from_sources(args: &[String], env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env_port = match env(ENV_HTTP_PORT) {
            Some(v) => Some(v.parse::<u16>().map_err(|_| anyhow!("{ENV_HTTP_PORT} is not a port: {v:?}"))?),
            None => None,
        };
        let arg_port = match flag_value(args, "--http-port") {
            Some(v) => Some(v.parse::<u16>().map_err(|_| anyhow!("--http-port is not a port: {v:?}"))?),
            None => None,
        };
        let http_port = arg_port.or(env_port).unwrap_or(DEFAULT_HTTP_PORT);

        let db_path = flag_value(args, "--db")
            .or_else(|| env(ENV_DB_PATH))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

        let production = has_flag(args, "--production")
            || env(ENV_MODE).map(|m| m.eq_ignore_ascii_case("production")).unwrap_or(false);

        let secret = env(ENV_SESSION_PASSWORD)
            .ok_or_else(|| anyhow!("{ENV_SESSION_PASSWORD} must be set (at least {MIN_SECRET_LEN} characters)"))?;
        let mut session = SessionConfig::new(secret).with_secure(production);
        if let Some(ttl) = env(ENV_SESSION_TTL) {
            let secs = ttl.parse::<u64>().map_err(|_| anyhow!("{ENV_SESSION_TTL} is not a number of seconds: {ttl:?}"))?;
            if secs == 0 || secs > MAX_SESSION_TTL.as_secs() {
                return Err(anyhow!("{ENV_SESSION_TTL} must be between 1 and {} seconds, got {secs}", MAX_SESSION_TTL.as_secs()));
            }
            session = session.with_max_age(Duration::from_secs(secs));
        }

        Ok(Self { http_port, db_path, production, session })
    }
}

pub(crate) fn flag_value(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

pub(crate) fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}
