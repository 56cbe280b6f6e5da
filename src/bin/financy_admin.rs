//!
//! financy admin binary
//! --------------------
//! Out-of-band identity management. Identities are never created through the
//! web server; use this tool against the same database file.
//!
//!   financy_admin [--db PATH] add-user <rut> <password>
//!   financy_admin [--db PATH] set-password <rut> <password>

use anyhow::{anyhow, bail, Context, Result};

use financy::config::{DEFAULT_DB_PATH, ENV_DB_PATH};
use financy::identity::hash_password;
use financy::rut;
use financy::storage::Store;

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--db <path>] add-user <rut> <password>\n  {program} [--db <path>] set-password <rut> <password>\n\nThe database path defaults to ${ENV_DB_PATH} or {DEFAULT_DB_PATH}."
    );
}

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let mut args: Vec<String> = std::env::args().collect();
    let program = args.remove(0);

    let mut db_path = std::env::var(ENV_DB_PATH).unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());
    if let Some(i) = args.iter().position(|a| a == "--db") {
        if i + 1 >= args.len() {
            print_usage(&program);
            bail!("--db needs a path");
        }
        db_path = args.remove(i + 1);
        args.remove(i);
    }

    let (cmd, raw_rut, password) = match args.as_slice() {
        [cmd, r, p] => (cmd.as_str(), r.as_str(), p.as_str()),
        _ => {
            print_usage(&program);
            bail!("expected a command, a RUT and a password");
        }
    };

    let canonical = rut::canonicalize(raw_rut);
    if canonical.len() < 2 {
        bail!("{raw_rut:?} does not look like a RUT");
    }
    let store = Store::open(&db_path).with_context(|| format!("While opening database {db_path}"))?;
    let hash = hash_password(password)?;

    match cmd {
        "add-user" => {
            let identity = store.create_user(&canonical, &hash)?;
            println!("created user {} ({})", identity.id, identity.rut);
        }
        "set-password" => {
            let identity = store
                .find_user_by_canonical_rut(&canonical)?
                .ok_or_else(|| anyhow!("no user with RUT {canonical}"))?;
            store.set_password_hash(&identity.id, &hash)?;
            println!("password updated for {}", identity.rut);
        }
        other => {
            print_usage(&program);
            bail!("unknown command {other:?}");
        }
    }
    Ok(())
}
