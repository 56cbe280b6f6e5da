use tracing_subscriber::{EnvFilter, fmt};

use financy::config::{Config, ENV_DB_PATH, ENV_HTTP_PORT, ENV_MODE, ENV_SESSION_PASSWORD};

fn print_usage() {
    println!(
        "financy\n\nUSAGE:\n  financy [--http-port N] [--db PATH] [--production]\n\nOPTIONS:\n  --http-port N   HTTP port (env: {ENV_HTTP_PORT}, default 3000)\n  --db PATH       SQLite database file (env: {ENV_DB_PATH}, default financy.db)\n  --production    Mark session cookies Secure (env: {ENV_MODE}=production)\n\nThe session secret is read from {ENV_SESSION_PASSWORD} (at least 32 characters)."
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let config = Config::from_env_and_args()?;
    financy::server::run(config).await
}
