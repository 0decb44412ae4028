//!
//! moodjournal server binary
//! -------------------------
//! Loads `.env`, reads configuration from the environment and lets a few CLI flags override it,
//! then serves the journal until interrupted.

use std::env;

use anyhow::{anyhow, Result};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use moodjournal::config::{BackendConfig, Config};

const HELP: &str = "moodjournal\n\nUSAGE:\n  moodjournal [--http-port N] [--bind ADDR] [--backend remote|memory]\n\nOPTIONS:\n  --http-port N        HTTP port (env: JOURNAL_HTTP_PORT, default 8501)\n  --bind ADDR          Listen address (env: JOURNAL_BIND, default 0.0.0.0)\n  --backend KIND       remote (hosted service, needs SUPABASE_URL + SUPABASE_KEY) or memory\n                       (env: JOURNAL_BACKEND, default remote)\n  -h, --help           Show this help\n";

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter().position(|a| a == flag).and_then(|i| args.get(i + 1)).map(String::as_str)
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

/// CLI arguments override environment
fn apply_args(mut config: Config, args: &[String]) -> Result<Config> {
    if let Some(p) = arg_value(args, "--http-port") {
        config.http_port = p.parse::<u16>().map_err(|_| anyhow!("--http-port expects a port number, got '{}'", p))?;
    }
    if let Some(b) = arg_value(args, "--bind") {
        config.bind = b.to_string();
    }
    match arg_value(args, "--backend") {
        None => {}
        Some("memory") => {
            if !matches!(config.backend, BackendConfig::Memory { .. }) {
                config.backend = BackendConfig::Memory { auto_confirm: true };
            }
        }
        Some("remote") => {
            if !matches!(config.backend, BackendConfig::Remote { .. }) {
                config.backend = Config::remote_backend(env::var("SUPABASE_URL").ok(), env::var("SUPABASE_KEY").ok())?;
            }
        }
        Some(other) => return Err(anyhow!("--backend expects remote|memory, got '{}'", other)),
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{}", HELP);
        return Ok(());
    }

    // A missing .env is fine; real environment variables still apply
    let dotenv = dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    // The environment decides the backend unless --backend says otherwise, so a memory run
    // does not need the hosted service settings.
    let config = match arg_value(&args, "--backend") {
        Some("memory") => Config::from_lookup(|k| match k {
            "JOURNAL_BACKEND" => Some("memory".to_string()),
            _ => env::var(k).ok(),
        })?,
        _ => Config::from_env()?,
    };
    let config = apply_args(config, &args)?;

    let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "startup",
        "moodjournal starting: RUST_LOG='{}', dotenv={}, backend={}, bind={}:{}, confirm_delete={}, edit_style={:?}",
        rust_log,
        dotenv.map(|p| p.display().to_string()).unwrap_or_else(|| "<none>".to_string()),
        config.backend.kind(),
        config.bind,
        config.http_port,
        config.workflow.confirm_delete,
        config.workflow.edit_style,
    );

    moodjournal::server::run(config).await
}
