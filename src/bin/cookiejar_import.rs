//! Imports a legacy cookie file and writes every partition to the configured store.
//!
//! ```text
//! COOKIEJAR_BACKEND=sqlite COOKIEJAR_SQLITE_PATH=cookies.db cookiejar-import cookies.json
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use persistent_cookie_jar::{PersistentCookieJar, StoreBackend, StoreConfig};

/// Import a legacy JSON cookie file into the cookie store
#[derive(Parser, Debug)]
#[command(name = "cookiejar-import", version, about, long_about = None)]
struct Args {
    /// Legacy cookie file (a JSON array of cookie records)
    path: PathBuf,

    /// Store backend (overrides COOKIEJAR_BACKEND)
    #[arg(short, long)]
    backend: Option<StoreBackend>,

    /// Log filter (overrides RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(level) = &args.log_level {
        logger.parse_filters(level);
    }
    logger.init();

    let mut config = StoreConfig::from_env().context("reading store configuration")?;
    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    log::debug!("store configuration: {config:?}");

    let jar = PersistentCookieJar::from_config(&config).context("opening cookie store")?;
    jar.load_from_file(&args.path)
        .with_context(|| format!("importing {}", args.path.display()))?;

    let report = jar.save();
    if !report.is_complete() {
        bail!("{} partitions failed to save: {}", report.failed.len(), report.failed.join(", "));
    }

    log::info!("import finished: {} partitions saved", report.saved);
    Ok(())
}
