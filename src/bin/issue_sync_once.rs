//! Run a single repository issue sync from the command line.
//!
//! Uses the same configuration and database as the server and prints the
//! sync report as JSON.

use anyhow::{Context, Result, bail};
use clap::Parser;
use issue_sync::{
    config::ConfigLoader,
    db,
    server::AppState,
    sync::SyncRequest,
    telemetry::init_tracing,
};

#[derive(Debug, Parser)]
#[command(name = "issue-sync-once", version, about = "Sync one repository's issues and exit")]
struct Cli {
    /// Id of the tracked repository
    #[arg(long)]
    repo_id: String,

    /// Maximum number of issues to process
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    issue_limit: Option<u32>,

    /// Apply pending migrations before syncing
    #[arg(long)]
    migrate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .load()
        .context("loading configuration")?;
    init_tracing(&config).context("initialising tracing")?;

    let pool = db::init_pool(&config)
        .await
        .context("initializing database connection pool")?;
    if cli.migrate {
        db::run_migrations(&pool).await?;
    }

    let state = AppState::new(config, pool).context("building GitHub issue source")?;

    let mut request = SyncRequest::new(cli.repo_id);
    if let Some(limit) = cli.issue_limit {
        request = request.with_issue_limit(limit);
    }

    match state.sync.run(request).await {
        Ok(run) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&run.report).context("serializing sync report")?
            );
            Ok(())
        }
        Err(err) => bail!("sync failed ({}): {}", err.kind(), err),
    }
}
