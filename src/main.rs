//! shardmesh entry point: loads configuration, wires the storage backends,
//! metadata store, and orchestrator, and serves the HTTP API.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use shardmesh::api_server::{build_router, ApiState};
use shardmesh::auth::{AuthConfig, AuthService};
use shardmesh::backend::{BackendAdapter, FilesystemBackend};
use shardmesh::codec::TOTAL_SHARDS;
use shardmesh::config::Config;
use shardmesh::database::{MetadataStore, SqliteMetadataStore};
use shardmesh::logging;
use shardmesh::ShardOrchestrator;

#[derive(Parser, Debug)]
#[command(name = "shardmesh", about = "Erasure-coded, multi-backend file storage")]
struct Cli {
    /// Path to a TOML configuration file. Defaults are used if absent.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging_safe();

    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config).context("loading configuration")?;

    let mut backends: Vec<Arc<dyn BackendAdapter>> = Vec::with_capacity(TOTAL_SHARDS);
    for i in 0..TOTAL_SHARDS {
        let root = config.server.backend_root.join(format!("location-{i}"));
        backends.push(Arc::new(
            FilesystemBackend::new(&root)
                .await
                .with_context(|| format!("initializing backend location {i} at {}", root.display()))?,
        ));
    }

    let metadata: Arc<dyn MetadataStore> = Arc::new(
        SqliteMetadataStore::open(&config.server.database_path)
            .context("opening metadata database")?,
    );

    let orchestrator = Arc::new(
        ShardOrchestrator::new(backends, metadata.clone(), config.per_call_timeout())
            .context("constructing shard orchestrator")?,
    );

    let auth = Arc::new(AuthService::new(
        metadata,
        AuthConfig {
            jwt_secret: config.auth.jwt_secret.clone(),
            jwt_ttl_secs: config.auth.jwt_ttl_secs,
        },
    ));

    let app = build_router(ApiState { orchestrator, auth });

    let listener = tokio::net::TcpListener::bind(&config.server.listen_address)
        .await
        .with_context(|| format!("binding to {}", config.server.listen_address))?;
    tracing::info!(address = %config.server.listen_address, "shardmesh listening");
    axum::serve(listener, app).await.context("serving HTTP")?;

    Ok(())
}
