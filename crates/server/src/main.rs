use clap::Parser;
use shelfdb_core::index::{ExactCosineIndex, IvfConfig, IvfIndex, NswConfig, NswIndex};
use shelfdb_core::{config, Database, IndexKind};
use shelfdb_server::api::handlers::AppState;
use shelfdb_server::api::{create_router, metrics};
use shelfdb_server::embedding::EmbeddingClient;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shelfdb", about = "Single-node vector database")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = config::DEFAULT_PORT)]
    port: u16,

    /// Data directory for record storage
    #[arg(short, long, default_value = config::DEFAULT_DATA_DIR)]
    data_dir: String,

    /// Embedding provider endpoint URL (e.g. https://api.example.com/embed)
    #[arg(long, env = "SHELFDB_EMBEDDING_URL")]
    embedding_url: Option<String>,

    /// Embedding model name sent to the provider
    #[arg(long, env = "SHELFDB_EMBEDDING_MODEL", default_value = "embed-v4.0")]
    embedding_model: String,

    /// IVF clusters for the chunk index (0 = ⌊√n⌋ at rebuild time)
    #[arg(long, default_value_t = 0)]
    ivf_clusters: usize,

    /// IVF clusters probed per query (0 = ⌈k_c/4⌉)
    #[arg(long, default_value_t = 0)]
    ivf_probe: usize,

    /// NSW target degree
    #[arg(long, default_value_t = config::NSW_DEFAULT_M)]
    nsw_m: usize,

    /// NSW candidate list size during search
    #[arg(long, default_value_t = config::NSW_DEFAULT_EF_SEARCH)]
    nsw_ef_search: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("shelfdb_server=info".parse().expect("valid directive"))
                .add_directive("shelfdb_core=info".parse().expect("valid directive")),
        )
        .init();

    let args = Args::parse();

    if args.port == 0 {
        eprintln!("Error: port must be > 0");
        std::process::exit(1);
    }
    let data_path = std::path::Path::new(&args.data_dir);
    if data_path.exists() && !data_path.is_dir() {
        eprintln!(
            "Error: data_dir '{}' exists but is not a directory",
            args.data_dir
        );
        std::process::exit(1);
    }

    // Credentials come from the environment, never from flags.
    let embedder = args.embedding_url.as_ref().map(|url| {
        let api_key = std::env::var("SHELFDB_EMBEDDING_API_KEY").ok();
        if api_key.is_none() {
            tracing::warn!("SHELFDB_EMBEDDING_API_KEY not set; embedding requests go unauthenticated");
        }
        Arc::new(EmbeddingClient::new(
            url.clone(),
            args.embedding_model.clone(),
            api_key,
        ))
    });
    if embedder.is_none() {
        tracing::info!("No embedding provider configured; text-only writes and queries will be rejected");
    }

    let db = Database::open(&args.data_dir)?;

    // Attach the chunk indexes, then the startup rebuild phase brings every
    // index in line with on-disk state.
    db.chunks
        .add_index(IndexKind::Cosine, Box::new(ExactCosineIndex::new()))?;
    db.chunks.add_index(
        IndexKind::Ivf,
        Box::new(IvfIndex::new(IvfConfig {
            n_clusters: (args.ivf_clusters > 0).then_some(args.ivf_clusters),
            n_probe: (args.ivf_probe > 0).then_some(args.ivf_probe),
            ..IvfConfig::default()
        })),
    )?;
    db.chunks.add_index(
        IndexKind::Nsw,
        Box::new(NswIndex::new(NswConfig {
            m: args.nsw_m,
            ef_search: args.nsw_ef_search,
            ..NswConfig::default()
        })),
    )?;

    let start = Instant::now();
    db.startup_rebuild()?;
    tracing::info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        chunks = db.chunks.len()?,
        "startup rebuild complete"
    );

    let prometheus_handle =
        metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    let state = AppState {
        db: db.clone(),
        embedder,
        prometheus_handle,
        start_time: Instant::now(),
    };

    // Background gauge refresh.
    let metrics_db = db.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(15));
        loop {
            interval.tick().await;
            metrics::update_collection_metrics(&metrics_db);
        }
    });

    let app = create_router(state);
    let addr = format!("0.0.0.0:{}", args.port);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port = args.port,
        data_dir = %args.data_dir,
        "shelfdb ready"
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_signal())
        .await?;

    tracing::info!("shutdown complete");
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }

    tracing::info!("Shutting down gracefully, draining in-flight requests...");
}
