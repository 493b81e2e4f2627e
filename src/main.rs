use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use loadlens::analysis::llm::LlmClient;
use loadlens::analysis::orchestrator::AnalysisOrchestrator;
use loadlens::config::Settings;
use loadlens::influxdb::InfluxClient;
use loadlens::k8s::resources::ResourceClient;
use loadlens::k8s::K8sClient;
use loadlens::pod_spec_cache::PodSpecCache;
use loadlens::resource_buffers::ResourceBufferMap;
use loadlens::schedulers::cache_cleanup::{CacheCleanupController, CleanupStats};
use loadlens::schedulers::discovery::DiscoveryController;
use loadlens::schedulers::job_monitor::JobMonitorController;
use loadlens::server::{create_app, AppState};
use loadlens::{db_connect, db_migrate};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{info, subscriber::set_global_default};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the control plane: schedulers plus the HTTP/SSE server
    Serve {
        /// Port to serve on (overrides SERVER_PORT)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Apply pending database migrations and exit
    Migrate,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = Registry::default()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer());
    set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    match cli.command {
        Commands::Migrate => {
            let db = db_connect(&settings.database_url).await?;
            db_migrate(&db).await?;
            println!("{}", "Migrations applied".green());
            Ok(())
        }
        Commands::Serve { port } => serve(settings, port).await,
    }
}

async fn serve(settings: Settings, port_override: Option<u16>) -> anyhow::Result<()> {
    let db = db_connect(&settings.database_url).await?;
    db_migrate(&db).await?;

    let k8s = K8sClient::new()
        .await
        .context("Error connecting to the Kubernetes API")?;
    let influx = InfluxClient::new(&settings.influxdb);
    let llm = LlmClient::new(&settings.llm);

    let pod_spec_cache = Arc::new(PodSpecCache::with_default_ttl());
    let buffers = Arc::new(ResourceBufferMap::new());
    let cleanup_stats = Arc::new(Mutex::new(CleanupStats::default()));
    let resources = Arc::new(ResourceClient::new(
        k8s.clone(),
        &settings.kubernetes.test_namespace,
    ));
    let orchestrator = Arc::new(AnalysisOrchestrator::new(
        db.clone(),
        &settings.llm,
        settings.display_timezone,
    ));

    // Controllers check the shutdown signal between ticks.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let discovery = DiscoveryController::new(db.clone(), k8s.clone(), &settings);
    tokio::spawn(discovery.run_loop(shutdown_rx.clone()));

    let job_monitor = JobMonitorController::new(
        db.clone(),
        k8s.clone(),
        influx.clone(),
        pod_spec_cache.clone(),
        orchestrator,
        &settings,
    );
    tokio::spawn(job_monitor.run_loop(shutdown_rx.clone()));

    let cleanup = CacheCleanupController::new(
        pod_spec_cache.clone(),
        buffers.clone(),
        cleanup_stats.clone(),
        &settings,
    );
    tokio::spawn(cleanup.run_loop(shutdown_rx.clone()));

    let state = AppState {
        db,
        influx,
        llm,
        pod_spec_cache,
        buffers,
        resources,
        cleanup_stats,
        display_timezone: settings.display_timezone,
    };
    let app = create_app(state);

    let port = port_override.unwrap_or(settings.server_port);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .context(format!("Error binding to port {port}"))?;

    println!("> loadlens listening on {}", format!("http://0.0.0.0:{port}").green());
    info!("Server started on port {port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received");
            shutdown_tx.send(true).ok();
        })
        .await
        .context("Server error")?;

    Ok(())
}
