use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use clap::Parser;
use tokio::sync::Semaphore;
use tokio::time::Duration;
use tracing::{error, info, warn};

use fib_jobs::api::{self, job::JobService, validation};
use fib_jobs::cli::{self, Cli, Command};
use fib_jobs::config::{Config, StoreKind};
use fib_jobs::db::{self, JobRepository, MemoryJobRepository, PgJobRepository};
use fib_jobs::logging;
use fib_jobs::pipeline::{Execution, OutputConfig, TaskRegistry};
use fib_jobs::shutdown::ShutdownCoordinator;
use fib_jobs::worker::JobWorker;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");

    // Create logs directory if it doesn't exist
    std::fs::create_dir_all(&config.log_dir).expect("Failed to create logs directory");
    logging::init(&config.log_dir);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Migrate => {
            let pool = connect(&config).await;
            db::migrations::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            pool.close().await;
            Ok(())
        }
        Command::Run { fib_num } => {
            std::fs::create_dir_all(&config.output_path)?;
            match cli::run_local(fib_num, OutputConfig::new(&config.output_path)) {
                Ok(run) => {
                    if run.execution == Execution::AlreadyComplete {
                        info!("Target {} already exists, not recomputing", run.target_key);
                    }
                    println!("{}", run.content.unwrap_or_default());
                    Ok(())
                }
                Err(e) => {
                    error!("Task failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}

async fn connect(config: &Config) -> sqlx::Pool<sqlx::Postgres> {
    let database_url = config
        .require_database_url()
        .expect("Failed to load configuration");

    let pool = db::connection::get_connection(database_url, config.max_db_connections)
        .await
        .expect("Failed to connect to database");
    info!("Database connection pool established");
    pool
}

async fn build_repository(config: &Config) -> Arc<dyn JobRepository> {
    match config.store {
        StoreKind::Postgres => {
            let pool = connect(config).await;

            // Run migrations on startup (auto-migrate when starting server)
            db::migrations::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");

            Arc::new(PgJobRepository::new(pool))
        }
        StoreKind::Memory => {
            warn!("Using in-memory job store; job requests are lost on restart");
            Arc::new(MemoryJobRepository::new())
        }
    }
}

async fn serve(config: Config) -> std::io::Result<()> {
    info!("Starting fib-jobs application");
    info!("Configuration loaded successfully:");
    info!("  - Job store: {:?}", config.store);
    info!("  - Output path: {}", config.output_path.display());
    info!("  - Max payload size: {} bytes", config.max_payload_size);
    info!("  - Max database connections: {}", config.max_db_connections);
    info!("  - Max concurrent jobs: {}", config.max_concurrent_jobs);
    info!("  - Number of workers: {}", config.num_workers);

    std::fs::create_dir_all(&config.output_path)?;

    let repo = build_repository(&config).await;
    match repo.requeue_processing().await {
        Ok(0) => {}
        Ok(n) => warn!("Requeued {} jobs left processing by a previous run", n),
        Err(e) => error!("Failed to requeue interrupted jobs: {:?}", e),
    }

    let registry = Arc::new(TaskRegistry::with_defaults(OutputConfig::new(&config.output_path)));

    // watch channel allows multiple receivers to get the same value
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    // Spawn background workers with semaphore-based bounded concurrency
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
    let poll_interval = Duration::from_secs(config.worker_poll_interval_secs);
    let mut worker_handles = Vec::new();

    for worker_id in 1..=config.num_workers {
        let job_worker = JobWorker::new(repo.clone(), registry.clone(), poll_interval);
        let worker_semaphore = semaphore.clone();
        let worker_shutdown_rx = shutdown_rx.clone();

        let handle = tokio::spawn(async move {
            job_worker.run(worker_id, worker_semaphore, worker_shutdown_rx).await;
        });

        worker_handles.push(handle);
        info!("Spawned worker {}", worker_id);
    }

    let job_service = web::Data::new(JobService::new(repo.clone(), registry));
    let max_payload_size = config.max_payload_size;

    let server = HttpServer::new(move || {
        App::new()
            .app_data(job_service.clone())
            .app_data(web::PayloadConfig::default().limit(max_payload_size))
            .app_data(validation::json_config().limit(max_payload_size))
            .app_data(validation::path_config())
            .configure(api::configure)
    });

    info!("Server starting on http://{}:{}", config.bind_addr, config.port);

    let server = server
        .bind((config.bind_addr.as_str(), config.port))?
        .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    let coordinator = ShutdownCoordinator::new(
        server_handle,
        server_task,
        worker_handles,
        shutdown_tx,
        repo,
    );

    coordinator.wait_for_shutdown().await
}
