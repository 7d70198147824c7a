//! Retrace application binary - composition root.
//!
//! Ties the crates together into a single executable:
//! 1. Load configuration from TOML and apply CLI/env overrides
//! 2. Open the SQLite page store
//! 3. Probe the embedding backend (ONNX model or deterministic mock)
//! 4. Build the query service (indexer + rankers + fusion + cache)
//! 5. Dispatch the subcommand: serve the REST API, index, search,
//!    print stats, or run the offline evaluation harness

use std::io::Read;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use retrace_api::{create_router, AppState};
use retrace_core::cancel::CancelFlag;
use retrace_core::config::RetraceConfig;
use retrace_core::error::RetraceError;
use retrace_core::types::{IndexRequest, SearchMode, SearchOptions};
use retrace_eval::{builtin_corpus, builtin_queries, EvalHarness};
use retrace_search::QueryService;
use retrace_storage::{Database, PageStore};
use retrace_vector::embedding::{BackendProbe, DynEmbeddingBackend};
use retrace_vector::{MockEmbedding, OnnxEmbeddingBackend};

mod cli;

use cli::{expand_home, CliArgs, Command};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    if let Err(e) = run(args).await {
        eprintln!("retrace: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: CliArgs) -> Result<(), RetraceError> {
    let config_path = args.resolve_config_path();
    let mut config = RetraceConfig::load_or_default(&config_path);

    if let Some(data_dir) = args.resolve_data_dir() {
        config.general.data_dir = data_dir;
    }
    if let Some(log_level) = args.resolve_log_level() {
        config.general.log_level = log_level;
    }
    config.general.port = args.resolve_port(config.general.port);

    init_tracing(&config.general.log_level);

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config).await,
        Command::Index { url, title, file } => index_page(&config, url, title, file).await,
        Command::Search { query, k, mode } => search(&config, &query, k, &mode).await,
        Command::Stats => stats(&config),
        Command::Eval { mode, k } => eval(&mode, k).await,
    }
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Open the store and build the query service from configuration.
fn build_service(config: &RetraceConfig) -> Result<QueryService, RetraceError> {
    let data_dir = expand_home(&config.general.data_dir);
    let db_path = data_dir.join("retrace.db");
    let store = Arc::new(PageStore::new(Arc::new(Database::new(&db_path)?)));
    let backend = select_backend(config);
    Ok(QueryService::new(store, backend, config))
}

/// Pick the embedding backend from config, falling back to the mock
/// when the ONNX model is not usable.
fn select_backend(config: &RetraceConfig) -> Arc<dyn DynEmbeddingBackend> {
    match config.embedding.backend.as_str() {
        "onnx" => {
            let model_dir = expand_home(&config.embedding.model_dir);
            match OnnxEmbeddingBackend::probe(&model_dir) {
                BackendProbe::Available(backend) => {
                    info!(model_dir = %model_dir.display(), "Using ONNX embedding backend");
                    backend
                }
                BackendProbe::Unavailable(reason) => {
                    warn!(reason = %reason, "ONNX backend unavailable; using mock embeddings");
                    Arc::new(MockEmbedding::new())
                }
            }
        }
        other => {
            if other != "mock" {
                warn!(backend = other, "Unknown embedding backend; using mock");
            }
            Arc::new(MockEmbedding::new())
        }
    }
}

async fn serve(config: &RetraceConfig) -> Result<(), RetraceError> {
    let service = Arc::new(build_service(config)?);
    let port = config.general.port;
    let router = create_router(AppState::new(service), port);

    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Retrace API listening");

    axum::serve(listener, router)
        .await
        .map_err(|e| RetraceError::Storage(format!("Server error: {}", e)))?;
    Ok(())
}

async fn index_page(
    config: &RetraceConfig,
    url: String,
    title: String,
    file: Option<std::path::PathBuf>,
) -> Result<(), RetraceError> {
    let content = match file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let service = build_service(config)?;
    let outcome = service
        .index(
            IndexRequest {
                url,
                title,
                content,
                visited_at: None,
                dwell_time_sec: 0.0,
            },
            &CancelFlag::new(),
        )
        .await?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn search(
    config: &RetraceConfig,
    query: &str,
    k: usize,
    mode: &str,
) -> Result<(), RetraceError> {
    let mode = SearchMode::parse(mode)
        .ok_or_else(|| RetraceError::InvalidArgs(format!("Unknown mode: {}", mode)))?;

    let service = build_service(config)?;
    let opts = SearchOptions {
        k,
        mode,
        ..SearchOptions::default()
    };
    let results = service.search(query, opts, &CancelFlag::new()).await?;

    for result in &results {
        println!(
            "{:.3}  [{}]  {}  {}",
            result.relevance,
            result.confidence.as_str(),
            result.page.url,
            result.top_snippet.as_deref().unwrap_or(&result.page.title),
        );
    }
    if results.is_empty() {
        println!("no results");
    }
    Ok(())
}

fn stats(config: &RetraceConfig) -> Result<(), RetraceError> {
    let service = build_service(config)?;
    println!("{}", serde_json::to_string_pretty(&service.stats()?)?);
    Ok(())
}

async fn eval(mode: &str, k: usize) -> Result<(), RetraceError> {
    let mode = SearchMode::parse(mode)
        .ok_or_else(|| RetraceError::InvalidArgs(format!("Unknown mode: {}", mode)))?;

    let harness = EvalHarness::with_lexicon_backend()?;
    harness.index_corpus(&builtin_corpus()).await?;
    let report = harness.run(&builtin_queries(), mode, k).await?;
    print!("{}", report.render());
    Ok(())
}
