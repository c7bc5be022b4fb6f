use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rustyrag::{api, config, ingestion::DocumentRoot, logging, service::RagService};
use tokio::net::TcpListener;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(
    name = "rustyrag",
    about = "Answer questions over documents through a traceable agent pipeline"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest files (or directories) and answer a single question.
    Ask {
        #[arg(long, short)]
        query: String,
        /// Print the full run (answer, sources, envelopes) as JSON.
        #[arg(long)]
        json: bool,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Serve the HTTP API.
    Serve,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = config::init_config().context("Failed to load configuration")?;
    logging::init_tracing();
    let service = RagService::new(config).context("Failed to initialize pipeline service")?;

    match cli.command {
        Command::Ask { query, json, paths } => ask(&service, query, &paths, json).await,
        Command::Serve => serve(service).await,
    }
}

async fn ask(service: &RagService, query: String, paths: &[PathBuf], json: bool) -> Result<()> {
    if query.trim().is_empty() {
        bail!("--query must not be empty");
    }
    let files = expand_paths(paths)?;
    let outcome = service
        .run(files, query)
        .await
        .context("Pipeline run failed")?;

    if json {
        let rendered = serde_json::json!({
            "trace_id": outcome.trace_id,
            "answer": outcome.response.answer,
            "retrieved": outcome.response.retrieved,
            "messages": outcome.messages,
        });
        println!("{}", serde_json::to_string_pretty(&rendered)?);
        return Ok(());
    }

    println!("{}", outcome.response.answer);
    if !outcome.response.retrieved.is_empty() {
        println!();
        println!("Sources (trace {}):", outcome.trace_id);
        for (rank, result) in outcome.response.retrieved.iter().enumerate() {
            println!(
                "  {}. {} #{} (score {:.3})",
                rank + 1,
                result.meta.source_id,
                result.meta.chunk_index,
                result.score
            );
        }
    }
    Ok(())
}

/// Replace each directory with the regular files beneath it, in a stable order.
fn expand_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }
        let mut nested = Vec::new();
        for entry in WalkDir::new(path).follow_links(true) {
            let entry = entry.with_context(|| format!("Failed to walk {}", path.display()))?;
            if entry.file_type().is_file() {
                nested.push(entry.into_path());
            }
        }
        nested.sort();
        files.extend(nested);
    }
    Ok(files)
}

async fn serve(service: RagService) -> Result<()> {
    let config = config::get_config();
    let documents = DocumentRoot::open(&config.docs_root)
        .await
        .context("Failed to open documents root")?;
    tracing::info!(docs_root = %documents.path().display(), "Serving documents");
    let app = api::create_router(Arc::new(service), documents);
    let (listener, port) = bind_listener()
        .await
        .context("Failed to bind listener")?;
    tracing::info!("Listening on http://{}:{}", config.server_host, port);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

async fn bind_listener() -> Result<(TcpListener, u16), std::io::Error> {
    let config = config::get_config();
    let host = config.server_host;
    if let Some(port) = config.server_port {
        return TcpListener::bind((host, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 4100..=4199;
    for port in PORT_RANGE {
        match TcpListener::bind((host, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 4100-4199",
    ))
}
