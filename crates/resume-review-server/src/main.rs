use anyhow::{Context, Result};
use resume_review_server::{
    build_router,
    config::Settings,
    document::TextChunker,
    index::{DocumentIndex, LocalVectorIndex},
    services::{EmbeddingService, LlmService, ReviewService},
    session::SessionManager,
    utils::logger,
    AppState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load().context("Failed to load configuration")?;

    let _log_guard = logger::init_logger(settings.logging.directory.as_deref())?;

    info!("🚀 Starting Resume Review Server...");

    // Upstream clients
    let embedding_service = Arc::new(EmbeddingService::new(&settings.embedding)?);
    let llm_service = Arc::new(LlmService::new(settings.llm.clone())?);

    let chunker = TextChunker::new(settings.rag.chunk_size, settings.rag.chunk_overlap)?;
    let index: Arc<dyn DocumentIndex> = Arc::new(LocalVectorIndex::new(
        settings.rag.index_dir.clone(),
        embedding_service,
        chunker,
    ));

    let review_service = Arc::new(ReviewService::new(
        index.clone(),
        llm_service,
        settings.prompts.review_prompt.clone(),
        settings.rag.retrieval_top_k,
    ));

    let sessions = SessionManager::load(&settings.session, Some(index.clone())).await;
    info!(
        "✅ Session store ready ({} sessions, {:?} inactivity window)",
        sessions.len().await,
        sessions.timeout()
    );

    let state = AppState {
        sessions: sessions.clone(),
        index,
        review_service,
    };
    let app = build_router(state, settings.server.max_body_bytes);

    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));
    info!("🎯 Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sessions.shutdown().await;
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT, shutting down"),
                }
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                info!("Received SIGINT, shutting down");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received shutdown signal");
    }
}
