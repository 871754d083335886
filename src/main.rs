use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use ledgerlift::application::ports::ArtifactStore;
use ledgerlift::application::services::{
    ConversionService, HistoryStore, JobRegistry, ProgressChannel,
};
use ledgerlift::infrastructure::extraction::PdfTextExtractor;
use ledgerlift::infrastructure::observability::{TracingConfig, init_tracing};
use ledgerlift::infrastructure::parsing::{BasicStatementParser, ClaudeStatementParser};
use ledgerlift::infrastructure::spreadsheet::XlsxRenderer;
use ledgerlift::infrastructure::storage::{LocalArtifactStore, run_stale_file_sweeper};
use ledgerlift::presentation::{AppState, Settings, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env();

    init_tracing(TracingConfig::default(), settings.server.port);

    let artifacts: Arc<dyn ArtifactStore> =
        Arc::new(LocalArtifactStore::new(settings.storage.base_dir.clone())?);

    let registry = Arc::new(JobRegistry::new());
    let channel = Arc::new(ProgressChannel::new());
    let history = Arc::new(HistoryStore::new(Arc::clone(&artifacts)));

    let extractor = Arc::new(PdfTextExtractor::new());
    let ai_parser = Arc::new(ClaudeStatementParser::new(
        settings.model.api_key.clone(),
        settings.model.model.clone(),
    ));
    let basic_parser = Arc::new(BasicStatementParser::new());
    let renderer = Arc::new(XlsxRenderer::new());

    let conversion_service = Arc::new(ConversionService::new(
        extractor,
        ai_parser,
        basic_parser,
        renderer,
        Arc::clone(&artifacts),
        Arc::clone(&registry),
        Arc::clone(&channel),
        Arc::clone(&history),
    ));

    // Background sweepers run for the process lifetime.
    tokio::spawn(Arc::clone(&history).run_sweeper(settings.sweep.history_interval));
    tokio::spawn(run_stale_file_sweeper(
        Arc::clone(&artifacts),
        settings.sweep.staging_interval,
    ));

    let state = AppState {
        conversion_service,
        registry,
        channel,
        history,
        artifacts,
    };

    let router = create_router(state);

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
