#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use ledgerlift::application::ports::{
    ArtifactStore, ExtractError, ParseError, RenderError, SpreadsheetRenderer, StatementParser,
    TextExtractor,
};
use ledgerlift::application::services::{
    ConversionService, HistoryStore, JobRegistry, ProgressChannel,
};
use ledgerlift::domain::TableData;
use ledgerlift::infrastructure::parsing::BasicStatementParser;
use ledgerlift::infrastructure::storage::LocalArtifactStore;
use ledgerlift::presentation::AppState;

/// Extractor that returns a canned statement without touching a real PDF.
pub struct StubExtractor {
    pub text: String,
    pub delay: Duration,
}

impl StubExtractor {
    pub fn statement() -> Self {
        Self {
            text: "2024-05-01 Coffee shop -5800\n2024-05-02 Salary deposit 100000\n".to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            text: "2024-05-01 Coffee shop -5800\n".to_string(),
            delay,
        }
    }
}

#[async_trait]
impl TextExtractor for StubExtractor {
    async fn extract_text(&self, _data: &[u8], _filename: &str) -> Result<String, ExtractError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.text.clone())
    }
}

/// Parser that fails a configurable number of times before succeeding, for
/// exercising pipeline behaviour around flaky structuring.
pub struct CountingParser {
    pub calls: AtomicUsize,
    pub failures: usize,
}

impl CountingParser {
    pub fn new(failures: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failures,
        }
    }
}

#[async_trait]
impl StatementParser for CountingParser {
    async fn parse(&self, _text: &str) -> Result<TableData, ParseError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(ParseError::RateLimited);
        }
        Ok(TableData::new(
            vec!["Date".to_string(), "Description".to_string(), "Amount".to_string()],
            vec![vec![
                "2024-05-01".to_string(),
                "Coffee shop".to_string(),
                "-5800".to_string(),
            ]],
        ))
    }
}

pub struct FailingRenderer;

#[async_trait]
impl SpreadsheetRenderer for FailingRenderer {
    async fn render(&self, _table: &TableData) -> Result<Vec<u8>, RenderError> {
        Err(RenderError::GenerationFailed("disk full".to_string()))
    }
}

/// Renderer producing a tiny deterministic artifact.
pub struct StubRenderer;

#[async_trait]
impl SpreadsheetRenderer for StubRenderer {
    async fn render(&self, table: &TableData) -> Result<Vec<u8>, RenderError> {
        Ok(format!("rows={}", table.rows.len()).into_bytes())
    }
}

pub struct TestHarness {
    pub service: Arc<ConversionService<StubExtractor>>,
    pub registry: Arc<JobRegistry>,
    pub channel: Arc<ProgressChannel>,
    pub history: Arc<HistoryStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn state(&self) -> AppState<StubExtractor> {
        AppState {
            conversion_service: Arc::clone(&self.service),
            registry: Arc::clone(&self.registry),
            channel: Arc::clone(&self.channel),
            history: Arc::clone(&self.history),
            artifacts: Arc::clone(&self.artifacts),
        }
    }
}

/// Full service graph over a temp directory, real except for extraction.
pub fn build_harness(extractor: StubExtractor) -> TestHarness {
    let dir = tempfile::TempDir::new().unwrap();
    let artifacts: Arc<dyn ArtifactStore> =
        Arc::new(LocalArtifactStore::new(dir.path().to_path_buf()).unwrap());
    let registry = Arc::new(JobRegistry::new());
    let channel = Arc::new(ProgressChannel::new());
    let history = Arc::new(HistoryStore::new(Arc::clone(&artifacts)));

    let service = Arc::new(ConversionService::new(
        Arc::new(extractor),
        Arc::new(CountingParser::new(0)),
        Arc::new(BasicStatementParser::new()),
        Arc::new(StubRenderer),
        Arc::clone(&artifacts),
        Arc::clone(&registry),
        Arc::clone(&channel),
        Arc::clone(&history),
    ));

    TestHarness {
        service,
        registry,
        channel,
        history,
        artifacts,
        dir,
    }
}

/// Polls `predicate` until it holds or the timeout elapses.
pub async fn wait_until<F>(timeout: Duration, mut predicate: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if predicate() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Minimal bytes that pass the pipeline's signature validation.
pub fn pdf_bytes() -> Vec<u8> {
    b"%PDF-1.4\nminimal statement fixture\n%%EOF".to_vec()
}
