use std::sync::Arc;

use crate::application::ports::{ArtifactStore, TextExtractor};
use crate::application::services::{ConversionService, HistoryStore, JobRegistry, ProgressChannel};

pub struct AppState<X>
where
    X: TextExtractor,
{
    pub conversion_service: Arc<ConversionService<X>>,
    pub registry: Arc<JobRegistry>,
    pub channel: Arc<ProgressChannel>,
    pub history: Arc<HistoryStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
}

impl<X> Clone for AppState<X>
where
    X: TextExtractor,
{
    fn clone(&self) -> Self {
        Self {
            conversion_service: Arc::clone(&self.conversion_service),
            registry: Arc::clone(&self.registry),
            channel: Arc::clone(&self.channel),
            history: Arc::clone(&self.history),
            artifacts: Arc::clone(&self.artifacts),
        }
    }
}
