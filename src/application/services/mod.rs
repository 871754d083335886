mod conversion_service;
mod history_store;
mod job_registry;
mod progress_channel;

pub use conversion_service::{ConversionError, ConversionService, SubmitError, MAX_UPLOAD_BYTES};
pub use history_store::{HistoryStore, HistoryUpdate};
pub use job_registry::{JobRegistry, TaskError};
pub use progress_channel::{ProgressChannel, SubscriberId};
