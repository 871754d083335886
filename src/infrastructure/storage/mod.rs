mod local_store;
mod stale_sweeper;

pub use local_store::LocalArtifactStore;
pub use stale_sweeper::run_stale_file_sweeper;
