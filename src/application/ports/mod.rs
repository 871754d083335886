mod artifact_store;
mod spreadsheet_renderer;
mod statement_parser;
mod text_extractor;

pub use artifact_store::{ArtifactStore, ArtifactStoreError};
pub use spreadsheet_renderer::{RenderError, SpreadsheetRenderer};
pub use statement_parser::{ParseError, StatementParser};
pub use text_extractor::{ExtractError, TextExtractor};
