mod basic_parser;
mod claude_client;

pub use basic_parser::BasicStatementParser;
pub use claude_client::{
    backoff_delay, extract_table_from_content, normalize_amount, ClaudeStatementParser,
    ContentBlock, MessagesResponse, INITIAL_BACKOFF, MAX_ATTEMPTS,
};
