use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Structured tabular form of a statement: a header row plus data rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableData {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Denormalizes each data row into a header-keyed map for history
    /// previews. Rows shorter than the header are padded with empty cells so
    /// every preview entry carries every header.
    pub fn preview_rows(&self) -> Vec<HashMap<String, String>> {
        self.rows
            .iter()
            .map(|row| {
                self.headers
                    .iter()
                    .enumerate()
                    .map(|(i, header)| {
                        (header.clone(), row.get(i).cloned().unwrap_or_default())
                    })
                    .collect()
            })
            .collect()
    }
}
