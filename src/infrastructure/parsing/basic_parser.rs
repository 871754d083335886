use async_trait::async_trait;

use crate::application::ports::{ParseError, StatementParser};
use crate::domain::TableData;

/// Local fallback structuring: a line-oriented heuristic that needs no
/// network. A line is treated as a transaction when it starts with a
/// date-like token and ends with an amount-like token; everything between
/// becomes the description. When nothing on the page looks transactional the
/// raw lines are returned under a single column, so the pipeline still
/// produces a deterministic artifact.
#[derive(Default)]
pub struct BasicStatementParser;

impl BasicStatementParser {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StatementParser for BasicStatementParser {
    async fn parse(&self, text: &str) -> Result<TableData, ParseError> {
        let mut rows = Vec::new();

        for line in text.lines() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 3 {
                continue;
            }

            let (first, last) = (tokens[0], tokens[tokens.len() - 1]);
            if !is_date_like(first) {
                continue;
            }
            let Some(amount) = parse_amount_token(last) else {
                continue;
            };

            let description = tokens[1..tokens.len() - 1].join(" ");
            rows.push(vec![
                normalize_date(first),
                description,
                format_amount(amount),
            ]);
        }

        if rows.is_empty() {
            let lines: Vec<Vec<String>> = text
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(|l| vec![l.trim().to_string()])
                .collect();
            if lines.is_empty() {
                return Err(ParseError::NoData);
            }
            tracing::debug!(
                lines = lines.len(),
                "No transaction-shaped lines, falling back to raw content"
            );
            return Ok(TableData::new(vec!["Content".to_string()], lines));
        }

        tracing::debug!(rows = rows.len(), "Parsed transactions from statement text");
        Ok(TableData::new(
            vec![
                "Date".to_string(),
                "Description".to_string(),
                "Amount".to_string(),
            ],
            rows,
        ))
    }
}

/// Accepts `2024-05-01`, `2024.05.01`, `2024/05/01`, and day-first forms like
/// `01/05/2024`: digit groups joined by a single separator class.
fn is_date_like(token: &str) -> bool {
    let mut separator = None;
    let mut groups = 0;
    let mut digits_in_group = 0;

    for ch in token.chars() {
        if ch.is_ascii_digit() {
            digits_in_group += 1;
        } else if matches!(ch, '-' | '.' | '/') {
            if digits_in_group == 0 || separator.is_some_and(|s| s != ch) {
                return false;
            }
            separator = Some(ch);
            groups += 1;
            digits_in_group = 0;
        } else {
            return false;
        }
    }

    groups == 2 && digits_in_group > 0
}

fn normalize_date(token: &str) -> String {
    token.replace(['.', '/'], "-")
}

/// Parses `-5,800`, `(5,800)`, `₩5800`, `$1,234.56` and plain numbers.
fn parse_amount_token(token: &str) -> Option<f64> {
    let mut cleaned = token
        .trim_start_matches(['₩', '$', '€', '£'])
        .replace(',', "");

    let mut negative = false;
    if cleaned.starts_with('(') && cleaned.ends_with(')') {
        negative = true;
        cleaned = cleaned[1..cleaned.len() - 1].to_string();
    }
    if let Some(stripped) = cleaned.strip_prefix('-') {
        negative = true;
        cleaned = stripped.to_string();
    } else if let Some(stripped) = cleaned.strip_prefix('+') {
        cleaned = stripped.to_string();
    }

    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }

    cleaned
        .parse::<f64>()
        .ok()
        .map(|v| if negative { -v } else { v })
}

fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{}", amount as i64)
    } else {
        format!("{:.2}", amount)
    }
}
