use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::application::ports::{ParseError, StatementParser};
use crate::domain::TableData;

pub const MAX_ATTEMPTS: u32 = 3;
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4000;

/// Remote structuring through the Anthropic messages API: the statement text
/// goes out with a strict JSON-only prompt, the reply comes back as a
/// transaction array.
///
/// Retry policy: up to three attempts per call. Rate limiting honours the
/// server's `retry-after` when present, otherwise exponential backoff from
/// 1 s; transient 5xx and timeouts back off the same way; authentication
/// failures and malformed response bodies fail immediately.
pub struct ClaudeStatementParser {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ClaudeStatementParser {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT.to_string(), api_key, model)
    }

    pub fn with_endpoint(endpoint: String, api_key: String, model: String) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client build never fails with valid TLS config");
        Self {
            client,
            endpoint,
            api_key,
            model,
        }
    }

    async fn request_once(&self, prompt: &str) -> Result<TableData, AttemptError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AttemptError::Transient(Transient::Retryable("request timed out".to_string()))
                } else {
                    AttemptError::Transient(Transient::Retryable(format!("request failed: {e}")))
                }
            })?;

        let status = response.status();
        match status {
            StatusCode::OK => {
                let parsed: MessagesResponse = response.json().await.map_err(|e| {
                    AttemptError::Fatal(ParseError::MalformedResponse(format!(
                        "response body did not parse: {e}"
                    )))
                })?;
                let content = parsed
                    .content
                    .first()
                    .map(|block| block.text.as_str())
                    .ok_or_else(|| {
                        AttemptError::Fatal(ParseError::MalformedResponse(
                            "response carried no content blocks".to_string(),
                        ))
                    })?;
                extract_table_from_content(content).map_err(AttemptError::Fatal)
            }
            StatusCode::UNAUTHORIZED => Err(AttemptError::Fatal(ParseError::Unauthorized(
                "model API rejected the configured key".to_string(),
            ))),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(Duration::from_secs);
                Err(AttemptError::Transient(Transient::RateLimited(retry_after)))
            }
            s if s.is_server_error() => {
                let text = response.text().await.unwrap_or_default();
                Err(AttemptError::Transient(Transient::Retryable(format!(
                    "server error {s}: {text}"
                ))))
            }
            s => {
                let text = response.text().await.unwrap_or_default();
                Err(AttemptError::Fatal(ParseError::ParsingFailed(format!(
                    "model API returned {s}: {text}"
                ))))
            }
        }
    }
}

#[async_trait]
impl StatementParser for ClaudeStatementParser {
    #[tracing::instrument(skip(self, text), fields(chars = text.len()))]
    async fn parse(&self, text: &str) -> Result<TableData, ParseError> {
        let prompt = build_parsing_prompt(text);

        let mut attempt = 0;
        loop {
            match self.request_once(&prompt).await {
                Ok(table) => {
                    tracing::info!(rows = table.rows.len(), "Model structuring succeeded");
                    return Ok(table);
                }
                Err(AttemptError::Fatal(e)) => return Err(e),
                Err(AttemptError::Transient(transient)) => {
                    let (reason, retry_after) = match &transient {
                        Transient::RateLimited(retry_after) => {
                            ("rate limited".to_string(), *retry_after)
                        }
                        Transient::Retryable(msg) => (msg.clone(), None),
                    };
                    if attempt + 1 >= MAX_ATTEMPTS {
                        tracing::error!(reason = %reason, "Model call exhausted its retry budget");
                        return Err(match transient {
                            Transient::RateLimited(_) => ParseError::RateLimited,
                            Transient::Retryable(msg) => ParseError::ParsingFailed(format!(
                                "retries exhausted: {msg}"
                            )),
                        });
                    }
                    let delay = backoff_delay(attempt, retry_after);
                    tracing::warn!(
                        reason = %reason,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Transient model failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

enum AttemptError {
    /// Worth retrying with a delay.
    Transient(Transient),
    Fatal(ParseError),
}

enum Transient {
    /// HTTP 429; carries the server-provided `retry-after` when present.
    RateLimited(Option<Duration>),
    /// Transient server error or timeout.
    Retryable(String),
}

/// A server-provided `retry-after` wins; otherwise exponential backoff from
/// the initial delay (1 s, 2 s, 4 s, ...).
pub fn backoff_delay(attempt: u32, retry_after: Option<Duration>) -> Duration {
    retry_after.unwrap_or_else(|| INITIAL_BACKOFF * 2u32.pow(attempt))
}

fn build_parsing_prompt(text: &str) -> String {
    format!(
        "The following text was extracted from a bank statement. Extract every \
transaction into a JSON array.\n\nText:\n{text}\n\nRequirements:\n\
1. Each transaction becomes an object with Date, Description and Amount fields\n\
2. Normalize Date to YYYY-MM-DD\n\
3. Description carries only the counterparty or purpose\n\
4. Amount is a plain number: currency symbols and thousands separators removed, \
debits negative, credits positive\n\nOutput format (JSON array):\n\
[\n  {{\"Date\": \"2024-05-01\", \"Description\": \"Coffee shop\", \"Amount\": -5800}},\n  \
{{\"Date\": \"2024-05-02\", \"Description\": \"Salary\", \"Amount\": 100000}}\n]\n\n\
Important: respond with the JSON array only, no surrounding prose."
    )
}

/// Pulls the transaction array out of a model reply (tolerating ```json
/// fences and surrounding prose) and shapes it into table rows.
pub fn extract_table_from_content(content: &str) -> Result<TableData, ParseError> {
    let content = content.trim();

    let json_str = if let Some(start) = content.find("```json") {
        let rest = &content[start + 7..];
        let end = rest.find("```").ok_or_else(|| {
            ParseError::MalformedResponse("unterminated code fence".to_string())
        })?;
        rest[..end].trim()
    } else {
        let start = content.find('[');
        let end = content.rfind(']');
        match (start, end) {
            (Some(s), Some(e)) if e > s => &content[s..=e],
            _ => {
                return Err(ParseError::MalformedResponse(
                    "no JSON array found in response".to_string(),
                ));
            }
        }
    };

    let items: Vec<serde_json::Value> = serde_json::from_str(json_str)
        .map_err(|e| ParseError::MalformedResponse(format!("invalid JSON array: {e}")))?;

    let mut rows = Vec::new();
    for item in items {
        let Some(obj) = item.as_object() else {
            continue;
        };
        let (Some(date), Some(description)) = (obj.get("Date"), obj.get("Description")) else {
            continue;
        };
        let Some(amount) = obj.get("Amount") else {
            continue;
        };
        rows.push(vec![
            value_to_text(date),
            value_to_text(description),
            normalize_amount(amount),
        ]);
    }

    if rows.is_empty() {
        return Err(ParseError::NoData);
    }

    Ok(TableData::new(
        vec![
            "Date".to_string(),
            "Description".to_string(),
            "Amount".to_string(),
        ],
        rows,
    ))
}

fn value_to_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Models occasionally echo currency notation back despite the prompt;
/// strip symbols and separators, handle parenthesised negatives.
pub fn normalize_amount(value: &serde_json::Value) -> String {
    if let Some(n) = value.as_f64() {
        return if n.fract() == 0.0 {
            format!("{}", n as i64)
        } else {
            format!("{n}")
        };
    }

    let Some(raw) = value.as_str() else {
        return "0".to_string();
    };

    let mut cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '₩' | '$' | '€' | '£' | ',' | ' ') && *c != '원')
        .collect();

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

    match cleaned.parse::<f64>() {
        Ok(n) => {
            let n = if negative { -n } else { n };
            if n.fract() == 0.0 {
                format!("{}", n as i64)
            } else {
                format!("{n}")
            }
        }
        Err(_) => {
            tracing::warn!(raw, "Could not normalize amount");
            "0".to_string()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(default)]
    pub text: String,
}
