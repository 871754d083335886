use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;

use ledgerlift::application::ports::{ParseError, StatementParser};
use ledgerlift::infrastructure::parsing::{
    BasicStatementParser, ClaudeStatementParser, INITIAL_BACKOFF, backoff_delay,
    extract_table_from_content, normalize_amount,
};

#[tokio::test]
async fn given_transaction_lines_when_parsing_then_rows_are_structured() {
    let parser = BasicStatementParser::new();
    let text = "ACME BANK STATEMENT\n\
                2024-05-01 Coffee shop -5800\n\
                2024.05.02 Salary deposit 100000\n\
                01/05/2024 Grocery store (12,500)\n";

    let table = parser.parse(text).await.unwrap();

    assert_eq!(table.headers, vec!["Date", "Description", "Amount"]);
    assert_eq!(table.rows.len(), 3);
    assert_eq!(table.rows[0], vec!["2024-05-01", "Coffee shop", "-5800"]);
    assert_eq!(table.rows[1], vec!["2024-05-02", "Salary deposit", "100000"]);
    assert_eq!(table.rows[2], vec!["01-05-2024", "Grocery store", "-12500"]);
}

#[tokio::test]
async fn given_prose_only_text_when_parsing_then_falls_back_to_raw_lines() {
    let parser = BasicStatementParser::new();
    let table = parser.parse("Dear customer\nYour balance is fine\n").await.unwrap();

    assert_eq!(table.headers, vec!["Content"]);
    assert_eq!(table.rows.len(), 2);
}

#[tokio::test]
async fn given_empty_text_when_parsing_then_no_data() {
    let parser = BasicStatementParser::new();
    let result = parser.parse("").await;
    assert!(matches!(result, Err(ParseError::NoData)));
}

#[test]
fn given_fenced_json_when_extracting_then_table_is_built() {
    let content = "Here you go:\n```json\n[\n  {\"Date\": \"2024-05-01\", \"Description\": \"Coffee\", \"Amount\": -5800}\n]\n```";
    let table = extract_table_from_content(content).unwrap();
    assert_eq!(table.rows, vec![vec!["2024-05-01", "Coffee", "-5800"]]);
}

#[test]
fn given_bare_array_when_extracting_then_table_is_built() {
    let content = r#"[{"Date": "2024-05-02", "Description": "Salary", "Amount": 100000}]"#;
    let table = extract_table_from_content(content).unwrap();
    assert_eq!(table.rows.len(), 1);
    assert_eq!(table.headers, vec!["Date", "Description", "Amount"]);
}

#[test]
fn given_prose_without_array_when_extracting_then_malformed() {
    let result = extract_table_from_content("I could not find any transactions.");
    assert!(matches!(result, Err(ParseError::MalformedResponse(_))));
}

#[test]
fn given_empty_array_when_extracting_then_no_data() {
    assert!(matches!(
        extract_table_from_content("[]"),
        Err(ParseError::NoData)
    ));
}

#[test]
fn given_currency_notation_when_normalizing_then_plain_numbers_come_back() {
    assert_eq!(normalize_amount(&serde_json::json!(-5800)), "-5800");
    assert_eq!(normalize_amount(&serde_json::json!("₩100,000")), "100000");
    assert_eq!(normalize_amount(&serde_json::json!("(5,000)")), "-5000");
    assert_eq!(normalize_amount(&serde_json::json!("$12.50")), "12.5");
    assert_eq!(normalize_amount(&serde_json::json!("garbage")), "0");
}

#[test]
fn given_no_retry_after_when_backing_off_then_delay_doubles() {
    assert_eq!(backoff_delay(0, None), INITIAL_BACKOFF);
    assert_eq!(backoff_delay(1, None), INITIAL_BACKOFF * 2);
    assert_eq!(backoff_delay(2, None), INITIAL_BACKOFF * 4);
}

#[test]
fn given_server_retry_after_when_backing_off_then_it_wins() {
    assert_eq!(
        backoff_delay(0, Some(Duration::from_secs(7))),
        Duration::from_secs(7)
    );
}

#[derive(Clone)]
struct FlakyApi {
    calls: Arc<AtomicUsize>,
    failures: usize,
}

async fn flaky_messages(State(api): State<FlakyApi>) -> impl IntoResponse {
    let call = api.calls.fetch_add(1, Ordering::SeqCst);
    if call < api.failures {
        return (StatusCode::TOO_MANY_REQUESTS, [("retry-after", "1")], "slow down")
            .into_response();
    }
    let body = serde_json::json!({
        "content": [{
            "type": "text",
            "text": "[{\"Date\": \"2024-05-01\", \"Description\": \"Coffee\", \"Amount\": -5800}]"
        }]
    });
    axum::Json(body).into_response()
}

async fn spawn_flaky_api(failures: usize) -> (SocketAddr, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let api = FlakyApi {
        calls: Arc::clone(&calls),
        failures,
    };
    let router = Router::new()
        .route("/v1/messages", post(flaky_messages))
        .with_state(api);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (addr, calls)
}

#[tokio::test]
async fn given_two_rate_limits_then_third_attempt_succeeds_after_honouring_delays() {
    let (addr, calls) = spawn_flaky_api(2).await;
    let parser = ClaudeStatementParser::with_endpoint(
        format!("http://{addr}/v1/messages"),
        "test-key".to_string(),
        "claude-3-haiku-20240307".to_string(),
    );

    let started = Instant::now();
    let table = parser.parse("statement text").await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(table.rows.len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // Two rate-limited attempts, each honouring retry-after: 1.
    assert!(elapsed >= Duration::from_secs(2), "retry delays were skipped");
}

#[tokio::test]
async fn given_persistent_rate_limiting_then_retry_budget_is_exhausted() {
    let (addr, calls) = spawn_flaky_api(usize::MAX).await;
    let parser = ClaudeStatementParser::with_endpoint(
        format!("http://{addr}/v1/messages"),
        "test-key".to_string(),
        "claude-3-haiku-20240307".to_string(),
    );

    let result = parser.parse("statement text").await;

    assert!(matches!(result, Err(ParseError::RateLimited)));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn given_unauthorized_response_then_no_retries_happen() {
    async fn unauthorized() -> impl IntoResponse {
        (StatusCode::UNAUTHORIZED, "bad key")
    }
    let router = Router::new().route("/v1/messages", post(unauthorized));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let parser = ClaudeStatementParser::with_endpoint(
        format!("http://{addr}/v1/messages"),
        "test-key".to_string(),
        "claude-3-haiku-20240307".to_string(),
    );

    let started = Instant::now();
    let result = parser.parse("statement text").await;

    assert!(matches!(result, Err(ParseError::Unauthorized(_))));
    assert!(started.elapsed() < Duration::from_secs(1), "auth failure must not retry");
}
