//! Retry an unreachable endpoint, then fall back to a mock document.
//!
//! Run with: cargo run --example retry_then_fallback

use std::fmt;
use std::time::Duration;

use weir::prelude::*;

const PRIMARY_URL: &str = "https://not-exist-url/";
const FALLBACK_URL: &str = "http://mock.local/json-1.json";

/// Stand-in for an HTTP client error.
#[derive(Debug)]
struct HttpError {
    url: &'static str,
    status: u16,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GET {} returned {}", self.url, self.status)
    }
}

impl std::error::Error for HttpError {}

async fn get_primary() -> Outcome<String> {
    tracing::debug!(url = PRIMARY_URL, "calling primary url, this will fail");
    Outcome::failure(ErrorDescriptor::transient(HttpError {
        url: PRIMARY_URL,
        status: 503,
    }))
}

async fn get_fallback() -> Outcome<String> {
    tracing::debug!(url = FALLBACK_URL, "calling fallback url");
    Outcome::success(r#"[{"id":1,"name":"mock item"}]"#.to_string())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let retry = RetryPolicy::constant(Duration::from_millis(500))
        .with_max_retries(3)
        .retry_if(|err| {
            err.downcast_ref::<HttpError>()
                .is_some_and(|http| http.status != 200)
        });
    let policy = FallbackPolicy::new(get_fallback).wrap(retry);

    let outcome = PolicyExecutor::new("retry_then_fallback")
        .execute(&policy, &get_primary, &CancellationToken::new())
        .await;

    match outcome.into_result() {
        Ok(body) => println!("{}", body),
        Err(e) => eprintln!("request failed: {}", e),
    }
}
