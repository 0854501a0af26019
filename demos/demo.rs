use axum::{
    body::{Body, Bytes},
    extract::Request,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use futures::stream;
use http_body_util::BodyExt;
use std::time::Duration;
use tokio::time::sleep;
use tower::{ServiceBuilder, ServiceExt};
use tracing::{info, Level};
use wiretap::ExchangeLoggerLayer;

// Handlers standing in for the external system we are calling.

async fn latest_rates_handler() -> impl IntoResponse {
    sleep(Duration::from_millis(120)).await; // simulate network latency
    r#"{"result":"success","base_code":"USD","rates":{"EUR":0.92,"GBP":0.79}}"#
}

async fn charge_handler(body: Bytes) -> impl IntoResponse {
    sleep(Duration::from_millis(40)).await;
    format!("accepted {} bytes", body.len())
}

async fn large_handler() -> impl IntoResponse {
    // Larger than the capture cap; the log shows a truncated prefix while the
    // caller receives everything.
    "x".repeat(10_000)
}

async fn flaky_handler() -> impl IntoResponse {
    let chunks = stream::iter(vec![
        Ok::<_, std::io::Error>(Bytes::from("the first half of the payload ")),
        Err(std::io::Error::other("connection reset by peer")),
    ]);
    Response::builder()
        .header("content-type", "text/plain")
        .body(Body::from_stream(chunks))
        .unwrap()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .init();

    info!("wiretap demo: each call below produces a pair of debug log events");

    let external_system = Router::new()
        .route("/v6/latest", get(latest_rates_handler))
        .route("/charge", post(charge_handler))
        .route("/large", get(large_handler))
        .route("/flaky", get(flaky_handler));

    let client = ServiceBuilder::new()
        .layer(ExchangeLoggerLayer::new("exchange-rate-api"))
        .service(external_system);

    // A plain GET: both body snapshots fit under the cap.
    let response = client
        .clone()
        .oneshot(Request::builder().uri("/v6/latest").body(Body::empty())?)
        .await?;
    let body = response.into_body().collect().await?.to_bytes();
    info!(received = body.len(), "GET /v6/latest done");

    // A POST with a large request body: the request log shows only the first
    // 4096 bytes, the handler still receives all 8192.
    let response = client
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/charge")
                .body(Body::from("y".repeat(8192)))?,
        )
        .await?;
    let body = response.into_body().collect().await?.to_bytes();
    info!(reply = %String::from_utf8_lossy(&body), "POST /charge done");

    // A large response: truncated in the log, complete on the wire.
    let response = client
        .clone()
        .oneshot(Request::builder().uri("/large").body(Body::empty())?)
        .await?;
    let body = response.into_body().collect().await?.to_bytes();
    info!(received = body.len(), "GET /large done");

    // A response stream that dies mid-body: the error event carries the
    // partial capture, and the caller sees the original error.
    let response = client
        .clone()
        .oneshot(Request::builder().uri("/flaky").body(Body::empty())?)
        .await?;
    match response.into_body().collect().await {
        Ok(_) => info!("GET /flaky unexpectedly succeeded"),
        Err(error) => info!(%error, "GET /flaky failed as expected"),
    }

    Ok(())
}
