//! Random slowdown middleware, handy for exercising the frontend's pending states

use axum::body::Body;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::IntoResponse;
use rand_distr::{Distribution, Normal};
use std::time::Duration;

const MEAN_DELAY_MS: f64 = 1000.0;
const DELAY_STD_DEV_MS: f64 = 500.0;

fn sample_delay() -> Duration {
    match Normal::new(MEAN_DELAY_MS, DELAY_STD_DEV_MS) {
        Ok(normal) => Duration::from_millis(0.0f64.max(normal.sample(&mut rand::rng())) as u64),
        Err(_) => Duration::from_millis(MEAN_DELAY_MS as u64),
    }
}

/// Delays each request by a normally distributed amount of time.
pub async fn slowdown_request(request: Request<Body>, next: Next) -> impl IntoResponse {
    tokio::time::sleep(sample_delay()).await;
    next.run(request).await
}
