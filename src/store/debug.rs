use std::{
    env,
    future::Future,
    sync::OnceLock,
    time::{Duration, Instant},
};

use tracing::{Instrument, Span};

const DEBUG_DELAY_ENV: &str = "MONGOMATE_DEBUG_STORE_DELAY_MS";

/// Run a store round trip inside `span`, logging how long it took.
pub async fn send_store_request<F, Fut, T, E>(span: Span, send: F) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    async move {
        debug_store_delay().await;
        let started = Instant::now();
        let result = send().await;
        let elapsed_ms = started.elapsed().as_millis();
        match &result {
            Ok(_) => tracing::trace!(elapsed_ms, "Store request finished"),
            Err(err) => tracing::debug!(elapsed_ms, error = %err, "Store request failed"),
        }
        result
    }
    .instrument(span)
    .await
}

async fn debug_store_delay() {
    if let Some(delay) = debug_store_delay_duration() {
        tracing::trace!(delay_ms = delay.as_millis(), "Applying debug store delay");
        tokio::time::sleep(delay).await;
    }
}

fn debug_store_delay_duration() -> Option<Duration> {
    static DELAY: OnceLock<Option<Duration>> = OnceLock::new();
    *DELAY.get_or_init(|| {
        let raw = env::var(DEBUG_DELAY_ENV).ok()?;
        parse_delay(&raw)
    })
}

fn parse_delay(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<u64>() {
        Ok(0) => None,
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(_) => {
            tracing::warn!(env = DEBUG_DELAY_ENV, value = %raw, "Invalid store debug delay");
            None
        }
    }
}
