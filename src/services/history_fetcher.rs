//! Paged Candle History
//!
//! Walks a `[start, end]` window one page at a time. Each page starts one
//! millisecond past the last candle's open time of the previous page, and the
//! walk stops on an empty page, a short page, or once the cursor passes the
//! window end.
//!
//! A fixed delay is slept between page requests. A rate-limit response
//! re-requests the same page after an exponential backoff with jitter: the
//! page delay doubled per attempt, capped at `MAX_BACKOFF_SECS` and never
//! shorter than the server's `Retry-After`. Once the retries run out the
//! rate-limit error is returned to the caller, and `cooldown` tells it how
//! long to hold off before its next request. Any other error aborts the walk.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::constants::MAX_BACKOFF_SECS;
use crate::error::{AppError, Result};
use crate::models::{Candle, Interval};
use crate::services::binance_client::MarketDataSource;
use crate::worker::Shutdown;

pub struct HistoryFetcher {
    source: Arc<dyn MarketDataSource>,
    interval: Interval,
    page_limit: u32,
    page_delay: Duration,
    rate_limit_retries: u32,
}

impl HistoryFetcher {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        interval: Interval,
        page_limit: u32,
        page_delay: Duration,
        rate_limit_retries: u32,
    ) -> Self {
        Self {
            source,
            interval,
            page_limit: page_limit.max(1),
            page_delay,
            rate_limit_retries,
        }
    }

    /// Every candle with `start_ms <= open_time <= end_ms`, oldest first
    ///
    /// A `start_ms` past `end_ms` returns an empty list without touching the
    /// exchange. When `shutdown` fires between pages the candles gathered so
    /// far are returned.
    pub async fn fetch_range(
        &self,
        pair_symbol: &str,
        start_ms: i64,
        end_ms: i64,
        shutdown: Option<&Shutdown>,
    ) -> Result<Vec<Candle>> {
        let mut candles = Vec::new();
        if start_ms > end_ms {
            debug!(pair = pair_symbol, start_ms, end_ms, "Nothing to fetch, cursor is past window end");
            return Ok(candles);
        }

        let mut cursor = start_ms;
        let mut pages = 0usize;

        loop {
            let page = self.fetch_page(pair_symbol, cursor, end_ms, shutdown).await?;
            pages += 1;

            let page_len = page.len();
            let last_open = page.last().map(|c| c.open_time);
            candles.extend(page);

            debug!(pair = pair_symbol, page = pages, rows = page_len, cursor, "Fetched candle page");

            let last_open = match last_open {
                Some(open_time) => open_time,
                None => break,
            };
            if page_len < self.page_limit as usize {
                break;
            }

            // Guard against a source that does not advance
            if last_open < cursor {
                warn!(pair = pair_symbol, cursor, last_open, "Page did not advance, stopping");
                break;
            }
            cursor = last_open + 1;
            if cursor > end_ms {
                break;
            }

            if let Some(shutdown) = shutdown {
                if shutdown.is_triggered() {
                    info!(pair = pair_symbol, pages, rows = candles.len(), "Shutdown requested, stopping paging");
                    break;
                }
                if !shutdown.sleep(self.page_delay).await {
                    break;
                }
            } else {
                tokio::time::sleep(self.page_delay).await;
            }
        }

        Ok(candles)
    }

    /// Pause owed to the exchange after `err`, if it is a rate limit
    ///
    /// Continues the backoff sequence one step past the last retry.
    pub fn cooldown(&self, err: &AppError) -> Option<Duration> {
        match err {
            AppError::RateLimit { retry_after } => Some(backoff_delay(
                self.page_delay,
                self.rate_limit_retries + 1,
                *retry_after,
            )),
            _ => None,
        }
    }

    async fn fetch_page(
        &self,
        pair_symbol: &str,
        cursor: i64,
        end_ms: i64,
        shutdown: Option<&Shutdown>,
    ) -> Result<Vec<Candle>> {
        let mut attempt = 0u32;

        loop {
            match self
                .source
                .fetch_candles(pair_symbol, self.interval, cursor, end_ms, self.page_limit)
                .await
            {
                Ok(page) => return Ok(page),
                Err(AppError::RateLimit { retry_after }) if attempt < self.rate_limit_retries => {
                    attempt += 1;
                    let delay = backoff_delay(self.page_delay, attempt, retry_after);
                    warn!(
                        pair = pair_symbol,
                        attempt,
                        max_retries = self.rate_limit_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited, backing off before retrying page"
                    );

                    let completed = match shutdown {
                        Some(shutdown) => shutdown.sleep(delay).await,
                        None => {
                            tokio::time::sleep(delay).await;
                            true
                        }
                    };
                    if !completed {
                        return Err(AppError::RateLimit { retry_after });
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Exponential backoff for the `attempt`-th rate-limit retry (1-based)
///
/// `base * 2^(attempt-1)` plus up to 25% jitter, capped at `MAX_BACKOFF_SECS`
/// and raised to `retry_after` when the server asked for longer.
pub(crate) fn backoff_delay(base: Duration, attempt: u32, retry_after: Option<Duration>) -> Duration {
    let cap = Duration::from_secs(MAX_BACKOFF_SECS);
    let base_ms = base.as_millis().min(cap.as_millis()) as u64;
    let scaled_ms = base_ms.saturating_mul(1u64 << attempt.saturating_sub(1).min(16));
    let jitter_ms = rand::thread_rng().gen_range(0..=scaled_ms / 4);
    let delay = Duration::from_millis(scaled_ms.saturating_add(jitter_ms)).min(cap);

    match retry_after {
        Some(server_delay) => delay.max(server_delay.min(cap)),
        None => delay,
    }
}
