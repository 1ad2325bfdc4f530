//! Timeout and bounded retry around individual store calls.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};

use crate::ports::{StoreError, StoreResult};

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy)]
pub struct StorePolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_STORE_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl StorePolicy {
    pub fn new(timeout: Duration, max_retries: u32, backoff: Duration) -> Self {
        Self {
            timeout,
            max_retries,
            backoff,
        }
    }

    /// Runs `call` with a per-attempt timeout. Transient failures are retried
    /// with doubling backoff; unique violations and other errors return at once.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut call: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let mut attempt: u32 = 0;

        loop {
            let result = match timeout(self.timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::Timeout(self.timeout)),
            };

            match result {
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let backoff = self.backoff.saturating_mul(2u32.saturating_pow(attempt));
                    attempt += 1;
                    tracing::warn!(
                        operation,
                        attempt,
                        error = %e,
                        "Store call failed. Retrying in {:?}",
                        backoff
                    );
                    sleep(backoff).await;
                }
                other => return other,
            }
        }
    }
}
