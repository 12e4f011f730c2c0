use std::future::Future;
use std::time::Duration;

/// Number of attempts made for a remote query before giving up
pub const RPC_MAX_ATTEMPTS: u32 = 5;

/// Fixed delay between two attempts of a remote query
pub const RPC_RETRY_INTERVAL: Duration = Duration::from_millis(400);

/// RetryPolicy retries a fallible async operation a fixed number of times with
/// a fixed delay in between. With `last_error_only` set, the errors of earlier
/// attempts are dropped and only the last one is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
    pub last_error_only: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: RPC_MAX_ATTEMPTS,
            delay: RPC_RETRY_INTERVAL,
            last_error_only: true,
        }
    }
}

/// RetryError is returned once every attempt failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryError<E> {
    pub last: E,
    /// Errors of the previous attempts, oldest first. Always empty when the
    /// policy reports the last error only.
    pub earlier: Vec<E>,
}

impl<E> RetryError<E> {
    pub fn into_last(self) -> E {
        self.last
    }
}

impl RetryPolicy {
    /// retry runs `op` until it succeeds or the attempts are exhausted.
    /// `on_retry` sees every failure together with its 1-based attempt number.
    pub async fn retry<T, E, F, Fut, H>(&self, mut op: F, mut on_retry: H) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        H: FnMut(u32, &E),
    {
        let attempts = self.attempts.max(1);
        let mut earlier = vec![];
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    on_retry(attempt, &err);
                    if attempt >= attempts {
                        return Err(RetryError { last: err, earlier });
                    }
                    if !self.last_error_only {
                        earlier.push(err);
                    }
                }
            }
            tokio::time::sleep(self.delay).await;
            attempt += 1;
        }
    }
}
