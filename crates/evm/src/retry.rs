// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use std::future::Future;
use tokio::time::{sleep, Duration};
use tracing::info;

const RETRY_MAX_ATTEMPTS: u32 = 3;
const RETRY_INITIAL_DELAY_MS: u64 = 2000;

fn should_retry_error(error: &str, retry_on_errors: &[&str]) -> bool {
    if retry_on_errors.is_empty() {
        return true;
    }
    retry_on_errors.iter().any(|code| error.contains(code))
}

/// Retries a read with exponential backoff. An empty `retry_on_errors` list
/// retries every error; otherwise only errors containing one of the given
/// fragments are retried.
pub async fn call_with_retry<F, Fut, T>(
    operation_name: &str,
    retry_on_errors: &[&str],
    read_fn: F,
) -> eyre::Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = eyre::Result<T>>,
{
    let mut attempts = 0;
    let mut delay = RETRY_INITIAL_DELAY_MS;

    loop {
        attempts += 1;
        let result = read_fn().await;

        match result {
            Ok(value) => return Ok(value),
            Err(e) => {
                let error_str = format!("{}", e);

                if should_retry_error(&error_str, retry_on_errors) && attempts < RETRY_MAX_ATTEMPTS
                {
                    info!(
                        "{}: error (attempt {}/{}), will retry after {}ms: {}",
                        operation_name, attempts, RETRY_MAX_ATTEMPTS, delay, e
                    );
                    sleep(Duration::from_millis(delay)).await;
                    delay *= 2;
                } else {
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn retries_until_the_read_succeeds() {
        let attempts = AtomicU32::new(0);
        let value = call_with_retry("flaky_read", &[], || async {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                eyre::bail!("connection reset");
            }
            Ok(7u64)
        })
        .await
        .unwrap();

        assert_eq!(value, 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_matching_errors_fail_fast() {
        let attempts = AtomicU32::new(0);
        let result: eyre::Result<u64> = call_with_retry("guarded_read", &["-32005"], || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            eyre::bail!("execution reverted")
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
