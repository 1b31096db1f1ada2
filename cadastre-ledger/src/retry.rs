use cadastre_core::error::LedgerError;
use log::warn;
use std::time::Duration;

/// Default number of attempts before giving up
pub const MAX_ATTEMPTS: u32 = 3;

/// Retry policy for transient ledger failures.
///
/// The policy only ever repeats operations that are safe to repeat:
/// read-only queries, and submissions the transport provably never
/// delivered (`LedgerError::Unavailable`). Validation rejections are
/// definite outcomes and are returned on the first attempt. A mutation
/// whose commit status is unknown must not be run under this policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts before the last error is returned
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on each subsequent one
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Run an operation, retrying transient failures with exponential
    /// backoff.
    ///
    /// # Parameters
    /// * `op_name` - Name of the operation, for log lines
    /// * `f` - The operation to run
    ///
    /// # Returns
    /// The first success, or the error of the final attempt
    pub fn run<T, F>(&self, op_name: &str, mut f: F) -> Result<T, LedgerError>
    where
        F: FnMut() -> Result<T, LedgerError>,
    {
        let mut attempt = 0;
        loop {
            match f() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt + 1 < self.max_attempts => {
                    let delay = self.base_delay * 2u32.saturating_pow(attempt);
                    warn!(
                        "{} attempt {} failed: {}; retrying in {:?}",
                        op_name,
                        attempt + 1,
                        err,
                        delay
                    );
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
