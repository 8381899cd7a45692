//! Fixed-interval retry for flaky network calls.
//!
//! Despite the pipeline's historical "retry with backoff" name, the delay is
//! constant between attempts: a run with `max_attempts = 3` and
//! `delay = 5s` sleeps 5s, then 5s, then gives up. There is no exponential
//! growth and no jitter.
//!
//! Every error is retried the same way. The wrapped operation is re-invoked
//! with the same inputs, so it must be safe to call repeatedly.

use std::fmt::Display;
use std::thread;
use std::time::Duration;

use crate::logging::{DataSource, Reporter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` below 1 is treated as 1.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `op` until it succeeds or `max_attempts` is reached, sleeping the
    /// calling thread between attempts.
    ///
    /// On exhaustion the error from the last attempt is returned unchanged.
    pub fn run<T, E, F>(&self, operation: &str, reporter: &dyn Reporter, op: F) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Result<T, E>,
    {
        self.run_with_sleep(operation, reporter, thread::sleep, op)
    }

    /// Same as [`run`](Self::run) with the sleep supplied by the caller.
    pub fn run_with_sleep<T, E, F, S>(
        &self,
        operation: &str,
        reporter: &dyn Reporter,
        mut sleep: S,
        mut op: F,
    ) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Result<T, E>,
        S: FnMut(Duration),
    {
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) => {
                    reporter.warn(
                        DataSource::System,
                        Some(operation),
                        &format!(
                            "Attempt {}/{} failed for '{}': {}",
                            attempt, self.max_attempts, operation, e
                        ),
                    );
                    if attempt >= self.max_attempts {
                        reporter.error(
                            DataSource::System,
                            Some(operation),
                            &format!("All {} attempts failed for '{}'", self.max_attempts, operation),
                        );
                        return Err(e);
                    }
                    sleep(self.delay);
                    attempt += 1;
                }
            }
        }
    }
}
