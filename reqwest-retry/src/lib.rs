// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::{Context, Result};
use async_trait::async_trait;
use backoff::{self, future::retry_notify, ExponentialBackoff};
use coverage_telemetry::warn;
use reqwest::{Response, StatusCode};
use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

/// What to do with a response whose status is not a success.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryCheck {
    Retry,
    Fail,
    Succeed,
}

/// Bounded exponential backoff.
///
/// `max_attempts` counts every request sent, including the first one. The
/// wait between attempts starts at `initial_interval` and is multiplied by
/// `multiplier` after each failure, never exceeding `max_interval`.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, initial_interval: Duration, max_interval: Duration) -> Self {
        Self {
            max_attempts,
            initial_interval,
            max_interval,
            multiplier: 2.0,
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_interval,
            initial_interval: self.initial_interval,
            randomization_factor: 0.0,
            multiplier: self.multiplier,
            max_interval: self.max_interval,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        }
    }

    // `attempt` is zero-based.
    fn is_last_attempt(&self, attempt: usize) -> bool {
        attempt + 1 >= self.max_attempts
    }
}

pub fn default_retry_check(_status: StatusCode) -> RetryCheck {
    RetryCheck::Retry
}

pub async fn send_retry_reqwest<F, C>(
    build_request: F,
    check_status: C,
    policy: &RetryPolicy,
) -> Result<Response>
where
    F: Fn() -> Result<reqwest::RequestBuilder> + Send + Sync,
    C: Fn(StatusCode) -> RetryCheck + Send + Sync,
{
    let counter = AtomicUsize::new(0);
    let op = || async {
        let attempt_count = counter.fetch_add(1, Ordering::SeqCst);
        let request = build_request().map_err(backoff::Error::permanent)?;
        let result = request
            .send()
            .await
            .with_context(|| format!("request attempt {} failed", attempt_count + 1));

        let response = match result {
            Ok(response) => response,
            Err(err) if policy.is_last_attempt(attempt_count) => {
                return Err(backoff::Error::permanent(err))
            }
            Err(err) => return Err(backoff::Error::transient(err)),
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let check = check_status(status);
        if check == RetryCheck::Succeed {
            return Ok(response);
        }

        let err = response
            .error_for_status()
            .map(|_| ())
            .with_context(|| format!("request attempt {} failed", attempt_count + 1))
            .err()
            .unwrap_or_else(|| {
                anyhow::format_err!(
                    "request attempt {} failed: {}",
                    attempt_count + 1,
                    status
                )
            });

        if check == RetryCheck::Fail || policy.is_last_attempt(attempt_count) {
            Err(backoff::Error::permanent(err))
        } else {
            Err(backoff::Error::transient(err))
        }
    };

    retry_notify(policy.backoff(), op, |err: anyhow::Error, dur| {
        warn!("request attempt failed, retrying after {:?}: {:?}", dur, err)
    })
    .await
}

#[async_trait]
pub trait SendRetry {
    async fn send_retry<C>(self, check_status: C, policy: &RetryPolicy) -> Result<Response>
    where
        C: Fn(StatusCode) -> RetryCheck + Send + Sync;
}

#[async_trait]
impl SendRetry for reqwest::RequestBuilder {
    async fn send_retry<C>(self, check_status: C, policy: &RetryPolicy) -> Result<Response>
    where
        C: Fn(StatusCode) -> RetryCheck + Send + Sync,
    {
        let result = send_retry_reqwest(
            || {
                self.try_clone().ok_or_else(|| {
                    anyhow::Error::msg("This request cannot be retried because it cannot be cloned")
                })
            },
            check_status,
            policy,
        )
        .await?;

        Ok(result)
    }
}
