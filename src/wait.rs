//! Interval polling with an optional deadline
//!
//! Read-back waits (armable, mode, armed) are plain futures: a caller that
//! wants to abort drops the future, e.g. from a `tokio::select!` branch.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, timeout, MissedTickBehavior};

/// How long and how often to poll a condition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaitPolicy {
    /// Give up after this long; `None` waits forever
    pub timeout: Option<Duration>,
    pub interval: Duration,
}

impl WaitPolicy {
    pub const fn bounded(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            interval,
        }
    }

    pub const fn unbounded(interval: Duration) -> Self {
        Self {
            timeout: None,
            interval,
        }
    }
}

/// Poll `check` until it returns `true`.
///
/// Returns `Ok(false)` if the deadline passes first. An error from `check`
/// ends the wait immediately.
pub async fn wait_until<F, Fut>(policy: &WaitPolicy, check: F) -> Result<bool>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    match policy.timeout {
        Some(limit) => match timeout(limit, poll(policy.interval, check)).await {
            Ok(result) => result.map(|()| true),
            Err(_) => Ok(false),
        },
        None => poll(policy.interval, check).await.map(|()| true),
    }
}

async fn poll<F, Fut>(period: Duration, mut check: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if check().await? {
            return Ok(());
        }
    }
}
