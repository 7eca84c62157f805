// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide LLM call spacing.
//!
//! One mutex over the last-call instant. Every outbound LLM request
//! acquires it, sleeps out the remainder of the gap, and stamps the new
//! call time before releasing. The mutex stays held across the sleep, so
//! a burst of conversations queues behind it and comes out spaced at the
//! configured gap.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Minimum-gap gate shared by every LLM caller in the process.
#[derive(Debug)]
pub struct Throttle {
    min_gap: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(min_gap: Duration) -> Self {
        Self {
            min_gap,
            last_call: Mutex::new(None),
        }
    }

    /// Wait until the gap since the previous call has elapsed, then claim
    /// the slot.
    pub async fn acquire(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_gap {
                tokio::time::sleep(self.min_gap - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}
