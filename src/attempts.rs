// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 The cashpoint-rs Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Per-card failed PIN attempt tracking.
//!
//! The counter decides *whether* a card should be blocked; persisting the
//! block on the card record is the transaction pipeline's job. Counters
//! are keyed per card so unrelated cards never contend.

use crate::base::CardToken;
use dashmap::DashMap;
use tracing::debug;

/// Concurrent counter of consecutive failed PIN authentications per card.
#[derive(Debug)]
pub struct AttemptTracker {
    counts: DashMap<CardToken, u32>,
    max_attempts: u32,
}

impl AttemptTracker {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            counts: DashMap::new(),
            max_attempts,
        }
    }

    /// Current consecutive failure count for a card.
    pub fn failed_attempts(&self, token: &CardToken) -> u32 {
        self.counts.get(token).map(|c| *c).unwrap_or(0)
    }

    /// Records one more failure and returns the updated count.
    pub fn record_failure(&self, token: &CardToken) -> u32 {
        let mut entry = self.counts.entry(token.clone()).or_insert(0);
        *entry += 1;
        let count = *entry;
        drop(entry);
        debug!(card = %token, count, "failed PIN attempt recorded");
        count
    }

    /// Clears the counter after a successful authentication.
    pub fn reset(&self, token: &CardToken) {
        self.counts.remove(token);
    }

    /// Whether the card has reached the configured failure ceiling.
    ///
    /// Pure function of counter state; it does not touch the card record.
    pub fn should_block(&self, token: &CardToken) -> bool {
        self.failed_attempts(token) >= self.max_attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Attempts left before the card is blocked.
    pub fn remaining_attempts(&self, token: &CardToken) -> u32 {
        self.max_attempts.saturating_sub(self.failed_attempts(token))
    }
}
