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

//! Runtime configuration knobs.
//!
//! The embedding layer owns where the values come from (file, environment,
//! service discovery); this struct only defines the knobs the core
//! recognizes and their defaults.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Configuration for the ATM operation core.
///
/// All monetary values are in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtmConfig {
    /// Idle session lifetime in seconds.
    pub session_timeout_secs: u64,

    /// Interval of the background sweep that marks expired sessions.
    pub session_sweep_interval_secs: u64,

    /// Consecutive failed PIN authentications before a card is blocked.
    pub max_failed_attempts: u32,

    /// Smallest withdrawal the ATM accepts.
    pub min_withdrawal: Decimal,

    /// Largest withdrawal the ATM accepts.
    pub max_withdrawal: Decimal,

    /// Withdrawals must be an exact multiple of this step.
    pub withdrawal_multiple: Decimal,

    /// Daily transaction count ceiling per card.
    pub max_daily_transactions: u32,

    /// PIN format policy.
    pub pin: PinPolicy,
}

impl Default for AtmConfig {
    fn default() -> Self {
        Self {
            session_timeout_secs: 300,
            session_sweep_interval_secs: 60,
            max_failed_attempts: 3,
            min_withdrawal: dec!(100),
            max_withdrawal: dec!(20000),
            withdrawal_multiple: dec!(100),
            max_daily_transactions: 50,
            pin: PinPolicy::default(),
        }
    }
}

/// PIN format rules.
///
/// Length and digits-only are always enforced; the trivial-sequence rules
/// are a configuration-driven extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinPolicy {
    pub min_length: usize,
    pub max_length: usize,

    /// Reject repeated-digit PINs (1111) and straight runs (1234, 4321).
    pub reject_trivial: bool,
}

impl Default for PinPolicy {
    fn default() -> Self {
        Self {
            min_length: 4,
            max_length: 6,
            reject_trivial: false,
        }
    }
}
