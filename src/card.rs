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

//! Card records as seen by the validation core.
//!
//! Only PCI-storable metadata crosses the collaborator boundary: the vault
//! token, masked PAN, IIN, last four digits, brand, expiry, and status.

use crate::base::CardToken;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Card lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardStatus {
    Active,
    Blocked,
    Inactive,
}

/// A card as resolved through the card directory collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub token: CardToken,

    /// Display-only masked PAN, e.g. `411111******1111`.
    pub masked_pan: Option<String>,

    /// Issuer identification number (first 6-8 digits).
    pub iin: Option<String>,

    pub last4: Option<String>,

    /// Card scheme, e.g. VISA, MASTERCARD, RUPAY.
    pub brand: Option<String>,

    /// Expiry month, 1-12.
    pub expiry_month: u32,

    pub expiry_year: i32,

    pub status: CardStatus,
}

impl Card {
    /// Whether the card's status allows transactions.
    pub fn is_active(&self) -> bool {
        self.status == CardStatus::Active
    }

    /// Whether the card has expired as of `now`.
    ///
    /// A card is valid through the last day of its expiry month.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        (self.expiry_year, self.expiry_month) < (now.year(), now.month())
    }
}
