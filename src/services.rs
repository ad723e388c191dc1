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

//! Collaborator contracts.
//!
//! Everything the core does not own — card storage, PIN hashes,
//! core-banking balances, cash inventory, transaction records — sits behind
//! these narrow traits. Implementations are injected into
//! [`AtmEngine`](crate::AtmEngine) as `Arc<dyn …>` and are expected to
//! enforce their own timeout contracts, surfacing problems as
//! [`ServiceError`] rather than panicking or blocking indefinitely.

use crate::base::{AtmId, CardToken, ProcessingCode};
use crate::card::{Card, CardStatus};
use crate::cash::{CashInventory, DenominationPlan};
use crate::error::ServiceError;
use crate::outcome::ErrorCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Card lookup and status management.
pub trait CardDirectory: Send + Sync {
    /// Resolves a card by its vault token. `Ok(None)` means no such card.
    fn find_by_token(&self, token: &CardToken) -> Result<Option<Card>, ServiceError>;

    /// Persists a security block on the card.
    fn block_card(&self, token: &CardToken) -> Result<(), ServiceError>;

    /// Updates the persisted card status.
    fn update_status(&self, token: &CardToken, status: CardStatus) -> Result<(), ServiceError>;
}

/// PIN verification against the secure PIN store.
///
/// The core never sees PIN hashes; it only learns whether a candidate PIN
/// matches.
pub trait PinVerifier: Send + Sync {
    fn verify(&self, token: &CardToken, pin: &str) -> Result<bool, ServiceError>;
}

/// Core-banking balance and limit lookups.
pub trait BalanceSource: Send + Sync {
    fn current_balance(&self, token: &CardToken) -> Result<Decimal, ServiceError>;

    /// Balance net of holds.
    fn available_balance(&self, token: &CardToken) -> Result<Decimal, ServiceError>;

    fn has_sufficient_balance(
        &self,
        token: &CardToken,
        amount: Decimal,
    ) -> Result<bool, ServiceError>;

    fn daily_withdrawal_limit(&self, token: &CardToken) -> Result<Decimal, ServiceError>;

    fn remaining_daily_limit(&self, token: &CardToken) -> Result<Decimal, ServiceError>;

    fn is_within_daily_limit(
        &self,
        token: &CardToken,
        amount: Decimal,
    ) -> Result<bool, ServiceError>;

    /// Account type, e.g. SAVINGS, CURRENT, CREDIT.
    fn account_type(&self, token: &CardToken) -> Result<String, ServiceError>;

    fn is_balance_inquiry_allowed(&self, token: &CardToken) -> Result<bool, ServiceError>;
}

/// Per-ATM cash inventory access.
pub trait CashInventorySource: Send + Sync {
    /// Current note inventory of the given ATM.
    fn inventory_for(&self, atm: &AtmId) -> Result<CashInventory, ServiceError>;

    /// Applies the inventory delta after a physical dispense. Invoked by
    /// the dispensing layer, not by the validation pipelines.
    fn apply_dispense(&self, atm: &AtmId, plan: &DenominationPlan) -> Result<(), ServiceError>;
}

/// Lifecycle status of a ledger transaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxnStatus {
    Pending,
    Approved,
    Declined,
}

/// A transaction record as created by the ledger collaborator.
///
/// RRN and STAN are the trace identifiers correlating a request with its
/// response; their format is owned by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: u64,
    pub rrn: String,
    pub stan: String,
    pub status: TxnStatus,
}

/// Transaction logging and trace-number generation.
pub trait TransactionLedger: Send + Sync {
    /// Creates a `Pending` record with freshly assigned trace numbers.
    fn create(
        &self,
        atm: &AtmId,
        card: &CardToken,
        code: &ProcessingCode,
        amount: Option<Decimal>,
    ) -> Result<TransactionRecord, ServiceError>;

    /// Updates the final status and response code of a record.
    fn update_status(
        &self,
        id: u64,
        status: TxnStatus,
        response_code: Option<ErrorCode>,
    ) -> Result<(), ServiceError>;

    /// Generates a unique retrieval reference number.
    fn next_rrn(&self) -> Result<String, ServiceError>;

    /// Generates a unique system trace audit number.
    fn next_stan(&self) -> Result<String, ServiceError>;

    /// Number of transactions recorded for this card today.
    fn daily_transaction_count(&self, card: &CardToken) -> Result<u32, ServiceError>;
}
