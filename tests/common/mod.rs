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

//! In-memory collaborator doubles shared by the integration suites.

#![allow(dead_code)]

use cashpoint_rs::{
    AtmConfig, AtmEngine, AtmId, AtmServices, BalanceSource, Card, CardDirectory, CardStatus,
    CardToken, CashInventory, CashInventorySource, DenominationPlan, ErrorCode, PinVerifier,
    ProcessingCode, ServiceError, TransactionLedger, TransactionRecord, TxnStatus,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Card directory backed by a concurrent map.
#[derive(Default)]
pub struct MemoryCards {
    cards: DashMap<CardToken, Card>,
}

impl MemoryCards {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, card: Card) {
        self.cards.insert(card.token.clone(), card);
    }

    pub fn status_of(&self, token: &CardToken) -> Option<CardStatus> {
        self.cards.get(token).map(|card| card.status)
    }
}

impl CardDirectory for MemoryCards {
    fn find_by_token(&self, token: &CardToken) -> Result<Option<Card>, ServiceError> {
        Ok(self.cards.get(token).map(|entry| entry.value().clone()))
    }

    fn block_card(&self, token: &CardToken) -> Result<(), ServiceError> {
        self.update_status(token, CardStatus::Blocked)
    }

    fn update_status(&self, token: &CardToken, status: CardStatus) -> Result<(), ServiceError> {
        match self.cards.get_mut(token) {
            Some(mut card) => {
                card.status = status;
                Ok(())
            }
            None => Err(ServiceError::Internal(format!("unknown card {token}"))),
        }
    }
}

/// PIN store holding plain PINs (test double only).
#[derive(Default)]
pub struct MemoryPins {
    pins: DashMap<CardToken, String>,
}

impl MemoryPins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, token: &CardToken, pin: &str) {
        self.pins.insert(token.clone(), pin.to_owned());
    }
}

impl PinVerifier for MemoryPins {
    fn verify(&self, token: &CardToken, pin: &str) -> Result<bool, ServiceError> {
        Ok(self.pins.get(token).is_some_and(|stored| *stored == pin))
    }
}

/// Balance source with a fixed balance and daily limit per setup.
pub struct MemoryBalances {
    balance: Decimal,
    daily_limit: Decimal,
    used_today: Mutex<Decimal>,
    inquiry_allowed: bool,
}

impl MemoryBalances {
    pub fn new(balance: Decimal, daily_limit: Decimal) -> Self {
        Self {
            balance,
            daily_limit,
            used_today: Mutex::new(Decimal::ZERO),
            inquiry_allowed: true,
        }
    }

    pub fn deny_inquiries(mut self) -> Self {
        self.inquiry_allowed = false;
        self
    }

    pub fn set_used_today(&self, used: Decimal) {
        *self.used_today.lock() = used;
    }
}

impl BalanceSource for MemoryBalances {
    fn current_balance(&self, _token: &CardToken) -> Result<Decimal, ServiceError> {
        Ok(self.balance)
    }

    fn available_balance(&self, _token: &CardToken) -> Result<Decimal, ServiceError> {
        Ok(self.balance)
    }

    fn has_sufficient_balance(
        &self,
        _token: &CardToken,
        amount: Decimal,
    ) -> Result<bool, ServiceError> {
        Ok(amount <= self.balance)
    }

    fn daily_withdrawal_limit(&self, _token: &CardToken) -> Result<Decimal, ServiceError> {
        Ok(self.daily_limit)
    }

    fn remaining_daily_limit(&self, _token: &CardToken) -> Result<Decimal, ServiceError> {
        Ok(self.daily_limit - *self.used_today.lock())
    }

    fn is_within_daily_limit(
        &self,
        token: &CardToken,
        amount: Decimal,
    ) -> Result<bool, ServiceError> {
        Ok(amount <= self.remaining_daily_limit(token)?)
    }

    fn account_type(&self, _token: &CardToken) -> Result<String, ServiceError> {
        Ok("SAVINGS".to_owned())
    }

    fn is_balance_inquiry_allowed(&self, _token: &CardToken) -> Result<bool, ServiceError> {
        Ok(self.inquiry_allowed)
    }
}

/// Cash inventory per ATM, mutable for dispense tests.
#[derive(Default)]
pub struct MemoryInventory {
    inventories: DashMap<AtmId, CashInventory>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, atm: &AtmId, inventory: CashInventory) {
        self.inventories.insert(atm.clone(), inventory);
    }
}

impl CashInventorySource for MemoryInventory {
    fn inventory_for(&self, atm: &AtmId) -> Result<CashInventory, ServiceError> {
        Ok(self
            .inventories
            .get(atm)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    fn apply_dispense(&self, atm: &AtmId, plan: &DenominationPlan) -> Result<(), ServiceError> {
        let mut inventory = self
            .inventories
            .get_mut(atm)
            .ok_or_else(|| ServiceError::Internal(format!("unknown ATM {atm}")))?;
        if inventory.apply_dispense(plan) {
            Ok(())
        } else {
            Err(ServiceError::Internal("dispense exceeds stock".to_owned()))
        }
    }
}

/// Ledger recording every create/update for later assertions.
#[derive(Default)]
pub struct MemoryLedger {
    next_id: AtomicU64,
    next_trace: AtomicU64,
    daily: DashMap<CardToken, u32>,
    pub updates: Mutex<Vec<(u64, TxnStatus, Option<ErrorCode>)>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_daily_count(&self, card: &CardToken, count: u32) {
        self.daily.insert(card.clone(), count);
    }

    pub fn last_update(&self) -> Option<(u64, TxnStatus, Option<ErrorCode>)> {
        self.updates.lock().last().cloned()
    }
}

impl TransactionLedger for MemoryLedger {
    fn create(
        &self,
        _atm: &AtmId,
        card: &CardToken,
        _code: &ProcessingCode,
        _amount: Option<Decimal>,
    ) -> Result<TransactionRecord, ServiceError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        *self.daily.entry(card.clone()).or_insert(0) += 1;
        Ok(TransactionRecord {
            id,
            rrn: self.next_rrn()?,
            stan: self.next_stan()?,
            status: TxnStatus::Pending,
        })
    }

    fn update_status(
        &self,
        id: u64,
        status: TxnStatus,
        response_code: Option<ErrorCode>,
    ) -> Result<(), ServiceError> {
        self.updates.lock().push((id, status, response_code));
        Ok(())
    }

    fn next_rrn(&self) -> Result<String, ServiceError> {
        Ok(format!("{:012}", self.next_trace.fetch_add(1, Ordering::Relaxed)))
    }

    fn next_stan(&self) -> Result<String, ServiceError> {
        Ok(format!("{:06}", self.next_trace.fetch_add(1, Ordering::Relaxed) % 1_000_000))
    }

    fn daily_transaction_count(&self, card: &CardToken) -> Result<u32, ServiceError> {
        Ok(self.daily.get(card).map(|count| *count).unwrap_or(0))
    }
}

/// Card directory that is always down, for boundary-conversion tests.
pub struct FailingCards;

impl CardDirectory for FailingCards {
    fn find_by_token(&self, _token: &CardToken) -> Result<Option<Card>, ServiceError> {
        Err(ServiceError::Unavailable("card vault".to_owned()))
    }

    fn block_card(&self, _token: &CardToken) -> Result<(), ServiceError> {
        Err(ServiceError::Unavailable("card vault".to_owned()))
    }

    fn update_status(&self, _token: &CardToken, _status: CardStatus) -> Result<(), ServiceError> {
        Err(ServiceError::Unavailable("card vault".to_owned()))
    }
}

/// An active VISA card expiring far in the future.
pub fn test_card(token: &str) -> Card {
    Card {
        token: CardToken::new(token),
        masked_pan: Some("411111******1111".to_owned()),
        iin: Some("411111".to_owned()),
        last4: Some("1111".to_owned()),
        brand: Some("VISA".to_owned()),
        expiry_month: 12,
        expiry_year: 2031,
        status: CardStatus::Active,
    }
}

/// Engine plus handles to every collaborator double.
pub struct Harness {
    pub engine: AtmEngine,
    pub cards: Arc<MemoryCards>,
    pub pins: Arc<MemoryPins>,
    pub balances: Arc<MemoryBalances>,
    pub inventory: Arc<MemoryInventory>,
    pub ledger: Arc<MemoryLedger>,
    pub atm: AtmId,
    pub card: CardToken,
}

pub const GOOD_PIN: &str = "4929";
pub const BAD_PIN: &str = "1111";

/// Standard setup: one active card (`card-1`, PIN 4929), a healthy
/// balance, a 10 000-unit daily limit, and a stocked ATM.
pub fn harness(config: AtmConfig) -> Harness {
    harness_with_balances(config, MemoryBalances::new(dec!(100000), dec!(10000)))
}

pub fn harness_with_balances(config: AtmConfig, balances: MemoryBalances) -> Harness {
    let atm = AtmId::new("ATM-001");
    let card = CardToken::new("card-1");

    let cards = Arc::new(MemoryCards::new());
    cards.insert(test_card("card-1"));

    let pins = Arc::new(MemoryPins::new());
    pins.set(&card, GOOD_PIN);

    let balances = Arc::new(balances);

    let inventory = Arc::new(MemoryInventory::new());
    inventory.set(
        &atm,
        CashInventory::with_notes(&[(2000, 5), (500, 10), (100, 50)]),
    );

    let ledger = Arc::new(MemoryLedger::new());

    let engine = AtmEngine::new(
        config,
        AtmServices {
            cards: Arc::clone(&cards) as Arc<dyn CardDirectory>,
            pins: Arc::clone(&pins) as Arc<dyn PinVerifier>,
            balances: Arc::clone(&balances) as Arc<dyn BalanceSource>,
            inventory: Arc::clone(&inventory) as Arc<dyn CashInventorySource>,
            ledger: Arc::clone(&ledger) as Arc<dyn TransactionLedger>,
        },
    );

    Harness {
        engine,
        cards,
        pins,
        balances,
        inventory,
        ledger,
        atm,
        card,
    }
}
