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

//! Transaction pipeline: session, card, PIN, limits, cash availability.
//!
//! The full chain validates withdrawals end to end; the balance-inquiry
//! variant omits the PIN and cash steps. Operation classification comes
//! from the request's processing code (exact-match table in
//! [`ProcessingCode::kind`]).

use crate::attempts::AttemptTracker;
use crate::auth::is_valid_pin_format;
use crate::base::{AtmId, CardToken, ProcessingCode, SessionToken};
use crate::card::Card;
use crate::cash::{self, DenominationPlan};
use crate::config::{AtmConfig, PinPolicy};
use crate::error::ServiceError;
use crate::outcome::{ErrorCode, StepOutcome};
use crate::pipeline::{Pipeline, Step};
use crate::services::{
    BalanceSource, CardDirectory, CashInventorySource, PinVerifier, TransactionLedger,
};
use crate::session::SessionManager;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;
use tracing::{debug, warn};

/// Request-scoped context for one transaction.
///
/// Created per incoming operation, discarded after the pipeline returns;
/// the caller keeps ownership and reads the enrichment (resolved card,
/// denomination plan) afterwards.
#[derive(Debug)]
pub struct TxnContext {
    pub session_token: SessionToken,
    pub card_token: CardToken,
    pub atm_id: AtmId,
    pub processing_code: ProcessingCode,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub pin: Option<String>,

    /// Enrichment written by the steps during traversal.
    pub txn: TxnEnrichment,
}

impl TxnContext {
    pub fn new(
        session_token: SessionToken,
        card_token: CardToken,
        atm_id: AtmId,
        processing_code: ProcessingCode,
    ) -> Self {
        Self {
            session_token,
            card_token,
            atm_id,
            processing_code,
            amount: None,
            currency: None,
            pin: None,
            txn: TxnEnrichment::default(),
        }
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_pin(mut self, pin: impl Into<String>) -> Self {
        self.pin = Some(pin.into());
        self
    }
}

/// Typed replacement for the dynamic transaction-context bag.
#[derive(Debug, Default)]
pub struct TxnEnrichment {
    /// Card resolved by the card-validation step.
    pub card: Option<Card>,
    /// Set once the PIN has been verified in this pipeline run (or was
    /// already verified earlier in the session).
    pub pin_validated: bool,
    pub remaining_daily_limit: Option<Decimal>,
    /// Exact note breakdown computed by the cash-availability step.
    pub plan: Option<DenominationPlan>,
}

/// Rejects transactions whose session is missing, inactive, or bound to a
/// different card; extends the session as a side effect of passing.
pub struct SessionValidationStep {
    sessions: Arc<SessionManager>,
}

impl SessionValidationStep {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }
}

impl Step<TxnContext> for SessionValidationStep {
    fn name(&self) -> &'static str {
        "session-validation"
    }

    fn apply(&self, ctx: &mut TxnContext) -> Result<StepOutcome, ServiceError> {
        debug!(session = %ctx.session_token, "validating session");

        if !self.sessions.is_valid(&ctx.session_token) {
            warn!(session = %ctx.session_token, "invalid or expired session");
            return Ok(StepOutcome::failure(
                "Session expired or invalid",
                ErrorCode::SessionInvalid,
            ));
        }

        match self.sessions.card_token_of(&ctx.session_token) {
            Some(bound) if bound == ctx.card_token => {}
            bound => {
                warn!(
                    session = %ctx.session_token,
                    expected = %ctx.card_token,
                    found = ?bound,
                    "session card token mismatch"
                );
                return Ok(StepOutcome::failure(
                    "Session validation failed",
                    ErrorCode::SessionMismatch,
                ));
            }
        }

        // Activity on a valid session slides its expiry window.
        self.sessions.extend(&ctx.session_token);

        Ok(StepOutcome::success_with("Session validated successfully"))
    }
}

/// Same card checks as the authentication chain's card-security step.
pub struct CardValidationStep {
    cards: Arc<dyn CardDirectory>,
}

impl CardValidationStep {
    pub fn new(cards: Arc<dyn CardDirectory>) -> Self {
        Self { cards }
    }
}

impl Step<TxnContext> for CardValidationStep {
    fn name(&self) -> &'static str {
        "card-validation"
    }

    fn apply(&self, ctx: &mut TxnContext) -> Result<StepOutcome, ServiceError> {
        debug!(card = %ctx.card_token, "validating card");

        let Some(card) = self.cards.find_by_token(&ctx.card_token)? else {
            warn!(card = %ctx.card_token, "card not found");
            return Ok(StepOutcome::failure("Card not found", ErrorCode::CardNotFound));
        };

        if !card.is_active() {
            warn!(card = %ctx.card_token, "card is not active");
            return Ok(StepOutcome::failure(
                "Card is blocked or inactive",
                ErrorCode::CardInactive,
            ));
        }

        if card.is_expired(chrono::Utc::now()) {
            warn!(card = %ctx.card_token, "card is expired");
            return Ok(StepOutcome::failure("Card has expired", ErrorCode::CardExpired));
        }

        ctx.txn.card = Some(card);
        Ok(StepOutcome::success_with("Card validated successfully"))
    }
}

/// Authenticates the PIN for the transaction, persisting a card block
/// (and killing the card's sessions) once the failure ceiling is reached.
pub struct PinValidationStep {
    pins: Arc<dyn PinVerifier>,
    cards: Arc<dyn CardDirectory>,
    attempts: Arc<AttemptTracker>,
    sessions: Arc<SessionManager>,
    policy: PinPolicy,
}

impl PinValidationStep {
    pub fn new(
        pins: Arc<dyn PinVerifier>,
        cards: Arc<dyn CardDirectory>,
        attempts: Arc<AttemptTracker>,
        sessions: Arc<SessionManager>,
        policy: PinPolicy,
    ) -> Self {
        Self {
            pins,
            cards,
            attempts,
            sessions,
            policy,
        }
    }
}

impl Step<TxnContext> for PinValidationStep {
    fn name(&self) -> &'static str {
        "pin-validation"
    }

    fn apply(&self, ctx: &mut TxnContext) -> Result<StepOutcome, ServiceError> {
        // Balance inquiries reuse a PIN already verified this session.
        if ctx.processing_code.is_balance_inquiry() && ctx.txn.pin_validated {
            debug!(card = %ctx.card_token, "PIN already validated, skipping");
            return Ok(StepOutcome::success_with(
                "PIN validation skipped - already authenticated",
            ));
        }

        let pin = ctx.pin.clone().unwrap_or_default();
        if !is_valid_pin_format(&pin, &self.policy) {
            warn!(card = %ctx.card_token, "invalid PIN format");
            return Ok(StepOutcome::failure(
                "Invalid PIN format",
                ErrorCode::PinInvalidFormat,
            ));
        }

        if self.attempts.should_block(&ctx.card_token) {
            warn!(card = %ctx.card_token, "blocking card after repeated PIN failures");
            self.cards.block_card(&ctx.card_token)?;
            self.sessions
                .terminate_all_for_card(&ctx.card_token, "card blocked after repeated PIN failures");
            return Ok(StepOutcome::failure(
                "Card blocked due to multiple failed attempts",
                ErrorCode::CardBlocked,
            ));
        }

        if !self.pins.verify(&ctx.card_token, &pin)? {
            self.attempts.record_failure(&ctx.card_token);
            warn!(card = %ctx.card_token, "PIN authentication failed");
            return Ok(StepOutcome::failure("Incorrect PIN", ErrorCode::PinIncorrect));
        }

        self.attempts.reset(&ctx.card_token);
        ctx.txn.pin_validated = true;
        Ok(StepOutcome::success_with("PIN validated successfully"))
    }
}

/// Checks daily transaction count and, per operation kind, withdrawal
/// limits, balance sufficiency, or the inquiry-allowed flag.
pub struct LimitValidationStep {
    balances: Arc<dyn BalanceSource>,
    ledger: Arc<dyn TransactionLedger>,
    max_daily_transactions: u32,
}

impl LimitValidationStep {
    pub fn new(
        balances: Arc<dyn BalanceSource>,
        ledger: Arc<dyn TransactionLedger>,
        max_daily_transactions: u32,
    ) -> Self {
        Self {
            balances,
            ledger,
            max_daily_transactions,
        }
    }

    fn validate_withdrawal(&self, ctx: &mut TxnContext) -> Result<StepOutcome, ServiceError> {
        let Some(amount) = ctx.amount else {
            return Ok(StepOutcome::failure(
                "Invalid withdrawal amount",
                ErrorCode::InvalidWithdrawalAmount,
            ));
        };

        if !self.balances.is_within_daily_limit(&ctx.card_token, amount)? {
            let remaining = self.balances.remaining_daily_limit(&ctx.card_token)?;
            warn!(card = %ctx.card_token, %amount, %remaining, "daily withdrawal limit exceeded");
            return Ok(StepOutcome::failure(
                format!("Withdrawal amount exceeds daily limit. Remaining limit: {remaining}"),
                ErrorCode::DailyWithdrawalLimitExceeded,
            ));
        }

        if !self.balances.has_sufficient_balance(&ctx.card_token, amount)? {
            warn!(card = %ctx.card_token, %amount, "insufficient balance for withdrawal");
            return Ok(StepOutcome::failure(
                "Insufficient account balance",
                ErrorCode::InsufficientBalance,
            ));
        }

        ctx.txn.remaining_daily_limit = Some(self.balances.remaining_daily_limit(&ctx.card_token)?);
        Ok(StepOutcome::success_with("Withdrawal limits validated"))
    }
}

impl Step<TxnContext> for LimitValidationStep {
    fn name(&self) -> &'static str {
        "limit-validation"
    }

    fn apply(&self, ctx: &mut TxnContext) -> Result<StepOutcome, ServiceError> {
        debug!(card = %ctx.card_token, "validating transaction limits");

        let daily = self.ledger.daily_transaction_count(&ctx.card_token)?;
        if daily >= self.max_daily_transactions {
            warn!(card = %ctx.card_token, daily, "daily transaction limit exceeded");
            return Ok(StepOutcome::failure(
                "Daily transaction limit exceeded",
                ErrorCode::DailyTxnLimitExceeded,
            ));
        }

        if ctx.processing_code.is_withdrawal() {
            return self.validate_withdrawal(ctx);
        }

        if ctx.processing_code.is_balance_inquiry()
            && !self.balances.is_balance_inquiry_allowed(&ctx.card_token)?
        {
            warn!(card = %ctx.card_token, "balance inquiry not allowed");
            return Ok(StepOutcome::failure(
                "Balance inquiry not allowed",
                ErrorCode::BalanceInquiryNotAllowed,
            ));
        }

        Ok(StepOutcome::success_with("Transaction limits validated"))
    }
}

/// For withdrawals: validates the amount's shape, confirms the ATM holds
/// enough cash, and computes the exact note plan. A pass-through for every
/// other operation kind.
pub struct CashAvailabilityStep {
    inventory: Arc<dyn CashInventorySource>,
    config: AtmConfig,
}

impl CashAvailabilityStep {
    pub fn new(inventory: Arc<dyn CashInventorySource>, config: AtmConfig) -> Self {
        Self { inventory, config }
    }
}

impl Step<TxnContext> for CashAvailabilityStep {
    fn name(&self) -> &'static str {
        "cash-availability"
    }

    fn apply(&self, ctx: &mut TxnContext) -> Result<StepOutcome, ServiceError> {
        if !ctx.processing_code.is_withdrawal() {
            debug!("non-withdrawal transaction, skipping cash availability check");
            return Ok(StepOutcome::success_with("Cash availability check skipped"));
        }

        let units = ctx
            .amount
            .filter(|&amount| cash::is_valid_withdrawal_amount(amount, &self.config))
            .and_then(|amount| amount.to_u64());
        let Some(units) = units else {
            warn!(amount = ?ctx.amount, "invalid withdrawal amount");
            return Ok(StepOutcome::failure(
                "Invalid withdrawal amount",
                ErrorCode::InvalidWithdrawalAmount,
            ));
        };

        let inventory = self.inventory.inventory_for(&ctx.atm_id)?;

        if inventory.total_value() < units {
            warn!(atm = %ctx.atm_id, units, "ATM has insufficient cash");
            return Ok(StepOutcome::failure(
                "ATM has insufficient cash",
                ErrorCode::InsufficientCashInAtm,
            ));
        }

        let Some(plan) = cash::distribute(&inventory, units) else {
            warn!(atm = %ctx.atm_id, units, "no exact denomination plan");
            return Ok(StepOutcome::failure(
                "Cannot dispense requested amount with available denominations",
                ErrorCode::CannotDispenseAmount,
            ));
        };

        debug!(atm = %ctx.atm_id, units, notes = plan.note_count(), "denomination plan computed");
        ctx.txn.plan = Some(plan);
        Ok(StepOutcome::success_with("Cash availability validated"))
    }
}

/// Dependencies shared by the transaction pipeline builders.
pub struct TxnPipelineParts {
    pub sessions: Arc<SessionManager>,
    pub cards: Arc<dyn CardDirectory>,
    pub pins: Arc<dyn PinVerifier>,
    pub balances: Arc<dyn BalanceSource>,
    pub inventory: Arc<dyn CashInventorySource>,
    pub ledger: Arc<dyn TransactionLedger>,
    pub attempts: Arc<AttemptTracker>,
    pub config: AtmConfig,
}

/// Builds the full transaction pipeline:
/// session -> card -> pin -> limits -> cash availability.
pub fn transaction_pipeline(parts: &TxnPipelineParts) -> Pipeline<TxnContext> {
    Pipeline::new(
        "Transaction processing chain error",
        ErrorCode::ChainError,
        vec![
            Arc::new(SessionValidationStep::new(Arc::clone(&parts.sessions))),
            Arc::new(CardValidationStep::new(Arc::clone(&parts.cards))),
            Arc::new(PinValidationStep::new(
                Arc::clone(&parts.pins),
                Arc::clone(&parts.cards),
                Arc::clone(&parts.attempts),
                Arc::clone(&parts.sessions),
                parts.config.pin.clone(),
            )),
            Arc::new(LimitValidationStep::new(
                Arc::clone(&parts.balances),
                Arc::clone(&parts.ledger),
                parts.config.max_daily_transactions,
            )),
            Arc::new(CashAvailabilityStep::new(
                Arc::clone(&parts.inventory),
                parts.config.clone(),
            )),
        ],
    )
}

/// Builds the reduced balance-inquiry pipeline:
/// session -> card -> limits (no PIN, no cash check).
pub fn balance_inquiry_pipeline(parts: &TxnPipelineParts) -> Pipeline<TxnContext> {
    Pipeline::new(
        "Balance inquiry processing error",
        ErrorCode::BalanceInquiryError,
        vec![
            Arc::new(SessionValidationStep::new(Arc::clone(&parts.sessions))),
            Arc::new(CardValidationStep::new(Arc::clone(&parts.cards))),
            Arc::new(LimitValidationStep::new(
                Arc::clone(&parts.balances),
                Arc::clone(&parts.ledger),
                parts.config.max_daily_transactions,
            )),
        ],
    )
}
