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

//! ATM validation engine.
//!
//! [`AtmEngine`] wires the four pipelines, the session manager and the
//! failed-attempt tracker around the injected collaborator services, and
//! exposes the operations an outer request-handling layer consumes. All
//! pipeline topology is constructed here, once; nothing is rewired per
//! call.

use crate::attempts::AttemptTracker;
use crate::auth::{
    AuthContext, authentication_pipeline, quick_authentication_pipeline,
};
use crate::base::{AtmId, CardToken, SessionToken};
use crate::config::AtmConfig;
use crate::outcome::{ErrorCode, StepOutcome};
use crate::pipeline::Pipeline;
use crate::services::{
    BalanceSource, CardDirectory, CashInventorySource, PinVerifier, TransactionLedger, TxnStatus,
};
use crate::session::{SessionManager, SweeperHandle};
use crate::transaction::{
    TxnContext, TxnPipelineParts, balance_inquiry_pipeline, transaction_pipeline,
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// The collaborator services an engine is built around.
#[derive(Clone)]
pub struct AtmServices {
    pub cards: Arc<dyn CardDirectory>,
    pub pins: Arc<dyn PinVerifier>,
    pub balances: Arc<dyn BalanceSource>,
    pub inventory: Arc<dyn CashInventorySource>,
    pub ledger: Arc<dyn TransactionLedger>,
}

/// Central coordinator for ATM operation validation.
pub struct AtmEngine {
    config: AtmConfig,
    sessions: Arc<SessionManager>,
    attempts: Arc<AttemptTracker>,
    ledger: Arc<dyn TransactionLedger>,
    auth_chain: Pipeline<AuthContext>,
    quick_auth_chain: Pipeline<AuthContext>,
    txn_chain: Pipeline<TxnContext>,
    balance_chain: Pipeline<TxnContext>,
}

impl AtmEngine {
    /// Builds the engine and all pipeline definitions up front.
    pub fn new(config: AtmConfig, services: AtmServices) -> Self {
        let sessions = Arc::new(SessionManager::new(&config));
        let attempts = Arc::new(AttemptTracker::new(config.max_failed_attempts));

        let auth_chain = authentication_pipeline(
            Arc::clone(&services.cards),
            Arc::clone(&services.pins),
            Arc::clone(&attempts),
            config.pin.clone(),
        );
        let quick_auth_chain =
            quick_authentication_pipeline(Arc::clone(&services.cards), Arc::clone(&attempts));

        let parts = TxnPipelineParts {
            sessions: Arc::clone(&sessions),
            cards: Arc::clone(&services.cards),
            pins: Arc::clone(&services.pins),
            balances: Arc::clone(&services.balances),
            inventory: Arc::clone(&services.inventory),
            ledger: Arc::clone(&services.ledger),
            attempts: Arc::clone(&attempts),
            config: config.clone(),
        };
        let txn_chain = transaction_pipeline(&parts);
        let balance_chain = balance_inquiry_pipeline(&parts);

        Self {
            config,
            sessions,
            attempts,
            ledger: services.ledger,
            auth_chain,
            quick_auth_chain,
            txn_chain,
            balance_chain,
        }
    }

    pub fn config(&self) -> &AtmConfig {
        &self.config
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn attempts(&self) -> &Arc<AttemptTracker> {
        &self.attempts
    }

    /// Runs the full authentication chain. On success a session is created
    /// and its token placed in `ctx.security.session_token`.
    pub fn authenticate(&self, ctx: &mut AuthContext) -> StepOutcome {
        info!(card = %ctx.card_token, atm = %ctx.atm_id, "starting authentication chain");

        let outcome = self.auth_chain.run(ctx);
        if outcome.is_success() {
            let token = self.sessions.create(&ctx.atm_id, &ctx.card_token);
            ctx.security.session_token = Some(token);
            info!(card = %ctx.card_token, "authentication chain completed successfully");
        } else {
            warn!(
                card = %ctx.card_token,
                error = ?outcome.error_code(),
                "authentication chain failed"
            );
        }
        outcome
    }

    /// Runs the reduced chain without PIN verification. No session is
    /// created.
    pub fn quick_authenticate(&self, ctx: &mut AuthContext) -> StepOutcome {
        info!(card = %ctx.card_token, "starting quick authentication chain");

        let outcome = self.quick_auth_chain.run(ctx);
        if !outcome.is_success() {
            warn!(
                card = %ctx.card_token,
                error = ?outcome.error_code(),
                "quick authentication failed"
            );
        }
        outcome
    }

    /// Runs the full transaction chain, bracketing it with ledger record
    /// creation and final status update.
    pub fn process_transaction(&self, ctx: &mut TxnContext) -> StepOutcome {
        info!(
            card = %ctx.card_token,
            atm = %ctx.atm_id,
            code = %ctx.processing_code,
            "starting transaction processing chain"
        );
        self.run_with_ledger(ctx, &self.txn_chain, ErrorCode::ChainError)
    }

    /// Runs the reduced balance-inquiry chain (no PIN or cash steps).
    pub fn process_balance_inquiry(&self, ctx: &mut TxnContext) -> StepOutcome {
        info!(card = %ctx.card_token, "starting balance inquiry chain");
        self.run_with_ledger(ctx, &self.balance_chain, ErrorCode::BalanceInquiryError)
    }

    fn run_with_ledger(
        &self,
        ctx: &mut TxnContext,
        chain: &Pipeline<TxnContext>,
        boundary: ErrorCode,
    ) -> StepOutcome {
        let record = match self.ledger.create(
            &ctx.atm_id,
            &ctx.card_token,
            &ctx.processing_code,
            ctx.amount,
        ) {
            Ok(record) => record,
            Err(err) => {
                error!(card = %ctx.card_token, %err, "could not create transaction record");
                return StepOutcome::failure("Transaction logging unavailable", boundary);
            }
        };

        let outcome = chain.run(ctx);

        let status = if outcome.is_success() {
            TxnStatus::Approved
        } else {
            TxnStatus::Declined
        };
        if let Err(err) = self
            .ledger
            .update_status(record.id, status, outcome.error_code())
        {
            // The validation verdict stands even if the ledger update is
            // lost; the record remains Pending on the collaborator side.
            warn!(record = record.id, %err, "could not update transaction record");
        }

        if outcome.is_success() {
            info!(card = %ctx.card_token, rrn = %record.rrn, "transaction chain approved");
        } else {
            warn!(
                card = %ctx.card_token,
                rrn = %record.rrn,
                error = ?outcome.error_code(),
                "transaction chain declined"
            );
        }
        outcome
    }

    // --- Session operations exposed to the outer layer ---

    pub fn create_session(&self, atm_id: &AtmId, card_token: &CardToken) -> SessionToken {
        self.sessions.create(atm_id, card_token)
    }

    pub fn validate_session(&self, token: &SessionToken) -> bool {
        self.sessions.is_valid(token)
    }

    pub fn extend_session(&self, token: &SessionToken) -> bool {
        self.sessions.extend(token)
    }

    pub fn terminate_session(&self, token: &SessionToken, reason: &str) -> bool {
        self.sessions.terminate(token, reason)
    }

    pub fn terminate_all_sessions_for_card(&self, card: &CardToken, reason: &str) -> usize {
        self.sessions.terminate_all_for_card(card, reason)
    }

    /// Starts the periodic session sweep at the configured interval.
    pub fn start_session_sweeper(&self) -> SweeperHandle {
        SweeperHandle::spawn(
            &self.sessions,
            std::time::Duration::from_secs(self.config.session_sweep_interval_secs),
        )
    }
}
