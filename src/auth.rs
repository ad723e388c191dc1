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

//! Authentication pipeline: card security, rate limiting, PIN security.
//!
//! The full chain runs all three steps; the quick variant stops after rate
//! limiting for operations that do not need a fresh PIN verification.
//! Steps enrich the typed [`SecurityContext`] as they pass — downstream
//! steps and the caller read what earlier steps resolved.

use crate::attempts::AttemptTracker;
use crate::base::{AtmId, CardToken, SessionToken};
use crate::card::Card;
use crate::config::PinPolicy;
use crate::error::ServiceError;
use crate::outcome::{ErrorCode, StepOutcome};
use crate::pipeline::{Pipeline, Step};
use crate::services::{CardDirectory, PinVerifier};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// Request-scoped context for one authentication attempt.
///
/// Created per incoming operation, discarded after the pipeline returns.
#[derive(Debug)]
pub struct AuthContext {
    pub card_token: CardToken,
    pub pin: String,
    pub atm_id: AtmId,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,

    /// Enrichment written by the steps during traversal.
    pub security: SecurityContext,
}

impl AuthContext {
    pub fn new(card_token: CardToken, pin: impl Into<String>, atm_id: AtmId) -> Self {
        Self {
            card_token,
            pin: pin.into(),
            atm_id,
            client_ip: None,
            user_agent: None,
            security: SecurityContext::default(),
        }
    }
}

/// Typed replacement for the dynamic security-context bag: named fields
/// for everything the steps resolve.
#[derive(Debug, Default)]
pub struct SecurityContext {
    /// Card resolved by the card-security step.
    pub card: Option<Card>,
    pub failed_attempts: Option<u32>,
    pub max_attempts: Option<u32>,
    pub remaining_attempts: Option<u32>,
    pub pin_authenticated: bool,
    pub authenticated_at: Option<DateTime<Utc>>,
    /// Session minted by the engine after a fully successful run.
    pub session_token: Option<SessionToken>,
}

/// Checks PIN shape against policy: fixed length band, digits only, and
/// optionally no trivial repeats or straight runs.
pub fn is_valid_pin_format(pin: &str, policy: &PinPolicy) -> bool {
    let len = pin.len();
    if len < policy.min_length || len > policy.max_length {
        return false;
    }
    if !pin.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if policy.reject_trivial {
        let digits: Vec<u8> = pin.bytes().map(|b| b - b'0').collect();
        let all_same = digits.windows(2).all(|w| w[0] == w[1]);
        let ascending = digits.windows(2).all(|w| w[1] == w[0].wrapping_add(1));
        let descending = digits.windows(2).all(|w| w[0] == w[1].wrapping_add(1));
        if all_same || ascending || descending {
            return false;
        }
    }
    true
}

/// Resolves the card and validates its status and expiry.
pub struct CardSecurityStep {
    cards: Arc<dyn CardDirectory>,
}

impl CardSecurityStep {
    pub fn new(cards: Arc<dyn CardDirectory>) -> Self {
        Self { cards }
    }
}

impl Step<AuthContext> for CardSecurityStep {
    fn name(&self) -> &'static str {
        "card-security"
    }

    fn apply(&self, ctx: &mut AuthContext) -> Result<StepOutcome, ServiceError> {
        debug!(card = %ctx.card_token, "validating card security");

        let Some(card) = self.cards.find_by_token(&ctx.card_token)? else {
            warn!(card = %ctx.card_token, "card not found during security check");
            return Ok(StepOutcome::failure("Card not found", ErrorCode::CardNotFound));
        };

        if !card.is_active() {
            warn!(card = %ctx.card_token, "card is not active during security check");
            return Ok(StepOutcome::failure(
                "Card is blocked or inactive",
                ErrorCode::CardInactive,
            ));
        }

        if card.is_expired(Utc::now()) {
            warn!(card = %ctx.card_token, "card is expired during security check");
            return Ok(StepOutcome::failure("Card has expired", ErrorCode::CardExpired));
        }

        ctx.security.card = Some(card);
        Ok(StepOutcome::success_with("Card security validated"))
    }
}

/// Guards against brute force by checking the failed-attempt counter.
pub struct RateLimitStep {
    attempts: Arc<AttemptTracker>,
}

impl RateLimitStep {
    pub fn new(attempts: Arc<AttemptTracker>) -> Self {
        Self { attempts }
    }
}

impl Step<AuthContext> for RateLimitStep {
    fn name(&self) -> &'static str {
        "rate-limiting"
    }

    fn apply(&self, ctx: &mut AuthContext) -> Result<StepOutcome, ServiceError> {
        let failed = self.attempts.failed_attempts(&ctx.card_token);
        let max = self.attempts.max_attempts();
        debug!(card = %ctx.card_token, failed, max, "checking rate limiting");

        if self.attempts.should_block(&ctx.card_token) {
            warn!(card = %ctx.card_token, "card hit the failed-attempt ceiling");
            return Ok(StepOutcome::failure(
                format!("Too many failed attempts. Card will be blocked after {max} attempts."),
                ErrorCode::RateLimitExceeded,
            ));
        }

        ctx.security.failed_attempts = Some(failed);
        ctx.security.max_attempts = Some(max);
        ctx.security.remaining_attempts = Some(self.attempts.remaining_attempts(&ctx.card_token));
        Ok(StepOutcome::success_with("Rate limiting check passed"))
    }
}

/// Validates PIN format and authenticates it against the PIN store.
///
/// Terminal step of the full chain: counts failures, resets the counter on
/// success, and stamps the authentication time.
pub struct PinSecurityStep {
    pins: Arc<dyn PinVerifier>,
    attempts: Arc<AttemptTracker>,
    policy: PinPolicy,
}

impl PinSecurityStep {
    pub fn new(pins: Arc<dyn PinVerifier>, attempts: Arc<AttemptTracker>, policy: PinPolicy) -> Self {
        Self {
            pins,
            attempts,
            policy,
        }
    }
}

impl Step<AuthContext> for PinSecurityStep {
    fn name(&self) -> &'static str {
        "pin-security"
    }

    fn apply(&self, ctx: &mut AuthContext) -> Result<StepOutcome, ServiceError> {
        if !is_valid_pin_format(&ctx.pin, &self.policy) {
            warn!(card = %ctx.card_token, "invalid PIN format");
            return Ok(StepOutcome::failure(
                "Invalid PIN format",
                ErrorCode::PinInvalidFormat,
            ));
        }

        if !self.pins.verify(&ctx.card_token, &ctx.pin)? {
            let count = self.attempts.record_failure(&ctx.card_token);
            warn!(card = %ctx.card_token, count, "PIN authentication failed");
            return Ok(StepOutcome::failure(
                format!("Incorrect PIN. Failed attempts: {count}"),
                ErrorCode::PinIncorrect,
            ));
        }

        self.attempts.reset(&ctx.card_token);
        ctx.security.pin_authenticated = true;
        ctx.security.authenticated_at = Some(Utc::now());
        debug!(card = %ctx.card_token, "PIN authentication successful");
        Ok(StepOutcome::success_and_stop("PIN authentication successful"))
    }
}

/// Builds the full authentication pipeline:
/// card-security -> rate-limiting -> pin-security.
pub fn authentication_pipeline(
    cards: Arc<dyn CardDirectory>,
    pins: Arc<dyn PinVerifier>,
    attempts: Arc<AttemptTracker>,
    policy: PinPolicy,
) -> Pipeline<AuthContext> {
    Pipeline::new(
        "Authentication chain error",
        ErrorCode::AuthChainError,
        vec![
            Arc::new(CardSecurityStep::new(cards)),
            Arc::new(RateLimitStep::new(Arc::clone(&attempts))),
            Arc::new(PinSecurityStep::new(pins, attempts, policy)),
        ],
    )
}

/// Builds the quick variant without PIN verification:
/// card-security -> rate-limiting.
pub fn quick_authentication_pipeline(
    cards: Arc<dyn CardDirectory>,
    attempts: Arc<AttemptTracker>,
) -> Pipeline<AuthContext> {
    Pipeline::new(
        "Quick authentication error",
        ErrorCode::QuickAuthError,
        vec![
            Arc::new(CardSecurityStep::new(cards)),
            Arc::new(RateLimitStep::new(attempts)),
        ],
    )
}
