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

//! Pipeline step outcomes.
//!
//! Every step returns a [`StepOutcome`]: a success flag, a continuation
//! flag, an optional human-readable message, and an optional stable
//! [`ErrorCode`]. Four shapes occur in practice:
//!
//! | shape | meaning |
//! |-------|---------|
//! | success + continue | pass through to the next step |
//! | success + stop | terminal success, skip the rest of the chain |
//! | failure + stop | hard failure, short-circuit |
//! | failure + continue | soft failure; downstream steps still run for their side effects |

use std::fmt;

/// Stable error codes reported to callers.
///
/// The string form is the wire-stable identifier; the enum exists so the
/// compiler tracks which codes a step can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    CardNotFound,
    CardInactive,
    CardExpired,
    CardBlocked,
    RateLimitExceeded,
    PinInvalidFormat,
    PinIncorrect,
    SessionInvalid,
    SessionMismatch,
    DailyTxnLimitExceeded,
    DailyWithdrawalLimitExceeded,
    InsufficientBalance,
    BalanceInquiryNotAllowed,
    InvalidWithdrawalAmount,
    InsufficientCashInAtm,
    CannotDispenseAmount,
    AuthChainError,
    QuickAuthError,
    ChainError,
    BalanceInquiryError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CardNotFound => "CARD_NOT_FOUND",
            Self::CardInactive => "CARD_INACTIVE",
            Self::CardExpired => "CARD_EXPIRED",
            Self::CardBlocked => "CARD_BLOCKED",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::PinInvalidFormat => "PIN_INVALID_FORMAT",
            Self::PinIncorrect => "PIN_INCORRECT",
            Self::SessionInvalid => "SESSION_INVALID",
            Self::SessionMismatch => "SESSION_MISMATCH",
            Self::DailyTxnLimitExceeded => "DAILY_TXN_LIMIT_EXCEEDED",
            Self::DailyWithdrawalLimitExceeded => "DAILY_WITHDRAWAL_LIMIT_EXCEEDED",
            Self::InsufficientBalance => "INSUFFICIENT_BALANCE",
            Self::BalanceInquiryNotAllowed => "BALANCE_INQUIRY_NOT_ALLOWED",
            Self::InvalidWithdrawalAmount => "INVALID_WITHDRAWAL_AMOUNT",
            Self::InsufficientCashInAtm => "INSUFFICIENT_CASH_IN_ATM",
            Self::CannotDispenseAmount => "CANNOT_DISPENSE_AMOUNT",
            Self::AuthChainError => "AUTH_CHAIN_ERROR",
            Self::QuickAuthError => "QUICK_AUTH_ERROR",
            Self::ChainError => "CHAIN_ERROR",
            Self::BalanceInquiryError => "BALANCE_INQUIRY_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single pipeline step, and of a whole pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    success: bool,
    should_continue: bool,
    message: Option<String>,
    error_code: Option<ErrorCode>,
}

impl StepOutcome {
    /// Successful result that continues to the next step.
    pub fn success() -> Self {
        Self {
            success: true,
            should_continue: true,
            message: None,
            error_code: None,
        }
    }

    /// Successful result with a message that continues to the next step.
    pub fn success_with(message: impl Into<String>) -> Self {
        Self {
            success: true,
            should_continue: true,
            message: Some(message.into()),
            error_code: None,
        }
    }

    /// Successful result that stops the chain.
    pub fn success_and_stop(message: impl Into<String>) -> Self {
        Self {
            success: true,
            should_continue: false,
            message: Some(message.into()),
            error_code: None,
        }
    }

    /// Failure result that stops the chain.
    pub fn failure(message: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            success: false,
            should_continue: false,
            message: Some(message.into()),
            error_code: Some(code),
        }
    }

    /// Failure result that still allows the rest of the chain to run.
    ///
    /// The runner pins the first such outcome as the pipeline's result
    /// while later steps execute for their side effects only.
    pub fn failure_but_continue(message: impl Into<String>) -> Self {
        Self {
            success: false,
            should_continue: true,
            message: Some(message.into()),
            error_code: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn should_continue(&self) -> bool {
        self.should_continue
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error_code
    }
}
