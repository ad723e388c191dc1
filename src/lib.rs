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

//! # cashpoint-rs
//!
//! This library validates and authorizes ATM operations — PIN
//! authentication, cash withdrawal, balance inquiry — through composable
//! pipelines of independent validation steps, and maintains short-lived
//! per-card sessions between authentication and subsequent operations.
//!
//! ## Core Components
//!
//! - [`AtmEngine`]: wires the pipelines, session manager, and collaborator
//!   services and exposes the operations an outer layer consumes
//! - [`Pipeline`] / [`Step`]: the generic ordered-step framework with
//!   three-valued continue/stop/success semantics
//! - [`SessionManager`]: concurrent per-card session lifecycle
//! - [`distribute`]: exact, inventory-respecting denomination distribution
//!
//! Persistent storage, core-banking lookups, PIN hashes, and transaction
//! records stay behind the narrow collaborator traits in [`services`].
//!
//! ## Example
//!
//! ```
//! use cashpoint_rs::{CashInventory, distribute};
//!
//! let inventory = CashInventory::with_notes(&[(2000, 5), (500, 10), (100, 50)]);
//! let plan = distribute(&inventory, 4300).expect("amount is dispensable");
//!
//! assert_eq!(plan.total_value(), 4300);
//! assert_eq!(plan.note_count(), 5); // 2 x 2000 + 3 x 100
//! ```
//!
//! ## Thread Safety
//!
//! Pipelines are immutable after construction and safe to share across
//! concurrent requests; the session store uses per-key locking so
//! unrelated cards and ATMs never contend.

pub mod attempts;
pub mod auth;
mod base;
pub mod card;
pub mod cash;
mod config;
pub mod error;
mod engine;
mod outcome;
mod pipeline;
pub mod services;
pub mod session;
pub mod transaction;

pub use attempts::AttemptTracker;
pub use auth::{AuthContext, SecurityContext, is_valid_pin_format};
pub use base::{AtmId, CardToken, OperationKind, ProcessingCode, SessionToken};
pub use card::{Card, CardStatus};
pub use cash::{CashInventory, DenominationPlan, NoteStock, distribute, is_valid_withdrawal_amount};
pub use config::{AtmConfig, PinPolicy};
pub use engine::{AtmEngine, AtmServices};
pub use error::ServiceError;
pub use outcome::{ErrorCode, StepOutcome};
pub use pipeline::{FailurePolicy, Pipeline, Step};
pub use services::{
    BalanceSource, CardDirectory, CashInventorySource, PinVerifier, TransactionLedger,
    TransactionRecord, TxnStatus,
};
pub use session::{SessionManager, SessionSnapshot, SessionStatus, SweeperHandle};
pub use transaction::{TxnContext, TxnEnrichment};
