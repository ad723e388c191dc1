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

//! Error types for collaborator service failures.
//!
//! Validation and policy failures are not errors: they travel through the
//! pipeline as [`StepOutcome`](crate::StepOutcome) values with stable error
//! codes. [`ServiceError`] covers the infrastructure side only — a
//! collaborator that is unreachable, times out, or misbehaves. The pipeline
//! runner catches these at the chain boundary and converts them into a
//! chain-level failure outcome, so callers always receive an outcome,
//! never a raw fault.

use thiserror::Error;

/// Infrastructure failure raised by an external collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The backing service could not be reached
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The backing service did not answer within its timeout contract
    #[error("service call timed out: {0}")]
    Timeout(String),

    /// The backing service answered with something unusable
    #[error("internal service error: {0}")]
    Internal(String),
}
