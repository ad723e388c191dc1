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

//! Core identifier types for cards, sessions, and ATM machines.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque tokenized card identifier.
///
/// A surrogate reference to the real PAN kept in a secure token vault;
/// the core never sees the PAN itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct CardToken(String);

impl CardToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque session token minted by the session manager.
///
/// URL-safe base64 over 32 cryptographically random bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the ATM machine an operation originates from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct AtmId(String);

impl AtmId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AtmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ISO 8583-style processing code carried by a transaction request.
///
/// Classification uses an exact-match table; unrecognized codes classify
/// as none of the known kinds and fall through default handling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ProcessingCode(String);

/// The operation kinds the core distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    Withdrawal,
    BalanceInquiry,
    Deposit,
}

impl ProcessingCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Classifies the processing code into an operation kind.
    pub fn kind(&self) -> Option<OperationKind> {
        match self.0.as_str() {
            "01" | "010000" => Some(OperationKind::Withdrawal),
            "31" | "310000" => Some(OperationKind::BalanceInquiry),
            "21" | "210000" => Some(OperationKind::Deposit),
            _ => None,
        }
    }

    pub fn is_withdrawal(&self) -> bool {
        self.kind() == Some(OperationKind::Withdrawal)
    }

    pub fn is_balance_inquiry(&self) -> bool {
        self.kind() == Some(OperationKind::BalanceInquiry)
    }

    pub fn is_deposit(&self) -> bool {
        self.kind() == Some(OperationKind::Deposit)
    }
}

impl fmt::Display for ProcessingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
