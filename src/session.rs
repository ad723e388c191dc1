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

//! Per-card session lifecycle management.
//!
//! Sessions follow a one-way state machine:
//!
//! - `Active -> Expired` (time-driven, observed by a validity check or the
//!   background sweep)
//! - `Active -> Terminated` (explicit logout or forced security
//!   termination)
//!
//! Terminal states never transition further; a session is recreated, never
//! resurrected.
//!
//! The store is a [`DashMap`] keyed by session token with a
//! [`parking_lot::Mutex`] around each record, so mutations are atomic per
//! session key without serializing unrelated cards or ATMs behind one
//! lock.

use crate::base::{AtmId, CardToken, SessionToken};
use crate::config::AtmConfig;
use chrono::{DateTime, Duration, Utc};
use crossbeam::channel::{self, RecvTimeoutError, Sender};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// Session lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Active,
    Expired,
    Terminated,
    /// Reserved for sessions voided by security tooling outside the
    /// normal expiry/termination paths.
    Invalid,
}

#[derive(Debug)]
struct SessionState {
    card_token: CardToken,
    atm_id: AtmId,
    status: SessionStatus,
    started_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    terminated_at: Option<DateTime<Utc>>,
    termination_reason: Option<String>,
    call_count: u64,
}

impl SessionState {
    fn new(card_token: CardToken, atm_id: AtmId, now: DateTime<Utc>, timeout: Duration) -> Self {
        Self {
            card_token,
            atm_id,
            status: SessionStatus::Active,
            started_at: now,
            last_activity_at: now,
            expires_at: now + timeout,
            terminated_at: None,
            termination_reason: None,
            call_count: 0,
        }
    }

    /// A session is usable iff it is `Active`, unexpired, and was never
    /// terminated.
    fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Active
            && now < self.expires_at
            && self.terminated_at.is_none()
    }

    /// Flips `Active` to `Expired` once the deadline has passed.
    fn observe_expiry(&mut self, now: DateTime<Utc>) {
        if self.status == SessionStatus::Active && now >= self.expires_at {
            self.status = SessionStatus::Expired;
        }
    }

    fn extend(&mut self, now: DateTime<Utc>, timeout: Duration) {
        self.last_activity_at = now;
        self.expires_at = now + timeout;
        self.call_count += 1;
    }

    fn terminate(&mut self, now: DateTime<Utc>, reason: &str) {
        self.status = SessionStatus::Terminated;
        self.terminated_at = Some(now);
        self.termination_reason = Some(reason.to_owned());
    }
}

/// One session record; the inner mutex makes every mutation atomic with
/// respect to concurrent readers and writers of the same key.
#[derive(Debug)]
struct Session {
    inner: Mutex<SessionState>,
}

/// Point-in-time copy of a session record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub token: SessionToken,
    pub card_token: CardToken,
    pub atm_id: AtmId,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub terminated_at: Option<DateTime<Utc>>,
    pub termination_reason: Option<String>,
    pub call_count: u64,
}

/// Creates, validates, extends, expires, and terminates sessions.
#[derive(Debug)]
pub struct SessionManager {
    sessions: DashMap<SessionToken, Session>,
    timeout: Duration,
}

/// Mints an unguessable session token: 32 cryptographically random bytes,
/// URL-safe base64 without padding.
fn mint_token() -> SessionToken {
    let bytes: [u8; 32] = rand::random();
    SessionToken::new(base64_url::encode(&bytes))
}

impl SessionManager {
    pub fn new(config: &AtmConfig) -> Self {
        Self::with_timeout(Duration::seconds(config.session_timeout_secs as i64))
    }

    /// Builds a manager with an explicit idle timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of sessions currently held, in any state.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Creates a new active session bound to one card and one ATM.
    pub fn create(&self, atm_id: &AtmId, card_token: &CardToken) -> SessionToken {
        let token = mint_token();
        let now = Utc::now();
        self.sessions.insert(
            token.clone(),
            Session {
                inner: Mutex::new(SessionState::new(
                    card_token.clone(),
                    atm_id.clone(),
                    now,
                    self.timeout,
                )),
            },
        );
        info!(card = %card_token, atm = %atm_id, "session created");
        token
    }

    /// Whether the session is currently usable.
    ///
    /// Observing a passed deadline transitions the record to `Expired`
    /// even without the background sweep.
    pub fn is_valid(&self, token: &SessionToken) -> bool {
        let Some(session) = self.sessions.get(token) else {
            debug!(session = %token, "session not found");
            return false;
        };
        let now = Utc::now();
        let mut state = session.inner.lock();
        state.observe_expiry(now);
        state.is_active(now)
    }

    /// Slides the expiry window and counts the call.
    ///
    /// A no-op returning `false` when the session is absent or no longer
    /// active.
    pub fn extend(&self, token: &SessionToken) -> bool {
        let Some(session) = self.sessions.get(token) else {
            warn!(session = %token, "cannot extend missing session");
            return false;
        };
        let now = Utc::now();
        let mut state = session.inner.lock();
        state.observe_expiry(now);
        if !state.is_active(now) {
            warn!(session = %token, status = ?state.status, "cannot extend inactive session");
            return false;
        }
        state.extend(now, self.timeout);
        true
    }

    /// Terminates one session, recording the reason.
    ///
    /// Returns `false` if the session is absent or already in a terminal
    /// state.
    pub fn terminate(&self, token: &SessionToken, reason: &str) -> bool {
        let Some(session) = self.sessions.get(token) else {
            warn!(session = %token, "cannot terminate missing session");
            return false;
        };
        let now = Utc::now();
        let mut state = session.inner.lock();
        state.observe_expiry(now);
        if state.status != SessionStatus::Active {
            return false;
        }
        state.terminate(now, reason);
        info!(session = %token, reason, "session terminated");
        true
    }

    /// Terminates every active session bound to `card_token`.
    ///
    /// Used for security events such as a card block after repeated PIN
    /// failures. Returns the number of sessions terminated.
    pub fn terminate_all_for_card(&self, card_token: &CardToken, reason: &str) -> usize {
        let now = Utc::now();
        let mut terminated = 0;
        for entry in self.sessions.iter() {
            let mut state = entry.inner.lock();
            if state.card_token == *card_token && state.status == SessionStatus::Active {
                state.terminate(now, reason);
                terminated += 1;
            }
        }
        if terminated > 0 {
            info!(card = %card_token, terminated, reason, "sessions terminated for card");
        }
        terminated
    }

    /// Marks every session whose deadline has passed as `Expired`.
    ///
    /// Returns the number of sessions newly expired.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut expired = 0;
        for entry in self.sessions.iter() {
            let mut state = entry.inner.lock();
            if state.status == SessionStatus::Active && now >= state.expires_at {
                state.status = SessionStatus::Expired;
                expired += 1;
            }
        }
        if expired > 0 {
            info!(expired, "expired sessions swept");
        }
        expired
    }

    /// Card token the session is bound to, regardless of state.
    pub fn card_token_of(&self, token: &SessionToken) -> Option<CardToken> {
        self.sessions
            .get(token)
            .map(|session| session.inner.lock().card_token.clone())
    }

    /// Point-in-time copy of the session record.
    pub fn snapshot(&self, token: &SessionToken) -> Option<SessionSnapshot> {
        self.sessions.get(token).map(|session| {
            let state = session.inner.lock();
            SessionSnapshot {
                token: token.clone(),
                card_token: state.card_token.clone(),
                atm_id: state.atm_id.clone(),
                status: state.status,
                started_at: state.started_at,
                last_activity_at: state.last_activity_at,
                expires_at: state.expires_at,
                terminated_at: state.terminated_at,
                termination_reason: state.termination_reason.clone(),
                call_count: state.call_count,
            }
        })
    }
}

/// Owner handle for the background sweep thread; stops it on drop.
#[derive(Debug)]
pub struct SweeperHandle {
    stop: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Spawns the periodic expiry sweep on its own thread.
    ///
    /// The sweeper runs until the returned handle is dropped (or `stop` is
    /// called) or the manager itself is gone; it holds only a weak
    /// reference so it never keeps the store alive.
    pub fn spawn(manager: &Arc<SessionManager>, interval: std::time::Duration) -> Self {
        let weak = Arc::downgrade(manager);
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);

        let thread = std::thread::spawn(move || {
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => match weak.upgrade() {
                        Some(manager) => {
                            manager.sweep_expired();
                        }
                        None => break,
                    },
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        Self {
            stop: stop_tx,
            thread: Some(thread),
        }
    }

    /// Stops the sweeper and waits for the thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.stop.try_send(());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
