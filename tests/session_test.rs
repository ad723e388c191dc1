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

//! Session manager tests under concurrent access.
//!
//! Uses parking_lot's deadlock detector (the `deadlock_detection` dev
//! feature) to verify the per-key locking pattern never cycles.

use cashpoint_rs::{AtmConfig, AtmId, CardToken, SessionManager, SessionStatus, SweeperHandle};
use chrono::Duration;
use parking_lot::deadlock;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration as StdDuration;

fn atm() -> AtmId {
    AtmId::new("ATM-001")
}

fn card(n: usize) -> CardToken {
    CardToken::new(format!("card-{n}"))
}

/// Panics if any deadlock was detected while `f` ran.
fn assert_deadlock_free(f: impl FnOnce()) {
    f();
    let deadlocks = deadlock::check_deadlock();
    assert!(deadlocks.is_empty(), "detected {} deadlocks", deadlocks.len());
}

#[test]
fn concurrent_extends_count_every_call() {
    let manager = Arc::new(SessionManager::new(&AtmConfig::default()));
    let token = manager.create(&atm(), &card(1));

    assert_deadlock_free(|| {
        thread::scope(|scope| {
            for _ in 0..8 {
                let manager = Arc::clone(&manager);
                let token = token.clone();
                scope.spawn(move || {
                    for _ in 0..250 {
                        assert!(manager.extend(&token));
                    }
                });
            }
        });
    });

    assert_eq!(manager.snapshot(&token).unwrap().call_count, 2000);
}

#[test]
fn unrelated_sessions_extend_in_parallel() {
    let manager = Arc::new(SessionManager::new(&AtmConfig::default()));
    let tokens: Vec<_> = (0..16).map(|n| manager.create(&atm(), &card(n))).collect();

    assert_deadlock_free(|| {
        thread::scope(|scope| {
            for token in &tokens {
                let manager = Arc::clone(&manager);
                scope.spawn(move || {
                    for _ in 0..100 {
                        assert!(manager.extend(token));
                        assert!(manager.is_valid(token));
                    }
                });
            }
        });
    });

    for token in &tokens {
        assert_eq!(manager.snapshot(token).unwrap().call_count, 100);
    }
}

#[test]
fn termination_races_extension_without_corruption() {
    let manager = Arc::new(SessionManager::new(&AtmConfig::default()));
    let token = manager.create(&atm(), &card(1));
    let terminated = Arc::new(AtomicUsize::new(0));

    assert_deadlock_free(|| {
        thread::scope(|scope| {
            for _ in 0..4 {
                let manager = Arc::clone(&manager);
                let token = token.clone();
                scope.spawn(move || {
                    for _ in 0..100 {
                        // Extends silently stop succeeding once terminated.
                        manager.extend(&token);
                    }
                });
            }
            let manager = Arc::clone(&manager);
            let token = token.clone();
            let terminated = Arc::clone(&terminated);
            scope.spawn(move || {
                thread::sleep(StdDuration::from_millis(1));
                if manager.terminate(&token, "security stop") {
                    terminated.fetch_add(1, Ordering::Relaxed);
                }
            });
        });
    });

    // Exactly one transition to Terminated, never more.
    assert_eq!(terminated.load(Ordering::Relaxed), 1);
    let snapshot = manager.snapshot(&token).unwrap();
    assert_eq!(snapshot.status, SessionStatus::Terminated);
    assert!(!manager.extend(&token));
}

#[test]
fn bulk_termination_during_traffic_only_hits_the_card() {
    let manager = Arc::new(SessionManager::new(&AtmConfig::default()));
    let victim_sessions: Vec<_> = (0..4).map(|_| manager.create(&atm(), &card(1))).collect();
    let bystander = manager.create(&atm(), &card(2));

    assert_deadlock_free(|| {
        thread::scope(|scope| {
            {
                let manager = Arc::clone(&manager);
                let bystander = bystander.clone();
                scope.spawn(move || {
                    for _ in 0..500 {
                        assert!(manager.is_valid(&bystander));
                    }
                });
            }
            let manager = Arc::clone(&manager);
            scope.spawn(move || {
                manager.terminate_all_for_card(&card(1), "card blocked");
            });
        });
    });

    for session in &victim_sessions {
        assert_eq!(
            manager.snapshot(session).unwrap().status,
            SessionStatus::Terminated
        );
        assert_eq!(
            manager.snapshot(session).unwrap().termination_reason.as_deref(),
            Some("card blocked")
        );
    }
    assert!(manager.is_valid(&bystander));
}

#[test]
fn background_sweeper_marks_expirations() {
    let manager = Arc::new(SessionManager::with_timeout(Duration::milliseconds(30)));
    let token = manager.create(&atm(), &card(1));

    let sweeper = SweeperHandle::spawn(&manager, StdDuration::from_millis(10));
    thread::sleep(StdDuration::from_millis(120));

    // The sweep flipped the record without any validity check touching it.
    assert_eq!(
        manager.snapshot(&token).unwrap().status,
        SessionStatus::Expired
    );
    sweeper.stop();
}

#[test]
fn sweeper_handle_drop_stops_the_thread() {
    let manager = Arc::new(SessionManager::with_timeout(Duration::seconds(300)));
    {
        let _sweeper = SweeperHandle::spawn(&manager, StdDuration::from_millis(5));
        thread::sleep(StdDuration::from_millis(20));
    }
    // Handle dropped; creating sessions afterwards stays uneventful.
    let token = manager.create(&atm(), &card(1));
    thread::sleep(StdDuration::from_millis(20));
    assert!(manager.is_valid(&token));
}

#[test]
fn sweeper_survives_manager_being_dropped_elsewhere() {
    let manager = Arc::new(SessionManager::with_timeout(Duration::seconds(300)));
    let sweeper = SweeperHandle::spawn(&manager, StdDuration::from_millis(5));
    drop(manager);
    // The weak reference fails to upgrade and the thread exits on its own;
    // stopping the handle must not hang.
    thread::sleep(StdDuration::from_millis(25));
    sweeper.stop();
}

#[test]
fn expired_session_stays_expired_after_extend_attempts() {
    let manager = SessionManager::with_timeout(Duration::milliseconds(20));
    let token = manager.create(&atm(), &card(1));
    thread::sleep(StdDuration::from_millis(40));

    assert!(!manager.extend(&token));
    assert!(!manager.extend(&token));
    let snapshot = manager.snapshot(&token).unwrap();
    assert_eq!(snapshot.status, SessionStatus::Expired);
    assert_eq!(snapshot.call_count, 0);
}

#[test]
fn many_sessions_for_one_card_all_fall_together() {
    let manager = SessionManager::new(&AtmConfig::default());
    let sessions: Vec<_> = (0..32).map(|_| manager.create(&atm(), &card(7))).collect();

    assert_eq!(manager.terminate_all_for_card(&card(7), "pin abuse"), 32);
    assert!(sessions.iter().all(|s| !manager.is_valid(s)));
    // A second bulk termination finds nothing active.
    assert_eq!(manager.terminate_all_for_card(&card(7), "pin abuse"), 0);
}
