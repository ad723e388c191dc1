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

//! Benchmarks for the denomination distributor.
//!
//! Run with: cargo bench
//!
//! Benchmarks include:
//! - Typical withdrawal amounts against a healthy cassette loadout
//! - Substitution-heavy cases where large notes are exhausted
//! - Infeasible amounts (full search space exhaustion)
//! - Scaling with amount size

use cashpoint_rs::{CashInventory, distribute};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

// =============================================================================
// Helper Functions
// =============================================================================

fn healthy_inventory() -> CashInventory {
    CashInventory::with_notes(&[(2000, 50), (500, 100), (200, 200), (100, 500)])
}

fn depleted_inventory() -> CashInventory {
    // Large notes nearly gone; most requests need substitution.
    CashInventory::with_notes(&[(2000, 1), (500, 3), (200, 10), (100, 40)])
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_typical_withdrawal(c: &mut Criterion) {
    let inventory = healthy_inventory();
    c.bench_function("distribute_typical_4300", |b| {
        b.iter(|| distribute(black_box(&inventory), black_box(4300)))
    });
}

fn bench_substitution_heavy(c: &mut Criterion) {
    let inventory = depleted_inventory();
    c.bench_function("distribute_depleted_6300", |b| {
        b.iter(|| distribute(black_box(&inventory), black_box(6300)))
    });
}

fn bench_infeasible(c: &mut Criterion) {
    // Only 2000-notes: odd hundreds are never dispensable, so the DP
    // exhausts the whole space before giving up.
    let inventory = CashInventory::with_notes(&[(2000, 10)]);
    c.bench_function("distribute_infeasible_4300", |b| {
        b.iter(|| distribute(black_box(&inventory), black_box(4300)))
    });
}

fn bench_amount_scaling(c: &mut Criterion) {
    let inventory = healthy_inventory();
    let mut group = c.benchmark_group("distribute_amount_scaling");
    for amount in [500u64, 2000, 8000, 20000] {
        group.bench_with_input(BenchmarkId::from_parameter(amount), &amount, |b, &amount| {
            b.iter(|| distribute(black_box(&inventory), black_box(amount)))
        });
    }
    group.finish();
}

criterion_group!(
    distributor,
    bench_typical_withdrawal,
    bench_substitution_heavy,
    bench_infeasible,
    bench_amount_scaling,
);

criterion_main!(distributor);
