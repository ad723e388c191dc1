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

//! Generic request-processing pipeline.
//!
//! A [`Pipeline`] is an immutable ordered sequence of shared [`Step`]
//! objects, built once at startup. Steps are stateless; all request-scoped
//! mutable state lives in the context value threaded through the run. This
//! replaces the classic chain-of-responsibility "next" pointer, which is
//! unsound when singleton steps are rewired per call under concurrency:
//! two differently-shaped chains built from the same shared step objects
//! would race on the links. Here the topology is data owned by the
//! pipeline, and the same step instance can appear in any number of
//! pipelines.
//!
//! # Continuation and merge rule
//!
//! For each step in order:
//! - `success + continue` — move on; the last such outcome is returned if
//!   nothing overrides it.
//! - `success + stop` — terminal success; nothing after it runs.
//! - `failure + stop` — terminal failure; nothing after it runs.
//! - `failure + continue` — the first such outcome is *pinned* as the
//!   pipeline's result, while the remaining steps still execute for their
//!   side effects. Their outcomes are discarded.
//!
//! The discard in the last case is deliberate legacy behavior and is
//! selected explicitly through [`FailurePolicy::ReportFirst`];
//! [`FailurePolicy::Halt`] turns every failure into a short-circuit
//! instead, skipping downstream side effects.

use crate::error::ServiceError;
use crate::outcome::{ErrorCode, StepOutcome};
use std::sync::Arc;
use tracing::{debug, error};

/// One unit of validation/enrichment in a pipeline.
///
/// Implementations must be stateless with respect to the request: anything
/// request-specific is read from and written to the context `C`. Steps are
/// shared across concurrent runs and across pipeline variants.
pub trait Step<C>: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Applies this step to the request context.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] only for collaborator infrastructure
    /// failures; domain failures are expressed as [`StepOutcome`] values.
    fn apply(&self, ctx: &mut C) -> Result<StepOutcome, ServiceError>;
}

/// What to do when a step reports failure-but-continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Pin the first failure as the pipeline result but keep executing the
    /// remaining steps for their side effects (legacy chain semantics).
    #[default]
    ReportFirst,

    /// Treat any failure as terminal: return it immediately and skip the
    /// remaining steps entirely.
    Halt,
}

/// Immutable ordered sequence of steps plus the chain-boundary error
/// conversion.
pub struct Pipeline<C> {
    steps: Vec<Arc<dyn Step<C>>>,
    boundary_message: &'static str,
    boundary_code: ErrorCode,
    policy: FailurePolicy,
}

impl<C> Pipeline<C> {
    /// Builds a pipeline over `steps`, converting collaborator faults into
    /// a failure outcome carrying `boundary_code`.
    pub fn new(
        boundary_message: &'static str,
        boundary_code: ErrorCode,
        steps: Vec<Arc<dyn Step<C>>>,
    ) -> Self {
        Self {
            steps,
            boundary_message,
            boundary_code,
            policy: FailurePolicy::ReportFirst,
        }
    }

    /// Overrides the soft-failure policy.
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs the pipeline over `ctx` and returns the aggregated outcome.
    ///
    /// Collaborator faults ([`ServiceError`]) are caught here and converted
    /// into a failure outcome with this pipeline's boundary code, so the
    /// caller always receives an outcome.
    pub fn run(&self, ctx: &mut C) -> StepOutcome {
        let mut pinned: Option<StepOutcome> = None;
        let mut last = StepOutcome::success();

        for step in &self.steps {
            let outcome = match step.apply(ctx) {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(step = step.name(), %err, "collaborator fault in pipeline");
                    return StepOutcome::failure(self.boundary_message, self.boundary_code);
                }
            };

            debug!(
                step = step.name(),
                success = outcome.is_success(),
                should_continue = outcome.should_continue(),
                "step completed"
            );

            if !outcome.is_success() {
                match self.policy {
                    FailurePolicy::Halt => return outcome,
                    FailurePolicy::ReportFirst => {
                        if pinned.is_none() {
                            pinned = Some(outcome.clone());
                        }
                    }
                }
            }

            let stop = !outcome.should_continue();
            last = outcome;
            if stop {
                break;
            }
        }

        pinned.unwrap_or(last)
    }
}
