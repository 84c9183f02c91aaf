// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    execution::CaseExecution,
    failure::{Failure, FailureStage, run_guarded},
    list::{Case, Fixture, Skip},
};

/// A step in the chain that runs a single case against an instance.
pub trait CaseBehavior {
    /// Runs the case.
    ///
    /// Behaviors report failures by calling [`CaseExecution::fail`]; nothing is returned.
    fn execute(&self, case: &mut CaseExecution<'_>, instance: &mut dyn Fixture);
}

/// A handle to the rest of a case behavior chain, passed to wrapping behaviors.
#[derive(Copy, Clone)]
pub struct CaseNext<'b> {
    inner: &'b dyn CaseBehavior,
}

impl CaseNext<'_> {
    /// Runs the rest of the chain.
    pub fn run(self, case: &mut CaseExecution<'_>, instance: &mut dyn Fixture) {
        self.inner.execute(case, instance);
    }
}

impl std::fmt::Debug for CaseNext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaseNext").finish_non_exhaustive()
    }
}

/// A user-supplied wrapping behavior for a case.
pub type CaseAction =
    Box<dyn Fn(&mut CaseExecution<'_>, &mut dyn Fixture, CaseNext<'_>) -> Result<(), Failure>>;

/// Decides whether a case is skipped, and why.
pub type SkipPredicate = Box<dyn Fn(&Case) -> Option<Skip>>;

/// Invokes the case body.
struct InvokeCase;

impl CaseBehavior for InvokeCase {
    fn execute(&self, case: &mut CaseExecution<'_>, instance: &mut dyn Fixture) {
        let result = run_guarded(FailureStage::CaseInvocation, || case.invoke(instance));
        if let Err(failure) = result {
            case.fail(failure);
        }
    }
}

struct CaseWrapBehavior {
    action: CaseAction,
    inner: Box<dyn CaseBehavior>,
}

impl CaseBehavior for CaseWrapBehavior {
    fn execute(&self, case: &mut CaseExecution<'_>, instance: &mut dyn Fixture) {
        let next = CaseNext {
            inner: &*self.inner,
        };
        let result = run_guarded(FailureStage::CaseBehavior, || {
            (self.action)(case, instance, next)
        });
        // A case wrap failure belongs to this case only.
        if let Err(failure) = result {
            case.fail(failure);
        }
    }
}

/// Builds the case behavior chain and skip predicate for a convention.
///
/// By default, a case is skipped if and only if it carries a skip marker.
pub struct CaseBehaviorBuilder {
    wraps: Vec<CaseAction>,
    skip: SkipPredicate,
}

impl Default for CaseBehaviorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CaseBehaviorBuilder {
    /// Creates a new builder with no wraps and the default skip predicate.
    pub fn new() -> Self {
        Self {
            wraps: Vec::new(),
            skip: Box::new(|case: &Case| case.skip_marker().cloned()),
        }
    }

    /// Adds a wrapping behavior around each case.
    ///
    /// Wraps run in the order they are added, each nested inside the previous one. A failure
    /// returned by `action` is recorded against the case.
    pub fn wrap<F>(&mut self, action: F) -> &mut Self
    where
        F: Fn(&mut CaseExecution<'_>, &mut dyn Fixture, CaseNext<'_>) -> Result<(), Failure>
            + 'static,
    {
        self.wraps.push(Box::new(action));
        self
    }

    /// Adds a wrapping behavior that runs `set_up` before each case.
    pub fn set_up<F>(&mut self, set_up: F) -> &mut Self
    where
        F: Fn(&mut CaseExecution<'_>, &mut dyn Fixture) -> Result<(), Failure> + 'static,
    {
        self.wrap(move |case, instance, next| {
            set_up(case, instance)?;
            next.run(case, instance);
            Ok(())
        })
    }

    /// Adds a wrapping behavior that runs `set_up` before each case and `tear_down` after it.
    ///
    /// `tear_down` does not run if `set_up` fails.
    pub fn set_up_tear_down<S, T>(&mut self, set_up: S, tear_down: T) -> &mut Self
    where
        S: Fn(&mut CaseExecution<'_>, &mut dyn Fixture) -> Result<(), Failure> + 'static,
        T: Fn(&mut CaseExecution<'_>, &mut dyn Fixture) -> Result<(), Failure> + 'static,
    {
        self.wrap(move |case, instance, next| {
            set_up(case, instance)?;
            next.run(case, instance);
            tear_down(case, instance)
        })
    }

    /// Replaces the skip predicate. Cases for which `predicate` returns `Some` are skipped.
    ///
    /// The predicate replaces the default, so skip markers are only honored if `predicate`
    /// consults [`Case::skip_marker`].
    pub fn skip<F>(&mut self, predicate: F) -> &mut Self
    where
        F: Fn(&Case) -> Option<Skip> + 'static,
    {
        self.skip = Box::new(predicate);
        self
    }

    /// Replaces the skip predicate with one that skips, without a reason, every case for which
    /// `predicate` returns true.
    pub fn skip_if<F>(&mut self, predicate: F) -> &mut Self
    where
        F: Fn(&Case) -> bool + 'static,
    {
        self.skip(move |case| predicate(case).then(Skip::new))
    }

    pub(crate) fn build(self) -> (Box<dyn CaseBehavior>, SkipPredicate) {
        let innermost: Box<dyn CaseBehavior> = Box::new(InvokeCase);
        let behavior = self
            .wraps
            .into_iter()
            .rev()
            .fold(innermost, |inner, action| {
                Box::new(CaseWrapBehavior { action, inner }) as Box<dyn CaseBehavior>
            });
        (behavior, self.skip)
    }
}

impl std::fmt::Debug for CaseBehaviorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaseBehaviorBuilder")
            .field("wraps", &self.wraps.len())
            .finish_non_exhaustive()
    }
}
