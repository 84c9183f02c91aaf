// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Instance lifecycle strategies: the innermost class behaviors.

use super::class::ClassBehavior;
use crate::{
    execution::ClassExecution,
    failure::{Failure, FailureStage, run_guarded},
    list::{Fixture, TestClass},
};
use tracing::trace;

type Factory = Box<dyn Fn(&TestClass) -> Result<Box<dyn Fixture>, Failure>>;

/// How a lifecycle strategy creates instances.
pub enum InstanceFactory {
    /// Use the class's own constructor. Failures are labelled
    /// [`FailureStage::Construction`].
    Default,

    /// Use a user-supplied factory. Failures are labelled [`FailureStage::CustomFactory`].
    Custom(Factory),
}

impl InstanceFactory {
    /// Creates a factory from a function.
    pub fn custom<F>(factory: F) -> Self
    where
        F: Fn(&TestClass) -> Result<Box<dyn Fixture>, Failure> + 'static,
    {
        Self::Custom(Box::new(factory))
    }

    /// Constructs an instance of `class`. Panics are caught and reported as failures.
    pub fn construct(&self, class: &TestClass) -> Result<Box<dyn Fixture>, Failure> {
        trace!(class = %class.name(), "constructing instance");
        match self {
            Self::Default => run_guarded(FailureStage::Construction, || class.construct()),
            Self::Custom(factory) => run_guarded(FailureStage::CustomFactory, || factory(class)),
        }
    }
}

impl std::fmt::Debug for InstanceFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

fn dispose(class: &TestClass, mut instance: Box<dyn Fixture>) -> Result<(), Failure> {
    trace!(class = %class.name(), "disposing instance");
    run_guarded(FailureStage::Disposal, move || instance.dispose())
}

/// Constructs a fresh instance immediately before each case and disposes it immediately after.
///
/// A skipped case is never constructed. If construction fails, the case fails with the
/// construction failure and is not run. A disposal failure is recorded against the case that
/// used the instance.
#[derive(Debug)]
pub struct CreateInstancePerCase {
    factory: InstanceFactory,
}

impl CreateInstancePerCase {
    /// Creates a new per-case strategy.
    pub fn new(factory: InstanceFactory) -> Self {
        Self { factory }
    }
}

impl ClassBehavior for CreateInstancePerCase {
    fn execute(&self, execution: &mut ClassExecution<'_>) {
        for index in 0..execution.case_count() {
            if execution.is_aborted() {
                return;
            }
            let case = &execution.cases()[index];
            if case.is_completed() {
                continue;
            }
            if case.skip().is_some() {
                execution.skip_case(index);
                continue;
            }

            let class = execution.class();
            let mut instance = match self.factory.construct(class) {
                Ok(instance) => instance,
                Err(failure) => {
                    execution.fail_case(index, failure);
                    continue;
                }
            };
            execution.run_case(index, instance.as_mut());
            if let Err(failure) = dispose(class, instance) {
                execution.cases_mut()[index].fail(failure);
            }
            execution.complete_case(index);
        }
    }
}

/// Constructs one instance before the first case and disposes it after the last.
///
/// If every case is skipped, no instance is constructed. If construction fails, every case that
/// has not completed fails with the construction failure. A disposal failure is reported as a
/// class-level failure.
#[derive(Debug)]
pub struct CreateInstancePerClass {
    factory: InstanceFactory,
}

impl CreateInstancePerClass {
    /// Creates a new per-class strategy.
    pub fn new(factory: InstanceFactory) -> Self {
        Self { factory }
    }
}

impl ClassBehavior for CreateInstancePerClass {
    fn execute(&self, execution: &mut ClassExecution<'_>) {
        let all_skipped = execution
            .cases()
            .iter()
            .filter(|case| !case.is_completed())
            .all(|case| case.skip().is_some());
        if all_skipped {
            for index in 0..execution.case_count() {
                execution.skip_case(index);
            }
            return;
        }

        let class = execution.class();
        let mut instance = match self.factory.construct(class) {
            Ok(instance) => instance,
            Err(failure) => {
                execution.fail_remaining_cases(failure);
                return;
            }
        };

        for index in 0..execution.case_count() {
            if execution.is_aborted() {
                break;
            }
            let case = &execution.cases()[index];
            if case.is_completed() {
                continue;
            }
            if case.skip().is_some() {
                execution.skip_case(index);
                continue;
            }
            execution.run_case(index, instance.as_mut());
            execution.complete_case(index);
        }

        if let Err(failure) = dispose(class, instance) {
            execution.report_class_failure(failure);
        }
    }
}
