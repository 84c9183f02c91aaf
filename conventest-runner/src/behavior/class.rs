// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{
    lifecycle::{CreateInstancePerCase, CreateInstancePerClass, InstanceFactory},
    order::CaseOrder,
};
use crate::{
    execution::{CaseExecution, ClassExecution},
    failure::{Failure, FailureStage, run_guarded},
    list::{Case, Fixture, TestClass},
};
use rand::RngCore;
use std::cmp::Ordering;
use tracing::debug;

/// A step in the chain that executes a class.
pub trait ClassBehavior {
    /// Executes the class.
    ///
    /// Behaviors report failures by failing cases on `execution`; nothing is returned.
    fn execute(&self, execution: &mut ClassExecution<'_>);
}

/// A handle to the rest of a class behavior chain, passed to wrapping behaviors.
#[derive(Copy, Clone)]
pub struct ClassNext<'b> {
    inner: &'b dyn ClassBehavior,
}

impl ClassNext<'_> {
    /// Runs the rest of the chain.
    pub fn run(self, execution: &mut ClassExecution<'_>) {
        self.inner.execute(execution);
    }
}

impl std::fmt::Debug for ClassNext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassNext").finish_non_exhaustive()
    }
}

/// A user-supplied wrapping behavior for a class.
///
/// The action receives the class execution and a handle to the rest of the chain. It may run
/// code before and after calling [`ClassNext::run`], or not call it at all.
pub type ClassAction =
    Box<dyn Fn(&mut ClassExecution<'_>, ClassNext<'_>) -> Result<(), Failure>>;

struct WrapBehavior {
    action: ClassAction,
    inner: Box<dyn ClassBehavior>,
}

impl ClassBehavior for WrapBehavior {
    fn execute(&self, execution: &mut ClassExecution<'_>) {
        let next = ClassNext {
            inner: &*self.inner,
        };
        let result = run_guarded(FailureStage::ClassBehavior, || {
            (self.action)(execution, next)
        });
        if let Err(failure) = result {
            debug!(
                class = %execution.class().name(),
                %failure,
                "class behavior failed, failing remaining cases",
            );
            execution.fail_remaining_cases(failure);
        }
    }
}

/// Builds the class behavior chain and case ordering for a convention.
///
/// By default, a fresh instance is constructed for every case and cases run in declaration
/// order.
pub struct ClassBehaviorBuilder {
    innermost: Box<dyn ClassBehavior>,
    wraps: Vec<ClassAction>,
    order: CaseOrder,
}

impl Default for ClassBehaviorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassBehaviorBuilder {
    /// Creates a new builder with the default lifecycle and ordering.
    pub fn new() -> Self {
        Self {
            innermost: Box::new(CreateInstancePerCase::new(InstanceFactory::Default)),
            wraps: Vec::new(),
            order: CaseOrder::Declaration,
        }
    }

    /// Replaces the innermost behavior of the chain.
    pub fn set_instance_strategy(&mut self, strategy: impl ClassBehavior + 'static) -> &mut Self {
        self.innermost = Box::new(strategy);
        self
    }

    /// Constructs a fresh instance for every case with the class's own constructor, and disposes
    /// it right after the case.
    pub fn create_instance_per_case(&mut self) -> &mut Self {
        self.set_instance_strategy(CreateInstancePerCase::new(InstanceFactory::Default))
    }

    /// Like [`create_instance_per_case`](Self::create_instance_per_case), but instances are made
    /// by `factory`.
    pub fn create_instance_per_case_with<F>(&mut self, factory: F) -> &mut Self
    where
        F: Fn(&TestClass) -> Result<Box<dyn Fixture>, Failure> + 'static,
    {
        self.set_instance_strategy(CreateInstancePerCase::new(InstanceFactory::custom(
            factory,
        )))
    }

    /// Constructs one instance, with the class's own constructor, shared by every case in the
    /// class.
    pub fn create_instance_per_class(&mut self) -> &mut Self {
        self.set_instance_strategy(CreateInstancePerClass::new(InstanceFactory::Default))
    }

    /// Like [`create_instance_per_class`](Self::create_instance_per_class), but the instance is
    /// made by `factory`.
    pub fn create_instance_per_class_with<F>(&mut self, factory: F) -> &mut Self
    where
        F: Fn(&TestClass) -> Result<Box<dyn Fixture>, Failure> + 'static,
    {
        self.set_instance_strategy(CreateInstancePerClass::new(InstanceFactory::custom(
            factory,
        )))
    }

    /// Adds a wrapping behavior.
    ///
    /// Wraps run in the order they are added, each nested inside the previous one. If `action`
    /// fails, every case in the class that has not completed yet is failed with its failure.
    pub fn wrap<F>(&mut self, action: F) -> &mut Self
    where
        F: Fn(&mut ClassExecution<'_>, ClassNext<'_>) -> Result<(), Failure> + 'static,
    {
        self.wraps.push(Box::new(action));
        self
    }

    /// Adds a wrapping behavior that runs `set_up` before the rest of the chain.
    pub fn set_up<F>(&mut self, set_up: F) -> &mut Self
    where
        F: Fn(&mut ClassExecution<'_>) -> Result<(), Failure> + 'static,
    {
        self.wrap(move |execution, next| {
            set_up(execution)?;
            next.run(execution);
            Ok(())
        })
    }

    /// Adds a wrapping behavior that runs `set_up` before the rest of the chain and `tear_down`
    /// after it.
    ///
    /// `tear_down` does not run if `set_up` fails.
    pub fn set_up_tear_down<S, T>(&mut self, set_up: S, tear_down: T) -> &mut Self
    where
        S: Fn(&mut ClassExecution<'_>) -> Result<(), Failure> + 'static,
        T: Fn(&mut ClassExecution<'_>) -> Result<(), Failure> + 'static,
    {
        self.wrap(move |execution, next| {
            set_up(execution)?;
            next.run(execution);
            tear_down(execution)
        })
    }

    /// Sets the policy used to order each class's cases before any of them run.
    pub fn order_cases<F>(&mut self, order: F) -> &mut Self
    where
        F: Fn(&mut [CaseExecution<'_>]) + 'static,
    {
        self.order = CaseOrder::custom(order);
        self
    }

    /// Shuffles each class's cases with `rng`.
    pub fn shuffle_cases(&mut self, rng: impl RngCore + 'static) -> &mut Self {
        self.order = CaseOrder::shuffle(rng);
        self
    }

    /// Sorts each class's cases with `compare`. The sort is stable.
    pub fn sort_cases<F>(&mut self, compare: F) -> &mut Self
    where
        F: Fn(&Case, &Case) -> Ordering + 'static,
    {
        self.order = CaseOrder::sort(compare);
        self
    }

    /// Folds the wraps around the innermost behavior, returning the composed chain and the case
    /// ordering.
    pub(crate) fn build(self) -> (Box<dyn ClassBehavior>, CaseOrder) {
        let behavior = self
            .wraps
            .into_iter()
            .rev()
            .fold(self.innermost, |inner, action| {
                Box::new(WrapBehavior { action, inner }) as Box<dyn ClassBehavior>
            });
        (behavior, self.order)
    }
}

impl std::fmt::Debug for ClassBehaviorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassBehaviorBuilder")
            .field("wraps", &self.wraps.len())
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}
