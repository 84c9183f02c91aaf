// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conventions: how an assembly's classes and cases are executed.

use crate::{
    behavior::{
        CaseBehavior, CaseBehaviorBuilder, CaseOrder, ClassBehavior, ClassBehaviorBuilder,
        SkipPredicate,
    },
    list::{Case, Skip},
    test_output::CaptureMode,
};

/// Describes how to execute classes and cases.
///
/// A convention bundles a [`ClassBehaviorBuilder`] and a [`CaseBehaviorBuilder`]. Building it
/// produces the [`ExecutionPlan`] a [`TestRunner`](crate::runner::TestRunner) runs with.
///
/// # Examples
///
/// ```
/// use conventest_runner::convention::Convention;
///
/// let mut convention = Convention::default();
/// convention
///     .class_execution
///     .create_instance_per_class()
///     .sort_cases(|a, b| a.name().cmp(b.name()));
/// convention.case_execution.skip_if(|case| case.name().ends_with("Slow"));
/// let plan = convention.build();
/// # let _ = plan;
/// ```
#[derive(Debug, Default)]
pub struct Convention {
    /// How classes are executed.
    pub class_execution: ClassBehaviorBuilder,

    /// How cases are executed.
    pub case_execution: CaseBehaviorBuilder,

    /// What is captured while a case is invoked. Defaults to the whole process's standard
    /// output and standard error.
    pub output_capture: CaptureMode,
}

impl Convention {
    /// Creates a new convention with the default behaviors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the behavior chains.
    pub fn build(self) -> ExecutionPlan {
        let (class_behavior, order) = self.class_execution.build();
        let (case_behavior, skip) = self.case_execution.build();
        ExecutionPlan {
            class_behavior,
            case_behavior,
            order,
            skip,
            output_capture: self.output_capture,
        }
    }
}

/// The built behavior chains of a [`Convention`].
pub struct ExecutionPlan {
    class_behavior: Box<dyn ClassBehavior>,
    case_behavior: Box<dyn CaseBehavior>,
    order: CaseOrder,
    skip: SkipPredicate,
    output_capture: CaptureMode,
}

impl ExecutionPlan {
    pub(crate) fn class_behavior(&self) -> &dyn ClassBehavior {
        &*self.class_behavior
    }

    pub(crate) fn case_behavior(&self) -> &dyn CaseBehavior {
        &*self.case_behavior
    }

    pub(crate) fn order(&self) -> &CaseOrder {
        &self.order
    }

    pub(crate) fn skip(&self, case: &Case) -> Option<Skip> {
        (self.skip)(case)
    }

    pub(crate) fn output_capture(&self) -> CaptureMode {
        self.output_capture
    }
}

impl Default for ExecutionPlan {
    fn default() -> Self {
        Convention::default().build()
    }
}

impl std::fmt::Debug for ExecutionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionPlan")
            .field("order", &self.order)
            .field("output_capture", &self.output_capture)
            .finish_non_exhaustive()
    }
}
