// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{execution::CaseExecution, list::Case};
use rand::{RngCore, seq::SliceRandom};
use std::{cell::RefCell, cmp::Ordering};

type CustomOrder = Box<dyn Fn(&mut [CaseExecution<'_>])>;

/// The policy used to order a class's cases before any of them run.
///
/// Ordering covers every selected case, including ones that will be skipped.
pub enum CaseOrder {
    /// Run cases in declaration order.
    Declaration,

    /// Shuffle cases with a random source.
    Shuffle(RefCell<Box<dyn RngCore>>),

    /// Stable-sort cases with a comparator.
    Sort(Box<dyn Fn(&Case, &Case) -> Ordering>),

    /// A user-supplied ordering function.
    Custom(CustomOrder),
}

impl CaseOrder {
    /// Creates a shuffling order.
    ///
    /// The same random source is used for every class, so a seeded source gives a reproducible
    /// order for the whole run.
    pub fn shuffle(rng: impl RngCore + 'static) -> Self {
        Self::Shuffle(RefCell::new(Box::new(rng)))
    }

    /// Creates a sorting order.
    pub fn sort<F>(compare: F) -> Self
    where
        F: Fn(&Case, &Case) -> Ordering + 'static,
    {
        Self::Sort(Box::new(compare))
    }

    /// Creates a custom order.
    pub fn custom<F>(order: F) -> Self
    where
        F: Fn(&mut [CaseExecution<'_>]) + 'static,
    {
        Self::Custom(Box::new(order))
    }

    /// Reorders `cases` in place.
    pub fn apply(&self, cases: &mut [CaseExecution<'_>]) {
        match self {
            Self::Declaration => {}
            Self::Shuffle(rng) => cases.shuffle(&mut **rng.borrow_mut()),
            Self::Sort(compare) => cases.sort_by(|a, b| compare(a.case(), b.case())),
            Self::Custom(order) => order(cases),
        }
    }
}

impl std::fmt::Debug for CaseOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Declaration => f.write_str("Declaration"),
            Self::Shuffle(_) => f.write_str("Shuffle(..)"),
            Self::Sort(_) => f.write_str("Sort(..)"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
