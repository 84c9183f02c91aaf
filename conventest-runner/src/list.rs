// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The tests the runner executes.
//!
//! Deciding which functions are tests is up to the caller. The runner consumes a
//! [`TestAssembly`]: an ordered list of [`TestClass`]es, each holding an ordered list of cases.
//! A test class is a [`Fixture`] type together with its case bodies, each of which takes
//! `&mut` access to an instance of the fixture.

use crate::failure::{Failure, FailureStage};
use conventest_metadata::MethodGroup;
use debug_ignore::DebugIgnore;
use smol_str::SmolStr;
use std::{any::Any, marker::PhantomData};

/// A test class instance.
///
/// Instances are created by the active lifecycle strategy and disposed when the strategy is done
/// with them. [`dispose`](Self::dispose) is always called exactly once for each instance that was
/// successfully constructed.
pub trait Fixture: Any {
    /// Releases the resources held by this instance.
    fn dispose(&mut self) -> Result<(), Failure> {
        Ok(())
    }
}

pub(crate) type Constructor = Box<dyn Fn() -> Result<Box<dyn Fixture>, Failure>>;
pub(crate) type CaseBody = Box<dyn Fn(&mut dyn Fixture) -> Result<(), Failure>>;

/// A case's marker requesting that it be skipped.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Skip {
    reason: Option<String>,
}

impl Skip {
    /// Creates a skip marker with no reason.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a skip marker with the given reason.
    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
        }
    }

    /// Returns the reason for skipping, if one was given.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

/// A test case: one method of a test class.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Case {
    method_group: MethodGroup,
    skip: Option<Skip>,
}

impl Case {
    /// Returns the identity of this case.
    pub fn method_group(&self) -> &MethodGroup {
        &self.method_group
    }

    /// Returns the name of the class this case belongs to.
    pub fn class(&self) -> &str {
        self.method_group.class()
    }

    /// Returns the method name of this case.
    pub fn name(&self) -> &str {
        self.method_group.method()
    }

    /// Returns the skip marker declared on this case, if any.
    pub fn skip_marker(&self) -> Option<&Skip> {
        self.skip.as_ref()
    }
}

/// A case along with the body that runs it.
#[derive(Debug)]
pub struct TestMethod {
    case: Case,
    body: DebugIgnore<CaseBody>,
}

impl TestMethod {
    /// Returns the case this method runs.
    pub fn case(&self) -> &Case {
        &self.case
    }

    pub(crate) fn invoke(&self, instance: &mut dyn Fixture) -> Result<(), Failure> {
        (self.body.0)(instance)
    }
}

/// A test class: a fixture type along with its cases, in declaration order.
#[derive(Debug)]
pub struct TestClass {
    name: SmolStr,
    type_name: &'static str,
    constructor: DebugIgnore<Option<Constructor>>,
    methods: Vec<TestMethod>,
}

impl TestClass {
    /// Starts building a test class with the given name, whose instances have type `T`.
    pub fn builder<T: Fixture>(name: impl Into<SmolStr>) -> TestClassBuilder<T> {
        TestClassBuilder {
            name: name.into(),
            constructor: None,
            methods: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Returns the name of this class.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the Rust type name of this class's fixture.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the methods of this class, in declaration order.
    pub fn methods(&self) -> &[TestMethod] {
        &self.methods
    }

    /// Returns the cases of this class, in declaration order.
    pub fn cases(&self) -> impl Iterator<Item = &Case> {
        self.methods.iter().map(TestMethod::case)
    }

    /// Constructs an instance of this class with its own constructor.
    ///
    /// Panics raised by the constructor are not caught here; lifecycle strategies call this
    /// within a guarded section.
    pub fn construct(&self) -> Result<Box<dyn Fixture>, Failure> {
        match &*self.constructor {
            Some(constructor) => constructor(),
            None => Err(Failure::with_type(
                "MissingConstructor",
                format!(
                    "class `{}` has no constructor; provide one or use a custom factory",
                    self.name
                ),
            )
            .at_stage(FailureStage::Construction)),
        }
    }
}

/// A builder for a [`TestClass`].
///
/// Created by [`TestClass::builder`].
#[must_use]
pub struct TestClassBuilder<T> {
    name: SmolStr,
    constructor: Option<Constructor>,
    methods: Vec<TestMethod>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Fixture> TestClassBuilder<T> {
    /// Sets the class's own constructor.
    pub fn constructor<F>(mut self, constructor: F) -> Self
    where
        F: Fn() -> Result<T, Failure> + 'static,
    {
        self.constructor = Some(Box::new(move || {
            constructor().map(|instance| Box::new(instance) as Box<dyn Fixture>)
        }));
        self
    }

    /// Uses `T::default` as the class's own constructor.
    pub fn default_constructor(self) -> Self
    where
        T: Default,
    {
        self.constructor(|| Ok(T::default()))
    }

    /// Adds a case.
    pub fn case<F>(self, name: impl Into<SmolStr>, body: F) -> Self
    where
        F: Fn(&mut T) -> Result<(), Failure> + 'static,
    {
        self.push_case(name.into(), None, body)
    }

    /// Adds a case that is marked to be skipped.
    pub fn skipped_case<F>(self, name: impl Into<SmolStr>, skip: Skip, body: F) -> Self
    where
        F: Fn(&mut T) -> Result<(), Failure> + 'static,
    {
        self.push_case(name.into(), Some(skip), body)
    }

    /// Finishes building the class.
    pub fn build(self) -> TestClass {
        TestClass {
            name: self.name,
            type_name: std::any::type_name::<T>(),
            constructor: DebugIgnore(self.constructor),
            methods: self.methods,
        }
    }

    fn push_case<F>(mut self, name: SmolStr, skip: Option<Skip>, body: F) -> Self
    where
        F: Fn(&mut T) -> Result<(), Failure> + 'static,
    {
        let body: CaseBody = Box::new(move |instance: &mut dyn Fixture| {
            let instance: &mut dyn Any = instance;
            match instance.downcast_mut::<T>() {
                Some(instance) => body(instance),
                None => Err(Failure::with_type(
                    "InstanceTypeMismatch",
                    format!(
                        "the factory produced an instance that is not a `{}`",
                        std::any::type_name::<T>()
                    ),
                )),
            }
        });
        self.methods.push(TestMethod {
            case: Case {
                method_group: MethodGroup::new(self.name.clone(), name),
                skip,
            },
            body: DebugIgnore(body),
        });
        self
    }
}

/// An ordered collection of test classes run together.
#[derive(Debug)]
pub struct TestAssembly {
    name: String,
    classes: Vec<TestClass>,
}

impl TestAssembly {
    /// Creates a new, empty assembly with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            classes: Vec::new(),
        }
    }

    /// Adds a class to this assembly.
    #[must_use]
    pub fn with_class(mut self, class: TestClass) -> Self {
        self.classes.push(class);
        self
    }

    /// Adds a class to this assembly.
    pub fn push_class(&mut self, class: TestClass) {
        self.classes.push(class);
    }

    /// Returns the name of this assembly.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the classes of this assembly, in order.
    pub fn classes(&self) -> &[TestClass] {
        &self.classes
    }

    /// Returns the total number of cases across all classes.
    pub fn case_count(&self) -> usize {
        self.classes.iter().map(|class| class.methods.len()).sum()
    }

    /// Iterates over every case in the assembly, class by class.
    pub fn cases(&self) -> impl Iterator<Item = &Case> {
        self.classes.iter().flat_map(TestClass::cases)
    }
}
