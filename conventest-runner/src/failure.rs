// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Failures raised by test code.
//!
//! A [`Failure`] is what a constructor, a case body, a disposal or a wrapping behavior produces
//! when it does not succeed. Failures are values: every lifecycle step returns
//! `Result<_, Failure>`, and panics raised by test code are caught at the same boundaries and
//! turned into failures. The runner never lets a failure escape the class that produced it.

use crate::test_output;
use std::{
    any::Any,
    cell::{Cell, RefCell},
    error, fmt,
    io::Write as _,
    panic::{self, AssertUnwindSafe, Location, PanicHookInfo},
    sync::Once,
};
use swrite::{SWrite, swrite};

/// A failure raised while running test code.
///
/// `Failure` deliberately does not implement [`std::error::Error`], so that any error type can
/// be converted into it with `?`:
///
/// ```
/// use conventest_runner::failure::Failure;
///
/// fn parse_port(input: &str) -> Result<u16, Failure> {
///     let port: u16 = input.parse()?;
///     Ok(port)
/// }
///
/// let failure = parse_port("not a port").unwrap_err();
/// assert_eq!(failure.message(), "invalid digit found in string");
/// ```
///
/// A `Failure` may also be raised by panicking with it through [`std::panic::panic_any`]: the
/// original failure is reported, not the panic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    type_name: String,
    message: String,
    stack_trace: Option<String>,
    stage: Option<FailureStage>,
}

impl Failure {
    /// Creates a new failure with the given message.
    ///
    /// The location of the caller is recorded as the failure's stack trace.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_type("Failure", message)
    }

    /// Creates a new failure with the given type name and message.
    #[track_caller]
    pub fn with_type(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            stack_trace: Some(format_location(Location::caller())),
            stage: None,
        }
    }

    /// Converts a panic payload into a failure.
    ///
    /// A payload that is itself a `Failure` is returned unchanged. Otherwise the panic message is
    /// used, and `location` (if known) becomes the stack trace.
    pub fn from_panic(payload: Box<dyn Any + Send>, location: Option<String>) -> Self {
        let payload = match payload.downcast::<Failure>() {
            Ok(failure) => return *failure,
            Err(payload) => payload,
        };

        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_owned()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "Box<dyn Any>".to_owned()
        };

        Self {
            type_name: "panic".to_owned(),
            message,
            stack_trace: location,
            stage: None,
        }
    }

    /// Records the lifecycle stage this failure was raised in.
    ///
    /// The first stage recorded wins: a failure raised by construction and propagated through a
    /// wrapping behavior keeps its construction label.
    pub fn at_stage(mut self, stage: FailureStage) -> Self {
        if self.stage.is_none() {
            self.stage = Some(stage);
        }
        self
    }

    /// Returns the name of the type of this failure.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the failure's message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the failure's stack trace, if one was recorded.
    pub fn stack_trace(&self) -> Option<&str> {
        self.stack_trace.as_deref()
    }

    /// Returns the lifecycle stage this failure was raised in, if known.
    pub fn stage(&self) -> Option<FailureStage> {
        self.stage
    }

    /// Returns the stack trace headed by the failure's type and stage.
    pub fn typed_stack_trace(&self) -> String {
        let mut out = self.type_name.clone();
        if let Some(stage) = self.stage {
            swrite!(out, " (during {stage})");
        }
        if let Some(stack_trace) = &self.stack_trace {
            out.push('\n');
            out.push_str(stack_trace);
        }
        out
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl<E> From<E> for Failure
where
    E: error::Error,
{
    #[track_caller]
    fn from(error: E) -> Self {
        let mut stack_trace = format_location(Location::caller());
        let mut source = error.source();
        while let Some(cause) = source {
            swrite!(stack_trace, "\ncaused by: {cause}");
            source = cause.source();
        }

        Self {
            type_name: std::any::type_name::<E>().to_owned(),
            message: error.to_string(),
            stack_trace: Some(stack_trace),
            stage: None,
        }
    }
}

fn format_location(location: &Location<'_>) -> String {
    format!(
        "at {}:{}:{}",
        location.file(),
        location.line(),
        location.column()
    )
}

/// The lifecycle step a failure was raised in.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FailureStage {
    /// The test class's own constructor.
    Construction,

    /// A user-supplied instance factory.
    CustomFactory,

    /// The case body.
    CaseInvocation,

    /// A case-level wrapping behavior.
    CaseBehavior,

    /// Disposal of a test class instance.
    Disposal,

    /// A class-level wrapping behavior.
    ClassBehavior,

    /// The policy ordering a class's cases.
    CaseOrdering,
}

impl FailureStage {
    /// Returns the label used when reporting this stage.
    pub fn label(self) -> &'static str {
        match self {
            Self::Construction => "construction",
            Self::CustomFactory => "custom factory",
            Self::CaseInvocation => "case",
            Self::CaseBehavior => "case behavior",
            Self::Disposal => "disposal",
            Self::ClassBehavior => "class behavior",
            Self::CaseOrdering => "case ordering",
        }
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Every failure recorded against a single case.
///
/// The first failure is the primary one and determines the reported message. Later failures
/// (for example, a disposal that fails after the case body already failed) are kept as
/// secondary failures so that nothing is silently dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaseFailures {
    primary: Failure,
    secondary: Vec<Failure>,
}

impl CaseFailures {
    pub(crate) fn new(primary: Failure) -> Self {
        Self {
            primary,
            secondary: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, failure: Failure) {
        self.secondary.push(failure);
    }

    /// Returns the primary failure.
    pub fn primary(&self) -> &Failure {
        &self.primary
    }

    /// Returns the secondary failures, in the order they were raised.
    pub fn secondary(&self) -> &[Failure] {
        &self.secondary
    }

    /// Iterates over all failures, primary first.
    pub fn iter(&self) -> impl Iterator<Item = &Failure> {
        std::iter::once(&self.primary).chain(&self.secondary)
    }

    /// Returns the primary failure's typed stack trace, followed by each secondary failure.
    pub fn compound_stack_trace(&self) -> String {
        let mut out = self.primary.typed_stack_trace();
        for failure in &self.secondary {
            swrite!(
                out,
                "\n\n===== Secondary Failure: {} =====\n{}",
                failure.type_name(),
                failure.message(),
            );
            if let Some(stack_trace) = failure.stack_trace() {
                out.push('\n');
                out.push_str(stack_trace);
            }
        }
        out
    }
}

thread_local! {
    static GUARD_DEPTH: Cell<usize> = const { Cell::new(0) };
    static LAST_PANIC_LOCATION: RefCell<Option<String>> = const { RefCell::new(None) };
}

static INSTALL_PANIC_HOOK: Once = Once::new();

/// Runs `f`, converting both returned failures and panics into a [`Failure`] tagged with
/// `stage`.
pub(crate) fn run_guarded<T>(
    stage: FailureStage,
    f: impl FnOnce() -> Result<T, Failure>,
) -> Result<T, Failure> {
    install_panic_hook();

    let guard = PanicGuard::enter();
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    let location = guard.exit();

    match result {
        Ok(result) => result.map_err(|failure| failure.at_stage(stage)),
        Err(payload) => Err(Failure::from_panic(payload, location).at_stage(stage)),
    }
}

struct PanicGuard {
    exited: bool,
}

impl PanicGuard {
    fn enter() -> Self {
        GUARD_DEPTH.with(|depth| depth.set(depth.get() + 1));
        Self { exited: false }
    }

    fn exit(mut self) -> Option<String> {
        self.exited = true;
        GUARD_DEPTH.with(|depth| depth.set(depth.get() - 1));
        LAST_PANIC_LOCATION.with(|last| last.borrow_mut().take())
    }
}

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if !self.exited {
            GUARD_DEPTH.with(|depth| depth.set(depth.get() - 1));
        }
    }
}

fn install_panic_hook() {
    INSTALL_PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if GUARD_DEPTH.with(Cell::get) == 0 {
                previous(info);
                return;
            }
            guarded_panic_hook(info);
        }));
    });
}

/// Panics inside guarded test code are reported as failures, so the default "thread panicked"
/// message is only written to the case's captured output.
fn guarded_panic_hook(info: &PanicHookInfo<'_>) {
    let location = info.location().map(format_location);
    LAST_PANIC_LOCATION.with(|last| *last.borrow_mut() = location.clone());

    if info.payload().is::<Failure>() || !test_output::is_capturing() {
        return;
    }

    let message = info
        .payload()
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| info.payload().downcast_ref::<String>().map(String::as_str))
        .unwrap_or("Box<dyn Any>");
    let _ = match location {
        Some(location) => writeln!(test_output::stderr(), "panicked {location}:\n{message}"),
        None => writeln!(test_output::stderr(), "panicked:\n{message}"),
    };
}
