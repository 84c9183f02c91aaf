// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::events::{Message, MessageKind};
use crate::errors::WriteEventError;
use indexmap::IndexMap;

/// A receiver of [`Message`]s.
///
/// A listener declares the kinds of message it handles up front; the [`Bus`] only delivers those
/// kinds to it.
pub trait Listener {
    /// Returns the kinds of message this listener handles.
    fn subscriptions(&self) -> &'static [MessageKind];

    /// Handles a message of one of the subscribed kinds.
    ///
    /// An error returned here aborts the run.
    fn handle(&mut self, message: &Message) -> Result<(), WriteEventError>;
}

/// Delivers messages to listeners.
///
/// Listeners are registered before a run starts. [`publish`](Self::publish) dispatches a message
/// synchronously to every listener subscribed to its kind, in registration order.
#[derive(Default)]
pub struct Bus<'l> {
    listeners: Vec<Box<dyn Listener + 'l>>,
    registry: IndexMap<MessageKind, Vec<usize>>,
}

impl<'l> Bus<'l> {
    /// Creates a new bus with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener.
    pub fn subscribe(&mut self, listener: impl Listener + 'l) -> &mut Self {
        self.subscribe_boxed(Box::new(listener))
    }

    /// Registers a boxed listener.
    pub fn subscribe_boxed(&mut self, listener: Box<dyn Listener + 'l>) -> &mut Self {
        let index = self.listeners.len();
        for &kind in listener.subscriptions() {
            let indexes = self.registry.entry(kind).or_default();
            // A listener subscribed twice to the same kind still receives it once.
            if indexes.last() != Some(&index) {
                indexes.push(index);
            }
        }
        self.listeners.push(listener);
        self
    }

    /// Registers a closure that receives messages of a single kind.
    pub fn subscribe_fn<F>(&mut self, kind: MessageKind, f: F) -> &mut Self
    where
        F: FnMut(&Message) -> Result<(), WriteEventError> + 'l,
    {
        self.subscribe(FnListener { kind, f })
    }

    /// Returns the number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Returns true if no listeners are registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Delivers `message` to every listener subscribed to its kind, in registration order.
    ///
    /// The first listener error stops delivery and is returned.
    pub fn publish(&mut self, message: &Message) -> Result<(), WriteEventError> {
        let Some(indexes) = self.registry.get(&message.kind()) else {
            return Ok(());
        };
        for &index in indexes {
            self.listeners[index].handle(message)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Bus<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus")
            .field("listeners", &self.listeners.len())
            .field("registry", &self.registry)
            .finish()
    }
}

struct FnListener<F> {
    kind: MessageKind,
    f: F,
}

impl<F> Listener for FnListener<F>
where
    F: FnMut(&Message) -> Result<(), WriteEventError>,
{
    fn subscriptions(&self) -> &'static [MessageKind] {
        let index = self.kind as usize;
        &MessageKind::ALL[index..=index]
    }

    fn handle(&mut self, message: &Message) -> Result<(), WriteEventError> {
        (self.f)(message)
    }
}
