// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! A single-threaded in-memory event bus supporting publish/subscribe.
//!
//! Handlers are invoked in subscription order over a point-in-time snapshot of the
//! registry, so a handler may subscribe or unsubscribe (itself included) while an
//! event is being dispatched. Changes made during a dispatch pass take effect from
//! the next call to [`EventBus::publish`].
//!
//! The bus is designed for single-threaded use within one async task, hence the
//! `Rc<RefCell<..>>` storage rather than locks.

use std::{
    cell::{Cell, RefCell},
    fmt::Debug,
    rc::{Rc, Weak},
};

/// A shareable event handler.
pub type EventHandler<T> = Rc<dyn Fn(&T)>;

struct HandlerRegistry<T> {
    next_id: u64,
    handlers: Vec<(u64, EventHandler<T>)>,
}

impl<T> Default for HandlerRegistry<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            handlers: Vec::new(),
        }
    }
}

trait RemoveHandler {
    fn remove(&self, id: u64) -> bool;
}

impl<T> RemoveHandler for RefCell<HandlerRegistry<T>> {
    fn remove(&self, id: u64) -> bool {
        let mut registry = self.borrow_mut();
        let before = registry.handlers.len();
        registry.handlers.retain(|(handler_id, _)| *handler_id != id);
        registry.handlers.len() != before
    }
}

/// Publish/subscribe registry fanning out events to zero or more live handlers.
///
/// Cloning an [`EventBus`] yields another handle to the same registry.
pub struct EventBus<T> {
    inner: Rc<RefCell<HandlerRegistry<T>>>,
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for EventBus<T> {
    fn default() -> Self {
        Self {
            inner: Rc::new(RefCell::new(HandlerRegistry::default())),
        }
    }
}

impl<T> Debug for EventBus<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(EventBus))
            .field("subscribers", &self.inner.borrow().handlers.len())
            .finish()
    }
}

impl<T: 'static> EventBus<T> {
    /// Creates a new empty [`EventBus`] instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes the `handler` to all subsequently published events.
    ///
    /// The returned [`Subscription`] removes the handler when unsubscribed.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&T) + 'static,
    {
        let mut registry = self.inner.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.handlers.push((id, Rc::new(handler)));

        tracing::debug!(
            "Subscribed handler {id} ({} active)",
            registry.handlers.len()
        );

        let weak: Weak<RefCell<HandlerRegistry<T>>> = Rc::downgrade(&self.inner);
        Subscription {
            id,
            registry: weak,
            active: Cell::new(true),
        }
    }

    /// Publishes the `event` to every handler subscribed at the time of the call.
    pub fn publish(&self, event: &T) {
        let snapshot: Vec<EventHandler<T>> = self
            .inner
            .borrow()
            .handlers
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();

        for handler in snapshot {
            handler(event);
        }
    }

    /// Returns the number of currently subscribed handlers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().handlers.len()
    }

    /// Returns whether no handlers are subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriber_count() == 0
    }
}

/// Capability to remove a handler previously registered with [`EventBus::subscribe`].
pub struct Subscription {
    id: u64,
    registry: Weak<dyn RemoveHandler>,
    active: Cell<bool>,
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(Subscription))
            .field("id", &self.id)
            .field("active", &self.active.get())
            .finish()
    }
}

impl Subscription {
    /// Returns the subscription identifier.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns whether the handler is still subscribed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Removes the handler from the bus.
    ///
    /// Only the first call has an effect, repeat calls are no-ops.
    pub fn unsubscribe(&self) {
        if !self.active.replace(false) {
            return;
        }

        match self.registry.upgrade() {
            Some(registry) => {
                if registry.remove(self.id) {
                    tracing::debug!("Unsubscribed handler {}", self.id);
                }
            }
            None => tracing::trace!("Bus dropped before handler {} unsubscribed", self.id),
        }
    }
}
