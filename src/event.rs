// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Change notification.
//!
//! A [`Publisher`] keeps an ordered list of subscriber callbacks. Firing an
//! event invokes each callback synchronously in registration order.
//! Subscribing hands back a [`Subscription`] that can later be used to remove
//! that exact callback again.

use std::fmt::{Debug, Formatter, Result as FmtResult};

type Callback<T> = Box<dyn Fn(&T) + Send + Sync>;

/// Handle to a registered subscriber callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

/// Ordered list of subscribers for one kind of event.
pub struct Publisher<T> {
    next_id: u64,
    subscribers: Vec<(Subscription, Callback<T>)>,
}

impl<T> Publisher<T> {
    /// Construct new publisher without subscribers.
    pub fn new() -> Self {
        Self {
            next_id: 0,
            subscribers: Vec::new(),
        }
    }

    /// Register callback to run on every fired event.
    pub fn subscribe(&mut self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let subscription = Subscription(self.next_id);
        self.next_id += 1;
        self.subscribers.push((subscription, Box::new(callback)));
        subscription
    }

    /// Remove callback of target subscription.
    ///
    /// Returns false if the subscription was already removed.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(id, _)| *id != subscription);
        before != self.subscribers.len()
    }

    /// Invoke every subscriber with event in registration order.
    pub fn fire(&self, event: &T) {
        for (_, callback) in &self.subscribers {
            callback(event);
        }
    }

    /// Number of live subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl<T> Default for Publisher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Debug for Publisher<T> {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.debug_struct("Publisher")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
