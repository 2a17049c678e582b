// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Change notification and batching.
//!
//! Groups, axes and 2D axes each own a [`ChangeNotifier`]. Notifications are
//! never delivered while a mutation is in progress: they are queued into a
//! [`Transaction`] and delivered when it commits, each listener at most once.
//!
//! ## Forwarding
//!
//! An axis forwards its group's notifications, and an [`Axis2D`](crate::Axis2D)
//! forwards both of its axes'. Forwarding is structural: when a notifier is
//! enqueued, the notifiers it forwards to are enqueued into the same
//! transaction. A listener reachable through several paths is still called
//! once.
//!
//! ## Re-entrancy
//!
//! No borrow is held while a listener runs. Listeners may read or mutate
//! axes and groups; such mutations run in their own transactions.

use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use hashbrown::HashMap;

use crate::group::AxisGroup;

enum Listener {
    Callback(Box<dyn Fn(bool)>),
    Forward(Weak<ChangeNotifier>),
}

/// Listener registry with weak entries pruned lazily.
#[derive(Default)]
pub struct ChangeNotifier {
    listeners: RefCell<Vec<Weak<Listener>>>,
}

impl ChangeNotifier {
    /// Creates a notifier with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback`, which receives the `ongoing` flag of each change.
    ///
    /// The callback stays registered until the returned [`Subscription`] is
    /// dropped.
    pub fn subscribe(&self, callback: impl Fn(bool) + 'static) -> Subscription {
        self.push(Listener::Callback(Box::new(callback)))
    }

    /// Forwards every notification of this notifier to `target`.
    ///
    /// Forwarding edges only run from groups to axes and from axes to 2D
    /// axes, so they never form a cycle.
    pub(crate) fn forward_to(&self, target: &Rc<Self>) -> Subscription {
        self.push(Listener::Forward(Rc::downgrade(target)))
    }

    /// Number of registered listeners, including ones not yet pruned.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Queues a notification for every live listener into `tx`.
    pub fn enqueue(&self, tx: &mut Transaction, ongoing: bool) {
        let live: Vec<Rc<Listener>> = {
            let mut listeners = self.listeners.borrow_mut();
            listeners.retain(|l| l.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };
        for listener in live {
            match &*listener {
                Listener::Callback(_) => tx.queue_listener(&listener, ongoing),
                Listener::Forward(target) => {
                    if let Some(target) = target.upgrade() {
                        target.enqueue(tx, ongoing);
                    }
                }
            }
        }
    }

    fn push(&self, listener: Listener) -> Subscription {
        let strong = Rc::new(listener);
        let mut listeners = self.listeners.borrow_mut();
        listeners.retain(|l| l.strong_count() > 0);
        listeners.push(Rc::downgrade(&strong));
        Subscription { guard: strong }
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("listener_count", &self.listener_count())
            .finish()
    }
}

/// RAII guard for a listener or forward registration.
///
/// Dropping the `Subscription` unregisters it; it will not be called again.
#[must_use = "dropping a Subscription unregisters the listener"]
pub struct Subscription {
    guard: Rc<Listener>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &*self.guard {
            Listener::Callback(_) => "callback",
            Listener::Forward(_) => "forward",
        };
        f.debug_struct("Subscription").field("kind", &kind).finish()
    }
}

fn ptr_key<T: ?Sized>(ptr: *const T) -> usize {
    ptr.cast::<()>() as usize
}

struct Pending<H> {
    item: H,
    ongoing: bool,
}

/// Keyed queue preserving first-enqueue order; re-queuing an item updates its flag.
struct Queue<H> {
    entries: Vec<Pending<H>>,
    index: HashMap<usize, usize>,
}

impl<H> Default for Queue<H> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<H> Queue<H> {
    fn push(&mut self, key: usize, item: H, ongoing: bool) {
        if let Some(&at) = self.index.get(&key) {
            self.entries[at].ongoing = ongoing;
        } else {
            self.index.insert(key, self.entries.len());
            self.entries.push(Pending { item, ongoing });
        }
    }

    fn take(&mut self) -> Vec<Pending<H>> {
        self.index.clear();
        core::mem::take(&mut self.entries)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Explicit batching context for a set of axis updates.
///
/// A transaction collects two kinds of deferred work:
/// - group reconstrains requested by viewport updates
///   ([`Axis::set_viewport`](crate::Axis::set_viewport)), one per distinct
///   group, and
/// - listener notifications, one per distinct listener.
///
/// [`Transaction::commit`] first runs the deferred reconstrains, then
/// delivers notifications in the order their listeners were first queued.
/// When the same listener is queued more than once, the last `ongoing` flag
/// wins. Dropping a transaction commits it.
///
/// ```rust
/// use understory_axis_link::{
///     Axis, CommonBoundsAxisGroup1D, Interval, Transaction,
/// };
///
/// let group = CommonBoundsAxisGroup1D::new(Interval::new(0.0, 10.0));
/// let mut a = Axis::new(group.clone(), Interval::new(0.0, 400.0)).unwrap();
/// let mut b = Axis::new(group, Interval::new(0.0, 200.0)).unwrap();
///
/// let mut tx = Transaction::new();
/// a.set_viewport(&mut tx, 2.0, Interval::new(0.0, 800.0));
/// b.set_viewport(&mut tx, 2.0, Interval::new(0.0, 400.0));
/// // Both axes share one group, so it is reconstrained once.
/// assert_eq!(tx.pending_reconstrains(), 1);
/// tx.commit();
/// ```
#[must_use = "a transaction delivers its notifications when committed or dropped"]
#[derive(Default)]
pub struct Transaction {
    reconstrains: Queue<Rc<dyn AxisGroup>>,
    listeners: Queue<Weak<Listener>>,
}

impl Transaction {
    /// Creates an empty transaction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `group.reconstrain(ongoing)` for commit time.
    pub fn defer_reconstrain(&mut self, group: Rc<dyn AxisGroup>, ongoing: bool) {
        self.reconstrains
            .push(ptr_key(Rc::as_ptr(&group)), group, ongoing);
    }

    /// Number of distinct groups waiting to be reconstrained.
    #[must_use]
    pub fn pending_reconstrains(&self) -> usize {
        self.reconstrains.len()
    }

    /// Number of distinct listeners waiting to be notified.
    #[must_use]
    pub fn pending_notifications(&self) -> usize {
        self.listeners.len()
    }

    /// Runs deferred reconstrains and delivers queued notifications.
    pub fn commit(self) {
        // Flushing happens in `Drop`.
    }

    fn queue_listener(&mut self, listener: &Rc<Listener>, ongoing: bool) {
        // Held weakly so a subscription dropped mid-flush is not called.
        self.listeners
            .push(ptr_key(Rc::as_ptr(listener)), Rc::downgrade(listener), ongoing);
    }

    fn flush(&mut self) {
        // Reconstrains may queue further reconstrains (none do today) and
        // notifications; loop until both queues are drained.
        loop {
            let reconstrains = self.reconstrains.take();
            if reconstrains.is_empty() {
                break;
            }
            for Pending { item, ongoing } in reconstrains {
                item.reconstrain(self, ongoing);
            }
        }

        let listeners = self.listeners.take();
        if listeners.is_empty() {
            return;
        }
        #[cfg(feature = "tracing")]
        tracing::trace!(listeners = listeners.len(), "transaction flush");
        for Pending { item, ongoing } in listeners {
            if let Some(listener) = item.upgrade()
                && let Listener::Callback(callback) = &*listener
            {
                callback(ongoing);
            }
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        self.flush();
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("pending_reconstrains", &self.pending_reconstrains())
            .field("pending_notifications", &self.pending_notifications())
            .finish()
    }
}
