//! Capacity-bounded, doubly-linked blocking queue with split locks.
//!
//! Producers serialize on the put lock and only touch the tail. The consumer
//! serializes on the take lock and only touches the head. Operations that
//! span both ends (clear, drain, removal by value, indexed access,
//! iteration) hold both locks, always acquired put-then-take.
//!
//! Nodes are reference counted. A removed node keeps its forward link, so an
//! iterator resting on it can still step back into the live list.

mod iter;

pub use iter::Iter;

use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cell::UnsafeCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use crate::error::{PutError, QueueError};

struct Node<E> {
    /// `None` for the sentinel and for nodes that have been removed.
    item: UnsafeCell<Option<E>>,
    next: UnsafeCell<Option<Arc<Node<E>>>>,
    prev: UnsafeCell<Weak<Node<E>>>,
}

// SAFETY: node cells are only touched while holding the queue lock(s) that
// guard them (see `LinkedQueue`).
unsafe impl<E: Send> Send for Node<E> {}
unsafe impl<E: Send> Sync for Node<E> {}

impl<E> Node<E> {
    fn sentinel() -> Arc<Self> {
        Arc::new(Self {
            item: UnsafeCell::new(None),
            next: UnsafeCell::new(None),
            prev: UnsafeCell::new(Weak::new()),
        })
    }

    fn new(item: E, prev: Weak<Self>) -> Arc<Self> {
        Arc::new(Self {
            item: UnsafeCell::new(Some(item)),
            next: UnsafeCell::new(None),
            prev: UnsafeCell::new(prev),
        })
    }
}

impl<E> Drop for Node<E> {
    // Unlink iteratively; a long chain would otherwise recurse once per node.
    fn drop(&mut self) {
        let mut next = self.next.get_mut().take();
        while let Some(node) = next {
            match Arc::try_unwrap(node) {
                Ok(mut node) => next = node.next.get_mut().take(),
                Err(_) => break,
            }
        }
    }
}

/// Both locks, released together.
struct FullLock<'a> {
    _put: MutexGuard<'a, ()>,
    _take: MutexGuard<'a, ()>,
}

fn lock(mutex: &Mutex<()>) -> MutexGuard<'_, ()> {
    // The mutexes guard `()`; a poisoned lock has no state to distrust.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

/// Wait on `condvar` until notified or until `deadline` passes.
///
/// `deadline == None` waits without bound. Returns `None` once the deadline
/// has passed, releasing the lock.
fn wait_until<'a>(
    condvar: &Condvar,
    guard: MutexGuard<'a, ()>,
    deadline: Option<Instant>,
) -> Option<MutexGuard<'a, ()>> {
    match deadline {
        None => Some(condvar.wait(guard).unwrap_or_else(PoisonError::into_inner)),
        Some(deadline) => {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let (guard, _) = condvar
                .wait_timeout(guard, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            Some(guard)
        }
    }
}

/// A blocking FIFO queue with a fixed capacity.
///
/// `count` is atomic so either side can read it without the other side's
/// lock. `head` (a sentinel that never holds an item) is guarded by
/// `take_lock`; `last` is guarded by `put_lock`. When the queue is empty they
/// are the same node, and only the put side writes its `next` link.
pub struct LinkedQueue<E> {
    capacity: usize,
    count: AtomicUsize,
    closed: AtomicBool,
    head: UnsafeCell<Arc<Node<E>>>,
    last: UnsafeCell<Arc<Node<E>>>,
    take_lock: Mutex<()>,
    not_empty: Condvar,
    put_lock: Mutex<()>,
    not_full: Condvar,
}

// SAFETY: `head`, `last` and the node cells are only accessed under the
// locks documented on the struct.
unsafe impl<E: Send> Send for LinkedQueue<E> {}
unsafe impl<E: Send> Sync for LinkedQueue<E> {}

impl<E> LinkedQueue<E> {
    /// Create a queue holding at most `capacity` elements.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidCapacity`] if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::InvalidCapacity);
        }
        Ok(Self::with_capacity(capacity))
    }

    /// Create a queue whose capacity is `usize::MAX`.
    pub fn unbounded() -> Self {
        Self::with_capacity(usize::MAX)
    }

    fn with_capacity(capacity: usize) -> Self {
        let head = Node::sentinel();
        Self {
            capacity,
            count: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            last: UnsafeCell::new(Arc::clone(&head)),
            head: UnsafeCell::new(head),
            take_lock: Mutex::new(()),
            not_empty: Condvar::new(),
            put_lock: Mutex::new(()),
            not_full: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remaining_capacity(&self) -> usize {
        self.capacity - self.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close the queue and wake every blocked waiter.
    ///
    /// Insertions fail from now on. Removals keep returning elements until
    /// the queue is empty and then fail with [`QueueError::Closed`].
    pub fn close(&self) {
        {
            // Under the put lock, so no insertion is between its closed
            // check and its count increment.
            let _put = lock(&self.put_lock);
            if self.closed.swap(true, Ordering::SeqCst) {
                return;
            }
            self.not_full.notify_all();
        }
        let _take = lock(&self.take_lock);
        self.not_empty.notify_all();
    }

    // ── Insertion ────────────────────────────────────────────────────

    /// Append `item`, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`PutError::Closed`] with the item if the queue is closed
    /// before room becomes available.
    pub fn put(&self, item: E) -> Result<(), PutError<E>> {
        let c;
        {
            let mut guard = lock(&self.put_lock);
            while self.count.load(Ordering::SeqCst) == self.capacity {
                if self.is_closed() {
                    return Err(PutError::Closed(item));
                }
                guard = self
                    .not_full
                    .wait(guard)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            if self.is_closed() {
                return Err(PutError::Closed(item));
            }
            // SAFETY: put lock held.
            unsafe { self.enqueue(item) };
            c = self.count.fetch_add(1, Ordering::SeqCst);
            if c + 1 < self.capacity {
                self.not_full.notify_one();
            }
        }
        if c == 0 {
            self.signal_not_empty();
        }
        Ok(())
    }

    /// Append `item` if there is room, waiting at most `timeout` for it.
    ///
    /// # Errors
    ///
    /// Returns [`PutError::Full`] with the item if the queue is still full
    /// when the timeout elapses, or [`PutError::Closed`] if it is closed.
    pub fn offer_timeout(&self, item: E, timeout: Duration) -> Result<(), PutError<E>> {
        let deadline = deadline_after(timeout);
        let c;
        {
            let mut guard = lock(&self.put_lock);
            loop {
                if self.is_closed() {
                    return Err(PutError::Closed(item));
                }
                if self.count.load(Ordering::SeqCst) < self.capacity {
                    // SAFETY: put lock held.
                    unsafe { self.enqueue(item) };
                    c = self.count.fetch_add(1, Ordering::SeqCst);
                    if c + 1 < self.capacity {
                        self.not_full.notify_one();
                    }
                    break;
                }
                guard = match wait_until(&self.not_full, guard, deadline) {
                    Some(guard) => guard,
                    None => return Err(PutError::Full(item)),
                };
            }
        }
        if c == 0 {
            self.signal_not_empty();
        }
        Ok(())
    }

    /// Append `item` only if there is room right now.
    ///
    /// # Errors
    ///
    /// Returns [`PutError::Full`] with the item if the queue is at capacity,
    /// leaving the queue untouched.
    pub fn offer(&self, item: E) -> Result<(), PutError<E>> {
        if self.is_closed() {
            return Err(PutError::Closed(item));
        }
        if self.count.load(Ordering::SeqCst) == self.capacity {
            return Err(PutError::Full(item));
        }
        let c;
        {
            let _guard = lock(&self.put_lock);
            if self.is_closed() {
                return Err(PutError::Closed(item));
            }
            if self.count.load(Ordering::SeqCst) == self.capacity {
                return Err(PutError::Full(item));
            }
            // SAFETY: put lock held.
            unsafe { self.enqueue(item) };
            c = self.count.fetch_add(1, Ordering::SeqCst);
            if c + 1 < self.capacity {
                self.not_full.notify_one();
            }
        }
        if c == 0 {
            self.signal_not_empty();
        }
        Ok(())
    }

    // ── Removal ──────────────────────────────────────────────────────

    /// Remove the head element, blocking while the queue is empty.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] once the queue is closed and empty.
    pub fn take(&self) -> Result<E, QueueError> {
        self.take_until(None)?.ok_or(QueueError::Closed)
    }

    /// Remove the head element, waiting at most `timeout` for one.
    ///
    /// Returns `Ok(None)` if the timeout elapses first.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] once the queue is closed and empty.
    pub fn poll_timeout(&self, timeout: Duration) -> Result<Option<E>, QueueError> {
        self.take_until(deadline_after(timeout))
    }

    /// Remove the head element if there is one.
    pub fn poll(&self) -> Option<E> {
        if self.count.load(Ordering::SeqCst) == 0 {
            return None;
        }
        let mut item = None;
        let mut c = 0;
        {
            let _guard = lock(&self.take_lock);
            if self.count.load(Ordering::SeqCst) > 0 {
                // SAFETY: take lock held, count observed non-zero.
                item = unsafe { self.dequeue() };
                if item.is_some() {
                    c = self.count.fetch_sub(1, Ordering::SeqCst);
                    if c > 1 {
                        self.not_empty.notify_one();
                    }
                }
            }
        }
        if c == self.capacity {
            self.signal_not_full();
        }
        item
    }

    /// Remove elements from the head for as long as `f` asks for more.
    ///
    /// `f` receives each removed element together with the element now at
    /// the head, if any. Returning `false` stops the drain. While the queue is
    /// empty the call waits for more elements until `timeout` has elapsed,
    /// measured from the start of the call. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] if the queue is closed and nothing was
    /// removed.
    pub fn poll_each<F>(&self, timeout: Duration, mut f: F) -> Result<usize, QueueError>
    where
        F: FnMut(E, Option<&E>) -> bool,
    {
        let deadline = deadline_after(timeout);
        let mut taken = 0;
        let mut was_full = false;
        let mut drained_closed = false;
        {
            let mut guard = lock(&self.take_lock);
            loop {
                let closed = self.is_closed();
                if self.count.load(Ordering::SeqCst) > 0 {
                    // SAFETY: take lock held, count observed non-zero.
                    if let Some(item) = unsafe { self.dequeue() } {
                        was_full |= self.count.fetch_sub(1, Ordering::SeqCst) == self.capacity;
                        taken += 1;
                        // SAFETY: take lock held for the duration of `f`.
                        let next = unsafe { self.peek_locked() };
                        if f(item, next) {
                            continue;
                        }
                        break;
                    }
                }
                if closed {
                    drained_closed = true;
                    break;
                }
                guard = match wait_until(&self.not_empty, guard, deadline) {
                    Some(guard) => guard,
                    None => break,
                };
            }
            if self.count.load(Ordering::SeqCst) > 0 {
                self.not_empty.notify_one();
            }
        }
        if was_full {
            self.signal_not_full();
        }
        if taken == 0 && drained_closed {
            return Err(QueueError::Closed);
        }
        Ok(taken)
    }

    /// Remove the first element equal to `value`.
    pub fn remove(&self, value: &E) -> bool
    where
        E: PartialEq,
    {
        let _lock = self.full_lock();
        // SAFETY: both locks held.
        unsafe {
            let mut trail = Arc::clone(&*self.head.get());
            let mut cursor = (*trail.next.get()).clone();
            while let Some(node) = cursor {
                if (*node.item.get()).as_ref() == Some(value) {
                    self.unlink(&trail, &node);
                    return true;
                }
                cursor = (*node.next.get()).clone();
                trail = node;
            }
        }
        false
    }

    /// Remove every element.
    pub fn clear(&self) {
        let _lock = self.full_lock();
        // SAFETY: both locks held.
        unsafe {
            let head = &*self.head.get();
            let first = (*head.next.get()).take();
            take_items(first, usize::MAX);
            *self.last.get() = Arc::clone(head);
        }
        if self.count.swap(0, Ordering::SeqCst) == self.capacity {
            self.not_full.notify_all();
        }
    }

    /// Move every element into `dst` in FIFO order. Returns how many moved.
    pub fn drain_to<C>(&self, dst: &mut C) -> usize
    where
        C: Extend<E>,
    {
        self.drain_to_max(dst, usize::MAX)
    }

    /// Move up to `max` elements into `dst` in FIFO order.
    pub fn drain_to_max<C>(&self, dst: &mut C, max: usize) -> usize
    where
        C: Extend<E>,
    {
        let items = {
            let _lock = self.full_lock();
            // SAFETY: both locks held.
            let items = unsafe {
                let head = &*self.head.get();
                let first = (*head.next.get()).take();
                let (items, rest) = take_items(first, max);
                match &rest {
                    Some(node) => *node.prev.get() = Arc::downgrade(head),
                    None => *self.last.get() = Arc::clone(head),
                }
                *head.next.get() = rest;
                items
            };
            if !items.is_empty()
                && self.count.fetch_sub(items.len(), Ordering::SeqCst) == self.capacity
            {
                self.not_full.notify_all();
            }
            items
        };
        let n = items.len();
        dst.extend(items);
        n
    }

    // ── Inspection and indexed access ────────────────────────────────

    /// Clone of the head element, if any.
    pub fn peek(&self) -> Option<E>
    where
        E: Clone,
    {
        if self.count.load(Ordering::SeqCst) == 0 {
            return None;
        }
        let _guard = lock(&self.take_lock);
        // SAFETY: take lock held.
        unsafe { self.peek_locked().cloned() }
    }

    /// Clone of the element at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::IndexOutOfBounds`] if `index >= len`.
    pub fn get(&self, index: usize) -> Result<E, QueueError>
    where
        E: Clone,
    {
        let _lock = self.full_lock();
        // SAFETY: both locks held.
        unsafe {
            self.node_at(index)
                .and_then(|node| (*node.item.get()).clone())
                .ok_or_else(|| self.out_of_bounds(index))
        }
    }

    /// Replace the element at `index`, returning the previous one.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::IndexOutOfBounds`] if `index >= len`.
    pub fn set(&self, index: usize, item: E) -> Result<E, QueueError> {
        let _lock = self.full_lock();
        // SAFETY: both locks held.
        unsafe {
            self.node_at(index)
                .and_then(|node| (*node.item.get()).replace(item))
                .ok_or_else(|| self.out_of_bounds(index))
        }
    }

    /// Insert `item` so that it ends up at `index`. Appends if
    /// `index >= len`.
    ///
    /// # Errors
    ///
    /// Returns [`PutError::Full`] if the queue is at capacity, or
    /// [`PutError::Closed`] if it is closed.
    pub fn add(&self, index: usize, item: E) -> Result<(), PutError<E>> {
        let _lock = self.full_lock();
        if self.is_closed() {
            return Err(PutError::Closed(item));
        }
        if self.count.load(Ordering::SeqCst) == self.capacity {
            return Err(PutError::Full(item));
        }
        // SAFETY: both locks held.
        unsafe {
            let target = self
                .node_at(index)
                .and_then(|node| (*node.prev.get()).upgrade().map(|trail| (trail, node)));
            match target {
                Some((trail, node)) => {
                    let inserted = Node::new(item, Arc::downgrade(&trail));
                    *inserted.next.get() = Some(Arc::clone(&node));
                    *node.prev.get() = Arc::downgrade(&inserted);
                    *trail.next.get() = Some(inserted);
                }
                None => self.enqueue(item),
            }
        }
        let c = self.count.fetch_add(1, Ordering::SeqCst);
        if c + 1 < self.capacity {
            self.not_full.notify_one();
        }
        if c == 0 {
            self.not_empty.notify_one();
        }
        Ok(())
    }

    /// Remove and return the element at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::IndexOutOfBounds`] if `index >= len`.
    pub fn remove_at(&self, index: usize) -> Result<E, QueueError> {
        let _lock = self.full_lock();
        // SAFETY: both locks held.
        unsafe {
            self.node_at(index)
                .and_then(|node| {
                    let trail = (*node.prev.get()).upgrade()?;
                    self.unlink(&trail, &node)
                })
                .ok_or_else(|| self.out_of_bounds(index))
        }
    }

    /// Position of the first element equal to `value`.
    pub fn index_of(&self, value: &E) -> Option<usize>
    where
        E: PartialEq,
    {
        let _lock = self.full_lock();
        // SAFETY: both locks held.
        unsafe {
            let mut cursor = self.first_node();
            let mut index = 0;
            while let Some(node) = cursor {
                if (*node.item.get()).as_ref() == Some(value) {
                    return Some(index);
                }
                index += 1;
                cursor = (*node.next.get()).clone();
            }
        }
        None
    }

    /// Snapshot of the queue contents in FIFO order.
    pub fn to_vec(&self) -> Vec<E>
    where
        E: Clone,
    {
        let _lock = self.full_lock();
        let mut items = Vec::with_capacity(self.len());
        // SAFETY: both locks held.
        unsafe {
            let mut cursor = self.first_node();
            while let Some(node) = cursor {
                if let Some(item) = (*node.item.get()).as_ref() {
                    items.push(item.clone());
                }
                cursor = (*node.next.get()).clone();
            }
        }
        items
    }

    /// Weakly consistent iterator over clones of the elements.
    ///
    /// Each step briefly holds both locks. Elements removed after the
    /// iterator passed them are not affected; elements removed before it
    /// reaches them are skipped; nothing is yielded twice.
    pub fn iter(&self) -> Iter<'_, E>
    where
        E: Clone,
    {
        Iter::new(self)
    }

    // ── Internals ────────────────────────────────────────────────────

    fn full_lock(&self) -> FullLock<'_> {
        FullLock {
            _put: lock(&self.put_lock),
            _take: lock(&self.take_lock),
        }
    }

    fn signal_not_empty(&self) {
        let _guard = lock(&self.take_lock);
        self.not_empty.notify_one();
    }

    fn signal_not_full(&self) {
        let _guard = lock(&self.put_lock);
        self.not_full.notify_one();
    }

    fn out_of_bounds(&self, index: usize) -> QueueError {
        QueueError::IndexOutOfBounds {
            index,
            len: self.len(),
        }
    }

    /// Shared body of `take` and `poll_timeout`. `Ok(None)` means the
    /// deadline passed.
    fn take_until(&self, deadline: Option<Instant>) -> Result<Option<E>, QueueError> {
        let item;
        let c;
        {
            let mut guard = lock(&self.take_lock);
            loop {
                // Read before `count`: once closed is seen, every accepted
                // insertion is already counted.
                let closed = self.is_closed();
                if self.count.load(Ordering::SeqCst) > 0 {
                    // SAFETY: take lock held, count observed non-zero.
                    if let Some(taken) = unsafe { self.dequeue() } {
                        c = self.count.fetch_sub(1, Ordering::SeqCst);
                        if c > 1 {
                            self.not_empty.notify_one();
                        }
                        item = taken;
                        break;
                    }
                }
                if closed {
                    return Err(QueueError::Closed);
                }
                guard = match wait_until(&self.not_empty, guard, deadline) {
                    Some(guard) => guard,
                    None => return Ok(None),
                };
            }
        }
        if c == self.capacity {
            self.signal_not_full();
        }
        Ok(Some(item))
    }

    fn push_owned(&mut self, item: E) {
        // SAFETY: `&mut self` excludes every other accessor.
        unsafe { self.enqueue(item) };
        *self.count.get_mut() += 1;
    }

    /// Link a new node after `last`.
    ///
    /// # Safety
    ///
    /// Caller holds the put lock.
    unsafe fn enqueue(&self, item: E) {
        let last = &mut *self.last.get();
        let node = Node::new(item, Arc::downgrade(last));
        *last.next.get() = Some(Arc::clone(&node));
        *last = node;
    }

    /// Unlink the first live node, which becomes the new sentinel.
    ///
    /// # Safety
    ///
    /// Caller holds the take lock and has observed `count > 0`.
    unsafe fn dequeue(&self) -> Option<E> {
        let head = &mut *self.head.get();
        let first = (*head.next.get()).clone()?;
        *first.prev.get() = Weak::new();
        let item = (*first.item.get()).take();
        // The old sentinel keeps its `next` link for iterators still on it.
        *head = first;
        item
    }

    /// First node after the sentinel, live or not.
    ///
    /// # Safety
    ///
    /// Caller holds both locks.
    unsafe fn first_node(&self) -> Option<Arc<Node<E>>> {
        let head = &*self.head.get();
        (*head.next.get()).clone()
    }

    /// # Safety
    ///
    /// Caller holds the take lock for as long as the reference is used.
    unsafe fn peek_locked(&self) -> Option<&E> {
        if self.count.load(Ordering::SeqCst) == 0 {
            return None;
        }
        let head = &*self.head.get();
        let first = (*head.next.get()).as_ref()?;
        (*first.item.get()).as_ref()
    }

    /// Resolve the live node at `index`, walking from whichever end is
    /// closer.
    ///
    /// # Safety
    ///
    /// Caller holds both locks.
    unsafe fn node_at(&self, index: usize) -> Option<Arc<Node<E>>> {
        let len = self.count.load(Ordering::SeqCst);
        if index >= len {
            return None;
        }
        if index < len / 2 {
            let mut node = Arc::clone(&*self.head.get());
            for _ in 0..=index {
                node = (*node.next.get()).clone()?;
            }
            Some(node)
        } else {
            let mut node = Arc::clone(&*self.last.get());
            for _ in index + 1..len {
                node = (*node.prev.get()).upgrade()?;
            }
            Some(node)
        }
    }

    /// Splice `node` out from behind `trail` and return its item.
    ///
    /// # Safety
    ///
    /// Caller holds both locks and `trail` directly precedes `node`.
    unsafe fn unlink(&self, trail: &Arc<Node<E>>, node: &Arc<Node<E>>) -> Option<E> {
        let item = (*node.item.get()).take();
        let next = (*node.next.get()).clone();
        match &next {
            Some(after) => *after.prev.get() = Arc::downgrade(trail),
            None => *self.last.get() = Arc::clone(trail),
        }
        *trail.next.get() = next;
        if self.count.fetch_sub(1, Ordering::SeqCst) == self.capacity {
            self.not_full.notify_all();
        }
        item
    }
}

/// Empty up to `max` nodes starting at `first`. Returns the items and the
/// first node left untouched.
///
/// # Safety
///
/// Caller holds both locks of the owning queue.
unsafe fn take_items<E>(
    first: Option<Arc<Node<E>>>,
    max: usize,
) -> (Vec<E>, Option<Arc<Node<E>>>) {
    let mut items = Vec::new();
    let mut cursor = first;
    while let Some(node) = cursor {
        if items.len() == max {
            return (items, Some(node));
        }
        if let Some(item) = (*node.item.get()).take() {
            items.push(item);
        }
        cursor = (*node.next.get()).clone();
    }
    (items, None)
}

impl<E> Default for LinkedQueue<E> {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl<E> FromIterator<E> for LinkedQueue<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        let mut queue = Self::unbounded();
        for item in iter {
            queue.push_owned(item);
        }
        queue
    }
}

impl<'a, E: Clone> IntoIterator for &'a LinkedQueue<E> {
    type Item = E;
    type IntoIter = Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<E: fmt::Debug> fmt::Debug for LinkedQueue<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let _lock = self.full_lock();
        let mut list = f.debug_list();
        // SAFETY: both locks held.
        unsafe {
            let mut cursor = self.first_node();
            while let Some(node) = cursor {
                if let Some(item) = (*node.item.get()).as_ref() {
                    list.entry(item);
                }
                cursor = (*node.next.get()).clone();
            }
        }
        list.finish()
    }
}

/// Serializes the elements as a sequence in FIFO order, taken under both
/// locks.
impl<E: Serialize> Serialize for LinkedQueue<E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let _lock = self.full_lock();
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        // SAFETY: both locks held.
        unsafe {
            let mut cursor = self.first_node();
            while let Some(node) = cursor {
                if let Some(item) = (*node.item.get()).as_ref() {
                    seq.serialize_element(item)?;
                }
                cursor = (*node.next.get()).clone();
            }
        }
        seq.end()
    }
}

/// Deserializes a sequence into an unbounded, open queue.
impl<'de, E: Deserialize<'de>> Deserialize<'de> for LinkedQueue<E> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<E>::deserialize(deserializer).map(|items| items.into_iter().collect())
    }
}
