use std::sync::Arc;

use super::{LinkedQueue, Node};

/// Iterator returned by [`LinkedQueue::iter`].
///
/// Holds a counted reference to the node it rests on together with a clone
/// of that node's element, captured when the cursor moved there.
pub struct Iter<'a, E> {
    queue: &'a LinkedQueue<E>,
    next: Option<(Arc<Node<E>>, E)>,
    last_ret: Option<Arc<Node<E>>>,
}

impl<'a, E: Clone> Iter<'a, E> {
    pub(super) fn new(queue: &'a LinkedQueue<E>) -> Self {
        let _lock = queue.full_lock();
        // SAFETY: both locks held.
        let next = unsafe { first_live(queue.first_node()) };
        Self {
            queue,
            next,
            last_ret: None,
        }
    }
}

impl<E> Iter<'_, E> {
    /// Remove the element most recently yielded by [`next`](Iterator::next).
    ///
    /// Returns `false` if nothing has been yielded yet, if it was already
    /// removed through this iterator, or if it left the queue some other way
    /// in the meantime.
    pub fn remove(&mut self) -> bool {
        let Some(node) = self.last_ret.take() else {
            return false;
        };
        let _lock = self.queue.full_lock();
        // SAFETY: both locks held. A node still holding an item is linked,
        // and its `prev` is its live predecessor.
        unsafe {
            if (*node.item.get()).is_none() {
                return false;
            }
            match (*node.prev.get()).upgrade() {
                Some(trail) => self.queue.unlink(&trail, &node).is_some(),
                None => false,
            }
        }
    }
}

impl<E: Clone> Iterator for Iter<'_, E> {
    type Item = E;

    fn next(&mut self) -> Option<E> {
        let (node, item) = self.next.take()?;
        let _lock = self.queue.full_lock();
        // SAFETY: both locks held.
        self.next = unsafe { first_live((*node.next.get()).clone()) };
        self.last_ret = Some(node);
        Some(item)
    }
}

/// First node at or after `cursor` that still holds an element.
///
/// # Safety
///
/// Caller holds both locks of the owning queue.
unsafe fn first_live<E: Clone>(mut cursor: Option<Arc<Node<E>>>) -> Option<(Arc<Node<E>>, E)> {
    while let Some(node) = cursor {
        if let Some(item) = (*node.item.get()).clone() {
            return Some((node, item));
        }
        cursor = (*node.next.get()).clone();
    }
    None
}
