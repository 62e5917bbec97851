use super::segment::SegmentId;
use std::collections::VecDeque;

/// Insertion-ordered set of the last `capacity` discovered ids, used only to
/// deduplicate discovery.
#[derive(Debug, Clone)]
pub struct RecentIdWindow {
    capacity: usize,
    order: VecDeque<SegmentId>,
}

impl RecentIdWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
        }
    }

    pub fn contains(&self, id: SegmentId) -> bool {
        self.order.contains(&id)
    }

    /// Records `id`, returning the entry that fell out of the window, if any.
    /// Re-inserting an id already present is a no-op.
    pub fn insert(&mut self, id: SegmentId) -> Option<SegmentId> {
        if self.contains(id) {
            return None;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity {
            self.order.pop_front()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Newest first.
    pub fn newest(&self, n: usize) -> Vec<SegmentId> {
        self.order.iter().rev().take(n).copied().collect()
    }
}
