use crate::conversation::TriggerId;
use std::collections::{HashSet, VecDeque};

/// Bounded recency set of trigger ids already handled or in flight.
///
/// Once `capacity` is exceeded the oldest id is forgotten, so a very late
/// duplicate can slip through.
#[derive(Debug)]
pub struct ClaimSet {
    capacity: usize,
    order: VecDeque<TriggerId>,
    members: HashSet<TriggerId>,
}

impl ClaimSet {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
        }
    }

    /// Insert `id`, returning `false` if it was already claimed.
    pub fn try_claim(&mut self, id: &TriggerId) -> bool {
        if self.members.contains(id) {
            return false;
        }
        if self.order.len() == self.capacity
            && let Some(evicted) = self.order.pop_front()
        {
            self.members.remove(&evicted);
        }
        self.order.push_back(id.clone());
        self.members.insert(id.clone());
        true
    }

    pub fn contains(&self, id: &TriggerId) -> bool {
        self.members.contains(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
