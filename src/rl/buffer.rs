//! Experience replay buffer.

use std::collections::VecDeque;

use rand::seq::index;
use rand::Rng;

/// A single `(state, action, reward, next_state, terminal)` experience.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Observation before the action.
    pub state: Vec<f64>,
    /// Id of the action taken.
    pub action: usize,
    /// Shaped reward received.
    pub reward: f64,
    /// Observation after the action.
    pub next_state: Vec<f64>,
    /// Whether the episode ended on this transition.
    pub terminal: bool,
}

/// Fixed-capacity FIFO store of transitions.
///
/// Pushing beyond capacity evicts the oldest transition. Contents are not
/// persisted; only learned weights survive a restart.
#[derive(Debug)]
pub struct ExperienceReplayBuffer {
    transitions: VecDeque<Transition>,
    capacity: usize,
}

impl ExperienceReplayBuffer {
    /// Creates an empty buffer holding at most `capacity` transitions.
    pub fn new(capacity: usize) -> Self {
        Self {
            transitions: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    /// Appends a transition, evicting the oldest one when full.
    pub fn push(&mut self, transition: Transition) {
        if self.capacity == 0 {
            return;
        }
        if self.transitions.len() == self.capacity {
            self.transitions.pop_front();
        }
        self.transitions.push_back(transition);
    }

    /// Draws `n` distinct transitions uniformly at random.
    ///
    /// Returns `None` when fewer than `n` transitions are stored, which the
    /// caller treats as "not enough data to train".
    pub fn sample_batch<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Option<Vec<&Transition>> {
        if self.transitions.len() < n {
            return None;
        }
        Some(
            index::sample(rng, self.transitions.len(), n)
                .into_iter()
                .map(|i| &self.transitions[i])
                .collect(),
        )
    }

    /// Returns the number of stored transitions.
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    /// Returns true if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterates stored transitions from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.iter()
    }

    /// Clears all stored transitions.
    pub fn clear(&mut self) {
        self.transitions.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn transition(tag: usize) -> Transition {
        Transition {
            state: vec![tag as f64],
            action: tag,
            reward: tag as f64,
            next_state: vec![tag as f64 + 1.0],
            terminal: false,
        }
    }

    #[test]
    fn fifo_eviction_keeps_newest() {
        let capacity = 5;
        let extra = 3;
        let mut buf = ExperienceReplayBuffer::new(capacity);
        for i in 0..capacity + extra {
            buf.push(transition(i));
        }

        assert_eq!(buf.len(), capacity);
        let kept: Vec<usize> = buf.iter().map(|t| t.action).collect();
        assert_eq!(kept, vec![3, 4, 5, 6, 7]);
        for evicted in 0..extra {
            assert!(!kept.contains(&evicted));
        }
    }

    #[test]
    fn sample_with_insufficient_data_is_none() {
        let mut buf = ExperienceReplayBuffer::new(10);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(buf.sample_batch(2, &mut rng).is_none());
        buf.push(transition(0));
        assert!(buf.sample_batch(2, &mut rng).is_none());
        buf.push(transition(1));
        assert_eq!(buf.sample_batch(2, &mut rng).map(|b| b.len()), Some(2));
    }

    #[test]
    fn sample_is_distinct_within_a_batch() {
        let mut buf = ExperienceReplayBuffer::new(50);
        for i in 0..50 {
            buf.push(transition(i));
        }
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let batch = buf.sample_batch(16, &mut rng).unwrap();
            let ids: HashSet<usize> = batch.iter().map(|t| t.action).collect();
            assert_eq!(ids.len(), 16);
        }
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let mut buf = ExperienceReplayBuffer::new(0);
        buf.push(transition(0));
        assert!(buf.is_empty());
    }
}
