//! C7 — TurnScheduler: a per-team rotating queue of connected client IDs.
//! Per §9 "Turn queue": an explicit order alongside the ID→connection map,
//! not reliance on any map's iteration order.

use std::collections::VecDeque;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// When the controller calls [`TurnScheduler::rotate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[clap(rename_all = "lowercase")]
pub enum RotatePolicy {
    /// Rotate after every accepted step, including TPW/TMSG.
    Phase,
    /// Rotate only after an accepted phase D (a completed block).
    Block,
}

#[derive(Clone, Debug, Default)]
pub struct TurnScheduler {
    order: VecDeque<u64>,
}

impl TurnScheduler {
    pub fn new() -> Self {
        Self { order: VecDeque::new() }
    }

    /// Seed the queue from a known connection order (match start).
    pub fn seed(&mut self, cids: impl IntoIterator<Item = u64>) {
        self.order = cids.into_iter().collect();
    }

    /// Add `cid` to the tail. Callers must only do this while no match is
    /// in progress; the scheduler itself does not enforce that gate.
    pub fn append(&mut self, cid: u64) {
        if !self.order.contains(&cid) {
            self.order.push_back(cid);
        }
    }

    /// Remove `cid`, preserving the relative order of the rest.
    pub fn remove(&mut self, cid: u64) {
        self.order.retain(|&c| c != cid);
    }

    /// The client currently authorized to answer, if any.
    pub fn current(&self) -> Option<u64> {
        self.order.front().copied()
    }

    /// Move the head to the tail. No-op on an empty or single-element queue.
    pub fn rotate(&mut self) {
        if let Some(front) = self.order.pop_front() {
            self.order.push_back(front);
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Snapshot of the full order, head first, for the `turn` broadcast.
    pub fn order(&self) -> Vec<u64> {
        self.order.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotate_moves_head_to_tail() {
        let mut sched = TurnScheduler::new();
        sched.seed([1, 2, 3]);
        assert_eq!(sched.current(), Some(1));
        sched.rotate();
        assert_eq!(sched.current(), Some(2));
        assert_eq!(sched.order(), vec![2, 3, 1]);
    }

    #[test]
    fn remove_preserves_relative_order() {
        let mut sched = TurnScheduler::new();
        sched.seed([1, 2, 3, 4]);
        sched.remove(2);
        assert_eq!(sched.order(), vec![1, 3, 4]);
    }

    #[test]
    fn append_is_idempotent_and_only_grows_tail() {
        let mut sched = TurnScheduler::new();
        sched.append(1);
        sched.append(2);
        sched.append(1);
        assert_eq!(sched.order(), vec![1, 2]);
    }

    #[test]
    fn rotate_on_empty_queue_is_a_no_op() {
        let mut sched = TurnScheduler::new();
        sched.rotate();
        assert_eq!(sched.current(), None);
    }

    #[test]
    fn length_tracks_connected_clients() {
        let mut sched = TurnScheduler::new();
        sched.seed([1, 2, 3]);
        assert_eq!(sched.len(), 3);
        sched.remove(2);
        assert_eq!(sched.len(), 2);
        assert!(!sched.is_empty());
    }
}
