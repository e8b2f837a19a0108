// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::{TryReserveError, VecDeque, vec_deque};

use crate::entry::Entry;

/// FIFO of entries with a privileged head slot for requeue.
///
/// Has no notion of capacity and no locking; `BufferEngine` enforces both.
#[derive(Debug, Default)]
pub(crate) struct BoundedQueue {
    entries: VecDeque<Entry>,
}

impl BoundedQueue {
    pub(crate) fn new() -> Self { Self::default() }

    /// Makes room for `additional` more entries without aborting on OOM.
    pub(crate) fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        self.entries.try_reserve(additional)
    }

    pub(crate) fn push_back(&mut self, entry: Entry) { self.entries.push_back(entry); }

    pub(crate) fn push_front(&mut self, entry: Entry) { self.entries.push_front(entry); }

    pub(crate) fn pop_front(&mut self) -> Option<Entry> { self.entries.pop_front() }

    pub(crate) fn len(&self) -> usize { self.entries.len() }

    pub(crate) fn clear(&mut self) { self.entries.clear(); }

    /// Head-first iterator.
    pub(crate) fn iter(&self) -> vec_deque::Iter<'_, Entry> { self.entries.iter() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u64) -> Entry { Entry::new(id, "INFO".into(), "test".into(), format!("m{id}"), 0) }

    #[test]
    fn push_back_is_fifo() {
        let mut queue = BoundedQueue::new();
        for id in 1..=3 {
            queue.push_back(entry(id));
        }
        assert_eq!(queue.len(), 3);
        let ids: Vec<u64> = std::iter::from_fn(|| queue.pop_front())
            .map(|e| e.id())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn push_front_jumps_the_line() {
        let mut queue = BoundedQueue::new();
        queue.push_back(entry(2));
        queue.push_back(entry(3));
        queue.push_front(entry(1));
        let ids: Vec<u64> = queue.iter().map(Entry::id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn clear_releases_everything() {
        let mut queue = BoundedQueue::new();
        queue.try_reserve(4).unwrap();
        queue.push_back(entry(1));
        queue.push_back(entry(2));
        queue.clear();
        assert_eq!(queue.len(), 0);
        assert!(queue.pop_front().is_none());
    }
}
