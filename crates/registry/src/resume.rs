use std::collections::VecDeque;

use fanout_core::Update;

/// Fixed-capacity ring of `{sequence, Update}` ordered by sequence (spec §3).
pub struct ResumeRing {
    entries: VecDeque<(u64, Update)>,
    cap: usize,
}

impl ResumeRing {
    pub fn with_capacity(cap: usize) -> Self {
        Self { entries: VecDeque::with_capacity(cap.min(1024)), cap: cap.max(1) }
    }

    pub fn append(&mut self, sequence: u64, update: Update) {
        if self.entries.len() >= self.cap {
            self.entries.pop_front();
        }
        self.entries.push_back((sequence, update));
    }

    /// `since(n)`: returns `ok=false` when `n` is older than the oldest
    /// retained entry; `(empty, true)` when the caller is current; otherwise
    /// every buffered update with `sequence > n`, in order.
    ///
    /// A ring with no entries yet (eagerly created on `Subscribe`, per spec
    /// §4.6 / §9 open question 3, before any broadcast has landed) always
    /// reports the caller current rather than falsely claiming data loss.
    pub fn since(&self, n: u64) -> (Vec<Update>, bool) {
        let Some((oldest, _)) = self.entries.front() else {
            return (Vec::new(), true);
        };
        if n < *oldest {
            return (Vec::new(), false);
        }
        let out = self.entries.iter().filter(|(seq, _)| *seq > n).map(|(_, u)| u.clone()).collect();
        (out, true)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
