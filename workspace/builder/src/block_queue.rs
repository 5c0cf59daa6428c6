use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

struct State<T> {
    queue: VecDeque<T>,
    active: usize,
    maxsize: usize,
}

/// Bounded queue used by both the dispatch side (feeding build-requests to
/// the worker pool) and the ingest queue: `put` blocks while
/// `active + pending >= maxsize`, `task_done` atomically decrements the
/// active count, and `load` exposes `(active + pending) / maxsize` as the
/// builder's load metric, matching `mini_buildd.misc.BlockQueue` (§4.5).
pub struct BlockQueue<T> {
    state: Mutex<State<T>>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<T> BlockQueue<T> {
    pub fn new(maxsize: usize) -> Self {
        BlockQueue {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                active: 0,
                maxsize,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    /// Blocks until there is room, then enqueues `item`.
    pub fn put(&self, item: T) {
        let mut state = self.state.lock().expect("block queue poisoned");
        while state.active + state.queue.len() >= state.maxsize {
            state = self.not_full.wait(state).expect("block queue poisoned");
        }
        state.queue.push_back(item);
        self.not_empty.notify_one();
    }

    /// Blocks until an item is available, then dequeues it and marks it
    /// active (so `load` reflects it until `task_done`).
    pub fn get(&self) -> T {
        let mut state = self.state.lock().expect("block queue poisoned");
        while state.queue.is_empty() {
            state = self.not_empty.wait(state).expect("block queue poisoned");
        }
        let item = state.queue.pop_front().expect("queue checked non-empty");
        state.active += 1;
        item
    }

    /// Marks one previously-`get`-ed item as finished, freeing a slot.
    pub fn task_done(&self) {
        let mut state = self.state.lock().expect("block queue poisoned");
        state.active = state.active.saturating_sub(1);
        self.not_full.notify_one();
    }

    /// `(active + pending) / maxsize`, the builder's load metric.
    pub fn load(&self) -> f64 {
        let state = self.state.lock().expect("block queue poisoned");
        if state.maxsize == 0 {
            return 1.0;
        }
        (state.active + state.queue.len()) as f64 / state.maxsize as f64
    }

    pub fn pending(&self) -> usize {
        self.state.lock().expect("block queue poisoned").queue.len()
    }

    pub fn active(&self) -> usize {
        self.state.lock().expect("block queue poisoned").active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn put_then_get_round_trips() {
        let queue: BlockQueue<i32> = BlockQueue::new(4);
        queue.put(1);
        queue.put(2);
        assert_eq!(queue.get(), 1);
        assert_eq!(queue.get(), 2);
    }

    #[test]
    fn load_reflects_active_and_pending() {
        let queue: BlockQueue<i32> = BlockQueue::new(4);
        assert_eq!(queue.load(), 0.0);
        queue.put(1);
        queue.put(2);
        assert_eq!(queue.load(), 0.5);
        let _ = queue.get();
        assert_eq!(queue.load(), 0.5);
        queue.task_done();
        assert_eq!(queue.load(), 0.25);
    }

    #[test]
    fn put_blocks_until_task_done_frees_a_slot() {
        let queue = Arc::new(BlockQueue::new(1));
        queue.put(1);

        let producer = Arc::clone(&queue);
        let handle = thread::spawn(move || {
            producer.put(2);
        });

        thread::sleep(Duration::from_millis(50));
        assert_eq!(queue.pending(), 1);

        let _ = queue.get();
        queue.task_done();
        handle.join().unwrap();
        assert_eq!(queue.pending(), 1);
    }
}
