//! Bounded, thread-safe, close-aware FIFO.
//!
//! The original runtime backs this with a growable array, a mutex and a
//! counting semaphore. A `VecDeque` behind a `parking_lot::Mutex` plus a
//! `Condvar` is the natural Rust rendition of the same protocol: the
//! semaphore's count is just the deque's length, and waiting for "count >
//! 0 or closed" is exactly what a condition variable predicate loop
//! expresses.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

struct State<T> {
    queue: VecDeque<T>,
    closed: bool,
}

/// A multi-producer/multi-consumer FIFO of `T`, closable from any sender.
pub struct Pipe<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
}

impl<T> Pipe<T> {
    pub fn new() -> Self {
        Pipe {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
        }
    }

    /// Enqueue a value. Fatal if the pipe is already closed.
    pub fn send(&self, value: T) {
        let mut state = self.state.lock();
        if state.closed {
            panic!("eyot-pipe: sending on a closed pipe");
        }
        state.queue.push_back(value);
        self.not_empty.notify_one();
    }

    /// Block until a value is available or the pipe is closed and empty.
    /// Returns `None` for end-of-stream.
    pub fn receive(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(value) = state.queue.pop_front() {
                return Some(value);
            }
            if state.closed {
                return None;
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Receive exactly `count` values in order, or `None` (end-of-stream)
    /// if the pipe closes before `count` values arrive.
    pub fn receive_multiple(&self, count: usize) -> Option<Vec<T>> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.receive()?);
        }
        Some(out)
    }

    /// Close the pipe. Every receiver currently blocked wakes and
    /// observes closed+empty once it drains whatever was already queued
    /// (this broadcasts, unlike the original's single semaphore post —
    /// see the pipe close open question in this workspace's design
    /// notes).
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        drop(state);
        self.not_empty.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for Pipe<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fifo_order_is_preserved() {
        let pipe = Pipe::new();
        pipe.send(1);
        pipe.send(2);
        pipe.send(3);
        assert_eq!(pipe.receive(), Some(1));
        assert_eq!(pipe.receive(), Some(2));
        assert_eq!(pipe.receive(), Some(3));
    }

    #[test]
    fn close_then_drain_then_end_of_stream() {
        let pipe = Pipe::new();
        pipe.send(1);
        pipe.close();
        assert_eq!(pipe.receive(), Some(1));
        assert_eq!(pipe.receive(), None);
        assert_eq!(pipe.receive(), None);
    }

    #[test]
    #[should_panic(expected = "closed pipe")]
    fn send_after_close_panics() {
        let pipe = Pipe::new();
        pipe.close();
        pipe.send(1);
    }

    #[test]
    fn receive_multiple_collects_in_order() {
        let pipe = Pipe::new();
        for v in [1, 2, 3] {
            pipe.send(v);
        }
        assert_eq!(pipe.receive_multiple(3), Some(vec![1, 2, 3]));
    }

    #[test]
    fn receive_multiple_returns_none_on_premature_close() {
        let pipe = Pipe::new();
        pipe.send(1);
        pipe.close();
        assert_eq!(pipe.receive_multiple(2), None);
    }

    #[test]
    fn every_blocked_receiver_wakes_on_close() {
        let pipe = Arc::new(Pipe::<i32>::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pipe = Arc::clone(&pipe);
                thread::spawn(move || pipe.receive())
            })
            .collect();

        // Give every thread a chance to block on the condvar.
        thread::sleep(std::time::Duration::from_millis(50));
        pipe.close();

        for h in handles {
            assert_eq!(h.join().unwrap(), None);
        }
    }

    #[test]
    fn concurrent_senders_preserve_fifo_per_single_sender_discipline() {
        let pipe = Arc::new(Pipe::<i32>::new());
        let sender = {
            let pipe = Arc::clone(&pipe);
            thread::spawn(move || {
                for i in 0..100 {
                    pipe.send(i);
                }
                pipe.close();
            })
        };
        sender.join().unwrap();

        let mut received = Vec::new();
        while let Some(v) = pipe.receive() {
            received.push(v);
        }
        assert_eq!(received, (0..100).collect::<Vec<_>>());
    }
}
