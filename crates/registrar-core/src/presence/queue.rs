//! Buffered event queue for poll-delivered endpoints

use std::collections::VecDeque;

use parking_lot::Mutex;

/// FIFO of events waiting for the next poll.
///
/// Appends may come from any number of routing tasks; [`EventQueue::drain`]
/// takes everything present at call time in one critical section, so a poll
/// never observes a partial queue and never sees an event twice.
///
/// A queue whose endpoint was replaced by a socket is [closed](EventQueue::close):
/// it hands back its backlog once and refuses every later append.
#[derive(Debug)]
pub struct EventQueue<E> {
    inner: Mutex<Inner<E>>,
    capacity: Option<usize>,
}

#[derive(Debug)]
struct Inner<E> {
    events: VecDeque<E>,
    closed: bool,
}

impl<E> EventQueue<E> {
    /// Create a queue. `capacity` of `None` means unbounded.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                events: VecDeque::new(),
                closed: false,
            }),
            capacity,
        }
    }

    /// Append an event. On overflow the oldest event is evicted and returned
    /// as `Ok(Some(..))`. A closed queue gives the event back as `Err`.
    pub fn push(&self, event: E) -> Result<Option<E>, E> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(event);
        }
        let evicted = match self.capacity {
            Some(0) => return Ok(Some(event)),
            Some(cap) if inner.events.len() >= cap => inner.events.pop_front(),
            _ => None,
        };
        inner.events.push_back(event);
        Ok(evicted)
    }

    /// Remove and return every buffered event, oldest first
    pub fn drain(&self) -> Vec<E> {
        let taken = std::mem::take(&mut self.inner.lock().events);
        taken.into()
    }

    /// Refuse further appends and return what is left, oldest first
    pub fn close(&self) -> Vec<E> {
        let mut inner = self.inner.lock();
        inner.closed = true;
        std::mem::take(&mut inner.events).into()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().events.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_drain_is_fifo_and_empties() {
        let queue = EventQueue::new(None);
        for i in 0..5 {
            assert_eq!(queue.push(i), Ok(None));
        }
        assert_eq!(queue.drain(), vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let queue = EventQueue::new(Some(2));
        queue.push("a").unwrap();
        queue.push("b").unwrap();
        assert_eq!(queue.push("c"), Ok(Some("a")));
        assert_eq!(queue.drain(), vec!["b", "c"]);
    }

    #[test]
    fn test_zero_capacity_buffers_nothing() {
        let queue = EventQueue::new(Some(0));
        assert_eq!(queue.push(1), Ok(Some(1)));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_closed_queue_hands_back_backlog_then_refuses() {
        let queue = EventQueue::new(None);
        queue.push(1).unwrap();
        queue.push(2).unwrap();

        assert_eq!(queue.close(), vec![1, 2]);
        assert!(queue.is_closed());
        assert_eq!(queue.push(3), Err(3));
        assert!(queue.drain().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_all_drained_once() {
        let queue = Arc::new(EventQueue::new(None));
        let mut tasks = Vec::new();
        for writer in 0..8u32 {
            let queue = queue.clone();
            tasks.push(tokio::spawn(async move {
                for n in 0..100u32 {
                    queue.push(writer * 1000 + n).unwrap();
                }
            }));
        }

        let mut seen = Vec::new();
        for task in tasks {
            task.await.unwrap();
            seen.extend(queue.drain());
        }
        seen.extend(queue.drain());

        assert_eq!(seen.len(), 800);
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 800);
    }
}
