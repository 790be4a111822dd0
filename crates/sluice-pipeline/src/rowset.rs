//! Bounded row queue between one producer and one consumer transform.
//!
//! `put` blocks while the queue is full, `get` blocks while it is empty.
//! Marking the set done wakes every waiter: blocked producers fail with
//! [`PipelineError::RowSetClosed`], consumers drain what is left and then
//! see end of stream.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use sluice_types::{Row, RowMeta};

use crate::error::{PipelineError, Result};

/// A row together with the schema it was written under.
pub type MetaRow = (Arc<RowMeta>, Row);

/// Outcome of a non-blocking or timed read.
#[derive(Debug)]
pub enum Poll {
    Row(MetaRow),
    /// Nothing available yet.
    Empty,
    /// Done and fully drained.
    Done,
}

struct Buffer {
    rows: VecDeque<MetaRow>,
    done: bool,
}

pub struct RowSet {
    origin: String,
    destination: String,
    capacity: usize,
    buffer: Mutex<Buffer>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl RowSet {
    pub fn new(
        origin: impl Into<String>,
        destination: impl Into<String>,
        capacity: usize,
    ) -> Result<Self> {
        let origin = origin.into();
        let destination = destination.into();
        if capacity == 0 {
            return Err(PipelineError::Configuration(format!(
                "row set {} -> {} needs a capacity greater than zero",
                origin, destination
            )));
        }
        Ok(Self {
            origin,
            destination,
            capacity,
            buffer: Mutex::new(Buffer {
                rows: VecDeque::with_capacity(capacity.min(1024)),
                done: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Rows currently buffered.
    pub fn size(&self) -> usize {
        self.buffer.lock().rows.len()
    }

    pub fn is_done(&self) -> bool {
        self.buffer.lock().done
    }

    /// Done and nothing left to read.
    pub fn is_finished(&self) -> bool {
        let buffer = self.buffer.lock();
        buffer.done && buffer.rows.is_empty()
    }

    /// Enqueue a row, waiting for space. Fails once the set is done.
    pub fn put(&self, meta: Arc<RowMeta>, row: Row) -> Result<()> {
        let mut buffer = self.buffer.lock();
        while buffer.rows.len() >= self.capacity && !buffer.done {
            self.not_full.wait(&mut buffer);
        }
        if buffer.done {
            return Err(PipelineError::RowSetClosed(self.label()));
        }
        buffer.rows.push_back((meta, row));
        self.not_empty.notify_one();
        Ok(())
    }

    /// Dequeue a row, waiting until one arrives. `None` means end of stream.
    pub fn get(&self) -> Option<MetaRow> {
        let mut buffer = self.buffer.lock();
        loop {
            if let Some(entry) = buffer.rows.pop_front() {
                self.not_full.notify_one();
                return Some(entry);
            }
            if buffer.done {
                return None;
            }
            self.not_empty.wait(&mut buffer);
        }
    }

    /// Dequeue without waiting.
    pub fn try_get(&self) -> Poll {
        let mut buffer = self.buffer.lock();
        self.take(&mut buffer)
    }

    /// Dequeue, waiting at most `timeout` for a row to arrive.
    pub fn get_timeout(&self, timeout: Duration) -> Poll {
        let mut buffer = self.buffer.lock();
        if buffer.rows.is_empty() && !buffer.done {
            let _ = self.not_empty.wait_for(&mut buffer, timeout);
        }
        self.take(&mut buffer)
    }

    fn take(&self, buffer: &mut Buffer) -> Poll {
        match buffer.rows.pop_front() {
            Some(entry) => {
                self.not_full.notify_one();
                Poll::Row(entry)
            }
            None if buffer.done => Poll::Done,
            None => Poll::Empty,
        }
    }

    /// No further rows will be accepted. Idempotent.
    pub fn set_done(&self) {
        self.buffer.lock().done = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Drop buffered rows and mark done. Returns the number of rows discarded.
    pub fn discard_and_close(&self) -> usize {
        let mut buffer = self.buffer.lock();
        let discarded = buffer.rows.len();
        buffer.rows.clear();
        buffer.done = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
        discarded
    }

    fn label(&self) -> String {
        format!("{} -> {}", self.origin, self.destination)
    }
}

impl std::fmt::Debug for RowSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowSet")
            .field("origin", &self.origin)
            .field("destination", &self.destination)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sluice_types::{Value, ValueMeta, ValueType};
    use std::thread;

    fn meta() -> Arc<RowMeta> {
        Arc::new(RowMeta::from_fields([ValueMeta::new("n", ValueType::Integer)]).unwrap())
    }

    fn row(n: i64) -> Row {
        Row::new(vec![Value::Integer(n)])
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = RowSet::new("a", "b", 0).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_fifo_order() {
        let rs = RowSet::new("a", "b", 4).unwrap();
        for n in 0..3 {
            rs.put(meta(), row(n)).unwrap();
        }
        rs.set_done();
        let got: Vec<i64> = std::iter::from_fn(|| rs.get())
            .map(|(_, r)| r[0].as_i64().unwrap())
            .collect();
        assert_eq!(got, vec![0, 1, 2]);
    }

    #[test]
    fn test_put_after_done_fails() {
        let rs = RowSet::new("a", "b", 4).unwrap();
        rs.set_done();
        rs.set_done();
        assert!(matches!(
            rs.put(meta(), row(1)),
            Err(PipelineError::RowSetClosed(_))
        ));
    }

    #[test]
    fn test_done_releases_blocked_producer() {
        let rs = Arc::new(RowSet::new("a", "b", 1).unwrap());
        rs.put(meta(), row(1)).unwrap();

        let producer = {
            let rs = rs.clone();
            thread::spawn(move || rs.put(meta(), row(2)))
        };
        thread::sleep(Duration::from_millis(20));
        rs.set_done();

        let result = producer.join().unwrap();
        assert!(result.is_err());
        // The row buffered before done is still readable.
        assert!(rs.get().is_some());
        assert!(rs.get().is_none());
    }

    #[test]
    fn test_done_releases_blocked_consumer() {
        let rs = Arc::new(RowSet::new("a", "b", 1).unwrap());
        let consumer = {
            let rs = rs.clone();
            thread::spawn(move || rs.get())
        };
        thread::sleep(Duration::from_millis(20));
        rs.set_done();
        assert!(consumer.join().unwrap().is_none());
    }

    #[test]
    fn test_get_timeout_and_try_get() {
        let rs = RowSet::new("a", "b", 2).unwrap();
        assert!(matches!(rs.try_get(), Poll::Empty));
        assert!(matches!(
            rs.get_timeout(Duration::from_millis(5)),
            Poll::Empty
        ));
        rs.put(meta(), row(7)).unwrap();
        assert!(matches!(rs.get_timeout(Duration::from_millis(5)), Poll::Row(_)));
        rs.set_done();
        assert!(matches!(rs.try_get(), Poll::Done));
    }

    #[test]
    fn test_discard_and_close() {
        let rs = RowSet::new("a", "b", 8).unwrap();
        rs.put(meta(), row(1)).unwrap();
        rs.put(meta(), row(2)).unwrap();
        assert_eq!(rs.discard_and_close(), 2);
        assert!(rs.is_finished());
        assert!(rs.get().is_none());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_rows_enqueued_before_done_are_all_dequeued(
            count in 0usize..300,
            capacity in 1usize..16,
        ) {
            let rs = Arc::new(RowSet::new("gen", "count", capacity).unwrap());
            let producer = {
                let rs = rs.clone();
                thread::spawn(move || {
                    let meta = meta();
                    for n in 0..count {
                        rs.put(meta.clone(), row(n as i64)).unwrap();
                    }
                    rs.set_done();
                })
            };

            let mut seen = Vec::new();
            while let Some((_, r)) = rs.get() {
                seen.push(r[0].as_i64().unwrap());
            }
            producer.join().unwrap();

            prop_assert_eq!(seen.len(), count);
            prop_assert!(seen.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
