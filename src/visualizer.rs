//! The hand-off between the tracking loop and whatever draws the tracked
//! point.
//!
//! The loop is the only writer and never waits on the reader: if the reader
//! happens to hold the snapshot when a position is published, the position
//! is held back and lands on the next write that gets the lock. The slot
//! always ends up at the latest published position.

use log::trace;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use crate::report_parser::AnchorPosition;
use crate::Point3;

/// What the tracking loop tells the outside world.
pub trait Visualizer {
    /// Called once, after enumeration.
    fn publish_anchor_roster(&mut self, anchors: &[AnchorPosition]);

    /// Called once per accepted report with the filtered position.
    fn publish_position(&mut self, position: Point3);

    /// Pushes out anything held back by an earlier publish. Called by the
    /// loop before each read.
    fn flush(&mut self) {}
}

/// The latest state a visualizer can draw.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Anchors in the order they were enumerated
    pub anchors: Vec<AnchorPosition>,
    /// Most recent filtered tag position, if any report was accepted yet
    pub position: Option<Point3>,
    /// How many positions have been published
    pub updates: u64,
}

/// Writing half of a single-slot mailbox. Owned by the tracking loop.
#[derive(Debug)]
pub struct PositionMailbox {
    shared: Arc<Mutex<Snapshot>>,
    pending: Option<Point3>,
    held_back: u64,
    skipped: u64,
}

/// Reading half of a single-slot mailbox. Owned by the visualizer thread.
#[derive(Debug)]
pub struct MailboxReader {
    shared: Arc<Mutex<Snapshot>>,
}

/// Creates a connected writer/reader pair.
pub fn mailbox() -> (PositionMailbox, MailboxReader) {
    let shared = Arc::new(Mutex::new(Snapshot::default()));
    (
        PositionMailbox {
            shared: Arc::clone(&shared),
            pending: None,
            held_back: 0,
            skipped: 0,
        },
        MailboxReader { shared },
    )
}

// A panic on the other side of the mailbox must not take the loop down.
fn relock(shared: &Mutex<Snapshot>) -> MutexGuard<'_, Snapshot> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl PositionMailbox {
    /// Publishes that found the reader holding the snapshot.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Whether a position is still waiting for the lock.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn try_deliver(&mut self) {
        let Some(position) = self.pending else {
            return;
        };
        let mut snapshot = match self.shared.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                trace!("visualizer busy, holding {}", position);
                return;
            }
        };
        snapshot.position = Some(position);
        snapshot.updates += self.held_back;
        drop(snapshot);
        self.pending = None;
        self.held_back = 0;
    }
}

impl Visualizer for PositionMailbox {
    fn publish_anchor_roster(&mut self, anchors: &[AnchorPosition]) {
        relock(&self.shared).anchors = anchors.to_vec();
    }

    fn publish_position(&mut self, position: Point3) {
        self.pending = Some(position);
        self.held_back += 1;
        self.try_deliver();
        if self.pending.is_some() {
            self.skipped += 1;
        }
    }

    fn flush(&mut self) {
        self.try_deliver();
    }
}

impl MailboxReader {
    /// Copies out the latest snapshot.
    pub fn snapshot(&self) -> Snapshot {
        relock(&self.shared).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn reader_sees_latest() {
        let (mut writer, reader) = mailbox();
        assert_eq!(reader.snapshot(), Snapshot::default());

        writer.publish_anchor_roster(&[Point3::new(0.0, 0.0, 1.0), Point3::new(4.0, 0.0, 1.0)]);
        writer.publish_position(Point3::new(1.0, 1.0, 1.0));
        writer.publish_position(Point3::new(2.0, 1.0, 1.0));

        let snapshot = reader.snapshot();
        assert_eq!(snapshot.anchors.len(), 2);
        assert_eq!(snapshot.position, Some(Point3::new(2.0, 1.0, 1.0)));
        assert_eq!(snapshot.updates, 2);
    }

    #[test]
    fn writer_never_waits_on_reader() {
        let (mut writer, reader) = mailbox();
        let held = reader.shared.lock().unwrap();
        writer.publish_position(Point3::new(1.0, 2.0, 3.0));
        assert_eq!(writer.skipped(), 1);
        assert!(writer.has_pending());
        drop(held);

        writer.publish_position(Point3::new(4.0, 5.0, 6.0));
        assert!(!writer.has_pending());
        let snapshot = reader.snapshot();
        assert_eq!(snapshot.position, Some(Point3::new(4.0, 5.0, 6.0)));
        assert_eq!(snapshot.updates, 2);
    }

    #[test]
    fn held_back_position_lands_on_flush() {
        let (mut writer, reader) = mailbox();
        writer.publish_position(Point3::new(1.0, 1.0, 1.0));

        let held = reader.shared.lock().unwrap();
        writer.publish_position(Point3::new(2.0, 2.0, 2.0));
        writer.flush();
        assert!(writer.has_pending());
        drop(held);

        // the tag went quiet; nothing else is published
        writer.flush();
        assert!(!writer.has_pending());
        let snapshot = reader.snapshot();
        assert_eq!(snapshot.position, Some(Point3::new(2.0, 2.0, 2.0)));
        assert_eq!(snapshot.updates, 2);
    }

    #[test]
    fn reader_on_another_thread() {
        let (mut writer, reader) = mailbox();
        let th = thread::spawn(move || {
            let mut last = 0;
            while last < 1 {
                last = reader.snapshot().updates;
            }
            last
        });
        // Publishes can be skipped while the reader holds the snapshot
        while !th.is_finished() {
            writer.publish_position(Point3::new(0.5, 0.5, 0.5));
            thread::yield_now();
        }
        assert!(th.join().unwrap() >= 1);
    }
}
