/*!
# Recomputation Recorder

Counts evaluations of tracked expressions. The recorder belongs to one execution
context: [`Recorder`] is neither `Send` nor `Sync`, and producers on other threads go
through a [`RemoteRecorder`] whose events are applied on the owning context the next
time it takes a snapshot or resets.
*/

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::sync::OnceLock;
use std::thread::{self, ThreadId};

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

/// Evaluation count and most recent declaration site of one tracked id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecomputeRecord {
    pub count: u64,
    pub file: String,
    pub line: u32,
}

/// Point-in-time copy of every record, ordered by id
pub type Snapshot = BTreeMap<String, RecomputeRecord>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecorderError {
    #[error("Shared recorder is owned by thread {owner}, accessed from {current}")]
    WrongContext { owner: String, current: String },

    #[error("Recorder has been dropped")]
    Disconnected,
}

#[derive(Debug)]
struct RecordEvent {
    id: String,
    file: String,
    line: u32,
}

#[derive(Debug)]
struct RecorderInner {
    records: HashMap<String, RecomputeRecord>,
    sender: Sender<RecordEvent>,
    receiver: Receiver<RecordEvent>,
}

impl RecorderInner {
    fn apply(&mut self, id: String, file: String, line: u32) {
        let record = self.records.entry(id).or_insert_with(|| RecomputeRecord {
            count: 0,
            file: String::new(),
            line: 0,
        });
        record.count += 1;
        record.file = file;
        record.line = line;
    }

    fn pump(&mut self) {
        while let Ok(event) = self.receiver.try_recv() {
            self.apply(event.id, event.file, event.line);
        }
    }
}

/// Handle to a recorder. Clones share the same counts.
#[derive(Debug, Clone)]
pub struct Recorder {
    inner: Rc<RefCell<RecorderInner>>,
}

static SHARED_OWNER: OnceLock<ThreadId> = OnceLock::new();

thread_local! {
    static SHARED: Recorder = Recorder::new();
}

impl Recorder {
    /// An isolated recorder, for tests or scoped measurements
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            inner: Rc::new(RefCell::new(RecorderInner {
                records: HashMap::new(),
                sender,
                receiver,
            })),
        }
    }

    /// The process-wide recorder.
    ///
    /// The first thread to call this becomes its owner; any other thread gets
    /// [`RecorderError::WrongContext`] and should use a [`RemoteRecorder`] instead.
    pub fn shared() -> Result<Recorder, RecorderError> {
        let current = thread::current().id();
        let owner = *SHARED_OWNER.get_or_init(|| current);
        if owner != current {
            return Err(RecorderError::WrongContext {
                owner: format!("{owner:?}"),
                current: format!("{current:?}"),
            });
        }
        Ok(SHARED.with(Recorder::clone))
    }

    /// Count one evaluation of `id` and overwrite its location
    pub fn record(&self, id: &str, file: &str, line: u32) {
        trace!(id, file, line, "recompute");
        let mut inner = self.inner.borrow_mut();
        // Earlier remote events land first so the stored location is this call's
        inner.pump();
        inner.apply(id.to_string(), file.to_string(), line);
    }

    /// Drop every record, including events still queued by remote handles
    pub fn reset(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.pump();
        inner.records.clear();
    }

    pub fn snapshot(&self) -> Snapshot {
        let mut inner = self.inner.borrow_mut();
        inner.pump();
        inner
            .records
            .iter()
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect()
    }

    /// Current count for `id`, 0 when never recorded
    pub fn count(&self, id: &str) -> u64 {
        let mut inner = self.inner.borrow_mut();
        inner.pump();
        inner.records.get(id).map_or(0, |record| record.count)
    }

    /// A handle other threads can record through
    pub fn remote(&self) -> RemoteRecorder {
        RemoteRecorder {
            sender: self.inner.borrow().sender.clone(),
        }
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

/// Cross-thread producer handle; events reach the owning recorder on its next
/// `snapshot`, `count` or `reset`
#[derive(Debug, Clone)]
pub struct RemoteRecorder {
    sender: Sender<RecordEvent>,
}

impl RemoteRecorder {
    pub fn record(&self, id: &str, file: &str, line: u32) -> Result<(), RecorderError> {
        self.sender
            .send(RecordEvent {
                id: id.to_string(),
                file: file.to_string(),
                line,
            })
            .map_err(|_| RecorderError::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_counts_and_overwrites_location() {
        let recorder = Recorder::new();
        recorder.record("Counter_Text_0", "A.view", 3);
        recorder.record("Counter_Text_0", "B.view", 7);

        let snapshot = recorder.snapshot();
        assert_eq!(
            snapshot["Counter_Text_0"],
            RecomputeRecord {
                count: 2,
                file: "B.view".to_string(),
                line: 7,
            }
        );
        assert_eq!(recorder.count("missing"), 0);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let recorder = Recorder::new();
        recorder.record("a", "f", 1);
        let before = recorder.snapshot();
        recorder.record("a", "f", 1);
        assert_eq!(before["a"].count, 1);
        assert_eq!(recorder.count("a"), 2);
    }

    #[test]
    fn test_clones_share_counts() {
        let recorder = Recorder::new();
        let other = recorder.clone();
        other.record("a", "f", 1);
        assert_eq!(recorder.count("a"), 1);
        recorder.reset();
        assert!(other.snapshot().is_empty());
    }

    #[test]
    fn test_remote_events_apply_on_snapshot() {
        let recorder = Recorder::new();
        let remote = recorder.remote();
        let handle = thread::spawn(move || {
            remote.record("worker", "W.view", 9).unwrap();
            remote.record("worker", "W.view", 9).unwrap();
        });
        handle.join().unwrap();

        assert_eq!(recorder.snapshot()["worker"].count, 2);
    }

    #[test]
    fn test_local_record_after_remote_keeps_latest_location() {
        let recorder = Recorder::new();
        let remote = recorder.remote();
        thread::spawn(move || remote.record("Feed_Row_0", "Remote.view", 4).unwrap())
            .join()
            .unwrap();

        recorder.record("Feed_Row_0", "Local.view", 12);
        assert_eq!(
            recorder.snapshot()["Feed_Row_0"],
            RecomputeRecord {
                count: 2,
                file: "Local.view".to_string(),
                line: 12,
            }
        );
    }

    #[test]
    fn test_reset_discards_queued_remote_events() {
        let recorder = Recorder::new();
        recorder.remote().record("late", "f", 1).unwrap();
        recorder.reset();
        assert_eq!(recorder.count("late"), 0);
    }

    #[test]
    fn test_remote_after_drop_is_disconnected() {
        let remote = Recorder::new().remote();
        assert_eq!(remote.record("a", "f", 1), Err(RecorderError::Disconnected));
    }
}
