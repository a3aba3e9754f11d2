/*!
# Runtime

The run-time half of viewtrace: the recomputation recorder, the tracking shim that
instrumented statements call, the state capabilities a live view exposes, a reference
render host and the over-render harness.
*/

pub mod harness;
pub mod host;
pub mod recorder;
pub mod shim;
pub mod state;

pub use harness::{
    check_snapshot, HarnessError, HarnessReport, OverRenderHarness, TriggerOutcome, Violation,
    ViolationKind,
};
pub use host::{Element, HostError, LiveView, Modifier, RenderNode, Value};
pub use recorder::{RecomputeRecord, Recorder, RecorderError, RemoteRecorder, Snapshot};
pub use shim::{TrackRecomputations, Tracked};
pub use state::{FieldValue, LiveHost, ReactiveState, StateError};
