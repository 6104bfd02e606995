// iotdash-core: Client-side sync layer between iotdash-api and consumers (CLI/dashboards).

pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod projection;
pub mod scheduler;
pub mod store;
pub mod stream;

mod push;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Mutation, MutationResult};
pub use config::{PollIntervals, PushSettings, SyncConfig, TlsVerification};
pub use controller::{ConnectionState, SyncController};
pub use error::CoreError;
pub use projection::Projector;
pub use scheduler::{PollScheduler, RefreshTarget};
pub use store::{
    ApplyOutcome, CollectionKind, CollectionPhase, CollectionState, CollectionStatus, Snapshot,
    SnapshotSource, SyncStore, SyncedCollection,
};
pub use stream::CollectionStream;

// Domain types travel with the store.
pub use iotdash_api::models;
pub use iotdash_api::models::{
    Device, DevicePayload, HealthReport, MotionAlert, MotionSensor, MotionSensorPayload, Relay,
    RelayAction, RelayPayload, ResourceId, ScheduleWindow, Sensitivity, SystemStats, TriggerMode,
};
