// ── Mutation API ──
//
// Every write flows through the `Mutation` enum. The controller routes each
// variant to its endpoint, then refetches the collections the write touched
// before the caller gets its answer.

use iotdash_api::models::{
    Device, DevicePayload, MotionSensor, MotionSensorPayload, Relay, RelayAction, RelayPayload,
    ResourceId,
};

use crate::error::CoreError;
use crate::store::CollectionKind;

/// A mutation envelope sent through the command channel.
/// Contains the mutation and a oneshot response channel.
pub(crate) struct MutationEnvelope {
    pub mutation: Mutation,
    pub response_tx: tokio::sync::oneshot::Sender<Result<MutationResult, CoreError>>,
}

/// All write operations against the dashboard backend.
#[derive(Debug, Clone)]
pub enum Mutation {
    // ── Devices ──────────────────────────────────────────────────────
    CreateDevice(DevicePayload),
    UpdateDevice {
        id: ResourceId,
        payload: DevicePayload,
    },
    DeleteDevice {
        id: ResourceId,
    },

    // ── Relays ───────────────────────────────────────────────────────
    CreateRelay {
        device_id: ResourceId,
        payload: RelayPayload,
    },
    UpdateRelay {
        id: ResourceId,
        payload: RelayPayload,
    },
    /// Central-server style: `PUT {status}`.
    SetRelayState {
        id: ResourceId,
        on: bool,
    },
    /// Agent style: `POST {action}`.
    InvokeRelay {
        id: ResourceId,
        action: RelayAction,
    },
    DeleteRelay {
        id: ResourceId,
    },

    // ── Motion sensors ───────────────────────────────────────────────
    CreateMotionSensor {
        device_id: ResourceId,
        payload: MotionSensorPayload,
    },
    UpdateMotionSensor {
        id: ResourceId,
        payload: MotionSensorPayload,
    },
    DeleteMotionSensor {
        id: ResourceId,
    },
    /// Fire a synthetic detection on the sensor.
    TestMotionSensor {
        id: ResourceId,
    },
    ClearMotionAlerts,
}

impl Mutation {
    /// Collections whose server-side content this mutation changes.
    pub fn affected(&self) -> &'static [CollectionKind] {
        use CollectionKind as K;

        match self {
            Self::CreateDevice(_) | Self::UpdateDevice { .. } => &[K::Devices],
            // Relays and sensors cascade with their device
            Self::DeleteDevice { .. } => &[K::Devices, K::Relays, K::MotionSensors],
            // Device cards carry relay/sensor counts
            Self::CreateRelay { .. } | Self::DeleteRelay { .. } => &[K::Relays, K::Devices],
            Self::UpdateRelay { .. } | Self::SetRelayState { .. } | Self::InvokeRelay { .. } => {
                &[K::Relays]
            }
            Self::CreateMotionSensor { .. } | Self::DeleteMotionSensor { .. } => {
                &[K::MotionSensors, K::Devices]
            }
            Self::UpdateMotionSensor { .. } => &[K::MotionSensors],
            Self::TestMotionSensor { .. } => &[K::MotionAlerts, K::MotionSensors],
            Self::ClearMotionAlerts => &[K::MotionAlerts],
        }
    }

    /// Deleting something already gone is treated as success.
    pub fn is_delete(&self) -> bool {
        matches!(
            self,
            Self::DeleteDevice { .. } | Self::DeleteRelay { .. } | Self::DeleteMotionSensor { .. }
        )
    }

    /// Short description for logs and progress spinners.
    pub fn describe(&self) -> String {
        match self {
            Self::CreateDevice(p) => format!("create device {:?}", p.name),
            Self::UpdateDevice { id, .. } => format!("update device {id}"),
            Self::DeleteDevice { id } => format!("delete device {id}"),
            Self::CreateRelay { device_id, payload } => {
                format!("create relay {:?} on device {device_id}", payload.name)
            }
            Self::UpdateRelay { id, .. } => format!("update relay {id}"),
            Self::SetRelayState { id, on } => {
                format!("switch relay {id} {}", RelayAction::from(*on))
            }
            Self::InvokeRelay { id, action } => format!("switch relay {id} {action}"),
            Self::DeleteRelay { id } => format!("delete relay {id}"),
            Self::CreateMotionSensor { device_id, payload } => {
                format!("create motion sensor {:?} on device {device_id}", payload.name)
            }
            Self::UpdateMotionSensor { id, .. } => format!("update motion sensor {id}"),
            Self::DeleteMotionSensor { id } => format!("delete motion sensor {id}"),
            Self::TestMotionSensor { id } => format!("test motion sensor {id}"),
            Self::ClearMotionAlerts => "clear motion alerts".into(),
        }
    }
}

/// What a mutation produced.
///
/// Echoed records are informational only; the store is updated from the
/// refetch that follows every mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationResult {
    Ok,
    /// A delete targeted a record the server no longer had.
    AlreadyGone,
    Device(Option<Device>),
    Relay(Option<Relay>),
    MotionSensor(Option<MotionSensor>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_switch_touches_only_relays() {
        let m = Mutation::SetRelayState {
            id: ResourceId::from(3),
            on: true,
        };
        assert_eq!(m.affected(), &[CollectionKind::Relays]);
        assert_eq!(m.describe(), "switch relay 3 on");
        assert!(!m.is_delete());
    }

    #[test]
    fn device_delete_cascades() {
        let m = Mutation::DeleteDevice {
            id: ResourceId::from(1),
        };
        assert!(m.is_delete());
        assert!(m.affected().contains(&CollectionKind::Relays));
        assert!(m.affected().contains(&CollectionKind::MotionSensors));
    }

    #[test]
    fn sensor_test_refreshes_alerts() {
        let m = Mutation::TestMotionSensor {
            id: ResourceId::from("pir-1"),
        };
        assert_eq!(m.affected()[0], CollectionKind::MotionAlerts);
    }
}
