// ── Sync store ──
//
// Client-side mirror of every backend collection, with per-collection
// lifecycle state and request sequencing.

mod collection;
mod data_store;

pub use collection::{
    ApplyOutcome, CollectionPhase, CollectionState, Snapshot, SnapshotSource, SyncedCollection,
    Ticket,
};
pub(crate) use collection::Slot;
pub use data_store::{CollectionStatus, SyncStore};

use iotdash_api::push::PushTopic;

/// The collections the dashboard mirrors.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumString,
    serde::Serialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum CollectionKind {
    Devices,
    Relays,
    MotionSensors,
    MotionAlerts,
    SystemStats,
    Health,
}

impl CollectionKind {
    pub const ALL: [Self; 6] = [
        Self::Devices,
        Self::Relays,
        Self::MotionSensors,
        Self::MotionAlerts,
        Self::SystemStats,
        Self::Health,
    ];

    /// The push topic carrying this collection, if the server pushes it.
    pub fn push_topic(self) -> Option<PushTopic> {
        match self {
            Self::Devices => Some(PushTopic::Devices),
            Self::Relays => Some(PushTopic::Relays),
            Self::SystemStats => Some(PushTopic::SystemStats),
            Self::MotionSensors | Self::MotionAlerts | Self::Health => None,
        }
    }
}

impl From<PushTopic> for CollectionKind {
    fn from(topic: PushTopic) -> Self {
        match topic {
            PushTopic::Devices => Self::Devices,
            PushTopic::Relays => Self::Relays,
            PushTopic::SystemStats => Self::SystemStats,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_parse_back() {
        for kind in CollectionKind::ALL {
            assert_eq!(kind.to_string().parse::<CollectionKind>().unwrap(), kind);
        }
        assert_eq!(
            "motion_alerts".parse::<CollectionKind>().unwrap(),
            CollectionKind::MotionAlerts
        );
    }

    #[test]
    fn pushed_kinds_map_to_topics() {
        let pushed: Vec<_> = CollectionKind::ALL
            .into_iter()
            .filter(|k| k.push_topic().is_some())
            .collect();
        assert_eq!(
            pushed,
            vec![
                CollectionKind::Devices,
                CollectionKind::Relays,
                CollectionKind::SystemStats
            ]
        );
        for topic in PushTopic::ALL {
            assert_eq!(CollectionKind::from(topic).push_topic(), Some(topic));
        }
    }
}
