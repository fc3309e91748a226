use serde::{Deserialize, Serialize};

/// Default region name shared by the bridge and its peers.
pub const DEFAULT_REGION_NAME: &str = "example_ipc_app";

/// Longest accepted region name.
pub const MAX_REGION_NAME_LEN: usize = 64;

/// Configuration for a channel region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    /// Name peers use to attach to the region.
    pub region_name: String,
    /// Total bytes backing all rings of the region.
    pub region_size: usize,
    /// Capacity of one message slot.
    pub slot_size: usize,
    /// Slots per ring when a channel is created without an explicit size.
    pub ring_capacity: usize,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            region_name: DEFAULT_REGION_NAME.to_string(),
            region_size: 64 * 1024 * 1024,
            slot_size: 1024,
            ring_capacity: 256,
        }
    }
}

impl IoConfig {
    /// Number of slots the region can back.
    pub fn total_slots(&self) -> usize {
        if self.slot_size == 0 {
            return 0;
        }
        self.region_size / self.slot_size
    }
}
