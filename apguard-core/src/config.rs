use serde::{Deserialize, Serialize};

use crate::{RejectListError, Result};

const DEFAULT_AVOID_LIST_EXPIRY_MS: u64 = 10 * 60 * 1000;
const DEFAULT_BLACKLIST_EXPIRY_MS: u64 = 10 * 60 * 1000;
const DEFAULT_BAD_BSSID_COUNTER_RESET_TIME_MS: u64 = 30 * 1000;
const DEFAULT_BAD_BSSID_COUNTER_THRESHOLD: u32 = 3;
const DEFAULT_DELTA_RSSI: i32 = 5;
const DEFAULT_MAX_ENTRIES: usize = 28;
// Largest reject timeout firmware can carry in one list element
const DEFAULT_MAX_REJECT_TIMEOUT_MS: u64 = 255_000;
const DEFAULT_FIRMWARE_LIST_SIZE: usize = 28;
const DEFAULT_RSSI_REJECT_LIST_SIZE: usize = 10;

/// Tunables for the reject list, read-only once a manager is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RejectListConfig {
    /// How long an AVOID membership lasts before the AP moves to MONITOR
    pub avoid_list_expiry_ms: u64,
    /// How long a driver BLACKLIST membership lasts before the AP moves to MONITOR
    pub blacklist_expiry_ms: u64,
    /// Connected time after which an AP's driver penalties are forgiven
    pub bad_bssid_counter_reset_time_ms: u64,
    /// AVOID(driver) events needed to escalate to BLACKLIST(driver)
    pub bad_bssid_counter_threshold: u32,
    /// RSSI margin exposed to candidate scoring
    pub delta_rssi: i32,
    /// Table capacity
    pub max_entries: usize,
    /// RSSI rejects asking for longer than this are not enforced as hard rejects
    pub max_reject_timeout_ms: u64,
    /// Eviction window assumed for RSSI rejects without a retry delay
    pub rssi_reject_default_window_ms: u64,
    /// Records pushed to firmware per snapshot
    pub firmware_list_size: usize,
    /// Records handed to the roaming scan filter
    pub rssi_reject_list_size: usize,
}

impl Default for RejectListConfig {
    fn default() -> Self {
        Self {
            avoid_list_expiry_ms: DEFAULT_AVOID_LIST_EXPIRY_MS,
            blacklist_expiry_ms: DEFAULT_BLACKLIST_EXPIRY_MS,
            bad_bssid_counter_reset_time_ms: DEFAULT_BAD_BSSID_COUNTER_RESET_TIME_MS,
            bad_bssid_counter_threshold: DEFAULT_BAD_BSSID_COUNTER_THRESHOLD,
            delta_rssi: DEFAULT_DELTA_RSSI,
            max_entries: DEFAULT_MAX_ENTRIES,
            max_reject_timeout_ms: DEFAULT_MAX_REJECT_TIMEOUT_MS,
            rssi_reject_default_window_ms: DEFAULT_MAX_REJECT_TIMEOUT_MS,
            firmware_list_size: DEFAULT_FIRMWARE_LIST_SIZE,
            rssi_reject_list_size: DEFAULT_RSSI_REJECT_LIST_SIZE,
        }
    }
}

impl RejectListConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(RejectListError::InvalidConfig("max_entries must be non-zero"));
        }
        if self.bad_bssid_counter_threshold == 0 {
            return Err(RejectListError::InvalidConfig(
                "bad_bssid_counter_threshold must be non-zero",
            ));
        }
        if self.firmware_list_size == 0 {
            return Err(RejectListError::InvalidConfig(
                "firmware_list_size must be non-zero",
            ));
        }
        Ok(())
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.bad_bssid_counter_threshold = threshold;
        self
    }
}
