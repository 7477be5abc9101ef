use core::fmt;

use serde::{Deserialize, Serialize};

use crate::address::Bssid;

/// A single (source x category) membership an entry can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    /// Deprioritized on user-space request
    UserAvoid,
    /// Deprioritized after a driver-observed failure
    DriverAvoid,
    /// Blocked on user-space request; never expires on its own
    UserBlacklist,
    /// Blocked after repeated driver-observed failures
    DriverBlacklist,
    /// Blocked until a retry delay passes or the signal improves
    RssiReject,
    /// Cooling down after an AVOID or BLACKLIST membership ended
    Monitor,
}

impl ListKind {
    pub const COUNT: usize = 6;

    pub const ALL: [ListKind; Self::COUNT] = [
        ListKind::UserAvoid,
        ListKind::DriverAvoid,
        ListKind::UserBlacklist,
        ListKind::DriverBlacklist,
        ListKind::RssiReject,
        ListKind::Monitor,
    ];

    const fn index(self) -> usize {
        self as usize
    }

    const fn bit(self) -> u8 {
        1 << self.index()
    }

    pub fn category(self) -> Category {
        match self {
            ListKind::UserAvoid | ListKind::DriverAvoid => Category::Avoid,
            ListKind::UserBlacklist | ListKind::DriverBlacklist => Category::Blacklist,
            ListKind::RssiReject => Category::RssiReject,
            ListKind::Monitor => Category::Monitor,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ListKind::UserAvoid => "USERSPACE_AVOID",
            ListKind::DriverAvoid => "DRIVER_AVOID",
            ListKind::UserBlacklist => "USERSPACE_BLACKLIST",
            ListKind::DriverBlacklist => "DRIVER_BLACKLIST",
            ListKind::RssiReject => "DRIVER_RSSI_REJECT",
            ListKind::Monitor => "DRIVER_MONITOR",
        }
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Avoid,
    Blacklist,
    RssiReject,
    Monitor,
}

/// Set of [`ListKind`] memberships held by one entry.
///
/// Only the crate can add memberships, so a driver blacklist cannot be
/// asserted from outside the escalation path.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Membership(u8);

impl Membership {
    pub fn contains(&self, kind: ListKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn contains_category(&self, category: Category) -> bool {
        self.iter().any(|kind| kind.category() == category)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// True when `kind` is the one and only membership.
    pub fn is_only(&self, kind: ListKind) -> bool {
        self.0 == kind.bit()
    }

    pub fn iter(self) -> impl Iterator<Item = ListKind> {
        ListKind::ALL.into_iter().filter(move |kind| self.contains(*kind))
    }

    pub(crate) fn insert(&mut self, kind: ListKind) {
        self.0 |= kind.bit();
    }

    pub(crate) fn remove(&mut self, kind: ListKind) -> bool {
        let present = self.contains(kind);
        self.0 &= !kind.bit();
        present
    }
}

impl fmt::Debug for Membership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    Unknown,
    NudFailure,
    StaKickout,
    RoamHandoffFailure,
    AssocRejectPoorRssi,
    AssocRejectOce,
    UserspaceBlacklist,
    UserspaceAvoidList,
    BtmDisassocImminent,
    BtmBssTermination,
    BtmMboRetry,
    ReassocRssiReject,
    ReassocNoMoreStas,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonSource {
    Userspace,
    Driver,
    Firmware,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

/// Which list a caller asks to place an AP in.
///
/// There is no variant for the driver blacklist or the monitor list. Both
/// are reached only as side effects of other memberships.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectKind {
    Avoid,
    Blacklist,
    RssiReject(RssiRejectParams),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RssiRejectParams {
    /// Minimum RSSI in dBm the AP asks for; zero means no signal condition
    pub expected_rssi: i32,
    /// Milliseconds before a retry is allowed. Zero means no timer, unless
    /// `expected_rssi` is also zero, in which case the default window applies
    pub retry_delay_ms: u64,
    /// Timeout as requested by the AP or firmware, before any clamping
    pub original_timeout_ms: u64,
    /// When the rejection was observed
    pub received_time_ms: u64,
    pub source: ReasonSource,
}

/// One tracked AP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectEntry {
    bssid: Bssid,
    membership: Membership,
    timestamps: [u64; ListKind::COUNT],
    avoid_reason: Option<RejectReason>,
    rssi_reason: Option<RejectReason>,
    rssi_params: Option<RssiRejectParams>,
    bad_bssid_counter: u32,
    connect_timestamp: Option<u64>,
}

impl RejectEntry {
    pub(crate) fn new(bssid: Bssid) -> Self {
        Self {
            bssid,
            membership: Membership::default(),
            timestamps: [0; ListKind::COUNT],
            avoid_reason: None,
            rssi_reason: None,
            rssi_params: None,
            bad_bssid_counter: 0,
            connect_timestamp: None,
        }
    }

    pub fn bssid(&self) -> Bssid {
        self.bssid
    }

    pub fn membership(&self) -> Membership {
        self.membership
    }

    pub fn is_member(&self, kind: ListKind) -> bool {
        self.membership.contains(kind)
    }

    pub fn last_update(&self, kind: ListKind) -> Option<u64> {
        self.is_member(kind).then(|| self.timestamps[kind.index()])
    }

    pub fn elapsed(&self, kind: ListKind, now: u64) -> u64 {
        now.saturating_sub(self.timestamps[kind.index()])
    }

    /// Most recent cause recorded for the category `kind` belongs to.
    pub fn reason_for(&self, kind: ListKind) -> Option<RejectReason> {
        match kind.category() {
            Category::Avoid | Category::Blacklist => self.avoid_reason,
            Category::RssiReject => self.rssi_reason,
            Category::Monitor => None,
        }
    }

    pub fn rssi_params(&self) -> Option<&RssiRejectParams> {
        self.rssi_params.as_ref()
    }

    pub fn bad_bssid_counter(&self) -> u32 {
        self.bad_bssid_counter
    }

    pub fn connect_timestamp(&self) -> Option<u64> {
        self.connect_timestamp
    }

    pub(crate) fn set_member(&mut self, kind: ListKind, now: u64) {
        self.membership.insert(kind);
        self.timestamps[kind.index()] = now;
    }

    pub(crate) fn clear_member(&mut self, kind: ListKind) -> bool {
        self.timestamps[kind.index()] = 0;
        if kind == ListKind::RssiReject {
            self.rssi_params = None;
            self.rssi_reason = None;
        }
        self.membership.remove(kind)
    }

    pub(crate) fn set_avoid_reason(&mut self, reason: Option<RejectReason>) {
        self.avoid_reason = reason;
    }

    pub(crate) fn set_rssi_reject(&mut self, reason: RejectReason, params: RssiRejectParams) {
        self.rssi_reason = Some(reason);
        self.rssi_params = Some(params);
    }

    pub(crate) fn bump_bad_bssid_counter(&mut self) -> u32 {
        self.bad_bssid_counter = self.bad_bssid_counter.saturating_add(1);
        self.bad_bssid_counter
    }

    pub(crate) fn set_connect_timestamp(&mut self, timestamp: Option<u64>) {
        self.connect_timestamp = timestamp;
    }
}
