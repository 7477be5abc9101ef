use core::fmt;

use serde::{Deserialize, Serialize};

use crate::address::Bssid;
use crate::aging;
use crate::config::RejectListConfig;
use crate::policy;
use crate::store::EntryStore;
use crate::types::{ListKind, ReasonSource, RejectEntry, RejectReason};

/// Order in which categories claim room in a firmware snapshot.
pub const EXPORT_ORDER: [ListKind; 5] = [
    ListKind::UserBlacklist,
    ListKind::DriverBlacklist,
    ListKind::RssiReject,
    ListKind::UserAvoid,
    ListKind::DriverAvoid,
];

/// One element of the list handed to firmware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectRecord {
    pub bssid: Bssid,
    pub kind: ListKind,
    /// Milliseconds left; `None` means until explicitly cleared
    pub reject_duration_ms: Option<u64>,
    pub expected_rssi: Option<i32>,
    pub reason: RejectReason,
    pub source: ReasonSource,
}

impl RejectRecord {
    fn from_entry(entry: &RejectEntry, kind: ListKind, config: &RejectListConfig, now: u64) -> Self {
        let reject_duration_ms = match kind {
            ListKind::UserBlacklist => None,
            _ => Some(policy::delta(entry, kind, config, now).max(0) as u64),
        };
        let expected_rssi = match kind {
            ListKind::RssiReject => entry.rssi_params().map(|params| params.expected_rssi),
            _ => None,
        };

        Self {
            bssid: entry.bssid(),
            kind,
            reject_duration_ms,
            expected_rssi,
            reason: entry.reason_for(kind).unwrap_or(RejectReason::Unknown),
            source: source_of(entry, kind),
        }
    }
}

fn source_of(entry: &RejectEntry, kind: ListKind) -> ReasonSource {
    match kind {
        ListKind::UserAvoid | ListKind::UserBlacklist => ReasonSource::Userspace,
        ListKind::RssiReject => entry
            .rssi_params()
            .map(|params| params.source)
            .unwrap_or(ReasonSource::Firmware),
        ListKind::DriverAvoid | ListKind::DriverBlacklist | ListKind::Monitor => {
            ReasonSource::Driver
        }
    }
}

/// Priority-ordered, size-bounded copy of the table for firmware.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectSnapshot {
    pub records: Vec<RejectRecord>,
}

impl RejectSnapshot {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RejectRecord> {
        self.records.iter()
    }
}

/// Appends records of `kind` to `out` until it holds `max_size` records.
pub fn fill_reject_list(
    store: &EntryStore,
    kind: ListKind,
    config: &RejectListConfig,
    now: u64,
    out: &mut Vec<RejectRecord>,
    max_size: usize,
) {
    let room = max_size.saturating_sub(out.len());

    out.extend(
        store
            .iter()
            .filter(|entry| entry.is_member(kind))
            .take(room)
            .map(|entry| RejectRecord::from_entry(entry, kind, config, now)),
    );
}

/// Ages the table, then fills up to `max_size` records following
/// [`EXPORT_ORDER`], so higher-priority categories are never crowded out by
/// lower ones.
pub fn build_snapshot(
    store: &mut EntryStore,
    config: &RejectListConfig,
    now: u64,
    max_size: usize,
) -> RejectSnapshot {
    aging::sweep(store, config, now);

    let mut records = Vec::with_capacity(max_size.min(store.len() * EXPORT_ORDER.len()));
    for kind in EXPORT_ORDER {
        if records.len() >= max_size {
            break;
        }
        fill_reject_list(store, kind, config, now, &mut records, max_size);
    }

    RejectSnapshot { records }
}

/// RSSI rejections alone, as consumed by the roaming scan filter.
pub fn rssi_reject_list(
    store: &mut EntryStore,
    config: &RejectListConfig,
    now: u64,
) -> Vec<RejectRecord> {
    aging::sweep(store, config, now);

    let mut records = Vec::new();
    fill_reject_list(
        store,
        ListKind::RssiReject,
        config,
        now,
        &mut records,
        config.rssi_reject_list_size,
    );
    records
}

/// What candidate selection should do with an AP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Allow,
    Deprioritize,
    Reject,
    ForceRemove,
}

/// Decides how candidate selection treats `bssid`, ageing its entry with
/// the live RSSI sample first.
pub fn decide_action(
    store: &mut EntryStore,
    bssid: &Bssid,
    config: &RejectListConfig,
    now: u64,
    live_rssi: Option<i32>,
) -> Action {
    let Some(entry) = aging::refresh_entry(store, bssid, config, now, live_rssi) else {
        return Action::Allow;
    };

    let user_blacklisted = entry.is_member(ListKind::UserBlacklist);
    let blacklisted = user_blacklisted || entry.is_member(ListKind::DriverBlacklist);
    let rssi_rejected = entry.is_member(ListKind::RssiReject);
    let avoided = entry.is_member(ListKind::UserAvoid) || entry.is_member(ListKind::DriverAvoid);

    if blacklisted {
        if user_blacklisted || rssi_rejected {
            return Action::ForceRemove;
        }
        return Action::Reject;
    }

    if rssi_rejected {
        let over_ceiling = entry
            .rssi_params()
            .is_some_and(|params| params.original_timeout_ms > config.max_reject_timeout_ms);

        if !over_ceiling {
            return Action::ForceRemove;
        }
        // Firmware asked for longer than it can enforce: not a hard reject
        return if avoided {
            Action::Deprioritize
        } else {
            Action::Allow
        };
    }

    if avoided {
        return Action::Deprioritize;
    }

    Action::Allow
}

/// Diagnostic view of one membership of one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayRecord {
    pub bssid: Bssid,
    pub kind: ListKind,
    /// Time left before expiry; `None` for memberships without one
    pub remaining_ms: Option<i64>,
    pub age_ms: u64,
    pub expected_rssi: Option<i32>,
    pub reason: Option<RejectReason>,
    pub source: ReasonSource,
    pub bad_bssid_counter: u32,
    pub connected: bool,
}

impl fmt::Display for DisplayRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.bssid, self.kind)?;
        match self.remaining_ms {
            Some(remaining) => write!(f, " remaining {remaining}ms")?,
            None => write!(f, " age {}ms", self.age_ms)?,
        }
        if let Some(rssi) = self.expected_rssi {
            write!(f, " expected_rssi {rssi}")?;
        }
        if let Some(reason) = self.reason {
            write!(f, " reason {reason:?}")?;
        }
        write!(
            f,
            " source {:?} bad_count {}",
            self.source, self.bad_bssid_counter
        )?;
        if self.connected {
            write!(f, " connected")?;
        }
        Ok(())
    }
}

/// Lists every membership in the table as of `now` without ageing or
/// otherwise touching it.
pub fn dump(store: &EntryStore, config: &RejectListConfig, now: u64) -> Vec<DisplayRecord> {
    store
        .iter()
        .flat_map(|entry| {
            entry.membership().iter().map(move |kind| DisplayRecord {
                bssid: entry.bssid(),
                kind,
                remaining_ms: match kind {
                    ListKind::UserBlacklist | ListKind::Monitor => None,
                    _ => Some(policy::delta(entry, kind, config, now)),
                },
                age_ms: entry.elapsed(kind, now),
                expected_rssi: match kind {
                    ListKind::RssiReject => entry.rssi_params().map(|params| params.expected_rssi),
                    _ => None,
                },
                reason: entry.reason_for(kind),
                source: source_of(entry, kind),
                bad_bssid_counter: entry.bad_bssid_counter(),
                connected: entry.connect_timestamp().is_some(),
            })
        })
        .collect()
}
