//! Admission of new reject reasons and eviction when the table is full.

use tracing::{debug, info, warn};

use crate::address::Bssid;
use crate::aging;
use crate::config::RejectListConfig;
use crate::store::EntryStore;
use crate::types::{
    Category, ListKind, ReasonSource, RejectEntry, RejectKind, RejectReason, RssiRejectParams,
};
use crate::{RejectListError, Result};

/// One reason to reject one AP.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RejectRequest {
    pub bssid: Bssid,
    pub kind: RejectKind,
    pub source: ReasonSource,
    pub reason: RejectReason,
}

impl RejectRequest {
    pub fn avoid(bssid: Bssid, source: ReasonSource, reason: RejectReason) -> Self {
        Self {
            bssid,
            kind: RejectKind::Avoid,
            source,
            reason,
        }
    }

    pub fn user_blacklist(bssid: Bssid) -> Self {
        Self {
            bssid,
            kind: RejectKind::Blacklist,
            source: ReasonSource::Userspace,
            reason: RejectReason::UserspaceBlacklist,
        }
    }

    pub fn rssi_reject(bssid: Bssid, reason: RejectReason, params: RssiRejectParams) -> Self {
        Self {
            bssid,
            kind: RejectKind::RssiReject(params),
            source: params.source,
            reason,
        }
    }

    /// Maps the requested kind and source onto a membership.
    pub fn target(&self) -> Result<ListKind> {
        match (&self.kind, self.source) {
            (RejectKind::Avoid, ReasonSource::Userspace) => Ok(ListKind::UserAvoid),
            (RejectKind::Avoid, _) => Ok(ListKind::DriverAvoid),
            (RejectKind::Blacklist, ReasonSource::Userspace) => Ok(ListKind::UserBlacklist),
            (RejectKind::Blacklist, _) => Err(RejectListError::InvalidRequest(
                "driver blacklist is reached only by escalation",
            )),
            (RejectKind::RssiReject(_), _) => Ok(ListKind::RssiReject),
        }
    }
}

/// Records `request` in the table and returns the membership the AP ended
/// up in, which is [`ListKind::DriverBlacklist`] when the request escalated
/// a driver avoid.
///
/// The whole table is aged first. A new AP arriving at a full table evicts
/// one entry; if none is evictable the request fails with
/// [`RejectListError::CapacityExceeded`] and the AP stays untracked.
pub fn add_reason(
    store: &mut EntryStore,
    config: &RejectListConfig,
    now: u64,
    request: &RejectRequest,
) -> Result<ListKind> {
    let bssid = request.bssid;
    if !bssid.is_unicast() {
        return Err(RejectListError::InvalidAddress(bssid));
    }
    let target = request.target()?;

    aging::sweep(store, config, now);

    if !store.contains(&bssid) {
        if store.is_full() && evict_one(store, config, now).is_none() {
            warn!("{} not tracked: reject list full of multi-reason entries", bssid);
            return Err(RejectListError::CapacityExceeded);
        }
        store.insert(RejectEntry::new(bssid))?;
    }

    let entry = store
        .find_mut(&bssid)
        .ok_or(RejectListError::CapacityExceeded)?;
    let placed = merge(entry, target, request, config, now);

    debug!(
        "{} added to {} ({:?}), now {:?}",
        bssid,
        placed,
        request.reason,
        entry.membership()
    );

    Ok(placed)
}

fn merge(
    entry: &mut RejectEntry,
    target: ListKind,
    request: &RejectRequest,
    config: &RejectListConfig,
    now: u64,
) -> ListKind {
    let mut placed = target;

    match (target, &request.kind) {
        (ListKind::RssiReject, RejectKind::RssiReject(params)) => {
            entry.set_member(ListKind::RssiReject, now);
            entry.set_rssi_reject(request.reason, *params);
        }
        (ListKind::DriverAvoid, _) => {
            let count = entry.bump_bad_bssid_counter();
            entry.set_avoid_reason(Some(request.reason));

            if count >= config.bad_bssid_counter_threshold {
                entry.clear_member(ListKind::DriverAvoid);
                entry.set_member(ListKind::DriverBlacklist, now);
                placed = ListKind::DriverBlacklist;
                info!(
                    "{} blacklisted after {} bad events ({:?})",
                    entry.bssid(),
                    count,
                    request.reason
                );
            } else {
                entry.set_member(ListKind::DriverAvoid, now);
            }
        }
        (kind, _) => {
            entry.set_member(kind, now);
            entry.set_avoid_reason(Some(request.reason));
        }
    }

    entry.clear_member(ListKind::Monitor);
    placed
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prefer {
    Largest,
    Smallest,
}

impl Prefer {
    fn is_better(self, candidate: i64, best: i64) -> bool {
        match self {
            Prefer::Largest => candidate > best,
            Prefer::Smallest => candidate < best,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct EvictionTier {
    kind: ListKind,
    prefer: Prefer,
}

/// Cheapest membership to lose first.
const EVICTION_ORDER: [EvictionTier; 6] = [
    EvictionTier { kind: ListKind::Monitor, prefer: Prefer::Largest },
    EvictionTier { kind: ListKind::DriverAvoid, prefer: Prefer::Smallest },
    EvictionTier { kind: ListKind::UserAvoid, prefer: Prefer::Smallest },
    EvictionTier { kind: ListKind::RssiReject, prefer: Prefer::Smallest },
    EvictionTier { kind: ListKind::DriverBlacklist, prefer: Prefer::Smallest },
    EvictionTier { kind: ListKind::UserBlacklist, prefer: Prefer::Smallest },
];

fn signed(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}

/// Ranking metric for `entry` within `kind`, in milliseconds.
///
/// For MONITOR this is the time spent monitoring. For every other kind it
/// is the time left before the membership would expire, which goes
/// negative for AVOID and BLACKLIST once overdue and stops at zero for
/// RSSI rejections.
pub fn delta(entry: &RejectEntry, kind: ListKind, config: &RejectListConfig, now: u64) -> i64 {
    let elapsed = signed(entry.elapsed(kind, now));

    match kind.category() {
        Category::Monitor => elapsed,
        Category::Avoid => signed(config.avoid_list_expiry_ms).saturating_sub(elapsed),
        Category::Blacklist => signed(config.blacklist_expiry_ms).saturating_sub(elapsed),
        Category::RssiReject => {
            let window = entry
                .rssi_params()
                .map(|params| params.retry_delay_ms)
                .filter(|delay| *delay != 0)
                .unwrap_or(config.rssi_reject_default_window_ms);
            signed(window).saturating_sub(elapsed).max(0)
        }
    }
}

/// Picks the entry to evict: the first tier in [`EVICTION_ORDER`] holding
/// an entry that belongs to that tier alone, and within it the entry with
/// the most favourable delta. Ties go to the entry found first.
pub fn select_victim(
    store: &EntryStore,
    config: &RejectListConfig,
    now: u64,
) -> Option<(ListKind, Bssid)> {
    EVICTION_ORDER.iter().find_map(|tier| {
        let mut best: Option<(i64, Bssid)> = None;

        for entry in store
            .iter()
            .filter(|entry| entry.membership().is_only(tier.kind))
        {
            let candidate = delta(entry, tier.kind, config, now);
            if best.is_none_or(|(current, _)| tier.prefer.is_better(candidate, current)) {
                best = Some((candidate, entry.bssid()));
            }
        }

        best.map(|(_, bssid)| (tier.kind, bssid))
    })
}

/// Evicts one entry to make room. Returns `None` when every entry holds
/// more than one membership.
pub fn evict_one(
    store: &mut EntryStore,
    config: &RejectListConfig,
    now: u64,
) -> Option<RejectEntry> {
    let (kind, bssid) = select_victim(store, config, now)?;
    info!("evicting {} from {} to make room", bssid, kind);
    store.remove(&bssid)
}

/// Replaces the user-space blacklist with `bssids`.
///
/// Every tracked AP outside the new list loses both blacklist memberships
/// and is dropped if nothing else holds it. Each listed AP is then
/// admitted as a user blacklist entry. Addresses are validated before
/// anything changes.
pub fn replace_user_blacklist(
    store: &mut EntryStore,
    config: &RejectListConfig,
    now: u64,
    bssids: &[Bssid],
) -> Result<()> {
    if let Some(invalid) = bssids.iter().find(|bssid| !bssid.is_unicast()) {
        return Err(RejectListError::InvalidAddress(*invalid));
    }

    let released = store.retain_mut(|entry| {
        if !bssids.contains(&entry.bssid()) {
            let cleared = entry.clear_member(ListKind::UserBlacklist)
                | entry.clear_member(ListKind::DriverBlacklist);
            if cleared && !entry.membership().contains_category(Category::Avoid) {
                entry.set_avoid_reason(None);
            }
        }
        !entry.membership().is_empty()
    });

    info!(
        "user blacklist replaced with {} entries, {} released",
        bssids.len(),
        released
    );

    for (index, bssid) in bssids.iter().enumerate() {
        if bssids[..index].contains(bssid) {
            continue;
        }
        add_reason(store, config, now, &RejectRequest::user_blacklist(*bssid))?;
    }

    Ok(())
}

/// Drops every membership contributed by `source` and returns the number
/// of entries that were deleted as a result.
pub fn clear_by_source(store: &mut EntryStore, source: ReasonSource) -> usize {
    let kinds: &[ListKind] = match source {
        ReasonSource::Userspace => &[ListKind::UserAvoid, ListKind::UserBlacklist],
        ReasonSource::Driver => &[
            ListKind::DriverAvoid,
            ListKind::DriverBlacklist,
            ListKind::Monitor,
        ],
        ReasonSource::Firmware => &[],
    };

    for entry in store.iter_mut() {
        for kind in kinds {
            entry.clear_member(*kind);
        }

        if entry
            .rssi_params()
            .is_some_and(|params| params.source == source)
        {
            entry.clear_member(ListKind::RssiReject);
        }

        let membership = entry.membership();
        if !membership.contains_category(Category::Avoid)
            && !membership.contains_category(Category::Blacklist)
        {
            entry.set_avoid_reason(None);
        }
    }

    let removed = store.retain_mut(|entry| !entry.membership().is_empty());
    info!("cleared {:?} reasons, {} entries removed", source, removed);
    removed
}
