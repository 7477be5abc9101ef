//! Lazy expiry of entry memberships.
//!
//! Nothing here runs on a timer. Every table operation ages the entries it
//! touches against the caller's `now`, so an expired membership lingers
//! until the next operation observes it.

use tracing::debug;

use crate::address::Bssid;
use crate::config::RejectListConfig;
use crate::store::EntryStore;
use crate::types::{Category, ConnectionState, ListKind, RejectEntry};

/// Recomputes which memberships of `entry` are still active at `now`.
///
/// Expired AVOID and driver BLACKLIST memberships move the entry to
/// MONITOR. An RSSI rejection clears once its retry delay has passed, or
/// once `live_rssi` reaches the RSSI the AP asked for. Returns whether the
/// entry changed. An entry left without memberships must be removed by
/// the caller.
pub fn refresh(
    entry: &mut RejectEntry,
    config: &RejectListConfig,
    now: u64,
    live_rssi: Option<i32>,
) -> bool {
    let mut changed = false;

    for kind in [ListKind::UserAvoid, ListKind::DriverAvoid] {
        if entry.is_member(kind) && entry.elapsed(kind, now) >= config.avoid_list_expiry_ms {
            entry.clear_member(kind);
            entry.set_member(ListKind::Monitor, now);
            changed = true;
        }
    }

    if entry.is_member(ListKind::DriverBlacklist)
        && entry.elapsed(ListKind::DriverBlacklist, now) >= config.blacklist_expiry_ms
    {
        entry.clear_member(ListKind::DriverBlacklist);
        entry.set_member(ListKind::Monitor, now);
        changed = true;
    }

    if entry.is_member(ListKind::RssiReject)
        && rssi_reject_resolved(entry, config, now, live_rssi)
    {
        entry.clear_member(ListKind::RssiReject);
        changed = true;
    }

    if changed {
        let membership = entry.membership();
        if !membership.contains_category(Category::Avoid)
            && !membership.contains_category(Category::Blacklist)
        {
            entry.set_avoid_reason(None);
        }
        debug!("{} aged to {:?}", entry.bssid(), membership);
    }

    changed
}

/// A reject with neither a retry delay nor an expected RSSI falls back to
/// the default window as its timer.
fn rssi_reject_resolved(
    entry: &RejectEntry,
    config: &RejectListConfig,
    now: u64,
    live_rssi: Option<i32>,
) -> bool {
    let Some(params) = entry.rssi_params() else {
        return true;
    };

    let window = match (params.retry_delay_ms, params.expected_rssi) {
        (0, 0) => Some(config.rssi_reject_default_window_ms),
        (0, _) => None,
        (delay, _) => Some(delay),
    };
    let timer_elapsed =
        window.is_some_and(|window| entry.elapsed(ListKind::RssiReject, now) >= window);

    let signal_recovered = params.expected_rssi != 0
        && live_rssi.is_some_and(|rssi| rssi >= params.expected_rssi);

    timer_elapsed || signal_recovered
}

/// Ages every entry and deletes the ones left without memberships.
/// Returns whether anything in the table changed.
pub fn sweep(store: &mut EntryStore, config: &RejectListConfig, now: u64) -> bool {
    let mut changed = false;

    let removed = store.retain_mut(|entry| {
        changed |= refresh(entry, config, now, None);
        !entry.membership().is_empty()
    });

    if removed > 0 {
        debug!("sweep removed {} expired entries", removed);
    }

    changed
}

/// Ages a single entry, deleting it when nothing remains. Returns the
/// entry if it is still tracked.
pub fn refresh_entry<'a>(
    store: &'a mut EntryStore,
    bssid: &Bssid,
    config: &RejectListConfig,
    now: u64,
    live_rssi: Option<i32>,
) -> Option<&'a RejectEntry> {
    let entry = store.find_mut(bssid)?;
    refresh(entry, config, now, live_rssi);

    if entry.membership().is_empty() {
        store.remove(bssid);
        debug!("{} fully expired", bssid);
        return None;
    }

    store.find(bssid)
}

/// Forgives an AP that stayed connected for longer than the counter reset
/// time. Driver penalties, the monitor state and user avoidance are
/// cleared. A user blacklist is kept, and with it the bad BSSID counter,
/// so one more driver avoid can escalate that AP straight to BLACKLIST.
pub fn forgive(entry: &mut RejectEntry, config: &RejectListConfig, connected_ms: u64) -> bool {
    if connected_ms <= config.bad_bssid_counter_reset_time_ms {
        return false;
    }

    let mut changed = false;
    for kind in [
        ListKind::DriverAvoid,
        ListKind::DriverBlacklist,
        ListKind::Monitor,
        ListKind::UserAvoid,
    ] {
        changed |= entry.clear_member(kind);
    }

    if changed && !entry.is_member(ListKind::UserBlacklist) {
        entry.set_avoid_reason(None);
    }

    changed
}

/// Tracks association with a listed AP. Connecting stamps the entry; a
/// later disconnect forgives it if the connection lasted long enough.
/// APs that are not tracked are ignored. Returns whether the table changed.
pub fn update_connection_state(
    store: &mut EntryStore,
    bssid: &Bssid,
    state: ConnectionState,
    config: &RejectListConfig,
    now: u64,
) -> bool {
    let Some(entry) = store.find_mut(bssid) else {
        return false;
    };

    match state {
        ConnectionState::Connected => {
            entry.set_connect_timestamp(Some(now));
            false
        }
        ConnectionState::Disconnected => {
            let Some(connected_at) = entry.connect_timestamp() else {
                return false;
            };
            entry.set_connect_timestamp(None);

            if !forgive(entry, config, now.saturating_sub(connected_at)) {
                return false;
            }

            if entry.membership().is_empty() {
                store.remove(bssid);
                debug!("{} forgiven and removed", bssid);
            } else {
                debug!("{} forgiven", bssid);
            }
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ReasonSource, RejectReason, RssiRejectParams};

    const BSSID: Bssid = Bssid::new([0x02, 0x11, 0x22, 0x33, 0x44, 0x55]);

    fn config() -> RejectListConfig {
        RejectListConfig {
            avoid_list_expiry_ms: 1_000,
            blacklist_expiry_ms: 5_000,
            bad_bssid_counter_reset_time_ms: 2_000,
            ..RejectListConfig::default()
        }
    }

    fn rssi_entry(expected_rssi: i32, retry_delay_ms: u64) -> RejectEntry {
        let mut entry = RejectEntry::new(BSSID);
        entry.set_member(ListKind::RssiReject, 0);
        entry.set_rssi_reject(
            RejectReason::AssocRejectOce,
            RssiRejectParams {
                expected_rssi,
                retry_delay_ms,
                original_timeout_ms: retry_delay_ms,
                received_time_ms: 0,
                source: ReasonSource::Firmware,
            },
        );
        entry
    }

    #[test]
    fn test_avoid_expires_into_monitor() {
        let mut entry = RejectEntry::new(BSSID);
        entry.set_member(ListKind::DriverAvoid, 0);
        entry.set_avoid_reason(Some(RejectReason::NudFailure));

        assert!(!refresh(&mut entry, &config(), 999, None));
        assert!(entry.is_member(ListKind::DriverAvoid));

        assert!(refresh(&mut entry, &config(), 1_000, None));
        assert!(!entry.is_member(ListKind::DriverAvoid));
        assert!(entry.membership().is_only(ListKind::Monitor));
        assert_eq!(entry.last_update(ListKind::Monitor), Some(1_000));
        assert_eq!(entry.reason_for(ListKind::DriverAvoid), None);
    }

    #[test]
    fn test_user_blacklist_never_expires() {
        let mut entry = RejectEntry::new(BSSID);
        entry.set_member(ListKind::UserBlacklist, 0);

        assert!(!refresh(&mut entry, &config(), u64::MAX, None));
        assert!(entry.membership().is_only(ListKind::UserBlacklist));
    }

    #[test]
    fn test_driver_blacklist_expires_into_monitor() {
        let mut entry = RejectEntry::new(BSSID);
        entry.set_member(ListKind::DriverBlacklist, 100);

        assert!(!refresh(&mut entry, &config(), 5_099, None));
        assert!(refresh(&mut entry, &config(), 5_100, None));
        assert!(entry.membership().is_only(ListKind::Monitor));
    }

    #[test]
    fn test_rssi_reject_cleared_by_signal() {
        let mut entry = rssi_entry(-70, 0);

        assert!(!refresh(&mut entry, &config(), 1_000_000, None));
        assert!(!refresh(&mut entry, &config(), 0, Some(-75)));
        assert!(refresh(&mut entry, &config(), 0, Some(-70)));
        assert!(entry.membership().is_empty());
    }

    #[test]
    fn test_rssi_reject_cleared_by_timer() {
        let mut entry = rssi_entry(-70, 3_000);

        assert!(!refresh(&mut entry, &config(), 2_999, Some(-80)));
        assert!(refresh(&mut entry, &config(), 3_000, Some(-80)));
        assert!(entry.membership().is_empty());
    }

    #[test]
    fn test_btm_reject_ignores_signal() {
        let mut entry = rssi_entry(0, 3_000);

        assert!(!refresh(&mut entry, &config(), 10, Some(-30)));
        assert!(entry.is_member(ListKind::RssiReject));
    }

    #[test]
    fn test_unconditioned_reject_uses_default_window() {
        let cfg = RejectListConfig {
            rssi_reject_default_window_ms: 4_000,
            ..config()
        };
        let mut entry = rssi_entry(0, 0);

        assert!(!refresh(&mut entry, &cfg, 3_999, Some(-20)));
        assert!(entry.is_member(ListKind::RssiReject));
        assert!(refresh(&mut entry, &cfg, 4_000, None));
        assert!(entry.membership().is_empty());
    }

    #[test]
    fn test_refresh_is_idempotent() {
        let mut entry = RejectEntry::new(BSSID);
        entry.set_member(ListKind::UserAvoid, 0);
        entry.set_member(ListKind::DriverBlacklist, 0);

        refresh(&mut entry, &config(), 6_000, None);
        let once = entry.clone();

        assert!(!refresh(&mut entry, &config(), 6_000, None));
        assert_eq!(entry, once);
    }

    #[test]
    fn test_refresh_entry_deletes_empty() {
        let mut store = EntryStore::new(4);
        store.insert(rssi_entry(-70, 0)).unwrap();

        assert!(refresh_entry(&mut store, &BSSID, &config(), 0, Some(-80)).is_some());
        assert!(refresh_entry(&mut store, &BSSID, &config(), 0, Some(-65)).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_sweep_keeps_monitor_entries() {
        let mut store = EntryStore::new(4);
        let mut entry = RejectEntry::new(BSSID);
        entry.set_member(ListKind::UserAvoid, 0);
        store.insert(entry).unwrap();

        assert!(sweep(&mut store, &config(), 1_000));
        let entry = store.find(&BSSID).unwrap();
        assert!(entry.membership().is_only(ListKind::Monitor));
        assert!(!sweep(&mut store, &config(), 1_000_000));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_forgive_keeps_user_blacklist() {
        let mut entry = RejectEntry::new(BSSID);
        entry.set_member(ListKind::UserBlacklist, 0);
        entry.set_member(ListKind::DriverAvoid, 0);
        entry.set_member(ListKind::Monitor, 0);

        assert!(!forgive(&mut entry, &config(), 2_000));
        assert!(forgive(&mut entry, &config(), 2_001));
        assert!(entry.membership().is_only(ListKind::UserBlacklist));
    }

    #[test]
    fn test_long_connection_forgives_and_removes() {
        let mut store = EntryStore::new(4);
        let mut entry = RejectEntry::new(BSSID);
        entry.set_member(ListKind::DriverAvoid, 0);
        store.insert(entry).unwrap();

        let cfg = config();
        assert!(!update_connection_state(&mut store, &BSSID, ConnectionState::Connected, &cfg, 100));
        assert_eq!(store.find(&BSSID).unwrap().connect_timestamp(), Some(100));

        assert!(update_connection_state(&mut store, &BSSID, ConnectionState::Disconnected, &cfg, 2_500));
        assert!(store.is_empty());
    }

    #[test]
    fn test_short_connection_keeps_penalties() {
        let mut store = EntryStore::new(4);
        let mut entry = RejectEntry::new(BSSID);
        entry.set_member(ListKind::DriverAvoid, 0);
        store.insert(entry).unwrap();

        let cfg = config();
        update_connection_state(&mut store, &BSSID, ConnectionState::Connected, &cfg, 100);
        assert!(!update_connection_state(&mut store, &BSSID, ConnectionState::Disconnected, &cfg, 600));

        let entry = store.find(&BSSID).unwrap();
        assert!(entry.is_member(ListKind::DriverAvoid));
        assert_eq!(entry.connect_timestamp(), None);
    }

    #[test]
    fn test_untracked_ap_is_not_inserted() {
        let mut store = EntryStore::new(4);
        assert!(!update_connection_state(
            &mut store,
            &BSSID,
            ConnectionState::Connected,
            &config(),
            0
        ));
        assert!(store.is_empty());
    }
}
