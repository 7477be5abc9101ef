use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::address::Bssid;
use crate::aging;
use crate::config::RejectListConfig;
use crate::export::{self, Action, DisplayRecord, RejectRecord, RejectSnapshot};
use crate::policy::{self, RejectRequest};
use crate::store::EntryStore;
use crate::time::{MonotonicClock, TimeProvider};
use crate::types::{ConnectionState, ListKind, ReasonSource, RejectEntry};
use crate::{RejectListError, Result};

/// Outbound link to the firmware copy of the reject list.
pub trait FirmwareTransport: Send + Sync {
    type Error: core::fmt::Display;

    /// Hands a complete snapshot to firmware, replacing whatever it held.
    fn send_reject_list(&self, snapshot: &RejectSnapshot) -> core::result::Result<(), Self::Error>;
}

impl<T: FirmwareTransport + ?Sized> FirmwareTransport for Arc<T> {
    type Error = T::Error;

    fn send_reject_list(&self, snapshot: &RejectSnapshot) -> core::result::Result<(), Self::Error> {
        (**self).send_reject_list(snapshot)
    }
}

/// Shared reject list for one radio.
///
/// Every operation holds the table lock for its whole duration. Operations
/// that change the table re-export it to firmware after the lock is
/// released; export failures are logged and otherwise ignored.
pub struct RejectListManager<T, C = MonotonicClock> {
    config: RejectListConfig,
    store: Mutex<EntryStore>,
    transport: T,
    clock: C,
}

impl<T: FirmwareTransport> RejectListManager<T, MonotonicClock> {
    pub fn new(config: RejectListConfig, transport: T) -> Result<Self> {
        Self::with_clock(config, transport, MonotonicClock::new())
    }
}

impl<T: FirmwareTransport, C: TimeProvider> RejectListManager<T, C> {
    pub fn with_clock(config: RejectListConfig, transport: T, clock: C) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            store: Mutex::new(EntryStore::new(config.max_entries)),
            config,
            transport,
            clock,
        })
    }

    pub fn config(&self) -> &RejectListConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn lock(&self) -> Result<MutexGuard<'_, EntryStore>> {
        self.store.lock().map_err(|_| RejectListError::LockUnavailable)
    }

    /// Runs `op` under the lock and exports the resulting table unless
    /// `op` was refused before touching it.
    fn mutate<R>(&self, op: impl FnOnce(&mut EntryStore, u64) -> Result<R>) -> Result<R> {
        let mut store = self.lock()?;
        let now = self.clock.uptime_ms();

        let result = op(&mut *store, now);
        let snapshot = match &result {
            Ok(_) | Err(RejectListError::CapacityExceeded) => Some(self.snapshot_locked(&mut store, now)),
            Err(_) => None,
        };
        drop(store);

        if let Some(snapshot) = snapshot {
            self.export(&snapshot);
        }
        result
    }

    fn snapshot_locked(&self, store: &mut EntryStore, now: u64) -> RejectSnapshot {
        export::build_snapshot(store, &self.config, now, self.config.firmware_list_size)
    }

    fn export(&self, snapshot: &RejectSnapshot) {
        match self.transport.send_reject_list(snapshot) {
            Ok(()) => debug!("exported {} records to firmware", snapshot.len()),
            Err(err) => warn!(
                "Failed to export {} records to firmware: {}",
                snapshot.len(),
                err
            ),
        }
    }

    /// Records one reject reason. Returns the membership the AP ended up
    /// in.
    pub fn submit_reject(&self, request: &RejectRequest) -> Result<ListKind> {
        self.mutate(|store, now| policy::add_reason(store, &self.config, now, request))
    }

    /// Replaces the user-space blacklist with `bssids`.
    pub fn submit_user_blacklist(&self, bssids: &[Bssid]) -> Result<()> {
        self.mutate(|store, now| policy::replace_user_blacklist(store, &self.config, now, bssids))
    }

    pub fn update_connection_state(&self, bssid: &Bssid, state: ConnectionState) -> Result<()> {
        let mut store = self.lock()?;
        let now = self.clock.uptime_ms();

        if !aging::update_connection_state(&mut store, bssid, state, &self.config, now) {
            return Ok(());
        }
        let snapshot = self.snapshot_locked(&mut store, now);
        drop(store);

        self.export(&snapshot);
        Ok(())
    }

    /// Decides how candidate selection should treat `bssid`. Nothing is
    /// exported, even when ageing drops the entry.
    pub fn decide_action(&self, bssid: &Bssid, live_rssi: Option<i32>) -> Result<Action> {
        let mut store = self.lock()?;
        let now = self.clock.uptime_ms();
        Ok(export::decide_action(&mut store, bssid, &self.config, now, live_rssi))
    }

    pub fn build_snapshot(&self, max_size: usize) -> Result<RejectSnapshot> {
        let mut store = self.lock()?;
        let now = self.clock.uptime_ms();
        Ok(export::build_snapshot(&mut store, &self.config, now, max_size))
    }

    pub fn rssi_reject_list(&self) -> Result<Vec<RejectRecord>> {
        let mut store = self.lock()?;
        let now = self.clock.uptime_ms();
        Ok(export::rssi_reject_list(&mut store, &self.config, now))
    }

    /// Drops every membership contributed by `source`. Returns the number of
    /// entries deleted.
    pub fn clear_by_source(&self, source: ReasonSource) -> Result<usize> {
        self.mutate(|store, _| Ok(policy::clear_by_source(store, source)))
    }

    /// Forgets every AP.
    pub fn flush(&self) -> Result<()> {
        self.mutate(|store, _| {
            store.clear();
            debug!("reject list flushed");
            Ok(())
        })
    }

    /// Pushes the current table to firmware and reports whether it arrived.
    pub fn resync(&self) -> Result<()> {
        let mut store = self.lock()?;
        let now = self.clock.uptime_ms();
        let snapshot = self.snapshot_locked(&mut store, now);
        drop(store);

        self.transport
            .send_reject_list(&snapshot)
            .map_err(|err| RejectListError::TransportFailure(err.to_string()))
    }

    /// Copy of the entry for `bssid` as stored, without ageing it.
    pub fn lookup(&self, bssid: &Bssid) -> Result<Option<RejectEntry>> {
        Ok(self.lock()?.find(bssid).cloned())
    }

    pub fn dump(&self) -> Result<Vec<DisplayRecord>> {
        let store = self.lock()?;
        Ok(export::dump(&store, &self.config, self.clock.uptime_ms()))
    }

    pub fn get_rssi_threshold(&self) -> i32 {
        self.config.delta_rssi
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }
}
