use crate::address::Bssid;
use crate::types::RejectEntry;
use crate::{RejectListError, Result};

/// Bounded table of reject entries, keyed by BSSID.
///
/// The table is small, so lookups are linear scans over a `Vec`.
#[derive(Debug, Clone)]
pub struct EntryStore {
    entries: Vec<RejectEntry>,
    max_entries: usize,
}

impl EntryStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::with_capacity(max_entries),
            max_entries,
        }
    }

    pub fn find(&self, bssid: &Bssid) -> Option<&RejectEntry> {
        self.entries.iter().find(|entry| entry.bssid() == *bssid)
    }

    pub(crate) fn find_mut(&mut self, bssid: &Bssid) -> Option<&mut RejectEntry> {
        self.entries.iter_mut().find(|entry| entry.bssid() == *bssid)
    }

    pub fn contains(&self, bssid: &Bssid) -> bool {
        self.find(bssid).is_some()
    }

    /// Adds a new entry, replacing any entry with the same BSSID.
    pub(crate) fn insert(&mut self, entry: RejectEntry) -> Result<()> {
        if let Some(existing) = self.find_mut(&entry.bssid()) {
            *existing = entry;
            return Ok(());
        }

        if self.is_full() {
            return Err(RejectListError::CapacityExceeded);
        }

        self.entries.push(entry);
        Ok(())
    }

    pub fn remove(&mut self, bssid: &Bssid) -> Option<RejectEntry> {
        let index = self.entries.iter().position(|entry| entry.bssid() == *bssid)?;
        Some(self.entries.swap_remove(index))
    }

    /// Keeps only the entries for which `keep` returns true. `keep` may
    /// mutate the entry it is given.
    pub(crate) fn retain_mut<F>(&mut self, keep: F) -> usize
    where
        F: FnMut(&mut RejectEntry) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain_mut(keep);
        before - self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RejectEntry> {
        self.entries.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut RejectEntry> {
        self.entries.iter_mut()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.max_entries
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ListKind;

    fn entry(last: u8) -> RejectEntry {
        let mut entry = RejectEntry::new(Bssid::new([0x02, 0, 0, 0, 0, last]));
        entry.set_member(ListKind::DriverAvoid, 0);
        entry
    }

    #[test]
    fn test_insert_find_remove() {
        let mut store = EntryStore::new(4);
        store.insert(entry(1)).unwrap();
        store.insert(entry(2)).unwrap();

        assert_eq!(store.len(), 2);
        assert!(store.contains(&Bssid::new([0x02, 0, 0, 0, 0, 1])));

        let removed = store.remove(&Bssid::new([0x02, 0, 0, 0, 0, 1])).unwrap();
        assert_eq!(removed.bssid(), Bssid::new([0x02, 0, 0, 0, 0, 1]));
        assert!(store.remove(&Bssid::new([0x02, 0, 0, 0, 0, 1])).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_insert_fails_when_full() {
        let mut store = EntryStore::new(2);
        store.insert(entry(1)).unwrap();
        store.insert(entry(2)).unwrap();

        assert!(store.is_full());
        assert_eq!(
            store.insert(entry(3)),
            Err(RejectListError::CapacityExceeded)
        );
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_insert_existing_replaces_in_place() {
        let mut store = EntryStore::new(1);
        store.insert(entry(1)).unwrap();

        let mut replacement = RejectEntry::new(Bssid::new([0x02, 0, 0, 0, 0, 1]));
        replacement.set_member(ListKind::UserBlacklist, 5);
        store.insert(replacement).unwrap();

        let found = store.find(&Bssid::new([0x02, 0, 0, 0, 0, 1])).unwrap();
        assert!(found.is_member(ListKind::UserBlacklist));
        assert!(!found.is_member(ListKind::DriverAvoid));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_retain_mut_deletes_during_iteration() {
        let mut store = EntryStore::new(4);
        for last in 1..=4 {
            store.insert(entry(last)).unwrap();
        }

        let removed = store.retain_mut(|entry| entry.bssid().octets()[5] % 2 == 0);
        assert_eq!(removed, 2);
        assert!(store.iter().all(|entry| entry.bssid().octets()[5] % 2 == 0));
    }
}
