use apguard_core::{ListKind, RejectSnapshot};
use tokio::sync::mpsc::Receiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What the mock firmware saw before its queue closed.
#[derive(Debug, Clone, Default)]
pub struct FirmwareReport {
    pub received: usize,
    pub malformed: usize,
    pub current: RejectSnapshot,
}

/// Stands in for firmware: decodes each pushed snapshot and keeps the most
/// recent one, as the real list replaces its predecessor wholesale.
pub fn spawn(mut rx: Receiver<Vec<u8>>) -> JoinHandle<FirmwareReport> {
    tokio::spawn(async move {
        let mut report = FirmwareReport::default();

        while let Some(frame) = rx.recv().await {
            let snapshot = match serde_json::from_slice::<RejectSnapshot>(&frame) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!("Firmware dropped malformed reject list: {}", e);
                    report.malformed += 1;
                    continue;
                }
            };

            report.received += 1;
            let blocked = snapshot
                .iter()
                .filter(|record| {
                    matches!(
                        record.kind,
                        ListKind::UserBlacklist | ListKind::DriverBlacklist
                    )
                })
                .count();
            info!(
                "Firmware reject list updated: {} records, {} blacklisted",
                snapshot.len(),
                blocked
            );
            for record in snapshot.iter() {
                debug!(
                    "  {} {} {:?} for {:?}ms",
                    record.bssid, record.kind, record.reason, record.reject_duration_ms
                );
            }

            report.current = snapshot;
        }

        report
    })
}
