use std::error::Error;
use std::sync::Arc;

use apguard_core::{Action, Bssid, ConnectionState, ManualClock, RejectListManager};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::firmware::FirmwareReport;
use crate::scenario::{Event, EventAction, Script};
use crate::settings::Settings;
use crate::transport::ChannelTransport;

pub mod firmware;
pub mod scenario;
pub mod settings;
pub mod transport;

type Manager = RejectListManager<ChannelTransport, Arc<ManualClock>>;

/// Outcome of replaying a script.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Answers to every `query` event, in replay order
    pub decisions: Vec<(Bssid, Action)>,
    /// Events the reject list refused
    pub refused: usize,
    /// Entries left in the table at the end of the replay
    pub remaining: usize,
    pub firmware: FirmwareReport,
}

pub async fn run(settings: &Arc<Settings>) -> Result<RunReport, Box<dyn Error>> {
    let script = match &settings.scenario {
        Some(scenario) => Script::load(&scenario.path)?,
        None => Script::default(),
    };
    info!("replaying {} events", script.events.len());

    replay(settings, &script).await
}

/// Replays `script` against a fresh reject list wired to a mock firmware
/// task, with time driven by the script.
pub async fn replay(settings: &Settings, script: &Script) -> Result<RunReport, Box<dyn Error>> {
    let (tx, rx) = mpsc::channel(settings.firmware.queue_depth.max(1));
    let firmware = firmware::spawn(rx);

    let clock = Arc::new(ManualClock::new(0));
    let manager = RejectListManager::with_clock(
        settings.reject_list.clone(),
        ChannelTransport::new(tx),
        clock.clone(),
    )?;

    let mut report = RunReport::default();
    for event in &script.events {
        clock.advance_to(event.at_ms);

        if let Err(e) = apply(&manager, event, &mut report) {
            warn!("t={}ms {:?} refused: {}", event.at_ms, event.action, e);
            report.refused += 1;
        }

        // Let the firmware task drain between events.
        tokio::task::yield_now().await;
    }

    log_dump(&manager)?;
    report.remaining = manager.len()?;

    drop(manager);
    report.firmware = firmware.await?;

    info!(
        "replay finished: {} queries, {} refused, firmware saw {} updates",
        report.decisions.len(),
        report.refused,
        report.firmware.received
    );

    Ok(report)
}

fn apply(manager: &Manager, event: &Event, report: &mut RunReport) -> apguard_core::Result<()> {
    match &event.action {
        EventAction::Reject { .. } => {
            if let Some(request) = event.reject_request() {
                let placed = manager.submit_reject(&request)?;
                info!("t={}ms {} placed in {}", event.at_ms, request.bssid, placed);
            }
        }
        EventAction::UserBlacklist { bssids } => manager.submit_user_blacklist(bssids)?,
        EventAction::Connected { bssid } => {
            manager.update_connection_state(bssid, ConnectionState::Connected)?
        }
        EventAction::Disconnected { bssid } => {
            manager.update_connection_state(bssid, ConnectionState::Disconnected)?
        }
        EventAction::Query { bssid, rssi } => {
            let action = manager.decide_action(bssid, *rssi)?;
            info!("t={}ms {} -> {:?}", event.at_ms, bssid, action);
            report.decisions.push((*bssid, action));
        }
        EventAction::ClearSource { source } => {
            let removed = manager.clear_by_source(*source)?;
            info!("t={}ms cleared {:?}, {} entries removed", event.at_ms, source, removed);
        }
        EventAction::Flush => manager.flush()?,
        EventAction::Dump => log_dump(manager)?,
    }

    Ok(())
}

fn log_dump(manager: &Manager) -> apguard_core::Result<()> {
    let records = manager.dump()?;

    info!(
        "reject list at {} ({} records, rssi threshold {}dB)",
        OffsetDateTime::now_utc(),
        records.len(),
        manager.get_rssi_threshold()
    );
    for record in &records {
        info!("  {}", record);
    }

    Ok(())
}
