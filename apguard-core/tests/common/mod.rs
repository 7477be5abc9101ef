use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use apguard_core::{
    Bssid, FirmwareTransport, ManualClock, ReasonSource, RejectListConfig, RejectListManager,
    RejectReason, RejectRequest, RejectSnapshot, RssiRejectParams,
};

#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<RejectSnapshot>>,
}

impl RecordingTransport {
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<RejectSnapshot> {
        self.sent.lock().unwrap().last().cloned()
    }
}

impl FirmwareTransport for RecordingTransport {
    type Error = Infallible;

    fn send_reject_list(&self, snapshot: &RejectSnapshot) -> Result<(), Infallible> {
        self.sent.lock().unwrap().push(snapshot.clone());
        Ok(())
    }
}

pub struct MockRadio {
    pub manager: RejectListManager<Arc<RecordingTransport>, Arc<ManualClock>>,
    pub transport: Arc<RecordingTransport>,
    pub clock: Arc<ManualClock>,
}

impl MockRadio {
    pub fn new(config: RejectListConfig) -> Self {
        let transport = Arc::new(RecordingTransport::default());
        let clock = Arc::new(ManualClock::new(1_000));
        let manager =
            RejectListManager::with_clock(config, transport.clone(), clock.clone()).unwrap();

        Self {
            manager,
            transport,
            clock,
        }
    }
}

pub fn bssid(last: u8) -> Bssid {
    Bssid::new([0x00, 0x1a, 0x2b, 0x3c, 0x4d, last])
}

pub fn driver_avoid(bssid: Bssid) -> RejectRequest {
    RejectRequest::avoid(bssid, ReasonSource::Driver, RejectReason::NudFailure)
}

pub fn user_avoid(bssid: Bssid) -> RejectRequest {
    RejectRequest::avoid(bssid, ReasonSource::Userspace, RejectReason::UserspaceAvoidList)
}

pub fn rssi_reject(bssid: Bssid, expected_rssi: i32, retry_delay_ms: u64) -> RejectRequest {
    RejectRequest::rssi_reject(
        bssid,
        RejectReason::AssocRejectPoorRssi,
        RssiRejectParams {
            expected_rssi,
            retry_delay_ms,
            original_timeout_ms: retry_delay_ms,
            received_time_ms: 0,
            source: ReasonSource::Firmware,
        },
    )
}
