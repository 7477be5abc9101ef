use std::error::Error;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use apguard_core::{Bssid, ReasonSource, RejectKind, RejectReason, RejectRequest, RssiRejectParams};
use serde::{Deserialize, Serialize};

/// List a scripted reject event targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestedList {
    Avoid,
    Blacklist,
    RssiReject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventAction {
    Reject {
        bssid: Bssid,
        list: RequestedList,
        #[serde(default = "default_source")]
        source: ReasonSource,
        #[serde(default = "default_reason")]
        reason: RejectReason,
        #[serde(default)]
        expected_rssi: i32,
        #[serde(default)]
        retry_delay_ms: u64,
        original_timeout_ms: Option<u64>,
    },
    UserBlacklist {
        bssids: Vec<Bssid>,
    },
    Connected {
        bssid: Bssid,
    },
    Disconnected {
        bssid: Bssid,
    },
    Query {
        bssid: Bssid,
        rssi: Option<i32>,
    },
    ClearSource {
        source: ReasonSource,
    },
    Flush,
    Dump,
}

fn default_source() -> ReasonSource {
    ReasonSource::Driver
}

fn default_reason() -> RejectReason {
    RejectReason::Unknown
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Uptime at which the event fires
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: EventAction,
}

impl Event {
    /// Builds the core request for a `reject` event.
    pub fn reject_request(&self) -> Option<RejectRequest> {
        let EventAction::Reject {
            bssid,
            list,
            source,
            reason,
            expected_rssi,
            retry_delay_ms,
            original_timeout_ms,
        } = &self.action
        else {
            return None;
        };

        let kind = match list {
            RequestedList::Avoid => RejectKind::Avoid,
            RequestedList::Blacklist => RejectKind::Blacklist,
            RequestedList::RssiReject => RejectKind::RssiReject(RssiRejectParams {
                expected_rssi: *expected_rssi,
                retry_delay_ms: *retry_delay_ms,
                original_timeout_ms: original_timeout_ms.unwrap_or(*retry_delay_ms),
                received_time_ms: self.at_ms,
                source: *source,
            }),
        };

        Some(RejectRequest {
            bssid: *bssid,
            kind,
            source: *source,
            reason: *reason,
        })
    }
}

/// Timed sequence of events replayed against a reject list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default, rename = "event")]
    pub events: Vec<Event>,
}

impl Script {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        Ok(fs::read_to_string(path)?.parse()?)
    }
}

impl FromStr for Script {
    type Err = toml::de::Error;

    /// Parses a script; events are ordered by `at_ms`, keeping file order
    /// for equal times.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut script: Script = toml::from_str(s)?;
        script.events.sort_by_key(|event| event.at_ms);
        Ok(script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_order_events() {
        let script: Script = r#"
            [[event]]
            at_ms = 500
            type = "dump"

            [[event]]
            at_ms = 100
            type = "reject"
            bssid = "02:00:00:00:00:01"
            list = "rssi_reject"
            source = "firmware"
            reason = "btm_mbo_retry"
            retry_delay_ms = 3000

            [[event]]
            at_ms = 100
            type = "query"
            bssid = "02:00:00:00:00:01"
            rssi = -61
        "#
        .parse()
        .unwrap();

        assert_eq!(script.events.len(), 3);
        assert_eq!(script.events[0].at_ms, 100);
        assert!(matches!(script.events[1].action, EventAction::Query { rssi: Some(-61), .. }));
        assert_eq!(script.events[2].action, EventAction::Dump);

        let request = script.events[0].reject_request().unwrap();
        assert_eq!(request.source, ReasonSource::Firmware);
        assert_eq!(request.reason, RejectReason::BtmMboRetry);
        let RejectKind::RssiReject(params) = request.kind else {
            panic!("expected an RSSI reject");
        };
        assert_eq!(params.retry_delay_ms, 3_000);
        assert_eq!(params.original_timeout_ms, 3_000);
        assert_eq!(params.expected_rssi, 0);
        assert_eq!(params.received_time_ms, 100);
    }

    #[test]
    fn test_reject_defaults() {
        let script: Script = r#"
            [[event]]
            at_ms = 0
            type = "reject"
            bssid = "02:00:00:00:00:02"
            list = "avoid"
        "#
        .parse()
        .unwrap();

        let request = script.events[0].reject_request().unwrap();
        assert_eq!(request.kind, RejectKind::Avoid);
        assert_eq!(request.source, ReasonSource::Driver);
        assert_eq!(request.reason, RejectReason::Unknown);
    }

    #[test]
    fn test_unknown_event_type_is_rejected() {
        let result = r#"
            [[event]]
            at_ms = 0
            type = "reboot"
        "#
        .parse::<Script>();

        assert!(result.is_err());
    }
}
