use crate::address::Bssid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectListError {
    #[error("Invalid BSSID {0}: zero and group addresses cannot be tracked")]
    InvalidAddress(Bssid),

    #[error("Reject list is full and no entry can be evicted")]
    CapacityExceeded,

    #[error("Reject list lock unavailable")]
    LockUnavailable,

    #[error("Firmware transport failure: {0}")]
    TransportFailure(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = core::result::Result<T, RejectListError>;
