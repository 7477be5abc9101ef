//! Reject-AP list for a Wi-Fi station: tracks access points to avoid,
//! blacklist or temporarily reject, ages those penalties, and exports a
//! bounded priority-ordered copy for firmware roam scans.

pub mod address;
pub mod aging;
pub mod config;
pub mod error;
pub mod export;
pub mod manager;
pub mod policy;
pub mod store;
pub mod time;
pub mod types;

pub use address::*;
pub use config::*;
pub use error::*;
pub use export::{Action, DisplayRecord, EXPORT_ORDER, RejectRecord, RejectSnapshot};
pub use manager::*;
pub use policy::RejectRequest;
pub use store::EntryStore;
pub use time::*;
pub use types::*;
