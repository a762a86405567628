//! Traffic store for rep: live capture buffer, session archive, query engine
//! and request chain reconstruction.

mod aggregate;
mod chain;
mod dedup;
mod error;
mod filter;
mod live;
mod migrate;
mod paths;
mod persist;
mod rules;
mod store;
mod working_set;

pub use aggregate::{domain_stats, page_flows};
pub use chain::{chain_for, page_chains};
pub use dedup::dedup_requests;
pub use error::RepError;
pub use filter::{filter_requests, filter_with_total};
pub use live::{
    read_live_snapshot, LiveBuffer, LiveOptions, LiveState, PingStatus, DEFAULT_CAPACITY,
};
pub use migrate::upgrade_legacy;
pub use paths::{expand_home, DataPaths, DATA_HOME_ENV, LIVE_FILE_NAME, LIVE_PATH_ENV, STORE_FILE_NAME};
pub use persist::{read_export, write_json_atomic};
pub use rules::DomainRules;
pub use store::{Store, StoreData};
pub use working_set::WorkingSet;

/// Result type for rep store operations.
pub type Result<T> = std::result::Result<T, RepError>;
