//! rangescan - incremental TCP reachability scanning over IPv4 ranges
//!
//! A scan is split into chunks of a few addresses each. The engine probes one
//! chunk per call and hands back a cursor; the caller keeps the cursor and
//! the accumulated results, so the engine itself holds no session state.

pub mod api;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod output;
pub mod scanner;
pub mod utils;

// Re-export commonly used types
pub use config::{ProgressMode, ScanConfig};
pub use error::{ScanError, ScanResult};
pub use network::{ProbeStatus, TargetProber, UNRESOLVED_NAME};
pub use scanner::{
    AccumulatedResults, ChunkResponse, ProbeResult, ScanAggregator, ScanEngine, ScanSession, ScanStatus,
};
pub use utils::address_parser::{AddressRange, ExpandedRange};
pub use utils::port_parser::{PortPolicy, PortSet};

pub type Result<T> = std::result::Result<T, ScanError>;
